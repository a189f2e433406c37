//! ARFF table loader.
//!
//! Supports dense ARFF files with `numeric` / `real` / `integer`, `string`
//! and nominal (`{a, b, c}`) attributes. Values may be single- or double-quoted,
//! `?` marks a missing value and `%` starts a comment line. Keywords are
//! case-insensitive.
//!
//! Sparse data rows and `date` / `relational` attributes are rejected with
//! [`DatasetLoadError::Unsupported`].

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};

use super::error::DatasetLoadError;
use crate::data::{DataError, MetaFeatureTable, PerformanceTable, TaskId};

// =============================================================================
// Types
// =============================================================================

/// Declared type of an ARFF attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum ArffType {
    Numeric,
    String,
    Nominal(Vec<String>),
}

impl ArffType {
    fn describe(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::String => "string",
            Self::Nominal(_) => "nominal",
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct ArffAttribute {
    pub name: String,
    pub kind: ArffType,
}

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ArffValue {
    Number(f64),
    Text(String),
    Missing,
}

/// A parsed ARFF file: header plus row-oriented values.
#[derive(Debug, Clone, PartialEq)]
pub struct ArffFrame {
    pub relation: String,
    pub attributes: Vec<ArffAttribute>,
    pub rows: Vec<Vec<ArffValue>>,
}

// =============================================================================
// Public API
// =============================================================================

/// Read and parse an ARFF file.
pub fn read_arff(path: impl AsRef<Path>) -> Result<ArffFrame, DatasetLoadError> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_arff(&text)
}

/// Parse ARFF text.
pub fn parse_arff(text: &str) -> Result<ArffFrame, DatasetLoadError> {
    let mut relation = String::new();
    let mut attributes = Vec::new();
    let mut rows = Vec::new();
    let mut in_data = false;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }

        if in_data {
            if line.starts_with('{') {
                return Err(DatasetLoadError::Unsupported {
                    line: line_no,
                    feature: "sparse data row".into(),
                });
            }
            rows.push(parse_row(line, line_no, &attributes)?);
            continue;
        }

        let (keyword, rest) = split_keyword(line);
        match keyword.to_ascii_lowercase().as_str() {
            "@relation" => relation = unquote(rest.trim()).to_string(),
            "@attribute" => attributes.push(parse_attribute(rest, line_no)?),
            "@data" => in_data = true,
            other => {
                return Err(DatasetLoadError::Syntax {
                    line: line_no,
                    message: format!("unexpected header keyword '{other}'"),
                })
            }
        }
    }

    if !in_data {
        return Err(DatasetLoadError::Syntax {
            line: text.lines().count(),
            message: "missing @data section".into(),
        });
    }

    Ok(ArffFrame {
        relation,
        attributes,
        rows,
    })
}

// =============================================================================
// Column Access and Table Conversion
// =============================================================================

impl ArffFrame {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Index of the attribute called `name`.
    pub fn column_index(&self, name: &str) -> Result<usize, DatasetLoadError> {
        self.attributes
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| DatasetLoadError::MissingColumn(name.to_string()))
    }

    /// Values of a numeric column, missing values as NaN.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>, DatasetLoadError> {
        let col = self.column_index(name)?;
        let attr = &self.attributes[col];
        if attr.kind != ArffType::Numeric {
            return Err(DatasetLoadError::UnsupportedType {
                column: name.to_string(),
                expected: "numeric".into(),
                got: attr.kind.describe().into(),
            });
        }
        Ok(self
            .rows
            .iter()
            .map(|row| match row[col] {
                ArffValue::Number(v) => v,
                _ => f64::NAN,
            })
            .collect())
    }

    /// Values of a nominal or string column.
    pub fn text_column(&self, name: &str) -> Result<Vec<Option<String>>, DatasetLoadError> {
        let col = self.column_index(name)?;
        let attr = &self.attributes[col];
        if attr.kind == ArffType::Numeric {
            return Err(DatasetLoadError::UnsupportedType {
                column: name.to_string(),
                expected: "nominal or string".into(),
                got: attr.kind.describe().into(),
            });
        }
        Ok(self
            .rows
            .iter()
            .map(|row| match &row[col] {
                ArffValue::Text(s) => Some(s.clone()),
                _ => None,
            })
            .collect())
    }

    /// Keep only the rows whose nominal or string `column` equals `value`.
    ///
    /// Dropped rows are never converted, so they may hold missing values in
    /// columns that [`ArffFrame::to_performance_table`] requires.
    pub fn filter_eq(&self, column: &str, value: &str) -> Result<Self, DatasetLoadError> {
        let keep = self.text_column(column)?;
        let rows = self
            .rows
            .iter()
            .zip(keep)
            .filter(|(_, v)| v.as_deref() == Some(value))
            .map(|(row, _)| row.clone())
            .collect();
        Ok(Self {
            relation: self.relation.clone(),
            attributes: self.attributes.clone(),
            rows,
        })
    }

    /// Build a [`PerformanceTable`].
    ///
    /// Every nominal and string attribute is kept as a categorical column so
    /// rows can be filtered afterwards. Parameters and target must be present
    /// in every row.
    pub fn to_performance_table(
        &self,
        task_column: &str,
        param_columns: &[String],
        target_column: &str,
    ) -> Result<PerformanceTable, DatasetLoadError> {
        let task_ids = self.task_ids(task_column)?;
        let n_rows = self.n_rows();

        let mut params = Array2::zeros((n_rows, param_columns.len()));
        for (j, name) in param_columns.iter().enumerate() {
            let values = self.numeric_column(name)?;
            for (i, v) in values.into_iter().enumerate() {
                if v.is_nan() {
                    return Err(DatasetLoadError::MissingValue {
                        column: name.clone(),
                        row: i,
                    });
                }
                params[[i, j]] = v;
            }
        }

        let targets = self.numeric_column(target_column)?;
        if let Some(row) = targets.iter().position(|v| v.is_nan()) {
            return Err(DatasetLoadError::MissingValue {
                column: target_column.to_string(),
                row,
            });
        }

        let mut table = PerformanceTable::new(
            param_columns.to_vec(),
            task_ids,
            params,
            Array1::from(targets),
        )?;
        for attr in &self.attributes {
            if attr.kind != ArffType::Numeric && attr.name != task_column {
                table = table.with_category(attr.name.clone(), self.text_column(&attr.name)?)?;
            }
        }
        Ok(table)
    }

    /// Build a [`MetaFeatureTable`] from every numeric attribute except the
    /// task column. Missing values stay NaN.
    pub fn to_metafeature_table(
        &self,
        task_column: &str,
    ) -> Result<MetaFeatureTable, DatasetLoadError> {
        let task_ids = self.task_ids(task_column)?;
        let names: Vec<String> = self
            .attributes
            .iter()
            .filter(|a| a.kind == ArffType::Numeric && a.name != task_column)
            .map(|a| a.name.clone())
            .collect();
        let columns = names
            .iter()
            .map(|n| self.numeric_column(n))
            .collect::<Result<Vec<_>, _>>()?;

        let mut table = MetaFeatureTable::new(names);
        for (row, task_id) in task_ids.into_iter().enumerate() {
            let values = columns.iter().map(|c| c[row]).collect();
            table.insert(task_id, values)?;
        }
        Ok(table)
    }

    fn task_ids(&self, task_column: &str) -> Result<Vec<TaskId>, DatasetLoadError> {
        self.numeric_column(task_column)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 {
                    Ok(TaskId(v as u32))
                } else {
                    Err(DataError::InvalidTaskId { row, value: v }.into())
                }
            })
            .collect()
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

fn split_keyword(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => (line, ""),
    }
}

fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn parse_attribute(rest: &str, line: usize) -> Result<ArffAttribute, DatasetLoadError> {
    let rest = rest.trim();
    let (name, type_spec) = if rest.starts_with('\'') || rest.starts_with('"') {
        let quote = rest.as_bytes()[0] as char;
        let end = rest[1..].find(quote).ok_or_else(|| DatasetLoadError::Syntax {
            line,
            message: "unterminated attribute name".into(),
        })?;
        (&rest[1..end + 1], rest[end + 2..].trim())
    } else {
        let (name, spec) = split_keyword(rest);
        (name, spec.trim())
    };

    if name.is_empty() || type_spec.is_empty() {
        return Err(DatasetLoadError::Syntax {
            line,
            message: "attribute needs a name and a type".into(),
        });
    }

    let kind = if type_spec.starts_with('{') {
        let inner = type_spec
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| DatasetLoadError::Syntax {
                line,
                message: "unterminated nominal specification".into(),
            })?;
        ArffType::Nominal(split_values(inner, line)?.into_iter().map(|(v, _)| v).collect())
    } else {
        let (keyword, _) = split_keyword(type_spec);
        match keyword.to_ascii_lowercase().as_str() {
            "numeric" | "real" | "integer" => ArffType::Numeric,
            "string" => ArffType::String,
            other => {
                return Err(DatasetLoadError::Unsupported {
                    line,
                    feature: format!("attribute type '{other}'"),
                })
            }
        }
    };

    Ok(ArffAttribute {
        name: name.to_string(),
        kind,
    })
}

fn parse_row(
    line: &str,
    line_no: usize,
    attributes: &[ArffAttribute],
) -> Result<Vec<ArffValue>, DatasetLoadError> {
    let cells = split_values(line, line_no)?;
    if cells.len() != attributes.len() {
        return Err(DatasetLoadError::Syntax {
            line: line_no,
            message: format!("expected {} values, got {}", attributes.len(), cells.len()),
        });
    }

    cells
        .into_iter()
        .zip(attributes)
        .map(|((cell, quoted), attr)| {
            if cell == "?" && !quoted {
                return Ok(ArffValue::Missing);
            }
            match attr.kind {
                ArffType::Numeric => cell.parse::<f64>().map(ArffValue::Number).map_err(|_| {
                    DatasetLoadError::Syntax {
                        line: line_no,
                        message: format!("invalid number '{cell}' for {}", attr.name),
                    }
                }),
                _ => Ok(ArffValue::Text(cell)),
            }
        })
        .collect()
}

/// Split a comma-separated list, honouring quotes and backslash escapes.
///
/// Returns each value with a flag telling whether it was quoted.
fn split_values(s: &str, line: usize) -> Result<Vec<(String, bool)>, DatasetLoadError> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut quote: Option<char> = None;
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                } else if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' if current.trim().is_empty() => {
                    current.clear();
                    quote = Some(c);
                    quoted = true;
                }
                ',' => {
                    values.push((finish_value(&current, quoted), quoted));
                    current.clear();
                    quoted = false;
                }
                _ if quoted && c.is_whitespace() => {}
                _ => current.push(c),
            },
        }
    }

    if quote.is_some() {
        return Err(DatasetLoadError::Syntax {
            line,
            message: "unterminated quoted value".into(),
        });
    }
    values.push((finish_value(&current, quoted), quoted));
    Ok(values)
}

fn finish_value(raw: &str, quoted: bool) -> String {
    if quoted {
        raw.to_string()
    } else {
        raw.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERFORMANCES: &str = "\
% OpenML run export
@RELATION svc

@ATTRIBUTE task_id NUMERIC
@ATTRIBUTE svc__kernel {rbf, 'sigmoid'}
@ATTRIBUTE svc__gamma REAL
@ATTRIBUTE svc__C numeric
@ATTRIBUTE 'predictive_accuracy' numeric

@DATA
3, rbf, 0.01, 1.0, 0.91
3, 'sigmoid', 0.1, 2.0, 0.72
6, rbf, 0.5, 4.0, 0.66
";

    #[test]
    fn parses_header_and_rows() {
        let frame = parse_arff(PERFORMANCES).unwrap();
        assert_eq!(frame.relation, "svc");
        assert_eq!(frame.attributes.len(), 5);
        assert_eq!(
            frame.attributes[1].kind,
            ArffType::Nominal(vec!["rbf".into(), "sigmoid".into()])
        );
        assert_eq!(frame.attributes[4].name, "predictive_accuracy");
        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.rows[1][1], ArffValue::Text("sigmoid".into()));
    }

    #[test]
    fn builds_filterable_performance_table() {
        let frame = parse_arff(PERFORMANCES).unwrap();
        let params = vec!["svc__gamma".to_string(), "svc__C".to_string()];
        let table = frame
            .to_performance_table("task_id", &params, "predictive_accuracy")
            .unwrap();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.params()[[2, 1]], 4.0);

        let rbf = table.filter_eq("svc__kernel", "rbf").unwrap();
        assert_eq!(rbf.task_ids(), &[TaskId(3), TaskId(6)]);
    }

    #[test]
    fn filtering_frame_drops_rows_with_missing_parameters() {
        let text = "\
@relation svc
@attribute task_id numeric
@attribute svc__kernel {rbf, linear}
@attribute svc__gamma numeric
@attribute svc__C numeric
@attribute predictive_accuracy numeric
@data
1,rbf,0.1,1.0,0.9
1,linear,?,2.0,0.8
1,rbf,0.2,3.0,0.7
";
        let params = vec!["svc__gamma".to_string(), "svc__C".to_string()];
        let frame = parse_arff(text).unwrap();
        assert!(matches!(
            frame.to_performance_table("task_id", &params, "predictive_accuracy"),
            Err(DatasetLoadError::MissingValue { row: 1, .. })
        ));

        let table = frame
            .filter_eq("svc__kernel", "rbf")
            .unwrap()
            .to_performance_table("task_id", &params, "predictive_accuracy")
            .unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.params()[[1, 0]], 0.2);
        assert!(matches!(
            frame.filter_eq("svc__gamma", "rbf"),
            Err(DatasetLoadError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn metafeatures_keep_missing_as_nan() {
        let text = "\
@relation meta
@attribute task_id numeric
@attribute NumberOfInstances numeric
@attribute MajorityClassSize numeric
@data
3,150,?
6,500,250
";
        let meta = parse_arff(text).unwrap().to_metafeature_table("task_id").unwrap();
        assert_eq!(meta.n_features(), 2);
        let row = meta.get(TaskId(3)).unwrap();
        assert_eq!(row[0], 150.0);
        assert!(row[1].is_nan());
    }

    #[test]
    fn missing_parameter_is_an_error() {
        let text = "\
@relation r
@attribute task_id numeric
@attribute x numeric
@attribute y numeric
@data
1,?,0.5
";
        let frame = parse_arff(text).unwrap();
        let err = frame
            .to_performance_table("task_id", &["x".to_string()], "y")
            .unwrap_err();
        assert!(matches!(err, DatasetLoadError::MissingValue { row: 0, .. }));
    }

    #[test]
    fn rejects_sparse_rows() {
        let text = "@relation r\n@attribute x numeric\n@data\n{0 1.0}\n";
        assert!(matches!(
            parse_arff(text),
            Err(DatasetLoadError::Unsupported { line: 4, .. })
        ));
    }

    #[test]
    fn rejects_wrong_value_count() {
        let text = "@relation r\n@attribute x numeric\n@attribute y numeric\n@data\n1.0\n";
        assert!(matches!(
            parse_arff(text),
            Err(DatasetLoadError::Syntax { line: 5, .. })
        ));
    }

    #[test]
    fn quoted_values_keep_commas() {
        let values = split_values("'a, b', \"c\", d", 1).unwrap();
        assert_eq!(
            values,
            vec![("a, b".into(), true), ("c".into(), true), ("d".into(), false)]
        );
    }

    #[test]
    fn fractional_task_id_is_rejected() {
        let text = "@relation r\n@attribute task_id numeric\n@data\n1.5\n";
        let frame = parse_arff(text).unwrap();
        assert!(matches!(
            frame.to_metafeature_table("task_id"),
            Err(DatasetLoadError::Data(DataError::InvalidTaskId { row: 0, .. }))
        ));
    }
}
