use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A collection of custom errors relating to tabular operations.
#[derive(Error, Debug, PartialEq)]
pub enum TableError {
    /// Indicates that a column required by name is not present in the table
    #[error("required column '{column}' is missing")]
    MissingColumn { column: String },

    /// Indicates that a metric cell holds text that cannot be read as a number
    #[error("column '{column}' holds a non-numeric value '{value}'")]
    NonNumeric { column: String, value: String },

    /// Indicates that a row number is past the end of the table
    #[error("row {row} is out of range for a table of {rows} rows")]
    RowOutOfRange { row: usize, rows: usize },
}

/// A single cell value
///
/// Excel dates are kept as their serial number
/// so they can be written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(f64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
    /// Read the value as a metric
    ///
    /// Nulls and NaN are missing (`None`), numeric text
    /// is parsed, anything else cannot be compared
    /// against a threshold and is an error.
    ///
    /// # Errors
    ///
    /// `TableError::NonNumeric` naming the column and the offending value
    pub fn to_f64(&self, column: &str) -> Result<Option<f64>, TableError> {
        let non_numeric = |value: String| TableError::NonNumeric {
            column: column.to_string(),
            value,
        };
        match self {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(*i as f64)),
            Value::Float(f) if f.is_nan() => Ok(None),
            Value::Float(f) => Ok(Some(*f)),
            Value::Str(s) if s.trim().is_empty() => Ok(None),
            Value::Str(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_nan() => Ok(None),
                Ok(f) => Ok(Some(f)),
                Err(_) => Err(non_numeric(s.clone())),
            },
            Value::Bool(b) => Err(non_numeric(b.to_string())),
            Value::Date(d) => Err(non_numeric(d.to_string())),
        }
    }
    /// Text used to compare join keys
    ///
    /// Whole-number cells compare as their integer text
    /// so that an id stored as a number in one workbook
    /// still matches the same id stored as text.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{}", *f as i64)),
            Value::Float(f) if f.is_finite() => Some(f.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d),
        }
    }
}

/// Utility function to normalize a header into a snake case identifier
///
/// Letters are lower-cased, every run of non-alphanumeric characters
/// becomes a single underscore and leading or trailing underscores
/// are dropped. Applying it twice gives the same result as once.
///
/// # Example
///
/// ```compile
/// assert_eq!(normalize_name("Average Coverage (X)"), "average_coverage_x");
/// ```
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut separator = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if separator && !normalized.is_empty() {
                normalized.push('_');
            }
            separator = false;
            // lower-casing may add combining marks, which would not survive a second pass
            normalized.extend(c.to_lowercase().filter(|l| l.is_alphanumeric()));
        } else {
            separator = true;
        }
    }
    normalized
}

/// Row counts of a full outer join
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct JoinStats {
    pub matched: usize,
    pub left_only: usize,
    pub right_only: usize,
}

/// Create a table object
///
/// Rows are stored in load order and always have
/// exactly one value per column
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: vec![],
        }
    }
    /// Append a row, padding with nulls or truncating to the table width
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Get the position of a column by name
    ///
    /// # Errors
    ///
    /// `TableError::MissingColumn` if no column has this name
    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| TableError::MissingColumn {
                column: name.to_string(),
            })
    }
    /// Get all values of a column in row order
    pub fn column(&self, name: &str) -> Result<Vec<&Value>, TableError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }
    /// Get a single cell by row number and column name
    ///
    /// # Errors
    ///
    /// `TableError::MissingColumn` for an unknown column and
    /// `TableError::RowOutOfRange` for a row past the end
    pub fn get(&self, row: usize, name: &str) -> Result<&Value, TableError> {
        let idx = self.column_index(name)?;
        self.rows
            .get(row)
            .map(|r| &r[idx])
            .ok_or(TableError::RowOutOfRange {
                row,
                rows: self.rows.len(),
            })
    }
    /// Normalize every header with `normalize_name`
    pub fn normalize_headers(&mut self) {
        for column in self.columns.iter_mut() {
            *column = normalize_name(column);
        }
    }
    /// Set a column from a vector of values, replacing it if present
    ///
    /// The vector is expected to hold one value per row,
    /// missing trailing values are filled with nulls.
    pub fn set_column(&mut self, name: &str, mut values: Vec<Value>) {
        values.resize(self.rows.len(), Value::Null);
        match self.columns.iter().position(|c| c == name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }
    /// Derive a numeric column from another one
    ///
    /// Missing source values stay missing in the derived column.
    ///
    /// # Errors
    ///
    /// `TableError::MissingColumn` if the source is absent and
    /// `TableError::NonNumeric` if a source value is not a number
    pub fn derive_numeric<F>(&mut self, from: &str, to: &str, f: F) -> Result<(), TableError>
    where
        F: Fn(f64) -> f64,
    {
        let values = self
            .column(from)?
            .into_iter()
            .map(|v| Ok(v.to_f64(from)?.map_or(Value::Null, |x| Value::Float(f(x)))))
            .collect::<Result<Vec<Value>, TableError>>()?;
        self.set_column(to, values);
        Ok(())
    }
    /// Project the table onto an ordered list of columns
    ///
    /// # Errors
    ///
    /// `TableError::MissingColumn` for the first label not in the table,
    /// absent columns are never padded with nulls
    pub fn select(&self, names: &[&str]) -> Result<Table, TableError> {
        let indices = names
            .iter()
            .map(|name| self.column_index(name))
            .collect::<Result<Vec<usize>, TableError>>()?;
        Ok(Table {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }
}

/// Full outer join of two tables on a shared key column
///
/// Output columns are the left columns followed by the right columns
/// without its key. Non-key names present on both sides get `_x` and
/// `_y` suffixes. Left rows come first in their original order, each
/// repeated once per matching right row, followed by unmatched right
/// rows whose key is carried into the left key column. Keys compare
/// by exact text and null keys never match.
///
/// # Errors
///
/// `TableError::MissingColumn` if either side lacks the key
pub fn outer_join(left: &Table, right: &Table, key: &str) -> Result<(Table, JoinStats), TableError> {
    let lk = left.column_index(key)?;
    let rk = right.column_index(key)?;

    let right_cols: Vec<usize> = (0..right.columns.len()).filter(|&j| j != rk).collect();
    let in_right = |name: &str| right_cols.iter().any(|&j| right.columns[j] == name);
    let in_left = |name: &str| {
        left.columns
            .iter()
            .enumerate()
            .any(|(i, c)| i != lk && c == name)
    };

    let mut columns: Vec<String> = left
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i != lk && in_right(c) {
                format!("{}_x", c)
            } else {
                c.clone()
            }
        })
        .collect();
    columns.extend(right_cols.iter().map(|&j| {
        let c = &right.columns[j];
        if in_left(c) {
            format!("{}_y", c)
        } else {
            c.clone()
        }
    }));

    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (j, row) in right.rows.iter().enumerate() {
        if let Some(k) = row[rk].key_text() {
            index.entry(k).or_default().push(j);
        }
    }

    let mut joined = Table::new(columns);
    let mut stats = JoinStats::default();
    let mut right_matched = vec![false; right.rows.len()];

    for lrow in left.rows.iter() {
        let matches = lrow[lk].key_text().and_then(|k| index.get(&k));
        match matches {
            Some(js) => {
                for &j in js {
                    right_matched[j] = true;
                    let mut row = lrow.clone();
                    row.extend(right_cols.iter().map(|&c| right.rows[j][c].clone()));
                    joined.push_row(row);
                    stats.matched += 1;
                }
            }
            None => {
                let mut row = lrow.clone();
                row.extend(right_cols.iter().map(|_| Value::Null));
                joined.push_row(row);
                stats.left_only += 1;
            }
        }
    }

    for (j, rrow) in right.rows.iter().enumerate() {
        if right_matched[j] {
            continue;
        }
        let mut row = vec![Value::Null; left.columns.len()];
        row[lk] = rrow[rk].clone();
        row.extend(right_cols.iter().map(|&c| rrow[c].clone()));
        joined.push_row(row);
        stats.right_only += 1;
    }

    Ok((joined, stats))
}
