use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::executor::types::values::NUM_LENGTH;
use crate::executor::types::{Value, VarType};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset {dataset}: row {row} has {found} values for {expected} columns")]
    RowWidth {
        dataset: String,
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("dataset {dataset}: column {column} is {declared} but row {row} holds {found}")]
    CellType {
        dataset: String,
        column: String,
        row: usize,
        declared: VarType,
        found: String,
    },

    #[error("dataset {dataset}: duplicate column {column}")]
    DuplicateColumn { dataset: String, column: String },

    #[error("invalid dataset JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Column metadata of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VarType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub informat: Option<String>,
}

impl Column {
    pub fn num(name: impl Into<String>) -> Self {
        Self::new(name, VarType::Num)
    }

    pub fn char(name: impl Into<String>) -> Self {
        Self::new(name, VarType::Char)
    }

    pub fn new(name: impl Into<String>, var_type: VarType) -> Self {
        Self {
            name: name.into(),
            var_type,
            length: None,
            label: None,
            format: None,
            informat: None,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Declared length, or the default for the column's type
    pub fn effective_length(&self) -> usize {
        match self.var_type {
            VarType::Num => NUM_LENGTH,
            VarType::Char => self.length.unwrap_or_else(|| self.var_type.default_length()),
        }
    }
}

/// A table: ordered columns plus ordered rows of typed values
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive column lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Append a row after checking its width and cell types
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), DatasetError> {
        let index = self.rows.len();
        if row.len() != self.columns.len() {
            return Err(DatasetError::RowWidth {
                dataset: self.name.clone(),
                row: index,
                found: row.len(),
                expected: self.columns.len(),
            });
        }
        for (column, value) in self.columns.iter().zip(&row) {
            if value.var_type() != column.var_type {
                return Err(DatasetError::CellType {
                    dataset: self.name.clone(),
                    column: column.name.clone(),
                    row: index,
                    declared: column.var_type,
                    found: value.var_type().to_string(),
                });
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Values of one column, top to bottom
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /* ===================== JSON ===================== */

    /// Read a dataset from its JSON interchange form.
    ///
    /// ```json
    /// { "name": "in",
    ///   "columns": [{"name": "x", "type": "num"}],
    ///   "rows": [[3], {"x": 1}, [null]] }
    /// ```
    ///
    /// Rows are arrays in column order or objects keyed by column name; `null`
    /// is missing. Without `columns`, columns are inferred from the object
    /// rows and typed by their first non-null value.
    pub fn from_json(fallback_name: &str, json: JsonValue) -> Result<Self, DatasetError> {
        let repr: DatasetRepr = serde_json::from_value(json)?;
        let name = repr.name.unwrap_or_else(|| fallback_name.to_string());
        let columns = match repr.columns {
            Some(columns) => columns,
            None => infer_columns(&repr.rows),
        };

        for (i, column) in columns.iter().enumerate() {
            if columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name))
            {
                return Err(DatasetError::DuplicateColumn {
                    dataset: name,
                    column: column.name.clone(),
                });
            }
        }

        let mut dataset = Dataset::new(name, columns);
        for (index, row) in repr.rows.into_iter().enumerate() {
            let cells = match row {
                RowRepr::Positional(cells) => cells,
                RowRepr::Named(mut fields) => dataset
                    .columns
                    .iter()
                    .map(|c| take_field(&mut fields, &c.name))
                    .collect(),
            };
            if cells.len() != dataset.columns.len() {
                return Err(DatasetError::RowWidth {
                    dataset: dataset.name.clone(),
                    row: index,
                    found: cells.len(),
                    expected: dataset.columns.len(),
                });
            }
            let values = dataset
                .columns
                .iter()
                .zip(cells)
                .map(|(column, cell)| cell_to_value(&dataset.name, column, index, cell))
                .collect::<Result<Vec<_>, _>>()?;
            dataset.rows.push(values);
        }
        Ok(dataset)
    }

    /// Render the JSON interchange form with object rows
    pub fn to_json(&self) -> JsonValue {
        let rows: Vec<JsonValue> = self
            .rows
            .iter()
            .map(|row| {
                let fields: Map<String, JsonValue> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.name.clone(), value_to_json(v)))
                    .collect();
                JsonValue::Object(fields)
            })
            .collect();

        serde_json::json!({
            "name": self.name,
            "columns": self.columns,
            "rows": rows,
        })
    }
}

#[derive(Deserialize)]
struct DatasetRepr {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    columns: Option<Vec<Column>>,
    #[serde(default)]
    rows: Vec<RowRepr>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RowRepr {
    Positional(Vec<JsonValue>),
    Named(Map<String, JsonValue>),
}

fn take_field(fields: &mut Map<String, JsonValue>, name: &str) -> JsonValue {
    if let Some(v) = fields.remove(name) {
        return v;
    }
    let key = fields
        .keys()
        .find(|k| k.eq_ignore_ascii_case(name))
        .cloned();
    key.and_then(|k| fields.remove(&k))
        .unwrap_or(JsonValue::Null)
}

fn infer_columns(rows: &[RowRepr]) -> Vec<Column> {
    let mut columns: Vec<Column> = Vec::new();
    let mut typed: Vec<bool> = Vec::new();

    for row in rows {
        let RowRepr::Named(fields) = row else {
            continue;
        };
        for (name, cell) in fields {
            let position = columns
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(name));
            let index = match position {
                Some(i) => i,
                None => {
                    columns.push(Column::num(name.clone()));
                    typed.push(false);
                    columns.len() - 1
                }
            };
            if !typed[index] {
                match cell {
                    JsonValue::String(_) => {
                        columns[index].var_type = VarType::Char;
                        typed[index] = true;
                    }
                    JsonValue::Null => {}
                    _ => typed[index] = true,
                }
            }
        }
    }
    columns
}

fn cell_to_value(
    dataset: &str,
    column: &Column,
    row: usize,
    cell: JsonValue,
) -> Result<Value, DatasetError> {
    let mismatch = |found: &str| DatasetError::CellType {
        dataset: dataset.to_string(),
        column: column.name.clone(),
        row,
        declared: column.var_type,
        found: found.to_string(),
    };

    match (column.var_type, cell) {
        (t, JsonValue::Null) => Ok(t.missing()),
        (VarType::Num, JsonValue::Number(n)) => {
            Ok(n.as_f64().map(Value::number).unwrap_or(Value::MissingNum))
        }
        (VarType::Num, JsonValue::Bool(b)) => Ok(Value::boolean(b)),
        (VarType::Char, JsonValue::String(s)) => {
            let length = column.effective_length();
            if s.chars().count() > length {
                Ok(Value::Str(s.chars().take(length).collect()))
            } else {
                Ok(Value::Str(s))
            }
        }
        (_, JsonValue::String(_)) => Err(mismatch("text")),
        (_, JsonValue::Number(_)) => Err(mismatch("a number")),
        (_, JsonValue::Bool(_)) => Err(mismatch("a boolean")),
        (_, _) => Err(mismatch("a nested value")),
    }
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Num(v) => serde_json::Number::from_f64(*v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Str(s) => JsonValue::String(s.trim_end_matches(' ').to_string()),
        Value::MissingNum | Value::MissingStr => JsonValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positional_and_named_rows() {
        let ds = Dataset::from_json(
            "fallback",
            json!({
                "name": "people",
                "columns": [
                    {"name": "id", "type": "num"},
                    {"name": "name", "type": "char", "length": 4}
                ],
                "rows": [
                    [1, "Alice"],
                    {"NAME": "Bo", "id": 2},
                    {"id": null}
                ]
            }),
        )
        .unwrap();

        assert_eq!(ds.name, "people");
        assert_eq!(ds.rows[0], vec![Value::Num(1.0), Value::text("Alic")]);
        assert_eq!(ds.rows[1], vec![Value::Num(2.0), Value::text("Bo")]);
        assert_eq!(ds.rows[2], vec![Value::MissingNum, Value::MissingStr]);
    }

    #[test]
    fn test_inferred_columns() {
        let ds = Dataset::from_json(
            "in",
            json!({"rows": [{"k": "a", "x": null}, {"x": 2, "y": 1.5}]}),
        )
        .unwrap();

        assert_eq!(ds.name, "in");
        assert_eq!(ds.column_names(), vec!["k", "x", "y"]);
        assert_eq!(ds.column("k").unwrap().var_type, VarType::Char);
        assert_eq!(ds.column("x").unwrap().var_type, VarType::Num);
        assert_eq!(ds.rows[1], vec![Value::MissingStr, Value::Num(2.0), Value::Num(1.5)]);
    }

    #[test]
    fn test_cell_type_mismatch_is_rejected() {
        let err = Dataset::from_json(
            "in",
            json!({"columns": [{"name": "x", "type": "num"}], "rows": [["abc"]]}),
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::CellType { .. }));
    }

    #[test]
    fn test_to_json_writes_null_for_missing() {
        let mut ds = Dataset::new("out", vec![Column::num("x"), Column::char("s")]);
        ds.push_row(vec![Value::MissingNum, Value::text("hi  ")]).unwrap();
        assert_eq!(
            ds.to_json()["rows"],
            json!([{"x": null, "s": "hi"}])
        );
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut ds = Dataset::new("out", vec![Column::num("x")]);
        assert!(ds.push_row(vec![]).is_err());
        assert!(ds.push_row(vec![Value::text("a")]).is_err());
        assert!(ds.push_row(vec![Value::Num(1.0)]).is_ok());
    }
}
