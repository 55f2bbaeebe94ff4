// == Std
use std::fmt::Display;

// == Internal crates
use super::model::PermissionRecord;

// == External crates
use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::Value;

/// Fields that are never shown in a permissions table
pub const DENYLIST: [&str; 3] = ["autodeskId", "subjectId", "subjectStatus"];

/// Name of the synthetic row index. It replaces any record field of the same name.
pub const ROW_KEY: &str = "key";

/// Returns true if the given field name is excluded from display
pub fn is_denied(field: &str) -> bool {
    DENYLIST.contains(&field)
}

/// Controls how the column set is derived from a list of records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnInference {
    /// Columns come from the keys of the first record only. Keys that only appear in later records get no column.
    #[default]
    FirstRecord,
    /// Columns come from the keys of every record, in the order they are first seen
    Union,
    /// Columns are supplied by the caller. The denylist still applies.
    Schema(Vec<String>),
}

/// A column definition, serialized in the `{title, dataIndex, key}` shape table widgets expect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    pub title: String,
    pub data_index: String,
    pub key: String,
}

impl TableColumn {
    fn for_field(field: &str) -> Self {
        TableColumn {
            title: field.to_string(),
            data_index: field.to_string(),
            key: field.to_string(),
        }
    }
}

/// One table row: the record's index in the input list plus every field that is not denylisted. The index is what
/// every view of the row shows under `key`, whatever the record's own `key` field held.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    key: usize,
    /// `key` as a cell value, so lookups can hand out a reference
    key_value: Value,
    fields: PermissionRecord,
}

impl TableRow {
    /// Returns the synthetic row key, equal to the record's index in the input list
    pub fn key(&self) -> usize {
        self.key
    }

    /// Returns the value of the given field, if present. `key` always yields the row index.
    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == ROW_KEY {
            return Some(&self.key_value);
        }
        self.fields.get(field)
    }
}

// Serializes as a flat object with `key` first
impl Serialize for TableRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(ROW_KEY, &self.key)?;
        for (field, value) in &self.fields {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

/// Render-ready table data derived from the currently loaded permission records. Recomputed whenever it is needed,
/// never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableSpec {
    columns: Vec<TableColumn>,
    rows: Vec<TableRow>,
}

impl TableSpec {
    /// Projects records into a table using first-record column inference
    pub fn project(records: Option<&[PermissionRecord]>) -> Self {
        Self::project_with(records, &ColumnInference::FirstRecord)
    }

    /// Projects records into a table. Absent records produce an empty table.
    pub fn project_with(records: Option<&[PermissionRecord]>, inference: &ColumnInference) -> Self {
        let Some(records) = records else {
            return TableSpec::default();
        };

        let columns = infer_columns(records, inference)
            .into_iter()
            .map(TableColumn::for_field)
            .collect();

        let rows = records
            .iter()
            .enumerate()
            .map(|(index, record)| TableRow {
                key: index,
                key_value: Value::from(index),
                fields: record
                    .iter()
                    .filter(|(field, _)| field.as_str() != ROW_KEY && !is_denied(field))
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect(),
            })
            .collect();

        TableSpec { columns, rows }
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.rows.is_empty()
    }
}

fn infer_columns<'a>(records: &'a [PermissionRecord], inference: &'a ColumnInference) -> Vec<&'a str> {
    let mut fields: Vec<&str> = Vec::new();
    let mut push_unique = |field: &'a str| {
        if !is_denied(field) && !fields.contains(&field) {
            fields.push(field);
        }
    };

    match inference {
        ColumnInference::FirstRecord => {
            records
                .first()
                .into_iter()
                .flat_map(|record| record.keys())
                .for_each(|field| push_unique(field.as_str()));
        }
        ColumnInference::Union => {
            records
                .iter()
                .flat_map(|record| record.keys())
                .for_each(|field| push_unique(field.as_str()));
        }
        ColumnInference::Schema(schema) => {
            schema.iter().for_each(|field| push_unique(field.as_str()));
        }
    }

    fields
}

/// Formats a cell value for plain text display. Strings are shown without quotes and arrays of scalars are joined
/// with `, `, anything else falls back to compact JSON.
pub fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) if items.iter().all(|item| !item.is_array() && !item.is_object()) => {
            items.iter().map(format_cell).collect::<Vec<_>>().join(", ")
        }
        other => other.to_string(),
    }
}

/// Plain text rendering with padded columns, used by the command line front end
impl Display for TableSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.columns.is_empty() {
            return writeln!(f, "(no columns, {} rows)", self.rows.len());
        }

        let cells = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|column| row.get(&column.data_index).map(format_cell).unwrap_or_default())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let widths = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(column.title.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect::<Vec<_>>();

        write_line(f, self.columns.iter().map(|column| column.title.as_str()), &widths)?;
        let separator = widths.iter().map(|width| "-".repeat(*width)).collect::<Vec<_>>();
        writeln!(f, "{}", separator.join("-+-"))?;
        for row in &cells {
            write_line(f, row.iter().map(String::as_str), &widths)?;
        }

        Ok(())
    }
}

fn write_line<'a>(
    f: &mut std::fmt::Formatter<'_>,
    values: impl Iterator<Item = &'a str>,
    widths: &[usize],
) -> std::fmt::Result {
    let line = values
        .zip(widths)
        .map(|(value, &width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ");
    writeln!(f, "{}", line.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<PermissionRecord> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_absent_and_empty_input() {
        let table = TableSpec::project(None);
        assert!(table.columns().is_empty(), "Absent input should produce no columns");
        assert!(table.rows().is_empty(), "Absent input should produce no rows");

        let table = TableSpec::project(Some(&[]));
        assert!(table.is_empty(), "Empty input should produce an empty table");
        assert_eq!(serde_json::to_value(&table).unwrap(), json!({"columns": [], "rows": []}));
    }

    #[test]
    fn test_denylisted_fields_are_dropped() {
        let input = records(json!([{"autodeskId": "x", "role": "viewer", "subjectId": "y"}]));
        let table = TableSpec::project(Some(&input));

        assert_eq!(
            serde_json::to_value(&table).unwrap(),
            json!({
                "columns": [{"title": "role", "dataIndex": "role", "key": "role"}],
                "rows": [{"key": 0, "role": "viewer"}],
            })
        );
    }

    #[test]
    fn test_first_record_inference() {
        let input = records(json!([
            {"name": "Ana", "subjectStatus": "ACTIVE", "email": "ana@example.com"},
            {"name": "Luis", "email": "luis@example.com", "userType": "USER", "subjectId": "s2"},
            {"name": "Team"},
        ]));
        let table = TableSpec::project(Some(&input));

        let titles = table.columns().iter().map(|c| c.title.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["name", "email"], "Columns should follow the first record's key order");

        assert_eq!(table.rows().len(), input.len(), "There should be one row per record");
        for (index, row) in table.rows().iter().enumerate() {
            assert_eq!(row.key(), index, "Row key should be the record index");
            for denied in DENYLIST {
                assert!(row.get(denied).is_none(), "Row {index} should not contain '{denied}'");
            }
        }

        // Extra keys are kept in the row even though no column shows them
        assert_eq!(table.rows()[1].get("userType"), Some(&json!("USER")));
    }

    #[test]
    fn test_union_and_schema_inference() {
        let input = records(json!([
            {"name": "Ana"},
            {"name": "Luis", "userType": "USER", "autodeskId": "a"},
        ]));

        let table = TableSpec::project_with(Some(&input), &ColumnInference::Union);
        let titles = table.columns().iter().map(|c| c.key.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["name", "userType"], "Union should include keys from every record");

        let schema = ColumnInference::Schema(vec!["userType".into(), "subjectId".into(), "userType".into()]);
        let table = TableSpec::project_with(Some(&input), &schema);
        let titles = table.columns().iter().map(|c| c.key.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["userType"], "Schema columns should be deduplicated and denylist-filtered");
    }

    #[test]
    fn test_record_key_field_is_replaced_by_index() {
        let input = records(json!([
            {"key": "custom", "role": "admin"},
            {"role": "viewer"},
            {"key": 7, "role": "editor"},
        ]));
        let table = TableSpec::project(Some(&input));

        let titles = table.columns().iter().map(|c| c.key.as_str()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["key", "role"], "Columns should still follow the first record's keys");
        for (index, row) in table.rows().iter().enumerate() {
            assert_eq!(row.get("key"), Some(&json!(index)), "Row {index} should show its index as key");
        }
        assert_eq!(
            serde_json::to_value(table.rows()).unwrap(),
            json!([{"key": 0, "role": "admin"}, {"key": 1, "role": "viewer"}, {"key": 2, "role": "editor"}])
        );

        let rendered = table.to_string();
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "key | role");
        assert_eq!(lines[2], "0   | admin", "Text output should agree with the JSON rows");
        assert_eq!(lines[4], "2   | editor");
    }

    #[test]
    fn test_text_rendering() {
        let input = records(json!([
            {"name": "Ana", "actions": ["VIEW", "DOWNLOAD"]},
            {"name": "Luis"},
        ]));
        let rendered = TableSpec::project(Some(&input)).to_string();
        let lines = rendered.lines().collect::<Vec<_>>();

        assert_eq!(lines[0], "name | actions");
        assert_eq!(lines[1], "-----+---------------");
        assert_eq!(lines[2], "Ana  | VIEW, DOWNLOAD");
        assert_eq!(lines[3], "Luis |");
    }
}
