use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A flat table: named columns and rows of JSON cells.
///
/// Serialises as a list of records (`[{column: value, ...}, ...]`) with keys
/// in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
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

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The cell at `row` in the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Remove every column whose cells are all null.
    pub fn drop_empty_columns(&mut self) {
        let keep: Vec<bool> = (0..self.columns.len())
            .map(|col| {
                self.rows
                    .iter()
                    .any(|row| !matches!(row.get(col), None | Some(Value::Null)))
            })
            .collect();

        let mut flags = keep.iter();
        self.columns.retain(|_| flags.next().copied().unwrap_or(false));
        for row in &mut self.rows {
            let mut flags = keep.iter();
            row.retain(|_| flags.next().copied().unwrap_or(false));
        }
    }
}

struct Record<'a> {
    columns: &'a [String],
    cells: &'a [Value],
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (col, cell) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(col, cell)?;
        }
        map.end()
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&Record {
                columns: &self.columns,
                cells: row,
            })?;
        }
        seq.end()
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.replace('\n', " "),
        other => other.to_string(),
    }
}

fn write_row<'a>(
    f: &mut fmt::Formatter<'_>,
    cells: impl Iterator<Item = &'a str>,
    widths: &[usize],
) -> fmt::Result {
    let line: Vec<String> = cells
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    writeln!(f, "{}", line.join(" | ").trim_end())
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(render_cell).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                rendered
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write_row(f, self.columns.iter().map(String::as_str), &widths)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
        for row in &rendered {
            write_row(f, row.iter().map(String::as_str), &widths)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        Table {
            columns: vec!["input".into(), "output".into(), "Score".into()],
            rows: vec![
                vec![json!("hi"), Value::Null, json!(true)],
                vec![json!("longer input"), Value::Null, json!("error")],
            ],
        }
    }

    #[test]
    fn get_by_column_name() {
        let table = sample();
        assert_eq!(table.get(0, "Score"), Some(&json!(true)));
        assert_eq!(table.get(5, "Score"), None);
        assert_eq!(table.get(0, "missing"), None);
    }

    #[test]
    fn drops_all_null_columns() {
        let mut table = sample();
        table.drop_empty_columns();
        assert_eq!(table.columns, vec!["input", "Score"]);
        assert_eq!(table.rows[1], vec![json!("longer input"), json!("error")]);
    }

    #[test]
    fn serializes_as_records_in_column_order() {
        let table = Table {
            columns: vec!["b".into(), "a".into()],
            rows: vec![vec![json!(1), json!(2)]],
        };
        assert_eq!(serde_json::to_string(&table).unwrap(), r#"[{"b":1,"a":2}]"#);
    }

    #[test]
    fn display_aligns_columns() {
        let mut table = sample();
        table.drop_empty_columns();
        let text = table.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "input        | Score");
        assert_eq!(lines[1], "-------------+------");
        assert_eq!(lines[2], "hi           | true");
        assert_eq!(lines[3], "longer input | error");
    }
}
