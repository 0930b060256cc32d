use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(json: bool, quiet: bool) -> Self {
        Self { json, quiet }
    }

    /// Prints a serializable record; objects become a field/value table.
    pub fn emit_record<T: Serialize>(&self, title: &str, value: &T) -> Result<()> {
        if self.quiet {
            return Ok(());
        }
        let value = serde_json::to_value(value)?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
        match &value {
            Value::Object(obj) => {
                let rows = obj.iter().map(|(k, v)| (k.clone(), to_string(v))).collect::<Vec<_>>();
                self.emit_kv_rows(title, &rows);
            }
            other => self.emit_message(to_string(other)),
        }
        Ok(())
    }

    pub fn emit_rows(&self, title: &str, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
        if self.quiet {
            return Ok(());
        }
        if self.json {
            let list = rows
                .iter()
                .map(|row| {
                    let map: Map<String, Value> = header
                        .iter()
                        .zip(row)
                        .map(|(k, v)| ((*k).to_owned(), Value::String(v.clone())))
                        .collect();
                    Value::Object(map)
                })
                .collect::<Vec<_>>();
            println!("{}", serde_json::to_string_pretty(&list)?);
            return Ok(());
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(header.to_vec());
        for row in rows {
            table.add_row(row.iter().map(Cell::new).collect::<Vec<_>>());
        }
        println!("{title}");
        println!("{table}");
        Ok(())
    }

    pub fn emit_message(&self, message: impl AsRef<str>) {
        if self.quiet {
            return;
        }
        println!("{}", message.as_ref());
    }

    pub fn emit_kv_rows(&self, title: &str, rows: &[(String, String)]) {
        if self.quiet {
            return;
        }

        if self.json {
            let mut map = Map::new();
            for (k, v) in rows {
                map.insert(k.clone(), Value::String(v.clone()));
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&Value::Object(map)).unwrap_or_else(|_| "{}".into())
            );
            return;
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["field", "value"]);
        for (k, v) in rows {
            table.add_row(vec![Cell::new(k), Cell::new(v)]);
        }

        println!("{title}");
        println!("{table}");
    }
}

fn to_string(value: &Value) -> String {
    match value {
        Value::Null => "-".into(),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => v.to_string(),
        Value::String(v) => v.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<invalid>".into()),
    }
}
