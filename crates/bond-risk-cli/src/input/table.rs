use bond_risk_core::table::{Cell, Row, Table};
use rust_decimal::Decimal;
use serde_json::Value;
use std::io::Read;
use std::str::FromStr;

use crate::input::file::{read_json_value, resolve_path};
use crate::input::stdin::read_stdin_text;

/// Load a table from a CSV file, or from JSON rows when the file ends in `.json`.
pub fn read_table(path: &str) -> Result<Table, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    if canonical.extension().and_then(|e| e.to_str()) == Some("json") {
        return table_from_value(&read_json_value(path)?);
    }

    let file = std::fs::File::open(&canonical)
        .map_err(|e| format!("Failed to open '{}': {}", canonical.display(), e))?;
    table_from_csv(file, &canonical.display().to_string())
}

/// Table from `--input`, or from CSV or JSON piped on stdin.
pub fn read_table_input(
    path: Option<&str>,
    what: &str,
) -> Result<Table, Box<dyn std::error::Error>> {
    if let Some(p) = path {
        return read_table(p);
    }
    match read_stdin_text()? {
        Some(text) if text.trim_start().starts_with(['[', '{']) => {
            table_from_value(&serde_json::from_str(text.trim())?)
        }
        Some(text) => table_from_csv(text.as_bytes(), "stdin"),
        None => Err(format!("--input <file.csv|file.json> or stdin required for {what}").into()),
    }
}

/// Parse CSV with a header row; numeric-looking cells become numbers.
pub fn table_from_csv<R: Read>(source: R, label: &str) -> Result<Table, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);
    let headers = rdr.headers()?.clone();
    let mut table = Table::new(headers.iter());
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| format!("'{}' line {}: {}", label, i + 2, e))?;
        table.push_values(record.iter().map(Cell::parse).collect())?;
    }
    tracing::debug!(source = label, rows = table.len(), "table loaded");
    Ok(table)
}

/// Build a table from a JSON array of row objects.
///
/// A computation envelope is unwrapped first, so the JSON output of one
/// command can be piped into the next.
pub fn table_from_value(value: &Value) -> Result<Table, Box<dyn std::error::Error>> {
    match value {
        Value::Object(map) if map.contains_key("result") => table_from_value(&map["result"]),
        Value::Object(map) if map.contains_key("table") => table_from_value(&map["table"]),
        Value::Array(rows) => {
            let mut table = Table::default();
            for (i, item) in rows.iter().enumerate() {
                let Value::Object(fields) = item else {
                    return Err(format!("Row {i} is not a JSON object").into());
                };
                for key in fields.keys() {
                    table.ensure_column(key.as_str());
                }
                let row: Row = fields
                    .iter()
                    .map(|(k, v)| Ok((k.as_str(), cell_from_json(v)?)))
                    .collect::<Result<Vec<_>, String>>()?
                    .into_iter()
                    .collect();
                table.push_row(row);
            }
            Ok(table)
        }
        _ => Err("Expected a JSON array of row objects".into()),
    }
}

fn cell_from_json(value: &Value) -> Result<Cell, String> {
    match value {
        Value::Null => Ok(Cell::Empty),
        Value::Number(n) => {
            let raw = n.to_string();
            Decimal::from_str(&raw)
                .or_else(|_| Decimal::from_scientific(&raw))
                .map(Cell::Number)
                .map_err(|e| format!("Number '{raw}' does not fit a decimal: {e}"))
        }
        Value::String(s) => Ok(Cell::parse(s)),
        Value::Bool(b) => Ok(Cell::Text(b.to_string())),
        other => Err(format!("Nested value not supported in a table cell: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rows_from_json_keep_key_order() {
        let value = serde_json::json!([
            {"ISIN": "US1", "Weight": 60, "Cpn": "4.5"},
            {"ISIN": "US2", "Weight": 40, "Cpn": null}
        ]);
        let table = table_from_value(&value).unwrap();
        assert_eq!(table.columns(), &["ISIN", "Weight", "Cpn"]);
        assert_eq!(table.rows()[0].number("Cpn"), Some(dec!(4.5)));
        assert!(table.rows()[1].get("Cpn").is_empty());
    }

    #[test]
    fn test_envelope_unwrapped() {
        let value = serde_json::json!({
            "result": {"table": [{"Weight": 100}], "analyzed": 1},
            "warnings": []
        });
        let table = table_from_value(&value).unwrap();
        assert_eq!(table.rows()[0].number("Weight"), Some(dec!(100)));
    }

    #[test]
    fn test_nested_cells_rejected() {
        let value = serde_json::json!([{"Weight": [1, 2]}]);
        assert!(table_from_value(&value).is_err());
    }

    #[test]
    fn test_csv_cells_typed_and_trimmed() {
        let csv = "ISIN, Cpn ,Maturity\nUS1, 4.5 ,15.11.2030\nUS2,,\n";
        let table = table_from_csv(csv.as_bytes(), "inline").unwrap();
        assert_eq!(table.columns(), &["ISIN", "Cpn", "Maturity"]);
        assert_eq!(table.rows()[0].number("Cpn"), Some(dec!(4.5)));
        assert_eq!(table.rows()[0].text("Maturity"), Some("15.11.2030"));
        assert!(table.rows()[1].get("Cpn").is_empty());
    }
}
