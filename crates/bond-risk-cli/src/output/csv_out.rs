use serde_json::Value;
use std::io;

/// Write output as CSV to stdout.
///
/// Row-shaped results (an array, or an object carrying a `table` array) are
/// written one record per row; anything else becomes `field,value` pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Array(arr) => write_array_csv(&mut wtr, arr),
        Value::Object(map) => {
            if let Some(Value::Array(rows)) = map.get("table") {
                write_array_csv(&mut wtr, rows);
            } else {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in map {
                    match val {
                        Value::Object(inner) => {
                            for (sub, v) in inner {
                                let _ = wtr.write_record([
                                    format!("{key}.{sub}"),
                                    format_csv_value(v),
                                ]);
                            }
                        }
                        _ => {
                            let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                        }
                    }
                }
            }
        }
        _ => {
            let _ = wtr.write_record([&format_csv_value(result)]);
        }
    }

    let _ = wtr.flush();
}

/// Rows as records under a header that is the union of every row's keys, in
/// first-seen order. Non-object items are written as single-cell records.
fn write_array_csv<W: io::Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    let headers = super::row_headers(arr);
    if !headers.is_empty() {
        let _ = wtr.write_record(&headers);
    }

    for item in arr {
        let record: Vec<String> = match item {
            Value::Object(map) => headers
                .iter()
                .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                .collect(),
            other => vec![format_csv_value(other)],
        };
        let _ = wtr.write_record(&record);
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
