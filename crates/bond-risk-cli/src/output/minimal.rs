use serde_json::{Map, Value};

/// Headline figures checked in order; the first one present is printed.
const HEADLINE_KEYS: [&str; 6] = [
    "dv01",
    "buy_sell_spread",
    "total_weight",
    "analyzed",
    "spot_rates",
    "forward_rates",
];

/// Print only the headline answer of a result envelope.
///
/// Curves print one point per line (`maturity rate` or `start end rate`),
/// so the output can be piped into plotting tools.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let lines = match result {
        Value::Object(map) => headline(map),
        Value::Array(points) => points.iter().map(point_line).collect(),
        other => vec![scalar(other)],
    };
    for line in lines {
        println!("{line}");
    }
}

fn headline(map: &Map<String, Value>) -> Vec<String> {
    for key in HEADLINE_KEYS {
        match map.get(key) {
            Some(Value::Array(points)) => return points.iter().map(point_line).collect(),
            Some(Value::Null) | None => continue,
            Some(v) => return vec![scalar(v)],
        }
    }
    map.iter()
        .next()
        .map(|(k, v)| vec![format!("{k}: {}", scalar(v))])
        .unwrap_or_default()
}

/// One curve point as space-separated values in field order.
fn point_line(point: &Value) -> String {
    match point {
        Value::Object(fields) => fields.values().map(scalar).collect::<Vec<_>>().join(" "),
        other => scalar(other),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
