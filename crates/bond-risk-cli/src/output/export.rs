use bond_risk_core::table::Table;
use std::path::Path;

/// Write a table to a CSV file, columns in table order.
pub fn write_table_csv(table: &Table, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_path(Path::new(path))
        .map_err(|e| format!("Failed to create '{}': {}", path, e))?;
    wtr.write_record(table.columns())?;
    for i in 0..table.len() {
        if let Some(cells) = table.row_values(i) {
            wtr.write_record(cells.iter().map(|c| c.to_string()))?;
        }
    }
    wtr.flush()?;
    tracing::info!(path, rows = table.len(), "table exported");
    Ok(())
}
