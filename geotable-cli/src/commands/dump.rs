use crate::error::CliResult;
use geotable_storage::{GeoTable, TableConfig};
use geotable_tabular::{Row, Schema};
use serde_json::{Map, Value as JsonValue};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use wkt::ToWkt;

pub fn run(file: &Path, config: TableConfig, limit: Option<usize>) -> CliResult<()> {
    let table = GeoTable::open_with_config(file, config)?;
    let limit = limit.unwrap_or(usize::MAX);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for row in table.rows()?.take(limit) {
        let row = row?;
        serde_json::to_writer(&mut out, &row_json(table.schema(), &row))?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// One row as a JSON object: column values under `properties`, geometry as
/// WKT (or null).
pub fn row_json(schema: &Schema, row: &Row) -> JsonValue {
    let properties: Map<String, JsonValue> = schema
        .columns()
        .iter()
        .zip(&row.values)
        .map(|(column, value)| (column.name.clone(), value.to_json()))
        .collect();

    let mut object = Map::new();
    object.insert("properties".into(), JsonValue::Object(properties));
    object.insert(
        "geometry".into(),
        row.geometry
            .as_ref()
            .map_or(JsonValue::Null, |g| JsonValue::String(g.wkt_string())),
    );
    JsonValue::Object(object)
}
