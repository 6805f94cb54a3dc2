use crate::commands::dump::row_json;
use crate::error::{CliError, CliResult};
use geotable_storage::{GeoTable, TableConfig};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Query box parsed from `minx,miny,maxx,maxy`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl FromStr for BBox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid coordinate in '{s}': {e}"))?;
        let [min_x, min_y, max_x, max_y] = parts[..] else {
            return Err(format!("expected minx,miny,maxx,maxy, got '{s}'"));
        };
        if min_x > max_x || min_y > max_y {
            return Err(format!("min corner must not exceed max corner in '{s}'"));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }
}

pub fn run(file: &Path, config: TableConfig, bbox: BBox, rows: bool) -> CliResult<()> {
    let table = GeoTable::open_with_config(file, config)?;
    let tree = table
        .index()?
        .ok_or_else(|| CliError::NoIndex(file.display().to_string()))?;
    let hits = tree.search(bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y);
    tracing::info!(hits = hits.len(), ?bbox, "index searched");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if rows {
        // Hits are in storage order, so one forward pass picks them up.
        let mut wanted = hits.iter().map(|h| h.index).peekable();
        for (i, row) in table.rows()?.enumerate() {
            let Some(&next) = wanted.peek() else { break };
            let row = row?;
            if i == next {
                wanted.next();
                serde_json::to_writer(&mut out, &row_json(table.schema(), &row))?;
                out.write_all(b"\n")?;
            }
        }
    } else {
        for hit in &hits {
            writeln!(out, "{}\t{}", hit.index, hit.offset)?;
        }
    }
    out.flush()?;
    Ok(())
}
