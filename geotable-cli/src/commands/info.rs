use crate::error::CliResult;
use colored::Colorize;
use geotable_storage::{GeoTable, TableConfig};
use std::path::Path;

pub fn run(file: &Path, config: TableConfig) -> CliResult<()> {
    let table = GeoTable::open_with_config(file, config)?;
    let header = table.header()?;
    let meta = &header.meta;

    println!("Name:            {}", meta.name);
    println!("Geometry type:   {}", meta.geometry_type);
    println!("SRID:            {}", meta.srid);
    println!("Features:        {}", meta.features_count);
    println!("Index node size: {}", meta.index_node_size);

    let index_size = meta.index_size();
    if index_size == 0 {
        println!("Index:           none");
    } else if meta.index_populated() {
        println!("Index:           populated ({index_size} bytes)");
        if let Some(extent) = table.index()?.and_then(|tree| tree.extent()) {
            println!(
                "Extent:          {},{},{},{}",
                extent.min_x, extent.min_y, extent.max_x, extent.max_y
            );
        }
    } else {
        println!(
            "Index:           {} ({index_size} bytes reserved)",
            "not populated".yellow()
        );
    }
    println!("Index offset:    {}", header.index_offset);
    println!("Features offset: {}", header.features_offset());

    println!("Columns:         {}", meta.columns.len());
    let width = meta.columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for column in &meta.columns {
        println!(
            "  {:width$}  {:8}  {}",
            column.name,
            column.column_type.name(),
            if column.nullable { "nullable" } else { "not null" },
        );
    }

    Ok(())
}
