//! Table facade binding a file path to a schema.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use geotable_tabular::{DataTable, Row, Schema};

use crate::config::TableConfig;
use crate::error::{Result, StoreError};
use crate::format::{read_header, HeaderInfo};
use crate::index::PackedRTree;
use crate::read::{FeatureReader, FrameBuffer};
use crate::write::{write_table, WriteStats};

/// Row iterator returned by [`GeoTable::rows`].
pub type TableRows = FeatureReader<File>;

/// A feature table stored in a single file.
///
/// The file is the source of truth. Every read opens its own handle, so
/// multiple iterators can run side by side; writes replace the whole file.
/// Readers and writers of the same path must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct GeoTable {
    path: PathBuf,
    schema: Schema,
    config: TableConfig,
}

impl GeoTable {
    /// Open an existing table with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, TableConfig::default())
    }

    /// Open an existing table. The schema and the persisted settings
    /// (geometry kind, srid, index parameters) come from the file header;
    /// only `buffer_capacity` is taken from `config`.
    pub fn open_with_config(path: impl AsRef<Path>, config: TableConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let header = read_header_at(&path, config.buffer_capacity)?;
        let meta = &header.meta;
        let config = config
            .with_geometry_type(meta.geometry_type)
            .with_srid(meta.srid)
            .with_index_node_size(meta.index_node_size)
            .with_build_index(meta.index_populated() || meta.index_size() == 0);
        Ok(Self {
            schema: meta.schema()?,
            path,
            config,
        })
    }

    /// Bind `schema` to `path` for writing. Nothing touches the disk until
    /// [`write`](Self::write).
    pub fn create(path: impl AsRef<Path>, schema: Schema, config: TableConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            schema,
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Read the header only.
    pub fn header(&self) -> Result<HeaderInfo> {
        read_header_at(&self.path, self.config.buffer_capacity)
    }

    /// Feature count from the header. Cost does not depend on the size of
    /// the feature stream.
    pub fn size(&self) -> Result<u64> {
        Ok(self.header()?.meta.features_count)
    }

    /// Start an independent pass over the rows. The file handle is closed
    /// when the returned iterator is dropped.
    pub fn rows(&self) -> Result<TableRows> {
        let file = File::open(&self.path)?;
        FeatureReader::open(file, self.config.buffer_capacity)
    }

    /// Load the spatial index. `None` when the table has no index region or
    /// it was written without building the tree.
    pub fn index(&self) -> Result<Option<PackedRTree>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut buffer = FrameBuffer::new(self.config.buffer_capacity);
        let header = read_header(&mut reader, &mut buffer)?;
        let meta = &header.meta;
        if !meta.index_populated() || meta.index_size() == 0 {
            return Ok(None);
        }
        let tree = PackedRTree::read_from(&mut reader, meta.features_count, meta.index_node_size)?;
        Ok(Some(tree))
    }

    /// Replace the table contents with `rows`.
    ///
    /// Bytes go to a sibling `*.tmp` file that is synced and then renamed
    /// over the destination. On failure the temporary file is removed and
    /// the destination is left as it was.
    pub fn write<I>(&self, rows: I) -> Result<WriteStats>
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: ExactSizeIterator,
    {
        let tmp_path = tmp_path(&self.path);
        match self.write_tmp(&tmp_path, rows) {
            Ok(stats) => {
                fs::rename(&tmp_path, &self.path)?;
                tracing::debug!(
                    path = %self.path.display(),
                    bytes = stats.total_bytes(),
                    "table replaced"
                );
                Ok(stats)
            }
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&tmp_path) {
                    tracing::debug!(
                        path = %tmp_path.display(),
                        error = %cleanup,
                        "temporary file not removed"
                    );
                }
                Err(err)
            }
        }
    }

    fn write_tmp<I>(&self, tmp_path: &Path, rows: I) -> Result<WriteStats>
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: ExactSizeIterator,
    {
        let mut writer = BufWriter::new(File::create(tmp_path)?);
        let stats = write_table(&mut writer, &self.schema, &self.config, rows)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(stats)
    }
}

impl DataTable for GeoTable {
    type Error = StoreError;
    type Rows = TableRows;

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn size(&self) -> Result<u64> {
        GeoTable::size(self)
    }

    fn rows(&self) -> Result<TableRows> {
        GeoTable::rows(self)
    }

    /// Always fails: tables are write-once.
    fn clear(&mut self) -> Result<()> {
        Err(StoreError::Unsupported(
            "clear: feature tables are write-once, rewrite the table instead",
        ))
    }
}

fn read_header_at(path: &Path, capacity: usize) -> Result<HeaderInfo> {
    let mut file = File::open(path)?;
    let mut buffer = FrameBuffer::new(capacity);
    read_header(&mut file, &mut buffer)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmp_path_is_sibling() {
        assert_eq!(
            tmp_path(Path::new("/data/parks.gtb")),
            PathBuf::from("/data/parks.gtb.tmp")
        );
        assert_eq!(tmp_path(Path::new("parks")), PathBuf::from("parks.tmp"));
    }
}
