use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use geopack::{CrsCoordinate, CrsProfile};
use tempfile::NamedTempFile;
use tracing::debug;

use super::{
    ClusterAddress, ClusterLayout, IndexEntry, RecordHeader, TileCluster, INDEX_ENTRY_SIZE,
};
use crate::error::{invalid, IoContext, Result, TileStoreError};
use crate::store::TileStoreWriter;

/// Appends tiles to a directory of cluster files.
#[derive(Debug)]
pub struct ClusterWriter {
    cluster: TileCluster,
}

impl ClusterWriter {
    pub fn new(
        location: impl Into<PathBuf>,
        set_name: &str,
        total_levels: u32,
        break_point: u32,
        profile: Box<dyn CrsProfile>,
    ) -> Result<Self> {
        let layout = ClusterLayout::new(location, set_name, total_levels, break_point)?;
        if !layout.location().is_dir() {
            return Err(invalid(format!(
                "cluster location {} is not a directory",
                layout.location().display()
            )));
        }
        Ok(Self {
            cluster: TileCluster::new(layout, profile)?,
        })
    }

    pub fn layout(&self) -> &ClusterLayout {
        self.cluster.layout()
    }

    /// Opens the cluster file for `address`, creating it with an all-empty
    /// index when it does not exist yet.
    fn open_cluster(&self, path: &Path, address: &ClusterAddress) -> Result<File> {
        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                create_cluster(path, address.index_entries(), fill_index)
            }
            Err(e) => Err(e).context(|| format!("opening {}", path.display())),
        }
    }
}

/// Writes `entries` empty index entries.
fn fill_index(file: &mut File, entries: u64) -> io::Result<()> {
    let empty = IndexEntry::EMPTY.encode();
    let mut out = BufWriter::new(file);
    for _ in 0..entries {
        out.write_all(&empty)?;
    }
    out.flush()
}

/// Builds the index in a temporary file next to `path` and moves it into
/// place only once complete, so `path` never holds a partial index. A
/// failed fill removes the temporary file.
fn create_cluster<F>(path: &Path, entries: u64, fill: F) -> Result<File>
where
    F: FnOnce(&mut File, u64) -> io::Result<()>,
{
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir)
        .context(|| format!("creating a staging file in {}", dir.display()))?;
    fill(staged.as_file_mut(), entries)
        .and_then(|()| staged.as_file().sync_data())
        .context(|| format!("writing index of {}", path.display()))?;

    match staged.persist_noclobber(path) {
        Ok(file) => {
            debug!(path = %path.display(), entries, "created cluster file");
            Ok(file)
        }
        // Another writer created it first; its index is already complete.
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .context(|| format!("opening {}", path.display())),
        Err(e) => Err(e.error).context(|| format!("creating {}", path.display())),
    }
}

impl TileStoreWriter for ClusterWriter {
    /// Appends the record, syncs it, then points the index entry at it.
    /// A crash between the two steps leaves an unreferenced record, never
    /// an entry pointing at missing data. Rewriting a tile orphans its
    /// previous record.
    fn add_tile(&self, column: u32, row: u32, zoom: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(invalid("tile data may not be empty"));
        }
        let length = i32::try_from(data.len()).map_err(|_| {
            invalid(format!(
                "tile of {} bytes exceeds the cluster record limit of {} bytes",
                data.len(),
                i32::MAX
            ))
        })?;

        let layout = self.layout();
        let address = layout.cluster_address(column, row, zoom)?;
        let slot_offset = layout.index_offset(column, row, zoom)?;
        let path = layout.cluster_file(&address);
        let mut file = self.open_cluster(&path, &address)?;

        let end = file
            .seek(SeekFrom::End(0))
            .context(|| format!("seeking in {}", path.display()))?;
        if end < address.index_size() {
            return Err(TileStoreError::Corrupt {
                path,
                detail: format!(
                    "file is {end} bytes but its index needs {}",
                    address.index_size()
                ),
            });
        }
        let record_offset = i64::try_from(end)
            .map_err(|_| invalid(format!("cluster file {} is too large", path.display())))?;

        let header = RecordHeader {
            column: i64::from(column),
            row: i64::from(row),
            length,
        };
        let mut record = Vec::with_capacity(header.encode().len() + data.len());
        record.extend_from_slice(&header.encode());
        record.extend_from_slice(data);
        file.write_all(&record)
            .context(|| format!("appending tile to {}", path.display()))?;
        file.sync_data()
            .context(|| format!("syncing {}", path.display()))?;

        let entry = IndexEntry {
            offset: record_offset,
            length,
        };
        file.seek(SeekFrom::Start(slot_offset))
            .context(|| format!("seeking in {}", path.display()))?;
        file.write_all(&entry.encode())
            .context(|| format!("updating index of {}", path.display()))?;

        debug!(
            column,
            row,
            zoom,
            bytes = data.len(),
            offset = record_offset,
            slot = slot_offset / INDEX_ENTRY_SIZE,
            "wrote cluster tile"
        );
        Ok(())
    }

    fn add_tile_at(&self, coordinate: &CrsCoordinate, zoom: u32, data: &[u8]) -> Result<()> {
        let tile = self.cluster.locate(coordinate, zoom)?;
        self.add_tile(tile.column, tile.row, zoom, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_failed_fill_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set-1-0-0.cluster");

        let err = create_cluster(&path, 85, |file, _| {
            file.write_all(&IndexEntry::EMPTY.encode())?;
            Err(io::Error::new(ErrorKind::Other, "disk full"))
        })
        .unwrap_err();
        assert!(matches!(err, TileStoreError::Io { .. }));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        let file = create_cluster(&path, 85, fill_index).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 85 * INDEX_ENTRY_SIZE);
        assert_eq!(fs::read(&path).unwrap(), vec![0xff; 85 * INDEX_ENTRY_SIZE as usize]);
    }

    #[test]
    fn test_existing_file_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set-1-0-0.cluster");
        fs::write(&path, b"occupied").unwrap();

        let file = create_cluster(&path, 5, fill_index).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 8);
        assert_eq!(fs::read(&path).unwrap(), b"occupied");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
