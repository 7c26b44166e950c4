use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use geopack::{CoordinateReferenceSystem, CrsCoordinate, CrsProfile};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use super::{
    ClusterAddress, ClusterLayout, IndexEntry, RecordHeader, TileCluster, INDEX_ENTRY_SIZE,
    TILE_HEADER_SIZE,
};
use crate::error::{invalid, IoContext, Result, TileStoreError};
use crate::store::TileStoreReader;

/// Positioned reads from an open cluster file.
trait ReadAt {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

impl ReadAt for File {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }
}

#[cfg(feature = "mmap")]
impl ReadAt for memmap2::Mmap {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset).map_err(|_| io::Error::from(ErrorKind::UnexpectedEof))?;
        let src = start
            .checked_add(buf.len())
            .and_then(|end| self.get(start..end))
            .ok_or_else(|| io::Error::from(ErrorKind::UnexpectedEof))?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

fn corrupt(path: &Path, detail: impl Into<String>) -> TileStoreError {
    TileStoreError::Corrupt {
        path: path.to_path_buf(),
        detail: detail.into(),
    }
}

/// Reads the tile behind index slot `slot`, checking the record against
/// the requested address.
fn read_tile<S: ReadAt>(
    source: &mut S,
    path: &Path,
    slot: u64,
    column: u32,
    row: u32,
) -> Result<Option<Vec<u8>>> {
    let mut raw = [0u8; INDEX_ENTRY_SIZE as usize];
    match source.read_at(slot * INDEX_ENTRY_SIZE, &mut raw) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            return Err(corrupt(path, format!("index slot {slot} lies past the end of the file")));
        }
        Err(e) => return Err(e).context(|| format!("reading index of {}", path.display())),
    }
    let entry = IndexEntry::decode(&raw);
    trace!(path = %path.display(), slot, offset = entry.offset, length = entry.length, "index lookup");
    if entry.is_empty() {
        return Ok(None);
    }
    let offset = u64::try_from(entry.offset)
        .map_err(|_| corrupt(path, format!("negative record offset {}", entry.offset)))?;
    let length = usize::try_from(entry.length)
        .map_err(|_| corrupt(path, format!("negative record length {}", entry.length)))?;

    let mut header = [0u8; TILE_HEADER_SIZE as usize];
    source
        .read_at(offset, &mut header)
        .context(|| format!("reading tile record at {offset} in {}", path.display()))?;
    let header = RecordHeader::decode(&header)
        .ok_or_else(|| corrupt(path, format!("bad tile record magic at offset {offset}")))?;
    if header.column != i64::from(column) || header.row != i64::from(row) || header.length != entry.length {
        return Err(corrupt(
            path,
            format!(
                "record at {offset} holds tile ({}, {}) of {} bytes, index expects ({column}, {row}) of {length} bytes",
                header.column, header.row, header.length
            ),
        ));
    }

    let mut data = vec![0u8; length];
    source
        .read_at(offset + TILE_HEADER_SIZE, &mut data)
        .context(|| format!("reading tile payload at {offset} in {}", path.display()))?;
    Ok(Some(data))
}

/// Per-file totals gathered while scanning a tile set.
#[derive(Debug, Default)]
struct Scan {
    tiles: u64,
    bytes: u64,
    zooms: BTreeSet<u32>,
}

/// Reads tiles from a directory of cluster files.
#[derive(Debug)]
pub struct ClusterReader {
    cluster: TileCluster,
}

impl ClusterReader {
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
                "cluster location {} is not a readable directory",
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

    /// Cluster files of this tile set with the address each encodes.
    fn cluster_files(&self) -> Vec<(PathBuf, ClusterAddress)> {
        let layout = self.layout();
        let mut files = Vec::new();
        for entry in WalkDir::new(layout.location())
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let Some((start_level, row, column)) = layout.parse_cluster_file_name(name) else {
                continue;
            };
            let Some((start_level, end_level)) = layout.range_starting_at(start_level) else {
                warn!(file = %entry.path().display(), "cluster file does not match the layout's zoom ranges; skipping");
                continue;
            };
            files.push((
                entry.into_path(),
                ClusterAddress {
                    row,
                    column,
                    start_level,
                    end_level,
                },
            ));
        }
        files
    }

    fn scan(&self) -> Result<Scan> {
        let mut scan = Scan::default();
        for (path, address) in self.cluster_files() {
            let file = File::open(&path).context(|| format!("opening {}", path.display()))?;
            let len = file
                .metadata()
                .context(|| format!("reading metadata of {}", path.display()))?
                .len();
            scan.bytes += len;
            if len < address.index_size() {
                warn!(file = %path.display(), len, "cluster file shorter than its index; skipping");
                continue;
            }

            let mut index = BufReader::new(file);
            let mut raw = [0u8; INDEX_ENTRY_SIZE as usize];
            for slot in 0..address.index_entries() {
                index
                    .read_exact(&mut raw)
                    .context(|| format!("reading index of {}", path.display()))?;
                if IndexEntry::decode(&raw).is_empty() {
                    continue;
                }
                scan.tiles += 1;
                if let Some(zoom) = address.zoom_of_slot(slot) {
                    scan.zooms.insert(zoom);
                }
            }
        }
        debug!(tiles = scan.tiles, bytes = scan.bytes, "scanned cluster tile set");
        Ok(scan)
    }
}

#[cfg(feature = "mmap")]
fn open_source(file: File, path: &Path) -> Result<memmap2::Mmap> {
    // SAFETY: cluster files are only ever appended to and patched in place;
    // a concurrent writer needs external exclusion in either read path.
    unsafe { memmap2::MmapOptions::new().map(&file) }
        .context(|| format!("mapping {}", path.display()))
}

#[cfg(not(feature = "mmap"))]
fn open_source(file: File, _path: &Path) -> Result<File> {
    Ok(file)
}

impl TileStoreReader for ClusterReader {
    fn tile(&self, column: u32, row: u32, zoom: u32) -> Result<Option<Vec<u8>>> {
        let layout = self.layout();
        let address = layout.cluster_address(column, row, zoom)?;
        let slot = layout.index_slot(column, row, zoom)?;
        let path = layout.cluster_file(&address);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context(|| format!("opening {}", path.display())),
        };
        let mut source = open_source(file, &path)?;
        let tile = read_tile(&mut source, &path, slot, column, row)?;
        debug!(column, row, zoom, found = tile.is_some(), "read cluster tile");
        Ok(tile)
    }

    fn tile_at(&self, coordinate: &CrsCoordinate, zoom: u32) -> Result<Option<Vec<u8>>> {
        let tile = self.cluster.locate(coordinate, zoom)?;
        self.tile(tile.column, tile.row, zoom)
    }

    fn count_tiles(&self) -> Result<u64> {
        Ok(self.scan()?.tiles)
    }

    fn byte_size(&self) -> Result<u64> {
        Ok(self.scan()?.bytes)
    }

    fn zoom_levels(&self) -> Result<BTreeSet<u32>> {
        Ok(self.scan()?.zooms)
    }

    fn coordinate_reference_system(&self) -> CoordinateReferenceSystem {
        self.cluster.profile().coordinate_reference_system()
    }
}
