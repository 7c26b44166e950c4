//! Tile Map Service directory layout: `<root>/<zoom>/<column>/<row>.<ext>`,
//! rows counted from the bottom of the world.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use geopack::{CoordinateReferenceSystem, CrsCoordinate, CrsProfile, TileOrigin};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{invalid, IoContext, Result};
use crate::scheme::{TileScheme, ZoomTimesTwo};
use crate::store::{self, TileStoreReader, TileStoreWriter};

pub const TMS_ORIGIN: TileOrigin = TileOrigin::LowerLeft;

/// Location and naming shared by the TMS reader and writer.
#[derive(Debug)]
struct TmsTileStore {
    root: PathBuf,
    extension: String,
    profile: Box<dyn CrsProfile>,
    scheme: ZoomTimesTwo,
}

impl TmsTileStore {
    fn new(root: PathBuf, extension: &str, profile: Box<dyn CrsProfile>) -> Result<Self> {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(invalid(format!("invalid tile file extension {extension:?}")));
        }
        Ok(Self {
            root,
            extension: extension.to_owned(),
            profile,
            scheme: ZoomTimesTwo::global(),
        })
    }

    fn tile_path(&self, column: u32, row: u32, zoom: u32) -> PathBuf {
        self.root
            .join(zoom.to_string())
            .join(column.to_string())
            .join(format!("{row}.{}", self.extension))
    }

    /// Checks the address against the zoom level's matrix.
    fn check(&self, column: u32, row: u32, zoom: u32) -> Result<()> {
        let dimensions = self.scheme.dimensions(zoom)?;
        if !dimensions.contains(column, row) {
            return Err(invalid(format!(
                "tile ({column}, {row}) is outside the {}x{} matrix of zoom level {zoom}",
                dimensions.width(),
                dimensions.height()
            )));
        }
        Ok(())
    }

    /// `(zoom, path, size)` of every tile file under the root.
    fn tiles(&self) -> Vec<(u32, PathBuf, u64)> {
        let numeric = |p: &Path| p.to_str().and_then(|s| s.parse::<u32>().ok());
        let mut out = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(3)
            .max_depth(3)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let mut parts = relative.iter().map(Path::new);
            let (Some(zoom), Some(column), Some(file)) = (parts.next(), parts.next(), parts.next()) else {
                continue;
            };
            let Some(zoom) = numeric(zoom) else {
                continue;
            };
            if numeric(column).is_none() {
                continue;
            }
            let row_ok = file.file_stem().map(Path::new).and_then(numeric).is_some();
            let ext_ok = file.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str());
            if !(row_ok && ext_ok) {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => out.push((zoom, path.to_path_buf(), meta.len())),
                Err(e) => warn!(file = %path.display(), error = %e, "unreadable tile skipped"),
            }
        }
        out
    }
}

/// Reads tiles from a TMS directory tree.
#[derive(Debug)]
pub struct TmsReader {
    store: TmsTileStore,
}

impl TmsReader {
    pub fn new(root: impl Into<PathBuf>, extension: &str, profile: Box<dyn CrsProfile>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(invalid(format!(
                "TMS location {} is not a readable directory",
                root.display()
            )));
        }
        Ok(Self {
            store: TmsTileStore::new(root, extension, profile)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.store.root
    }
}

impl TileStoreReader for TmsReader {
    fn tile(&self, column: u32, row: u32, zoom: u32) -> Result<Option<Vec<u8>>> {
        self.store.check(column, row, zoom)?;
        let path = self.store.tile_path(column, row, zoom);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(|| format!("reading {}", path.display())),
        }
    }

    fn tile_at(&self, coordinate: &CrsCoordinate, zoom: u32) -> Result<Option<Vec<u8>>> {
        let tile = store::locate(
            self.store.profile.as_ref(),
            &self.store.scheme,
            TMS_ORIGIN,
            coordinate,
            zoom,
        )?;
        self.tile(tile.column, tile.row, zoom)
    }

    fn count_tiles(&self) -> Result<u64> {
        Ok(self.store.tiles().len() as u64)
    }

    fn byte_size(&self) -> Result<u64> {
        Ok(self.store.tiles().iter().map(|(_, _, size)| size).sum())
    }

    fn zoom_levels(&self) -> Result<BTreeSet<u32>> {
        Ok(self.store.tiles().into_iter().map(|(zoom, _, _)| zoom).collect())
    }

    fn coordinate_reference_system(&self) -> CoordinateReferenceSystem {
        self.store.profile.coordinate_reference_system()
    }
}

/// Writes tiles into a TMS directory tree, creating directories as needed.
#[derive(Debug)]
pub struct TmsWriter {
    store: TmsTileStore,
}

impl TmsWriter {
    pub fn new(root: impl Into<PathBuf>, extension: &str, profile: Box<dyn CrsProfile>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).context(|| format!("creating {}", root.display()))?;
        Ok(Self {
            store: TmsTileStore::new(root, extension, profile)?,
        })
    }
}

impl TileStoreWriter for TmsWriter {
    fn add_tile(&self, column: u32, row: u32, zoom: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(invalid("tile data may not be empty"));
        }
        self.store.check(column, row, zoom)?;
        let path = self.store.tile_path(column, row, zoom);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context(|| format!("creating {}", dir.display()))?;
        }
        fs::write(&path, data).context(|| format!("writing {}", path.display()))?;
        debug!(column, row, zoom, bytes = data.len(), "wrote TMS tile");
        Ok(())
    }

    fn add_tile_at(&self, coordinate: &CrsCoordinate, zoom: u32, data: &[u8]) -> Result<()> {
        let tile = store::locate(
            self.store.profile.as_ref(),
            &self.store.scheme,
            TMS_ORIGIN,
            coordinate,
            zoom,
        )?;
        self.add_tile(tile.column, tile.row, zoom, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geopack::GlobalGeodeticCrsProfile;

    #[test]
    fn test_tile_path_layout() {
        let store = TmsTileStore::new("/tms".into(), ".png", Box::new(GlobalGeodeticCrsProfile)).unwrap();
        assert_eq!(store.tile_path(3, 5, 4), Path::new("/tms/4/3/5.png"));
    }

    #[test]
    fn test_extension_validation() {
        assert!(TmsTileStore::new("/tms".into(), "", Box::new(GlobalGeodeticCrsProfile)).is_err());
        assert!(TmsTileStore::new("/tms".into(), "a/b", Box::new(GlobalGeodeticCrsProfile)).is_err());
    }

    #[test]
    fn test_out_of_matrix_tile_rejected() {
        let store = TmsTileStore::new("/tms".into(), "png", Box::new(GlobalGeodeticCrsProfile)).unwrap();
        assert!(store.check(1, 1, 1).is_ok());
        assert!(store.check(2, 0, 1).is_err());
        assert!(store.check(0, 0, 32).is_err());
    }
}
