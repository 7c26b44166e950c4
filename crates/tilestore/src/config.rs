//! JSON description of a tile store.
//!
//! ```json
//! {
//!   "kind": "cluster",
//!   "location": "/data/tiles",
//!   "set_name": "world",
//!   "total_levels": 10,
//!   "break_point": 5,
//!   "profile": "global-geodetic"
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use geopack::{
    CrsProfile, EllipsoidalMercatorCrsProfile, GlobalGeodeticCrsProfile, SphericalMercatorCrsProfile,
};
use serde::{Deserialize, Serialize};

use crate::cluster::{ClusterLayout, ClusterReader, ClusterWriter};
use crate::error::{invalid, IoContext, Result};
use crate::store::{TileStoreReader, TileStoreWriter};
use crate::tms::{TmsReader, TmsWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    Cluster,
    Tms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileKind {
    #[default]
    GlobalGeodetic,
    SphericalMercator,
    EllipsoidalMercator,
}

impl ProfileKind {
    pub fn profile(self) -> Box<dyn CrsProfile> {
        match self {
            ProfileKind::GlobalGeodetic => Box::new(GlobalGeodeticCrsProfile),
            ProfileKind::SphericalMercator => Box::new(SphericalMercatorCrsProfile),
            ProfileKind::EllipsoidalMercator => Box::new(EllipsoidalMercatorCrsProfile::default()),
        }
    }
}

fn default_extension() -> String {
    "png".to_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub location: PathBuf,
    /// Cluster stores only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_levels: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_point: Option<u32>,
    /// TMS stores only.
    #[serde(default = "default_extension")]
    pub image_extension: String,
    #[serde(default)]
    pub profile: ProfileKind,
}

impl StoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(|| format!("opening {}", path.display()))?;
        let config: StoreConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that the fields the store kind needs are present and
    /// consistent. Does not touch the filesystem.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            StoreKind::Cluster => {
                self.cluster_layout()?;
            }
            StoreKind::Tms => {
                if self.image_extension.trim_start_matches('.').is_empty() {
                    return Err(invalid("a TMS store needs an image extension"));
                }
            }
        }
        Ok(())
    }

    fn cluster_layout(&self) -> Result<(&str, u32, u32)> {
        let set_name = self
            .set_name
            .as_deref()
            .ok_or_else(|| invalid("a cluster store needs a set name"))?;
        let total_levels = self
            .total_levels
            .ok_or_else(|| invalid("a cluster store needs a total level count"))?;
        let break_point = self
            .break_point
            .ok_or_else(|| invalid("a cluster store needs a break point"))?;
        ClusterLayout::new(&self.location, set_name, total_levels, break_point)?;
        Ok((set_name, total_levels, break_point))
    }

    pub fn open_reader(&self) -> Result<Box<dyn TileStoreReader>> {
        let profile = self.profile.profile();
        Ok(match self.kind {
            StoreKind::Cluster => {
                let (set_name, total_levels, break_point) = self.cluster_layout()?;
                Box::new(ClusterReader::new(
                    &self.location,
                    set_name,
                    total_levels,
                    break_point,
                    profile,
                )?)
            }
            StoreKind::Tms => Box::new(TmsReader::new(&self.location, &self.image_extension, profile)?),
        })
    }

    pub fn open_writer(&self) -> Result<Box<dyn TileStoreWriter>> {
        let profile = self.profile.profile();
        Ok(match self.kind {
            StoreKind::Cluster => {
                let (set_name, total_levels, break_point) = self.cluster_layout()?;
                Box::new(ClusterWriter::new(
                    &self.location,
                    set_name,
                    total_levels,
                    break_point,
                    profile,
                )?)
            }
            StoreKind::Tms => Box::new(TmsWriter::new(&self.location, &self.image_extension, profile)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TileStoreError;

    #[test]
    fn test_parse_cluster_config() {
        let config = StoreConfig::from_json_str(
            r#"{"kind":"cluster","location":"/tmp/x","set_name":"world","total_levels":10,"break_point":5,"profile":"spherical-mercator"}"#,
        )
        .unwrap();
        assert_eq!(config.kind, StoreKind::Cluster);
        assert_eq!(config.profile, ProfileKind::SphericalMercator);
        assert_eq!(config.image_extension, "png");
        assert_eq!(config.profile.profile().coordinate_reference_system().identifier(), 3857);
    }

    #[test]
    fn test_cluster_config_requires_layout() {
        let err = StoreConfig::from_json_str(r#"{"kind":"cluster","location":"/tmp/x"}"#).unwrap_err();
        assert!(matches!(err, TileStoreError::InvalidArgument(_)));
        let err = StoreConfig::from_json_str(
            r#"{"kind":"cluster","location":"/tmp/x","set_name":"w","total_levels":4,"break_point":4}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TileStoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_unknown_fields_and_kinds_rejected() {
        let err = StoreConfig::from_json_str(r#"{"kind":"gpkg","location":"/tmp/x"}"#).unwrap_err();
        assert!(matches!(err, TileStoreError::Config(_)));
        let err = StoreConfig::from_json_str(r#"{"kind":"tms","location":"/tmp/x","zoom":3}"#).unwrap_err();
        assert!(matches!(err, TileStoreError::Config(_)));
    }

    #[test]
    fn test_json_round_trip() {
        let config = StoreConfig::from_json_str(
            r#"{"kind":"tms","location":"/tmp/x","image_extension":"jpg","profile":"ellipsoidal-mercator"}"#,
        )
        .unwrap();
        let back = StoreConfig::from_json_str(&config.to_json_string().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
