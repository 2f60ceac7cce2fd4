//! A JSON layer list GIS clients can load, standing in for the host map.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MAP_LAYERS_FILE: &str = "map_layers.json";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct LayerList {
    #[serde(skip)]
    file: PathBuf,
    layers: Vec<Layer>,
}

impl LayerList {
    /// Load the list stored at `file`, or start an empty one.
    pub fn open<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref().to_path_buf();
        let mut list: Self = if file.exists() {
            serde_json::from_str(&fs::read_to_string(&file)?)?
        } else {
            Self::default()
        };
        list.file = file;
        Ok(list)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Register a raster and persist the list. Returns `false` if it was already listed.
    pub fn add_raster(&mut self, raster: &Path) -> Result<bool> {
        if self.layers.iter().any(|layer| layer.path == raster) {
            return Ok(false);
        }

        let name = raster
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| raster.display().to_string());
        info!("Adding layer '{name}' to {}", self.file.display());

        self.layers.push(Layer {
            name,
            path: raster.to_path_buf(),
        });
        self.save()?;
        Ok(true)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&self.file, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_raster_persists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(MAP_LAYERS_FILE);

        let mut list = LayerList::open(&file).unwrap();
        assert!(list.layers().is_empty());
        assert!(list.add_raster(Path::new("/data/SCENE_B4.TIF")).unwrap());
        assert!(list.add_raster(Path::new("/data/SCENE_B5.TIF")).unwrap());

        let list = LayerList::open(&file).unwrap();
        assert_eq!(list.layers().len(), 2);
        assert_eq!(list.layers()[0].name, "SCENE_B4");
        assert_eq!(list.layers()[1].path, PathBuf::from("/data/SCENE_B5.TIF"));
    }

    #[test]
    fn test_add_raster_ignores_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut list = LayerList::open(dir.path().join(MAP_LAYERS_FILE)).unwrap();

        assert!(list.add_raster(Path::new("SCENE_B1.TIF")).unwrap());
        assert!(!list.add_raster(Path::new("SCENE_B1.TIF")).unwrap());
        assert_eq!(list.layers().len(), 1);
    }

    #[test]
    fn test_add_raster_reports_unwritable_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut list = LayerList::open(dir.path().join("missing").join(MAP_LAYERS_FILE)).unwrap();
        assert!(list.add_raster(Path::new("SCENE_B1.TIF")).is_err());
    }
}
