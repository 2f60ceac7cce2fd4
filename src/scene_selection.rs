use crate::catalog::{Catalog, SceneRecord};
use crate::error::SelectionError;
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use toml;
use tracing::{info, warn};

pub const LANDSAT8_BANDS: std::ops::RangeInclusive<u8> = 1..=11;

pub fn landsat8_template() -> toml::Table {
    toml::toml! {
        id = "landsat8.collection1"

        scene_list = "https://landsat-pds.s3.amazonaws.com/c1/L8/scene_list.gz"

        start_date = "2017-01-01"
        end_date = "2017-12-31"

        path = 139
        row = 45

        // 0 keeps every match
        max_results = 1

        bands = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]

        add_to_map = false
        create_composite = false

        output_dir = "./outputs"
    }
}

fn default_bands() -> Vec<u8> {
    LANDSAT8_BANDS.collect()
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SceneSelection {
    pub id: String,
    pub scene_list: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub path: u32,
    pub row: u32,
    #[serde(default)]
    pub max_results: usize,
    #[serde(default = "default_bands")]
    pub bands: Vec<u8>,
    #[serde(default)]
    pub add_to_map: bool,
    #[serde(default)]
    pub create_composite: bool,
    pub output_dir: PathBuf,
}

impl SceneSelection {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let selection: Self = toml::from_str(&content)?;
        Ok(selection)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let selection: Self = toml::from_str(&table.to_string())?;
        Ok(selection)
    }

    pub fn validate(self: &Self) -> Result<(), SelectionError> {
        if self.bands.is_empty() {
            return Err(SelectionError::NoBands);
        }
        match self.bands.iter().copied().find(|b| !LANDSAT8_BANDS.contains(b)) {
            Some(band) => Err(SelectionError::InvalidBand(band)),
            None => Ok(()),
        }
    }

    /// Ascending, without duplicates.
    pub fn bands_to_download(self: &Self) -> Vec<u8> {
        let mut bands = self.bands.clone();
        bands.sort_unstable();
        bands.dedup();
        bands
    }

    /// Pick the newest scenes on the requested path/row whose acquisition day
    /// falls inside `[start_date, end_date]`, stopping after `max_results`.
    pub fn select(self: &Self, catalog: &Catalog) -> Vec<SceneRecord> {
        info!("Filtering by path {}", self.path);
        let mut candidates: Vec<&SceneRecord> = catalog
            .scenes()
            .iter()
            .filter(|scene| scene.path == self.path)
            .collect();
        info!("Filtering by path resulted in {} scenes", candidates.len());

        info!("Filtering by row {}", self.row);
        candidates.retain(|scene| scene.row == self.row);
        info!("Filtering by row resulted in {} scenes", candidates.len());

        info!("Sorting by acquisitionDate");
        candidates.sort_by(|a, b| b.acquisition_date.cmp(&a.acquisition_date));

        info!("Filtering by dates {} to {}", self.start_date, self.end_date);
        if self.start_date > self.end_date {
            warn!("Start date is after end date");
        }

        let mut matches: Vec<SceneRecord> = vec![];
        for scene in candidates {
            let day = scene.acquisition_day();
            if day < self.start_date || day > self.end_date {
                continue;
            }
            info!("Found match: {}", scene.product_id);
            matches.push(scene.clone());
            if matches.len() == self.max_results {
                info!("Filtering reached maximum");
                break;
            }
        }

        if matches.is_empty() {
            warn!("Filtering resulted in no scenes matching the query");
        } else {
            info!("Filtering resulted in {} scenes", matches.len());
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn scene(id: &str, path: u32, row: u32, date: &str) -> SceneRecord {
        SceneRecord {
            product_id: id.to_string(),
            entity_id: None,
            acquisition_date: NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").unwrap(),
            cloud_cover: None,
            processing_level: None,
            path,
            row,
            min_lat: None,
            min_lon: None,
            max_lat: None,
            max_lon: None,
            download_url: format!("https://example.com/c1/L8/{path:03}/{row:03}/{id}/index.html"),
        }
    }

    fn mock_catalog() -> Catalog {
        Catalog::new(vec![
            scene("A", 139, 45, "2017-01-15 04:30:00"),
            scene("B", 139, 45, "2017-03-04 04:33:18"),
            scene("C", 139, 46, "2017-03-04 04:33:42"),
            scene("D", 140, 45, "2017-03-11 04:39:00"),
            scene("E", 139, 45, "2017-12-31 23:59:59"),
            scene("F", 139, 45, "2018-01-01 00:00:01"),
            scene("G", 139, 45, "2016-12-31 23:00:00"),
            scene("H", 139, 45, "2017-06-20 04:31:00"),
        ])
    }

    fn selection(max_results: usize) -> SceneSelection {
        let mut selection = SceneSelection::from_template(&landsat8_template()).unwrap();
        selection.max_results = max_results;
        selection
    }

    fn ids(scenes: &[SceneRecord]) -> Vec<&str> {
        scenes.iter().map(|s| s.product_id.as_str()).collect()
    }

    #[test]
    fn test_template() {
        let selection = selection(1);
        assert_eq!(selection.id, "landsat8.collection1");
        assert_eq!(selection.bands.len(), 11);
        assert_eq!(selection.start_date, NaiveDate::from_ymd_opt(2017, 1, 1).unwrap());
        assert!(selection.validate().is_ok());
    }

    #[test]
    fn test_read_write_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.toml");
        selection(3).write(&path).unwrap();

        let selection = SceneSelection::read(&path).unwrap();
        assert_eq!(selection.max_results, 3);
        assert_eq!(selection.path, 139);
        assert_eq!(selection.output_dir, PathBuf::from("./outputs"));
    }

    #[test]
    fn test_read_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.toml");
        fs::write(
            &path,
            r#"
id = "minimal"
scene_list = "scene_list.gz"
start_date = "2020-01-01"
end_date = "2020-02-01"
path = 1
row = 2
output_dir = "out"
"#,
        )
        .unwrap();

        let selection = SceneSelection::read(&path).unwrap();
        assert_eq!(selection.max_results, 0);
        assert_eq!(selection.bands, (1..=11).collect::<Vec<u8>>());
        assert!(!selection.add_to_map);
        assert!(!selection.create_composite);
    }

    #[test]
    fn test_select_filters_and_sorts_descending() {
        let scenes = selection(0).select(&mock_catalog());
        assert_eq!(ids(&scenes), vec!["E", "H", "B", "A"]);
        for s in &scenes {
            assert_eq!((s.path, s.row), (139, 45));
        }
    }

    #[test]
    fn test_select_stops_at_max_results() {
        let scenes = selection(2).select(&mock_catalog());
        assert_eq!(ids(&scenes), vec!["E", "H"]);
    }

    #[test]
    fn test_select_date_bounds_are_inclusive() {
        let mut selection = selection(0);
        selection.start_date = NaiveDate::from_ymd_opt(2017, 3, 4).unwrap();
        selection.end_date = NaiveDate::from_ymd_opt(2017, 3, 4).unwrap();
        assert_eq!(ids(&selection.select(&mock_catalog())), vec!["B"]);
    }

    #[test]
    fn test_select_no_matches() {
        let mut selection = selection(5);
        selection.row = 99;
        assert!(selection.select(&mock_catalog()).is_empty());

        let mut selection = self::selection(5);
        selection.start_date = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        selection.end_date = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
        assert!(selection.select(&mock_catalog()).is_empty());
    }

    #[test]
    fn test_bands() {
        let mut selection = selection(1);
        selection.bands = vec![4, 3, 2, 4];
        assert_eq!(selection.bands_to_download(), vec![2, 3, 4]);

        selection.bands = vec![4, 12];
        assert!(matches!(
            selection.validate(),
            Err(SelectionError::InvalidBand(12))
        ));

        selection.bands = vec![];
        assert!(matches!(selection.validate(), Err(SelectionError::NoBands)));
    }
}
