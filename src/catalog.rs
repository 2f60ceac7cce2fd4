//! The Landsat scene list: a (usually gzipped) CSV with one row per scene.
use crate::error::CatalogError;
use chrono::{NaiveDate, NaiveDateTime};
use flate2::read::GzDecoder;
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, info};
use url::Url;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct SceneRecord {
    #[serde(rename = "productId")]
    pub product_id: String,
    #[serde(rename = "entityId", default)]
    pub entity_id: Option<String>,
    #[serde(
        rename = "acquisitionDate",
        deserialize_with = "deserialize_acquisition_date"
    )]
    pub acquisition_date: NaiveDateTime,
    #[serde(rename = "cloudCover", default)]
    pub cloud_cover: Option<f64>,
    #[serde(rename = "processingLevel", default)]
    pub processing_level: Option<String>,
    pub path: u32,
    pub row: u32,
    #[serde(default)]
    pub min_lat: Option<f64>,
    #[serde(default)]
    pub min_lon: Option<f64>,
    #[serde(default)]
    pub max_lat: Option<f64>,
    #[serde(default)]
    pub max_lon: Option<f64>,
    pub download_url: String,
}

impl SceneRecord {
    pub fn acquisition_day(&self) -> NaiveDate {
        self.acquisition_date.date()
    }
}

/// Accepts the timestamp layouts found in scene lists, falling back to a bare date.
pub fn parse_acquisition_date(raw: &str) -> Result<NaiveDateTime, CatalogError> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(datetime);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| CatalogError::Date(raw.to_string()))
}

fn deserialize_acquisition_date<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_acquisition_date(&raw).map_err(serde::de::Error::custom)
}

#[derive(Debug, Default)]
pub struct Catalog {
    scenes: Vec<SceneRecord>,
}

impl Catalog {
    pub fn new(scenes: Vec<SceneRecord>) -> Self {
        Self { scenes }
    }

    /// Fetch the scene list from an http(s) URL or a local path.
    pub async fn fetch(source: &str) -> Result<Self, CatalogError> {
        info!("Downloading scene list from {source}");
        let bytes = fetch_bytes(source).await?;
        debug!("Scene list is {} bytes", bytes.len());

        let catalog = if is_gzip(&bytes) {
            Self::from_reader(GzDecoder::new(bytes.as_slice()))?
        } else {
            Self::from_reader(bytes.as_slice())?
        };

        info!("Download complete: {} scenes listed", catalog.len());
        Ok(catalog)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let scenes = csv_reader
            .deserialize()
            .collect::<Result<Vec<SceneRecord>, csv::Error>>()?;
        Ok(Self { scenes })
    }

    pub fn scenes(&self) -> &[SceneRecord] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

#[derive(Debug, PartialEq)]
enum CatalogSource {
    Remote(Url),
    Local(PathBuf),
}

impl CatalogSource {
    fn parse(source: &str) -> Option<Self> {
        match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(Self::Remote(url)),
            Ok(url) if url.scheme() == "file" => url.to_file_path().ok().map(Self::Local),
            // Relative paths and Windows drive letters land here
            _ => Some(Self::Local(PathBuf::from(source))),
        }
    }
}

async fn fetch_bytes(source: &str) -> Result<Vec<u8>, CatalogError> {
    let fetch_error = |reason: String| CatalogError::Fetch {
        source_name: source.to_string(),
        reason,
    };

    let location =
        CatalogSource::parse(source).ok_or_else(|| fetch_error("Invalid file URL".to_string()))?;

    match location {
        CatalogSource::Remote(url) => {
            let response = reqwest::get(url)
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| fetch_error(e.to_string()))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| fetch_error(e.to_string()))?;
            Ok(bytes.to_vec())
        }
        CatalogSource::Local(path) => tokio::fs::read(path)
            .await
            .map_err(|e| fetch_error(e.to_string())),
    }
}

/// Decided by content only, a `.gz` name is no guarantee of compression.
fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}
