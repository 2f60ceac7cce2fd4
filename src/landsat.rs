//! Maps catalog rows onto the per-band GeoTIFFs stored next to each scene's index page.
use crate::catalog::SceneRecord;
use crate::download_plan::{CompositeTask, DownloadPlan, DownloadTask};
use crate::error::TargetError;
use crate::scene_selection::SceneSelection;
use anyhow::Result;
use std::path::PathBuf;
use url::Url;

const INDEX_PAGE: &str = "index.html";

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct BandTarget {
    pub scene_id: String,
    pub band: u8,
    pub file_name: String,
    pub url: String,
}

/// The scene directory, i.e. `download_url` without its trailing `index.html`.
pub fn scene_dir_url(download_url: &str) -> Result<&str, TargetError> {
    download_url
        .strip_suffix(INDEX_PAGE)
        .filter(|dir| dir.ends_with('/'))
        .ok_or_else(|| TargetError::NotAnIndexUrl(download_url.to_string()))
}

/// The scene directory name, which doubles as the band file prefix.
pub fn scene_id(download_url: &str) -> Result<String, TargetError> {
    let missing = || TargetError::MissingSceneId(download_url.to_string());

    let url = Url::parse(download_url).map_err(|_| missing())?;
    let mut segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.collect())
        .unwrap_or_default();

    if segments.last() != Some(&INDEX_PAGE) {
        return Err(TargetError::NotAnIndexUrl(download_url.to_string()));
    }
    segments.pop();

    segments
        .last()
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
        .ok_or_else(missing)
}

pub fn band_file_name(scene_id: &str, band: u8) -> String {
    format!("{scene_id}_B{band}.TIF")
}

pub fn band_target(scene: &SceneRecord, band: u8) -> Result<BandTarget, TargetError> {
    let dir = scene_dir_url(&scene.download_url)?;
    let scene_id = scene_id(&scene.download_url)?;
    let file_name = band_file_name(&scene_id, band);
    let url = format!("{dir}{file_name}");

    Ok(BandTarget {
        scene_id,
        band,
        file_name,
        url,
    })
}

pub fn generate_download_plan(
    selection: &SceneSelection,
    scenes: &[SceneRecord],
    output_dir: PathBuf,
) -> Result<DownloadPlan> {
    let bands = selection.bands_to_download();

    let mut tasks: Vec<DownloadTask> = vec![];
    let mut composites: Vec<CompositeTask> = vec![];

    for scene in scenes {
        let mut outputs = vec![];
        let mut scene_id = String::new();

        for &band in &bands {
            let target = band_target(scene, band)?;
            let output = output_dir.join(&target.file_name);
            outputs.push(output.clone());
            scene_id = target.scene_id.clone();

            tasks.push(DownloadTask::new(&target.scene_id, band, &target.url, output));
        }

        if selection.create_composite {
            let output = output_dir.join(format!("{scene_id}.TIF"));
            composites.push(CompositeTask::new(&scene_id, outputs, output));
        }
    }
    Ok(DownloadPlan::new(&selection.id, tasks, composites))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_selection::landsat8_template;
    use chrono::NaiveDate;

    const SCENE_ID: &str = "LC08_L1TP_139045_20170304_20170316_01_T1";
    const DOWNLOAD_URL: &str = "https://s3-us-west-2.amazonaws.com/landsat-pds/c1/L8/139/045/LC08_L1TP_139045_20170304_20170316_01_T1/index.html";

    fn scene(download_url: &str) -> SceneRecord {
        SceneRecord {
            product_id: SCENE_ID.to_string(),
            entity_id: Some("LC81390452017063LGN00".to_string()),
            acquisition_date: NaiveDate::from_ymd_opt(2017, 3, 4)
                .unwrap()
                .and_hms_opt(4, 33, 18)
                .unwrap(),
            cloud_cover: Some(0.47),
            processing_level: Some("L1TP".to_string()),
            path: 139,
            row: 45,
            min_lat: None,
            min_lon: None,
            max_lat: None,
            max_lon: None,
            download_url: download_url.to_string(),
        }
    }

    #[test]
    fn test_scene_id() {
        assert_eq!(scene_id(DOWNLOAD_URL).unwrap(), SCENE_ID);
    }

    #[test]
    fn test_band_target() {
        let target = band_target(&scene(DOWNLOAD_URL), 4).unwrap();
        assert_eq!(
            target,
            BandTarget {
                scene_id: SCENE_ID.to_string(),
                band: 4,
                file_name: format!("{SCENE_ID}_B4.TIF"),
                url: format!("https://s3-us-west-2.amazonaws.com/landsat-pds/c1/L8/139/045/{SCENE_ID}/{SCENE_ID}_B4.TIF"),
            }
        );
    }

    #[test]
    fn test_two_digit_band() {
        let target = band_target(&scene(DOWNLOAD_URL), 11).unwrap();
        assert!(target.url.ends_with(&format!("{SCENE_ID}/{SCENE_ID}_B11.TIF")));
    }

    #[test]
    fn test_malformed_download_urls() {
        assert!(matches!(
            band_target(&scene("https://example.com/c1/L8/scene/"), 1),
            Err(TargetError::NotAnIndexUrl(_))
        ));
        assert!(matches!(
            band_target(&scene("https://example.com/index.html"), 1),
            Err(TargetError::MissingSceneId(_))
        ));
        assert!(band_target(&scene("not a url index.html"), 1).is_err());
    }

    #[test]
    fn test_generate_download_plan() {
        let mut selection = SceneSelection::from_template(&landsat8_template()).unwrap();
        selection.bands = vec![5, 4, 3];
        selection.create_composite = true;

        let scenes = vec![scene(DOWNLOAD_URL)];
        let plan = generate_download_plan(&selection, &scenes, PathBuf::from("/data")).unwrap();

        let outputs: Vec<PathBuf> = plan.tasks().iter().map(|t| t.output.clone()).collect();
        assert_eq!(
            outputs,
            vec![
                PathBuf::from(format!("/data/{SCENE_ID}_B3.TIF")),
                PathBuf::from(format!("/data/{SCENE_ID}_B4.TIF")),
                PathBuf::from(format!("/data/{SCENE_ID}_B5.TIF")),
            ]
        );

        let composite = &plan.composites()[0];
        assert_eq!(composite.scene_id, SCENE_ID);
        assert_eq!(composite.inputs, outputs);
        assert_eq!(composite.output, PathBuf::from(format!("/data/{SCENE_ID}.TIF")));
    }

    #[test]
    fn test_generate_download_plan_without_composite() {
        let selection = SceneSelection::from_template(&landsat8_template()).unwrap();
        let scenes = vec![scene(DOWNLOAD_URL), scene(DOWNLOAD_URL)];
        let plan = generate_download_plan(&selection, &scenes, PathBuf::from("/data")).unwrap();
        assert_eq!(plan.tasks().len(), 22);
        assert!(plan.composites().is_empty());
    }
}
