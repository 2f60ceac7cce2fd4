use crate::composite::build_composite;
use crate::store::ObjectStore;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct DownloadTask {
    pub scene_id: String,
    pub band: u8,
    pub url: String,
    pub output: PathBuf,
}

impl DownloadTask {
    pub fn new(scene_id: &str, band: u8, url: &str, output: PathBuf) -> Self {
        DownloadTask {
            scene_id: scene_id.to_string(),
            band,
            url: url.to_string(),
            output,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CompositeTask {
    pub scene_id: String,
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}

impl CompositeTask {
    pub fn new(scene_id: &str, inputs: Vec<PathBuf>, output: PathBuf) -> Self {
        CompositeTask {
            scene_id: scene_id.to_string(),
            inputs,
            output,
        }
    }

    pub fn execute(self: &Self) -> Result<()> {
        info!("Creating composite of all bands: {}", self.scene_id);
        let pages = build_composite(&self.inputs, &self.output)?;
        info!("Wrote {} bands to {}", pages, self.output.display());
        Ok(())
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct DownloadPlan {
    selection_id: String,
    tasks: Vec<DownloadTask>,
    #[serde(default)]
    composites: Vec<CompositeTask>,
}

impl DownloadPlan {
    pub fn new(selection_id: &str, tasks: Vec<DownloadTask>, composites: Vec<CompositeTask>) -> Self {
        Self {
            selection_id: selection_id.to_string(),
            tasks,
            composites,
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let plan: Self = serde_json::from_str(&content)?;
        Ok(plan)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn selection_id(self: &Self) -> &str {
        &self.selection_id
    }

    pub fn tasks(self: &Self) -> &[DownloadTask] {
        &self.tasks
    }

    pub fn composites(self: &Self) -> &[CompositeTask] {
        &self.composites
    }

    /// Download every band in order, calling `on_complete` after each one. A
    /// scene's composite is built as soon as its last band is on disk.
    pub async fn execute<F>(self: &Self, store: &impl ObjectStore, mut on_complete: F) -> Result<()>
    where
        F: FnMut(&DownloadTask),
    {
        for (i, task) in self.tasks.iter().enumerate() {
            info!(
                "Downloading band {}: '{}'",
                task.band,
                task.output.display()
            );
            try_download(store, &task.url, &task.output).await?;
            on_complete(task);

            let scene_done = self
                .tasks
                .get(i + 1)
                .map_or(true, |next| next.scene_id != task.scene_id);
            if scene_done {
                for composite in self.composites.iter().filter(|c| c.scene_id == task.scene_id) {
                    composite.execute()?;
                }
            }
        }
        Ok(())
    }
}

pub async fn try_download(store: &impl ObjectStore, url: &str, dst: &Path) -> Result<()> {
    // Check if the output file already exists; return early if so
    if dst.exists() {
        info!("Output file already exists: {}", dst.display());
        return Ok(());
    }

    // Make parent directories as necessary
    if let Some(parent_dir) = dst.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }

    // Check if partial file exists and get its size
    let mut partial = dst.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    let mut partial_file = OpenOptions::new()
        .read(true)
        .create(true)
        .append(true)
        .open(&partial)?;
    let mut byte_count = partial_file.metadata()?.len();

    let total_size = store.content_length(url).await?;

    if byte_count > total_size {
        warn!("Partial file is larger than the remote object, restarting download");
        partial_file.set_len(0)?;
        byte_count = 0;
    }

    if byte_count > 0 && total_size > 0 {
        let progress = (byte_count as f64 / total_size as f64) * 100.;
        info!("Resuming download from {:.2}% completion", progress);
    }

    if byte_count < total_size {
        debug!("Requesting bytes {}-{} of {}", byte_count, total_size - 1, url);
        byte_count += store
            .fetch_range(url, byte_count, total_size - 1, &mut partial_file)
            .await?;
    }
    debug!("Received {} of {} bytes", byte_count, total_size);

    // Keep the .partial file so the next run resumes from it
    if byte_count != total_size {
        return Err(anyhow!(
            "Incomplete download of {}: received {} of {} bytes",
            url,
            byte_count,
            total_size
        ));
    }

    // Rename the file to remove .partial suffix
    fs::rename(partial, dst)?;

    Ok(())
}
