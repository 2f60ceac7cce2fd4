use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use slow_landsat::catalog::Catalog;
use slow_landsat::landsat;
use slow_landsat::map_layers::{LayerList, MAP_LAYERS_FILE};
use slow_landsat::scene_selection::{landsat8_template, SceneSelection};
use slow_landsat::store::{Store, StoreKind};

const DOWNLOAD_PLAN_FILE: &str = "download_plan.json";

#[derive(Parser)]
#[command(name = "slow-landsat")]
#[command(author, version, about = "Download Landsat 8 bands by path/row and date range", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter the scene list and download the bands of the matching scenes
    Fetch(FetchArgs),
    /// Write the built-in scene selection as a starting point
    Template {
        /// Output TOML file
        output: PathBuf,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Scene selection TOML; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Scene list URL or local path (CSV, optionally gzipped)
    #[arg(long)]
    scene_list: Option<String>,
    /// First acquisition day to accept (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last acquisition day to accept (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,
    /// WRS-2 path
    #[arg(long)]
    path: Option<u32>,
    /// WRS-2 row
    #[arg(long)]
    row: Option<u32>,
    /// Stop after this many scenes (0 keeps all)
    #[arg(short, long)]
    max_results: Option<usize>,
    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Comma separated band numbers, e.g. 4,3,2
    #[arg(short, long, value_delimiter = ',')]
    bands: Option<Vec<u8>>,
    /// Register downloaded bands in the map layer list (`--add-to-map false` disables)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    add_to_map: Option<bool>,
    /// Merge each scene's bands into a composite (`--composite false` disables)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    composite: Option<bool>,
    /// Where to fetch band files from
    #[arg(long, value_enum, default_value_t = StoreKind::Http)]
    store: StoreKind,
    /// Write the download plan without downloading
    #[arg(long)]
    dry_run: bool,
}

impl FetchArgs {
    fn selection(&self) -> Result<SceneSelection> {
        let mut selection = match &self.config {
            Some(path) => SceneSelection::read(path)?,
            None => SceneSelection::from_template(&landsat8_template())?,
        };

        if let Some(scene_list) = &self.scene_list {
            selection.scene_list = scene_list.clone();
        }
        if let Some(start) = self.start {
            selection.start_date = start;
        }
        if let Some(end) = self.end {
            selection.end_date = end;
        }
        if let Some(path) = self.path {
            selection.path = path;
        }
        if let Some(row) = self.row {
            selection.row = row;
        }
        if let Some(max_results) = self.max_results {
            selection.max_results = max_results;
        }
        if let Some(output) = &self.output {
            selection.output_dir = output.clone();
        }
        if let Some(bands) = &self.bands {
            selection.bands = bands.clone();
        }
        if let Some(add_to_map) = self.add_to_map {
            selection.add_to_map = add_to_map;
        }
        if let Some(composite) = self.composite {
            selection.create_composite = composite;
        }

        selection.validate()?;
        Ok(selection)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Fetch(args) => fetch(args).await,
        Commands::Template { output } => {
            SceneSelection::from_template(&landsat8_template())?.write(&output)?;
            info!("Wrote scene selection template to {}", output.display());
            Ok(())
        }
    }
}

async fn fetch(args: FetchArgs) -> Result<()> {
    let selection = args.selection()?;
    let output_dir = selection.output_dir.clone();

    let catalog = match Catalog::fetch(&selection.scene_list).await {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Could not access scene list: {e}");
            return Err(e.into());
        }
    };

    let scenes = selection.select(&catalog);
    let plan = landsat::generate_download_plan(&selection, &scenes, output_dir.clone())?;

    fs::create_dir_all(&output_dir)?;
    plan.write(output_dir.join(DOWNLOAD_PLAN_FILE))?;

    if args.dry_run {
        info!(
            "Dry run: {} downloads written to {}",
            plan.tasks().len(),
            output_dir.join(DOWNLOAD_PLAN_FILE).display()
        );
        return Ok(());
    }

    let mut layers = if selection.add_to_map {
        match LayerList::open(output_dir.join(MAP_LAYERS_FILE)) {
            Ok(layers) => Some(layers),
            Err(e) => {
                error!("Could not open map layer list: {e}");
                None
            }
        }
    } else {
        None
    };

    let store = Store::new(args.store);
    plan.execute(&store, |task| {
        if let Some(layers) = layers.as_mut() {
            if let Err(e) = layers.add_raster(&task.output) {
                error!("Could not add raster to map: {e}");
            }
        }
    })
    .await?;

    info!("Done");
    Ok(())
}
