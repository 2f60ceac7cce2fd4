use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Unable to fetch scene list from {source_name}: {reason}")]
    Fetch { source_name: String, reason: String },

    #[error("Malformed scene list: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unrecognised acquisitionDate '{0}'")]
    Date(String),
}

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("download_url does not point at a scene index page: {0}")]
    NotAnIndexUrl(String),

    #[error("Unable to determine scene id from: {0}")]
    MissingSceneId(String),
}

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Band {0} is not a Landsat 8 band (expected 1-11)")]
    InvalidBand(u8),

    #[error("No bands selected for download")]
    NoBands,
}

#[derive(Error, Debug)]
pub enum CompositeError {
    #[error("No input bands to composite")]
    NoInputs,

    #[error("Unsupported sample format in {0}")]
    UnsupportedSamples(String),

    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
