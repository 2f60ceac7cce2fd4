//! Remote object stores the band files can be fetched from.
use anyhow::Result;
use std::io::Write;

mod http;
mod s3;

pub use http::HttpStore;
pub use s3::{S3Object, S3Store};

pub trait ObjectStore {
    async fn content_length(self: &Self, url: &str) -> Result<u64>;

    /// Write bytes `start..=end` of the object to `sink`, returning the number written.
    async fn fetch_range<W: Write>(
        self: &Self,
        url: &str,
        start: u64,
        end: u64,
        sink: &mut W,
    ) -> Result<u64>;
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreKind {
    #[default]
    Http,
    S3,
}

pub enum Store {
    Http(HttpStore),
    S3(S3Store),
}

impl Store {
    pub fn new(kind: StoreKind) -> Self {
        match kind {
            StoreKind::Http => Self::Http(HttpStore::new()),
            StoreKind::S3 => Self::S3(S3Store::new()),
        }
    }
}

impl ObjectStore for Store {
    async fn content_length(self: &Self, url: &str) -> Result<u64> {
        match self {
            Self::Http(store) => store.content_length(url).await,
            Self::S3(store) => store.content_length(url).await,
        }
    }

    async fn fetch_range<W: Write>(
        self: &Self,
        url: &str,
        start: u64,
        end: u64,
        sink: &mut W,
    ) -> Result<u64> {
        match self {
            Self::Http(store) => store.fetch_range(url, start, end, sink).await,
            Self::S3(store) => store.fetch_range(url, start, end, sink).await,
        }
    }
}
