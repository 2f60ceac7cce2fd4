use super::ObjectStore;
use anyhow::{anyhow, Result};
use futures_util::TryStreamExt;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use std::io::Write;

pub struct HttpStore {
    client: Client,
}

impl HttpStore {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpStore {
    fn default() -> Self {
        Self::new()
    }
}

// Read the header directly, the body of a HEAD response is always empty
fn content_length_header(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

/// A resumed request must come back as 206, a 200 would restart the body at byte 0.
fn check_range_status(status: StatusCode, start: u64, url: &str) -> Result<()> {
    if start > 0 && status != StatusCode::PARTIAL_CONTENT {
        return Err(anyhow!("Server ignored Range request for {}", url));
    }
    Ok(())
}

impl ObjectStore for HttpStore {
    async fn content_length(self: &Self, url: &str) -> Result<u64> {
        let response = self.client.head(url).send().await?.error_for_status()?;
        content_length_header(response.headers())
            .ok_or(anyhow!("Error reading size of remote object: {}", url))
    }

    async fn fetch_range<W: Write>(
        self: &Self,
        url: &str,
        start: u64,
        end: u64,
        sink: &mut W,
    ) -> Result<u64> {
        let range = format!("bytes={}-{}", start, end);
        let response = self
            .client
            .get(url)
            .header(RANGE, range)
            .send()
            .await?
            .error_for_status()?;

        check_range_status(response.status(), start, url)?;

        let mut byte_count = 0_u64;
        let mut stream = response.bytes_stream();
        while let Some(bytes) = stream.try_next().await? {
            sink.write_all(&bytes)?;
            byte_count += bytes.len() as u64;
        }
        Ok(byte_count)
    }
}
