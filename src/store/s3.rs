use super::ObjectStore;
use anyhow::{anyhow, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use regex::Regex;
use std::io::Write;

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, PartialEq)]
pub struct S3Object {
    pub region: String,
    pub bucket: String,
    pub key: String,
}

impl S3Object {
    /// Accepts virtual-hosted (`https://bucket.s3.region.amazonaws.com/key`) and
    /// path-style (`https://s3-region.amazonaws.com/bucket/key`) object URLs.
    pub fn from_url(url: &str) -> Result<Self> {
        let patterns = [
            r"^https?://(?<bucket>[^./]+)\.s3[.-](?<region>[a-z0-9-]+)\.amazonaws\.com/(?<key>.+)$",
            r"^https?://s3[.-](?<region>[a-z0-9-]+)\.amazonaws\.com/(?<bucket>[^/]+)/(?<key>.+)$",
            r"^https?://(?<bucket>[^./]+)\.s3\.amazonaws\.com/(?<key>.+)$",
        ];

        for pattern in patterns {
            let re = Regex::new(pattern).expect("Regex pattern should always compile");
            if let Some(captures) = re.captures(url) {
                let region = captures
                    .name("region")
                    .map_or(DEFAULT_REGION, |m| m.as_str());
                return Ok(Self {
                    region: region.to_string(),
                    bucket: captures["bucket"].to_string(),
                    key: captures["key"].to_string(),
                });
            }
        }
        Err(anyhow!("No regex matches found for: {}", url))
    }
}

/// Anonymous access to public buckets. A client is built per request since
/// objects may live in different regions.
#[derive(Default)]
pub struct S3Store;

impl S3Store {
    pub fn new() -> Self {
        Self
    }
}

async fn get_anon_client(region: &str) -> Client {
    let region = Region::new(region.to_string());
    let config = aws_config::defaults(BehaviorVersion::latest())
        .no_credentials()
        .region(region)
        .load()
        .await;
    Client::new(&config)
}

impl ObjectStore for S3Store {
    async fn content_length(self: &Self, url: &str) -> Result<u64> {
        let object = S3Object::from_url(url)?;
        let client = get_anon_client(&object.region).await;

        let head_object = client
            .head_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await?;

        let total_size = head_object
            .content_length()
            .ok_or(anyhow!("Error reading size of remote object"))?;
        Ok(total_size as u64)
    }

    async fn fetch_range<W: Write>(
        self: &Self,
        url: &str,
        start: u64,
        end: u64,
        sink: &mut W,
    ) -> Result<u64> {
        let object = S3Object::from_url(url)?;
        let client = get_anon_client(&object.region).await;

        let range = format!("bytes={}-{}", start, end);
        let mut response = client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .range(range)
            .send()
            .await?;

        let mut byte_count = 0_u64;
        while let Some(bytes) = response.body.try_next().await? {
            sink.write_all(&bytes)?;
            byte_count += bytes.len() as u64;
        }
        Ok(byte_count)
    }
}
