use std::io::{Read, Write};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::HarvestError;
use crate::progress::{ProgressSink, TransferProgress};

const CHUNK_SIZE: usize = 64 * 1024;

pub trait GeoClient {
    fn fetch_text(&self, url: &str) -> Result<String, HarvestError>;
    fn probe_size(&self, url: &str) -> Result<Option<u64>, HarvestError>;
    fn download(
        &self,
        url: &str,
        destination: &mut dyn Write,
        progress: &dyn ProgressSink,
    ) -> Result<u64, HarvestError>;
}

#[derive(Clone)]
pub struct GeoHttpClient {
    client: Client,
}

impl GeoHttpClient {
    pub fn new() -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("geo-harvest/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HarvestError::GeoHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| HarvestError::GeoHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn send(&self, url: &str) -> Result<reqwest::blocking::Response, HarvestError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| HarvestError::GeoHttp(err.to_string()))?;
        ensure_success(response)
    }
}

impl GeoClient for GeoHttpClient {
    fn fetch_text(&self, url: &str) -> Result<String, HarvestError> {
        self.send(url)?
            .text()
            .map_err(|err| HarvestError::GeoHttp(err.to_string()))
    }

    fn probe_size(&self, url: &str) -> Result<Option<u64>, HarvestError> {
        let response = self
            .client
            .head(url)
            .send()
            .map_err(|err| HarvestError::GeoHttp(err.to_string()))?;
        let response = ensure_success(response)?;
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok()))
    }

    fn download(
        &self,
        url: &str,
        destination: &mut dyn Write,
        progress: &dyn ProgressSink,
    ) -> Result<u64, HarvestError> {
        let mut response = self.send(url)?;
        let total = response.content_length();
        let name = url.rsplit('/').next().unwrap_or(url).to_string();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut received = 0u64;
        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|err| HarvestError::GeoHttp(err.to_string()))?;
            if read == 0 {
                break;
            }
            destination
                .write_all(&buffer[..read])
                .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
            received += read as u64;
            progress.transfer(TransferProgress {
                name: name.clone(),
                received,
                total,
                done: false,
            });
        }
        destination
            .flush()
            .map_err(|err| HarvestError::Filesystem(err.to_string()))?;
        progress.transfer(TransferProgress {
            name,
            received,
            total,
            done: true,
        });
        Ok(received)
    }
}

fn ensure_success(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, HarvestError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "GEO request failed".to_string());
    Err(HarvestError::GeoStatus { status, message })
}

pub fn normalize_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("ftp://") {
        return format!("https://{rest}");
    }
    url.to_string()
}
