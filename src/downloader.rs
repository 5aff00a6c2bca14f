use std::path::Path;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::StreamExt;
use reqwest::header;
use reqwest::StatusCode;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::drive;
use crate::error::MergeError;

/// Connect timeout for every request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Total timeout for one access probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);
/// Byte range requested by a probe; enough to see past any HTML shell.
const PROBE_RANGE: &str = "bytes=0-1023";

/// Outcome of probing one URL. `outcome` carries a plain-language
/// failure reason when the file is not publicly readable.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub index: usize,
    pub url: String,
    pub outcome: Result<(), String>,
}

/// HTTP client for Google Drive's direct-download endpoint.
pub struct DriveClient {
    http: reqwest::Client,
}

impl DriveClient {
    pub fn new() -> Result<Self, MergeError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    /// Probe every `(url, id)` pair concurrently and collect the results
    /// in input order. Each probe is independent; nothing is downloaded
    /// here.
    pub async fn probe_all(&self, targets: &[(String, String)]) -> Vec<ProbeResult> {
        let probes = targets
            .iter()
            .enumerate()
            .map(|(index, (url, id))| self.probe_one(index, url, id));
        join_all(probes).await
    }

    async fn probe_one(&self, index: usize, url: &str, id: &str) -> ProbeResult {
        debug!("Probing access for {} (id {})", url, id);
        let outcome = match self
            .http
            .get(drive::download_endpoint(id))
            .header(header::RANGE, PROBE_RANGE)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => {
                let content_type = response
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                interpret_probe(response.status(), content_type.as_deref())
            }
            Err(e) if e.is_timeout() => Err("timed out waiting for a response".to_string()),
            Err(e) if e.is_connect() => Err("network error: could not connect".to_string()),
            Err(e) => Err(e.to_string()),
        };

        ProbeResult {
            index,
            url: url.to_string(),
            outcome,
        }
    }

    /// Stream one file to `dest`. The caller owns cleanup of any partial
    /// file (the per-attempt temp directory takes care of it).
    pub async fn fetch_to(&self, url: &str, id: &str, dest: &Path) -> Result<(), MergeError> {
        let endpoint = drive::download_endpoint(id);
        info!("Downloading {} into {}", url, dest.display());

        let response = self
            .http
            .get(endpoint)
            .send()
            .await
            .map_err(|e| MergeError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(MergeError::Download {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MergeError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }
}

/// Decide whether a probe response means the file is publicly readable.
///
/// Drive answers permission problems with an HTML interstitial and a 200,
/// so the content type check comes before the status check.
fn interpret_probe(status: StatusCode, content_type: Option<&str>) -> Result<(), String> {
    if content_type.is_some_and(|ct| ct.contains("text/html")) {
        return Err("permission denied or file not accessible".to_string());
    }
    match status {
        StatusCode::OK | StatusCode::PARTIAL_CONTENT => Ok(()),
        StatusCode::FORBIDDEN => Err("permission denied".to_string()),
        StatusCode::NOT_FOUND => Err("file not found".to_string()),
        other => Err(format!("HTTP {other}")),
    }
}
