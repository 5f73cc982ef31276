use std::fs::File;
use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{info, warn};

use crate::domain::{Category, media_type_of};
use crate::error::AvisetError;
use crate::store::{Manifest, Store};

/// Outcome of one fetch attempt. Transport and HTTP failures are data, not
/// errors: the caller turns them into permanent placeholder files. Only
/// local I/O problems surface as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloaded,
    TransportError(String),
    HttpStatus(u16),
}

pub trait ImageFetcher: Send + Sync {
    fn fetch_to(&self, url: &str, destination: &Utf8Path) -> Result<DownloadStatus, AvisetError>;
}

#[derive(Clone)]
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new() -> Result<Self, AvisetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("aviset/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AvisetError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| AvisetError::Filesystem(err.to_string()))?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch_to(&self, url: &str, destination: &Utf8Path) -> Result<DownloadStatus, AvisetError> {
        let response = match self.client.get(url).send() {
            Ok(response) => response,
            Err(err) => return Ok(DownloadStatus::TransportError(err.to_string())),
        };
        if !response.status().is_success() {
            return Ok(DownloadStatus::HttpStatus(response.status().as_u16()));
        }

        // Stream the body verbatim; validation happens in a later sweep.
        let mut response = response;
        let mut file = File::create(destination.as_std_path())
            .map_err(|err| AvisetError::Filesystem(err.to_string()))?;
        match std::io::copy(&mut response, &mut file) {
            Ok(_) => Ok(DownloadStatus::Downloaded),
            Err(err) => Ok(DownloadStatus::TransportError(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    pub downloaded: u64,
    pub placeholders: u64,
    pub skipped: u64,
    pub dropped: u64,
}

pub struct Downloader<F: ImageFetcher> {
    store: Store,
    fetcher: F,
}

impl<F: ImageFetcher> Downloader<F> {
    pub fn new(store: Store, fetcher: F) -> Self {
        Self { store, fetcher }
    }

    /// Download every URL in a category's cleaned ledger. Re-runs are
    /// idempotent: a file (real or placeholder) at a position means that
    /// position is done forever.
    pub fn download_category(&self, category: &Category) -> Result<DownloadReport, AvisetError> {
        let ledger = self
            .store
            .read_ledger(category)?
            .ok_or_else(|| AvisetError::LedgerMissing(category.to_string()))?;

        // Drop URLs with no recognizable media type before numbering; the
        // rewrite fixes positions for good.
        let before = ledger.urls.len();
        let clean: Vec<String> = ledger
            .urls
            .into_iter()
            .filter(|url| media_type_of(url).is_some())
            .collect();
        let dropped = (before - clean.len()) as u64;
        self.store.rewrite_ledger(category, &clean)?;

        self.store.ensure_image_dir(category)?;
        let image_dir = self.store.image_dir(category);

        let mut report = DownloadReport {
            dropped,
            ..DownloadReport::default()
        };

        for (index, url) in clean.iter().enumerate() {
            let media_type = match media_type_of(url) {
                Some(media_type) => media_type,
                None => continue,
            };
            let destination = image_dir.join(format!("{}.{}", index + 1, media_type.extension()));
            if destination.as_std_path().exists() {
                report.skipped += 1;
                continue;
            }

            match self.fetcher.fetch_to(url, &destination)? {
                DownloadStatus::Downloaded => report.downloaded += 1,
                DownloadStatus::TransportError(reason) => {
                    warn!(url = %url, reason = %reason, "transport failure, writing placeholder");
                    touch(&destination)?;
                    report.placeholders += 1;
                }
                DownloadStatus::HttpStatus(status) => {
                    warn!(url = %url, status, "failed to download image");
                    touch(&destination)?;
                    report.placeholders += 1;
                }
            }
        }

        info!(
            category = %category,
            downloaded = report.downloaded,
            placeholders = report.placeholders,
            skipped = report.skipped,
            "download pass complete"
        );

        self.store.write_manifest(
            category,
            &Manifest {
                category: category.to_string(),
                declared_max: clean.len() as u64,
                downloaded: report.downloaded,
                placeholders: report.placeholders,
                skipped: report.skipped,
                tool: format!("aviset/{}", env!("CARGO_PKG_VERSION")),
                completed_at: chrono::Utc::now().to_rfc3339(),
            },
        )?;

        Ok(report)
    }
}

/// Zero-byte marker: the existence check above turns a failed item into a
/// permanently skipped one, so repeated runs converge instead of retrying
/// known-bad URLs forever.
fn touch(path: &Utf8Path) -> Result<(), AvisetError> {
    File::create(path.as_std_path())
        .map(|_| ())
        .map_err(|err| AvisetError::Filesystem(err.to_string()))
}
