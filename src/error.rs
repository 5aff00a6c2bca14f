//! Error types for drive2pdf.
//!
//! [`MergeError`] covers everything a merge attempt can die of, from "no
//! links in the input" to "the merged document could not be written".
//! Per-file failures during the download/convert loop are *not* fatal —
//! they are recorded in the outcome report and only escalate when every
//! file fails. The access check that runs before any download is the
//! opposite: one inaccessible link rejects the whole batch.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Outcome of probing a single URL, in input order.
#[derive(Debug, Clone)]
pub struct ProbeFailure {
    /// Zero-based position of the URL in the submitted batch.
    pub index: usize,
    pub url: String,
    pub reason: String,
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.reason)
    }
}

/// All fatal errors returned by the drive2pdf library.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The input string contained no recognizable Google Drive links.
    #[error("no Google Drive links found in the input")]
    NoUrls,

    /// A link matched the Drive host but no identifier pattern.
    #[error("invalid Google Drive URL: {url}")]
    InvalidUrl { url: String },

    /// One or more links failed the pre-download access check.
    /// The whole batch is rejected; nothing was downloaded.
    #[error("{}/{} links failed the access check:\n{}", .failures.len(), .total,
        .failures.iter().map(|f| format!("  {f}")).collect::<Vec<_>>().join("\n"))]
    AccessCheck {
        total: usize,
        failures: Vec<ProbeFailure>,
    },

    /// A file passed the access check but could not be downloaded.
    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// Downloaded bytes matched none of the known PDF/image signatures.
    #[error("unsupported file type for {url}: only PDF and image files can be merged")]
    UnsupportedType { url: String },

    /// HEIC/HEIF file that the bundled codecs cannot decode.
    #[error("cannot decode HEIC image from {url}: no HEIC codec is available; export the photo as JPEG or PNG and share that instead")]
    HeicCodec { url: String },

    /// An image downloaded fine but could not be converted to a page.
    #[error("failed to convert image from {url}: {reason}")]
    ImageConvert { url: String, reason: String },

    /// A buffer handed to the merger was not a loadable PDF.
    #[error("failed to read PDF data: {0}")]
    MalformedPdf(String),

    /// Direct mode refuses to overwrite an existing output file.
    #[error("output file already exists: {}", .path.display())]
    OutputExists { path: PathBuf },

    /// Every file in the batch failed to download or convert.
    #[error("all {0} files failed to download or convert")]
    AllFilesFailed(usize),

    /// HTTP client construction or an unclassified transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure modes of the image-to-PDF converter.
///
/// Kept separate from [`MergeError`] so the converter stays independent of
/// URLs; the session layer attaches the offending URL when recording the
/// failure.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// HEIC/HEIF input whose codec is unavailable. Surfaced with an
    /// explanation instead of the raw decoder error.
    #[error("no HEIC codec is available to decode this image")]
    HeicCodec,

    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),

    #[error("failed to re-encode image: {0}")]
    Encode(image::ImageError),

    #[error("failed to assemble PDF page: {0}")]
    Page(#[from] lopdf::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
