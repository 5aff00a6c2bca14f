//! # drive2pdf
//!
//! A CLI utility that merges publicly shared Google Drive files into a
//! single PDF. Images become single-page PDFs sized to their pixel
//! dimensions; PDFs pass through; everything is concatenated in the
//! order the links were given.
//!
//! ## Usage
//!
//! ```bash
//! drive2pdf "https://drive.google.com/file/d/AAA/view https://drive.google.com/file/d/BBB/view" -n scans
//! drive2pdf interactive
//! ```

pub mod convert;
pub mod downloader;
pub mod drive;
pub mod error;
pub mod pdf_merger;
pub mod session;
pub mod sniff;

pub use downloader::{DriveClient, ProbeResult};
pub use error::{ConvertError, MergeError, ProbeFailure};
pub use pdf_merger::PdfMerger;
pub use session::{merge_urls, run_direct, run_interactive, MergeOutcome};
