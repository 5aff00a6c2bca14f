//! Pipeline composition and the two invocation modes.
//!
//! One merge attempt runs validate → probe → fetch → classify → convert
//! → merge. The access check is all-or-nothing: one bad link rejects the
//! batch before anything is downloaded. After the gate, per-file failures are
//! tolerated: each is recorded and the merge proceeds over whatever
//! succeeded. The asymmetry is deliberate and kept as-is.

use std::path::{Path, PathBuf};

use colored::*;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info, warn};

use crate::convert;
use crate::downloader::DriveClient;
use crate::drive;
use crate::error::{ConvertError, MergeError, ProbeFailure};
use crate::pdf_merger::PdfMerger;
use crate::sniff::{self, FileKind};

/// Fixed output directory used by default paths, `-n`, and interactive
/// mode. Created when needed, never deleted by the tool.
pub const OUTPUT_DIR: &str = "output";
/// Default output file for direct mode.
const DEFAULT_OUTPUT: &str = "merged.pdf";

/// What one merge attempt produced.
#[derive(Debug)]
pub struct MergeOutcome {
    /// Files that made it into the output.
    pub merged: usize,
    /// Files in the accepted batch.
    pub total: usize,
    /// Pages in the output document.
    pub pages: usize,
    /// Files that failed after the access gate: (url, reason).
    pub skipped: Vec<(String, String)>,
}

/// Run the pipeline for a batch of extracted URLs.
///
/// The temporary working area lives for exactly this call; dropping the
/// `TempDir` removes it on success and on every error path.
pub async fn merge_urls(
    client: &DriveClient,
    urls: &[String],
    output: &Path,
) -> Result<MergeOutcome, MergeError> {
    // Unrecognized URL shapes abort here, before any request goes out.
    let mut targets = Vec::with_capacity(urls.len());
    for url in urls {
        targets.push((url.clone(), drive::extract_file_id(url)?));
    }

    info!("Checking access for {} links...", targets.len());
    let probes = client.probe_all(&targets).await;

    let failures: Vec<ProbeFailure> = probes
        .iter()
        .filter_map(|p| match &p.outcome {
            Ok(()) => None,
            Err(reason) => Some(ProbeFailure {
                index: p.index,
                url: p.url.clone(),
                reason: reason.clone(),
            }),
        })
        .collect();
    if !failures.is_empty() {
        return Err(MergeError::AccessCheck {
            total: urls.len(),
            failures,
        });
    }

    let workdir = tempfile::tempdir()?;
    let mut buffers = Vec::new();
    let mut skipped = Vec::new();

    for (index, (url, id)) in targets.iter().enumerate() {
        match process_one(client, workdir.path(), index, url, id).await {
            Ok(buffer) => buffers.push(buffer),
            Err(e) => {
                error!("{}", format!("{e}").red());
                skipped.push((url.clone(), e.to_string()));
            }
        }
    }

    if buffers.is_empty() {
        return Err(MergeError::AllFilesFailed(urls.len()));
    }

    let mut merger = PdfMerger::new();
    for buffer in &buffers {
        merger.add_bytes(buffer)?;
    }
    let pages = merger.save(output).await?;

    Ok(MergeOutcome {
        merged: buffers.len(),
        total: urls.len(),
        pages,
        skipped,
    })
}

/// Download, classify, and convert one file into a PDF buffer.
///
/// The temporary file is deleted as soon as its bytes are in memory;
/// peak temp usage is one in-flight file.
async fn process_one(
    client: &DriveClient,
    workdir: &Path,
    index: usize,
    url: &str,
    id: &str,
) -> Result<Vec<u8>, MergeError> {
    let dest = workdir.join(format!("{:02}_{}", index, id));
    client.fetch_to(url, id, &dest).await?;

    let kind = sniff::sniff_file(&dest)
        .await?
        .ok_or_else(|| MergeError::UnsupportedType {
            url: url.to_string(),
        })?;

    let buffer = match kind {
        FileKind::Pdf => fs::read(&dest).await?,
        FileKind::Image(image_kind) => {
            info!("Converting image {} to a PDF page", dest.display());
            convert::image_to_pdf(&dest, image_kind).map_err(|e| match e {
                ConvertError::HeicCodec => MergeError::HeicCodec {
                    url: url.to_string(),
                },
                other => MergeError::ImageConvert {
                    url: url.to_string(),
                    reason: other.to_string(),
                },
            })?
        }
    };

    if let Err(e) = fs::remove_file(&dest).await {
        warn!("Failed to remove {}: {}", dest.display(), e);
    }

    Ok(buffer)
}

/// Where the merged PDF goes in direct mode. An explicit basename wins
/// over an explicit path; otherwise the fixed default applies.
fn resolve_output(output: Option<PathBuf>, name: Option<String>) -> PathBuf {
    match (name, output) {
        (Some(name), _) => output_path_for(&name),
        (None, Some(path)) => path,
        (None, None) => Path::new(OUTPUT_DIR).join(DEFAULT_OUTPUT),
    }
}

/// Basename → path inside the output directory, `.pdf` appended when
/// missing.
fn output_path_for(name: &str) -> PathBuf {
    let file = if name.to_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{name}.pdf")
    };
    Path::new(OUTPUT_DIR).join(file)
}

/// One-shot invocation: merge the links in `urls_blob` and exit.
pub async fn run_direct(
    urls_blob: &str,
    output: Option<PathBuf>,
    name: Option<String>,
) -> Result<(), MergeError> {
    let urls = drive::extract_urls(urls_blob);
    if urls.is_empty() {
        return Err(MergeError::NoUrls);
    }
    if urls.len() == 1 {
        info!(
            "{}",
            "Only one link was provided; there is nothing to merge. Download it directly from Google Drive instead.".yellow()
        );
        return Ok(());
    }

    let output = resolve_output(output, name);
    if output.exists() {
        return Err(MergeError::OutputExists { path: output });
    }
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let client = DriveClient::new()?;
    let outcome = merge_urls(&client, &urls, &output).await?;
    report_outcome(&outcome, &output);
    Ok(())
}

fn report_outcome(outcome: &MergeOutcome, output: &Path) {
    for (url, reason) in &outcome.skipped {
        warn!("Skipped {}: {}", url, reason);
    }
    info!(
        "Merged {}/{} files ({} pages) into {}",
        outcome.merged,
        outcome.total,
        outcome.pages,
        output.display().to_string().green()
    );
}

/// Interactive session states. One merge attempt walks
/// `CollectUrls → CollectName → Process` and loops back; the transition
/// helpers below are pure so the re-prompt rules stay testable.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Waiting for a fresh URL blob. `retained_name` survives an access
    /// gate failure so only the links are re-requested.
    CollectUrls { retained_name: Option<String> },
    CollectName { urls: Vec<String> },
    Process { urls: Vec<String>, name: String },
}

/// Decide the next state after a URL blob was submitted.
fn after_url_entry(urls: Vec<String>, retained_name: Option<String>) -> Step {
    match (urls.len(), retained_name) {
        (0, retained_name) => Step::CollectUrls { retained_name },
        // One link is not an error, just nothing to do; the retained
        // name belongs to a batch that no longer exists.
        (1, _) => Step::CollectUrls {
            retained_name: None,
        },
        (_, Some(name)) => Step::Process { urls, name },
        (_, None) => Step::CollectName { urls },
    }
}

/// Decide the next state after a name was submitted. `collides` is
/// whether a file of that name already exists in the output directory.
fn after_name_entry(urls: Vec<String>, name: &str, collides: bool) -> Step {
    let name = name.trim();
    if name.is_empty() || collides {
        Step::CollectName { urls }
    } else {
        Step::Process {
            urls,
            name: name.to_string(),
        }
    }
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, text: &str) -> Option<String> {
    println!("{}", text.cyan().bold());
    match lines.next_line().await {
        Ok(line) => line,
        Err(e) => {
            error!("Failed to read input: {}", e);
            None
        }
    }
}

/// Looping prompt-driven mode: one merge per round, forever.
///
/// Ends only on external interrupt or end of input. Validation failures
/// re-solicit the offending field instead of restarting the process.
pub async fn run_interactive() -> Result<(), MergeError> {
    let client = DriveClient::new()?;
    fs::create_dir_all(OUTPUT_DIR).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut step = Step::CollectUrls {
        retained_name: None,
    };

    loop {
        step = match step {
            Step::CollectUrls { retained_name } => {
                let Some(blob) = prompt(
                    &mut lines,
                    "Paste the Google Drive links to merge (one line, any separators):",
                )
                .await
                else {
                    break;
                };
                let urls = drive::extract_urls(&blob);
                match urls.len() {
                    0 => info!(
                        "{}",
                        "No Google Drive links were recognized in that input.".yellow()
                    ),
                    1 => info!(
                        "{}",
                        "Only one link was provided; there is nothing to merge.".yellow()
                    ),
                    n => info!("Found {} links.", n),
                }
                after_url_entry(urls, retained_name)
            }

            Step::CollectName { urls } => {
                let Some(name) = prompt(&mut lines, "Name for the merged PDF:").await else {
                    break;
                };
                let trimmed = name.trim();
                let collides = !trimmed.is_empty() && output_path_for(trimmed).exists();
                if trimmed.is_empty() {
                    info!("{}", "The file name cannot be empty.".yellow());
                } else if collides {
                    info!(
                        "{}",
                        format!(
                            "{} already exists in {}/; pick another name.",
                            trimmed, OUTPUT_DIR
                        )
                        .yellow()
                    );
                }
                after_name_entry(urls, trimmed, collides)
            }

            Step::Process { urls, name } => {
                let output = output_path_for(&name);
                match merge_urls(&client, &urls, &output).await {
                    Ok(outcome) => {
                        report_outcome(&outcome, &output);
                        Step::CollectUrls {
                            retained_name: None,
                        }
                    }
                    Err(MergeError::AccessCheck { total, failures }) => {
                        error!(
                            "{}",
                            MergeError::AccessCheck { total, failures }.to_string().red()
                        );
                        info!("Make the files public (\"anyone with the link\") and paste the links again.");
                        Step::CollectUrls {
                            retained_name: Some(name),
                        }
                    }
                    Err(e) => {
                        error!("{}", format!("Error: {e}").red());
                        Step::CollectUrls {
                            retained_name: None,
                        }
                    }
                }
            }
        };
    }

    Ok(())
}
