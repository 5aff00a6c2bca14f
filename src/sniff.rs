//! Magic-byte classification of downloaded files.
//!
//! Only the leading bytes are inspected; nothing here parses file
//! structure. WebP and HEIC/HEIF carry their signature at a fixed offset
//! past the start of the file, so both get a secondary check in addition
//! to the leading-byte table.

use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// How many leading bytes are enough to match every known signature.
const SNIFF_LEN: usize = 16;

/// Classification of a downloaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image(ImageKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
    Tiff,
    Heic,
}

/// ISO BMFF brands that identify HEIC/HEIF content.
const HEIC_BRANDS: [&[u8]; 6] = [b"heic", b"heix", b"heif", b"hevc", b"mif1", b"msf1"];

/// Match a byte prefix against the known PDF and image signatures.
///
/// Returns `None` when nothing matches; the caller turns that into an
/// "unsupported file type" error distinct from transport failures.
pub fn classify(bytes: &[u8]) -> Option<FileKind> {
    if bytes.starts_with(b"%PDF") {
        return Some(FileKind::Pdf);
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(FileKind::Image(ImageKind::Jpeg));
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(FileKind::Image(ImageKind::Png));
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(FileKind::Image(ImageKind::Gif));
    }
    // RIFF container: only a WebP payload at offset 8 counts.
    if bytes.starts_with(b"RIFF") && bytes.len() >= 12 && &bytes[8..12] == b"WEBP" {
        return Some(FileKind::Image(ImageKind::Webp));
    }
    if bytes.starts_with(b"BM") {
        return Some(FileKind::Image(ImageKind::Bmp));
    }
    if bytes.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || bytes.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
    {
        return Some(FileKind::Image(ImageKind::Tiff));
    }
    // ISO BMFF: "ftyp" sits at offset 4, the brand at offset 8.
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        let brand: &[u8] = &bytes[8..12];
        if HEIC_BRANDS.contains(&brand) {
            return Some(FileKind::Image(ImageKind::Heic));
        }
    }
    None
}

/// Read the leading bytes of `path` and classify them.
pub async fn sniff_file(path: &Path) -> std::io::Result<Option<FileKind>> {
    let mut file = File::open(path).await?;
    let mut buf = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let kind = classify(&buf[..filled]);
    debug!("Sniffed {} as {:?}", path.display(), kind);
    Ok(kind)
}
