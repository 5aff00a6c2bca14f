//! Google Drive link handling: pulling candidate links out of free-form
//! text and extracting the file identifier from a single link.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::MergeError;

/// Host marker every accepted link must contain.
const DRIVE_HOST: &str = "drive.google.com";

/// Identifier patterns, tried in priority order. `/file/d/<id>` is the
/// canonical share shape, `id=` covers `open?id=` and `uc?id=` links, and
/// a bare `/d/<id>` catches older share formats.
static FILE_PATH_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/file/d/([A-Za-z0-9_-]+)").unwrap());
static QUERY_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]id=([A-Za-z0-9_-]+)").unwrap());
static BARE_PATH_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/d/([A-Za-z0-9_-]+)").unwrap());

/// Extract Google Drive links from a free-form string.
///
/// Splits on newlines, commas, and runs of whitespace, then keeps tokens
/// that carry the Drive host marker together with either a `/d/` path
/// segment or an `id=` query parameter. Order is preserved and duplicates
/// are retained; surrounding prose falls away with the filter.
pub fn extract_urls(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == '\n' || c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter(|token| {
            token.contains(DRIVE_HOST) && (token.contains("/d/") || token.contains("id="))
        })
        .map(str::to_string)
        .collect()
}

/// Extract the opaque file identifier from a single Drive link.
pub fn extract_file_id(url: &str) -> Result<String, MergeError> {
    for pattern in [&*FILE_PATH_ID, &*QUERY_ID, &*BARE_PATH_ID] {
        if let Some(captures) = pattern.captures(url) {
            return Ok(captures[1].to_string());
        }
    }
    Err(MergeError::InvalidUrl {
        url: url.to_string(),
    })
}

/// Direct-download endpoint for a file identifier.
pub fn download_endpoint(id: &str) -> Url {
    // Infallible: the base is a constant and the id is percent-encoded.
    Url::parse_with_params(
        &format!("https://{DRIVE_HOST}/uc"),
        &[("export", "download"), ("id", id)],
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_links_from_mixed_separators() {
        let input = "here are the scans:\nhttps://drive.google.com/file/d/AAA/view?usp=sharing, \
                     https://drive.google.com/open?id=BBB\n  https://drive.google.com/d/CCC  thanks!";
        let urls = extract_urls(input);
        assert_eq!(urls.len(), 3);
        assert!(urls[0].contains("AAA"));
        assert!(urls[1].contains("BBB"));
        assert!(urls[2].contains("CCC"));
    }

    #[test]
    fn drops_prose_and_non_drive_links() {
        let input = "see https://example.com/file.pdf and also my notes";
        assert!(extract_urls(input).is_empty());
    }

    #[test]
    fn retains_duplicates_in_order() {
        let url = "https://drive.google.com/file/d/SAME/view";
        let urls = extract_urls(&format!("{url} {url}"));
        assert_eq!(urls, vec![url.to_string(), url.to_string()]);
    }

    #[test]
    fn extraction_is_idempotent_over_rejoined_output() {
        let input = "https://drive.google.com/file/d/AAA/view,junk,\
                     https://drive.google.com/open?id=BBB";
        let first = extract_urls(input);
        let second = extract_urls(&first.join("\n"));
        assert_eq!(first, second);
    }

    #[test]
    fn file_path_id_wins_over_query_id() {
        let url = "https://drive.google.com/file/d/PATHID/view?id=QUERYID";
        assert_eq!(extract_file_id(url).unwrap(), "PATHID");
    }

    #[test]
    fn query_id_wins_over_bare_path() {
        let url = "https://drive.google.com/open?id=QUERYID";
        assert_eq!(extract_file_id(url).unwrap(), "QUERYID");
    }

    #[test]
    fn bare_path_is_the_fallback() {
        let url = "https://drive.google.com/d/BAREID";
        assert_eq!(extract_file_id(url).unwrap(), "BAREID");
    }

    #[test]
    fn unrecognized_shape_is_an_invalid_url() {
        let err = extract_file_id("https://drive.google.com/drive/folders/").unwrap_err();
        assert!(matches!(err, MergeError::InvalidUrl { .. }));
        assert!(err.to_string().contains("folders"));
    }

    #[test]
    fn endpoint_carries_export_and_id() {
        let endpoint = download_endpoint("FILE-ID_123");
        assert_eq!(endpoint.host_str(), Some("drive.google.com"));
        assert!(endpoint.as_str().contains("export=download"));
        assert!(endpoint.as_str().contains("id=FILE-ID_123"));
    }
}
