//! Model page URL parsing.

use cmm_core::ParsedModelUrl;

use crate::error::{CivitaiError, CivitaiResult};

/// Extract model and version ids from a Civitai model URL.
///
/// Recognized shapes, checked in order:
/// - `…/models/{id}…?…modelVersionId={vid}`
/// - `…/models/{id}/versions/{vid}`
/// - `…/models/{id}`
pub fn parse_model_url(url: &str) -> CivitaiResult<ParsedModelUrl> {
    let Some(model_id) = digits_after(url, "/models/") else {
        return Err(CivitaiError::InvalidUrl {
            url: url.to_string(),
        });
    };

    let version_id =
        digits_after(url, "modelVersionId=").or_else(|| digits_after(url, "/versions/"));

    Ok(ParsedModelUrl {
        model_id,
        version_id,
    })
}

/// Parse the decimal run immediately following `pattern`.
fn digits_after(haystack: &str, pattern: &str) -> Option<i64> {
    let start = haystack.find(pattern)? + pattern.len();
    let digits: String = haystack[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_model_url() {
        let parsed = parse_model_url("https://civitai.com/models/1102").unwrap();
        assert_eq!(parsed.model_id, 1102);
        assert_eq!(parsed.version_id, None);
    }

    #[test]
    fn model_url_with_slug() {
        let parsed = parse_model_url("https://civitai.com/models/1102/synthwavepunk").unwrap();
        assert_eq!(parsed.model_id, 1102);
        assert_eq!(parsed.version_id, None);
    }

    #[test]
    fn version_query_parameter() {
        let parsed =
            parse_model_url("https://civitai.com/models/1102?modelVersionId=1144").unwrap();
        assert_eq!(parsed.model_id, 1102);
        assert_eq!(parsed.version_id, Some(1144));
    }

    #[test]
    fn version_path_segment() {
        let parsed = parse_model_url("https://civitai.com/models/1102/versions/1144").unwrap();
        assert_eq!(parsed.model_id, 1102);
        assert_eq!(parsed.version_id, Some(1144));
    }

    #[test]
    fn rejects_urls_without_model_id() {
        assert!(parse_model_url("https://civitai.com/images/55").is_err());
        assert!(parse_model_url("https://civitai.com/models/abc").is_err());
        assert!(parse_model_url("not a url at all").is_err());
    }
}
