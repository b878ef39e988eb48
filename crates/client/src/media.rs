//! Media reference resolution.
//!
//! The backend stores media as paths on its public disk (`avatars/x.png`,
//! `/storage/agents/1/thumb.jpg`) or as absolute URLs for externally hosted
//! files. [`resolve_image_url`] turns either form into something fetchable.

use url::Url;

/// Path prefix under which the backend exposes its public disk.
const STORAGE_PREFIX: &str = "/storage";

/// Resolve a stored media reference against the media origin.
///
/// - empty or blank input yields `""`
/// - absolute references (`http`, `https`, `data`, `blob`, or `//host/...`)
///   are returned unchanged
/// - `/storage/...` and other rooted paths are appended to the origin
/// - `storage/...` gains a leading slash
/// - `avatars/...` and any other relative path are placed under `/storage/`
///
/// A malformed reference yields a URL that will not load, which is a
/// rendering concern rather than an error.
///
/// ```
/// use agent_market_client::media::resolve_image_url;
/// use url::Url;
///
/// let origin = Url::parse("http://localhost:8000").unwrap();
/// assert_eq!(resolve_image_url(&origin, ""), "");
/// assert_eq!(
///     resolve_image_url(&origin, "avatars/a.png"),
///     "http://localhost:8000/storage/avatars/a.png"
/// );
/// ```
#[must_use]
pub fn resolve_image_url(media_origin: &Url, path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if is_absolute_reference(trimmed) {
        return path.to_string();
    }

    let base = media_origin.as_str().trim_end_matches('/');

    if trimmed.starts_with('/') {
        // Covers `/storage/...` as well as other rooted paths
        format!("{base}{trimmed}")
    } else if trimmed.starts_with("storage/") {
        format!("{base}/{trimmed}")
    } else {
        // `avatars/...` and bare public-disk paths
        format!("{base}{STORAGE_PREFIX}/{trimmed}")
    }
}

fn is_absolute_reference(path: &str) -> bool {
    path.starts_with("//")
        || Url::parse(path).is_ok_and(|url| {
            matches!(url.scheme(), "http" | "https" | "data" | "blob")
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:8000/").unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(resolve_image_url(&origin(), ""), "");
        assert_eq!(resolve_image_url(&origin(), "   "), "");
    }

    #[test]
    fn test_absolute_urls_unchanged() {
        assert_eq!(resolve_image_url(&origin(), "http://x/y"), "http://x/y");
        assert_eq!(
            resolve_image_url(&origin(), "https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
        assert_eq!(
            resolve_image_url(&origin(), "//cdn.example.com/a.png"),
            "//cdn.example.com/a.png"
        );
        assert_eq!(
            resolve_image_url(&origin(), "data:image/png;base64,AAAA"),
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_avatar_paths_get_storage_segment() {
        assert_eq!(
            resolve_image_url(&origin(), "avatars/a.png"),
            "http://localhost:8000/storage/avatars/a.png"
        );
    }

    #[test]
    fn test_storage_rooted_paths() {
        assert_eq!(
            resolve_image_url(&origin(), "/storage/agents/1/thumb.jpg"),
            "http://localhost:8000/storage/agents/1/thumb.jpg"
        );
        assert_eq!(
            resolve_image_url(&origin(), "storage/agents/1/thumb.jpg"),
            "http://localhost:8000/storage/agents/1/thumb.jpg"
        );
    }

    #[test]
    fn test_other_relative_paths_default_to_public_disk() {
        assert_eq!(
            resolve_image_url(&origin(), "agents/2/demo.mp4"),
            "http://localhost:8000/storage/agents/2/demo.mp4"
        );
    }

    #[test]
    fn test_origin_with_port_and_no_trailing_slash() {
        let origin = Url::parse("https://media.example.com:9000").unwrap();
        assert_eq!(
            resolve_image_url(&origin, "avatars/b.jpg"),
            "https://media.example.com:9000/storage/avatars/b.jpg"
        );
    }
}
