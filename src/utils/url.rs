//! URL utilities for consistent endpoint construction.

/// Normalize a base URL by removing trailing slashes.
///
/// # Examples
///
/// ```
/// use shopbot::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://relay.example.com"), "https://relay.example.com");
/// assert_eq!(normalize_base_url("https://relay.example.com///"), "https://relay.example.com");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Construct a complete endpoint URL from a base URL and a path, with no
/// double slashes regardless of how either side was written.
///
/// # Examples
///
/// ```
/// use shopbot::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://relay.example.com/", "chat"),
///     "https://relay.example.com/chat"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_any_number_of_trailing_slashes() {
        assert_eq!(normalize_base_url("http://localhost:8787"), "http://localhost:8787");
        assert_eq!(normalize_base_url("http://localhost:8787/"), "http://localhost:8787");
        assert_eq!(normalize_base_url("http://localhost:8787//"), "http://localhost:8787");
    }

    #[test]
    fn construct_handles_slashes_on_both_sides() {
        assert_eq!(
            construct_api_url("http://localhost:8787", "chat"),
            "http://localhost:8787/chat"
        );
        assert_eq!(
            construct_api_url("http://localhost:8787/", "/chat"),
            "http://localhost:8787/chat"
        );
    }
}
