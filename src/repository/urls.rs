// src/repository/urls.rs

//! Asset URL normalization
//!
//! Chart indexes often list archive URLs relative to the repository root.
//! Recorded versions always carry URLs a client can fetch directly.

use tracing::warn;
use url::Url;

/// Resolve `candidate` against the repository `base` URL
///
/// - already under `base`: returned unchanged
/// - absolute URL (scheme and host): returned unchanged, even on another host
/// - otherwise joined onto the path of `base`
///
/// When `base` does not parse as a URL the two are joined as plain paths.
pub fn normalize_url(base: &str, candidate: &str) -> String {
    if candidate.starts_with(base) {
        return candidate.to_string();
    }

    if let Ok(absolute) = Url::parse(candidate)
        && absolute.has_host()
    {
        return candidate.to_string();
    }

    match Url::parse(base) {
        Ok(mut url) => {
            let joined = clean_join(url.path(), candidate);
            url.set_path(&joined);
            url.to_string()
        }
        Err(e) => {
            warn!("Repository URL {} is not a valid URL ({}), joining as a path", base, e);
            clean_join(base, candidate)
        }
    }
}

/// URL of `file` inside the repository rooted at `base`, keeping any query
pub fn repository_file_url(base: &str, file: &str) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    if !url.has_host() {
        return None;
    }
    let joined = clean_join(url.path(), file);
    url.set_path(&joined);
    Some(url.to_string())
}

/// Join two slash-separated paths and lexically clean the result
///
/// Empty and `.` segments disappear; `..` removes the previous segment, or is
/// dropped at the root of an absolute path.
pub fn clean_join(base: &str, rel: &str) -> String {
    let joined = match (base.is_empty(), rel.is_empty()) {
        (true, true) => return String::new(),
        (true, false) => rel.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{rel}"),
    };

    let rooted = joined.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let body = parts.join("/");
    match (rooted, body.is_empty()) {
        (true, _) => format!("/{body}"),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}
