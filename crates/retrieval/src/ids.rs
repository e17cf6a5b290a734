//! Stable document ids derived from source URLs.
//!
//! Forum topics and articles from the known sources keep their natural id
//! (`talk_yiwu_io.1234`); anything else uses the last path segment. Ids are
//! prefixed with the host so two sites can never collide.

use reqwest::Url;
use sha2::{Digest, Sha256};

/// Hex characters kept from the content hash for URL-less records.
const HASH_ID_LEN: usize = 16;

/// Derive the document id for a record.
///
/// `title` and `content` are only used when `url` is empty.
pub fn document_id(url: &str, title: &str, content: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return content_hash_id(title, content);
    }

    match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("unknown");
            let prefix = host.replace('.', "_");
            match site_local_id(host, &parsed).or_else(|| last_segment(parsed.path())) {
                Some(local) => format!("{}.{}", prefix, local),
                None => prefix,
            }
        }
        Err(_) => last_segment(url).unwrap_or_else(|| content_hash_id(title, content)),
    }
}

fn site_local_id(host: &str, url: &Url) -> Option<String> {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if host.ends_with("talk.yiwu.io") {
        // /t/topic/<number>[/<post>]
        let pos = segments
            .windows(2)
            .position(|w| w[0] == "t" && w[1] == "topic")?;
        let number = segments.get(pos + 2)?;
        return number
            .chars()
            .all(|c| c.is_ascii_digit())
            .then(|| number.to_string());
    }

    if host.ends_with("scarleteen.com") {
        // /read/<section>/<slug>?page=<n>
        let has_page = url.query_pairs().any(|(k, _)| k == "page");
        if segments.first() == Some(&"read") && segments.len() >= 3 && has_page {
            return segments.last().map(|s| s.to_string());
        }
        return None;
    }

    if host.ends_with("helloclue.com") {
        // /<locale>/articles/<category>/<slug>
        let pos = segments.iter().position(|s| *s == "articles")?;
        if segments.len() >= pos + 3 {
            return segments.last().map(|s| s.to_string());
        }
    }

    None
}

fn last_segment(path: &str) -> Option<String> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn content_hash_id(title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("doc-{}", &hex[..HASH_ID_LEN])
}
