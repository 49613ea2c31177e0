//! Product image URL selection and filtering.
//!
//! Storefront product galleries lazy-load: the real URL may live in
//! `data-srcset`, `srcset`, `data-src`, or `src`, and placeholder frames
//! (spinners, transparent gifs) share markup with real photos. This module
//! picks the best candidate per element and rejects anything that is not a
//! plausible product photo.

use regex::Regex;

use crate::session::ElementSnapshot;

/// Substrings that mark a lazy-load placeholder rather than a photo.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "transparent",
    "placeholder",
    "loading",
    "spinner",
    "blank",
    "empty",
    "data:image/svg+xml",
    "data:image/gif;base64",
];

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".avif"];

/// URL path fragments that identify asset hosting even without a file
/// extension (CDNs often serve extensionless transformed images).
const PATH_HINTS: &[&str] = &[
    "/photos/", "/images/", "/img/", "/assets/", "/static/", "/product/", "/items/",
    "/catalog/", "/media/",
];

/// Pick the best image URL carried by one `<img>` snapshot.
///
/// Prefers the widest `srcset` candidate over plain `src`, and validates
/// the result with [`is_valid_image_src`]. `allow` is a site-specific CDN
/// host filter; when set, URLs that do not match it are rejected.
#[must_use]
pub fn best_image_url(snapshot: &ElementSnapshot, allow: Option<&Regex>) -> Option<String> {
    for attr in ["data-srcset", "srcset"] {
        if let Some(srcset) = snapshot.attr(attr) {
            if let Some(url) = parse_srcset(srcset) {
                if is_valid_image_src(&url, allow) {
                    return Some(url);
                }
            }
        }
    }
    for attr in ["data-src", "src"] {
        if let Some(src) = snapshot.attr(attr) {
            let src = src.trim();
            if is_valid_image_src(src, allow) {
                return Some(src.to_string());
            }
        }
    }
    None
}

/// Pick one URL from a `srcset` value.
///
/// When every candidate carries a width descriptor the widest wins;
/// otherwise the last listed candidate is taken, since storefronts order
/// srcsets smallest-first.
#[must_use]
pub fn parse_srcset(srcset: &str) -> Option<String> {
    let mut candidates: Vec<(String, Option<u64>)> = Vec::new();
    for entry in srcset.split(',') {
        let mut parts = entry.split_whitespace();
        let url = parts.next()?.to_string();
        if url.is_empty() {
            continue;
        }
        let width = parts
            .next()
            .and_then(|d| d.strip_suffix('w'))
            .and_then(|w| w.parse::<u64>().ok());
        candidates.push((url, width));
    }
    if candidates.is_empty() {
        return None;
    }
    if candidates.iter().all(|(_, w)| w.is_some()) {
        return candidates
            .into_iter()
            .max_by_key(|(_, w)| w.unwrap_or(0))
            .map(|(url, _)| url);
    }
    candidates.pop().map(|(url, _)| url)
}

/// True when `src` looks like a real product photo URL.
#[must_use]
pub fn is_valid_image_src(src: &str, allow: Option<&Regex>) -> bool {
    if src.is_empty() {
        return false;
    }
    let lower = src.to_lowercase();
    if PLACEHOLDER_PATTERNS.iter().any(|p| lower.contains(p)) {
        return false;
    }
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return false;
    }
    if let Some(allow) = allow {
        if !allow.is_match(src) {
            return false;
        }
    }
    let path = lower.split(['?', '#']).next().unwrap_or(&lower);
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        || PATH_HINTS.iter().any(|hint| lower.contains(hint))
}
