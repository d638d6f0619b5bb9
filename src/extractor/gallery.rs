//! Responsive image extraction from recall detail pages.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

use crate::domain::models::ImageCandidate;
use crate::error::{AppError, Result};

/// Score for density descriptors when the intrinsic width is unknown.
const DENSITY_SCALE: f64 = 1000.0;

/// Collects every resolution variant inside the gallery container.
///
/// Returns `Ok(None)` when the page has no gallery, which is the normal case
/// for recalls published without photos.
pub fn extract_candidates(
    markup: &str,
    gallery_selector: &str,
    page_url: &Url,
) -> Result<Option<Vec<ImageCandidate>>> {
    let gallery = Selector::parse(gallery_selector)
        .map_err(|e| AppError::config(format!("invalid selector {gallery_selector:?}: {e}")))?;

    let html = Html::parse_document(markup);
    let Some(container) = html.select(&gallery).next() else {
        return Ok(None);
    };

    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    let selector = SELECTOR.get_or_init(|| Selector::parse("img, source").unwrap());

    let candidates = container
        .select(selector)
        .flat_map(|el| element_candidates(el, page_url))
        .collect();
    Ok(Some(candidates))
}

fn element_candidates(el: ElementRef<'_>, page_url: &Url) -> Vec<ImageCandidate> {
    let attrs = el.value();
    let intrinsic_width = attrs
        .attr("width")
        .and_then(|w| w.trim().trim_end_matches("px").parse::<u32>().ok());

    let srcset = attrs
        .attr("srcset")
        .or_else(|| attrs.attr("data-srcset"))
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(srcset) = srcset {
        return parse_srcset(srcset, intrinsic_width, page_url);
    }

    // <source> without srcset carries nothing usable.
    if attrs.name() != "img" {
        return Vec::new();
    }

    attrs
        .attr("src")
        .or_else(|| attrs.attr("data-src"))
        .and_then(|src| candidate(src, intrinsic_width.unwrap_or(0), page_url))
        .into_iter()
        .collect()
}

/// Parses `url [descriptor], url [descriptor], ...`.
///
/// `640w` is taken as is. `2x` is scaled by the intrinsic width when the
/// element declares one, otherwise by a fixed factor so density variants still
/// order correctly against each other.
pub fn parse_srcset(
    srcset: &str,
    intrinsic_width: Option<u32>,
    page_url: &Url,
) -> Vec<ImageCandidate> {
    srcset_entries(srcset)
        .into_iter()
        .filter_map(|(raw_url, descriptor)| {
            candidate(raw_url, descriptor_width(descriptor, intrinsic_width), page_url)
        })
        .collect()
}

/// Splits a srcset into `(url, descriptor)` pairs.
///
/// A URL runs up to the next whitespace and may itself contain commas
/// (`/upload/w_400,h_300/a.jpg`); only a trailing comma ends it early.
/// The descriptor runs up to the next comma.
fn srcset_entries(srcset: &str) -> Vec<(&str, Option<&str>)> {
    let mut entries = Vec::new();
    let mut rest = srcset;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let url_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (url, after) = rest.split_at(url_end);
        let trimmed = url.trim_end_matches(',');
        if trimmed.len() != url.len() {
            entries.push((trimmed, None));
            rest = after;
            continue;
        }

        let descriptor_end = after.find(',').unwrap_or(after.len());
        let descriptor = after[..descriptor_end].split_whitespace().next();
        entries.push((url, descriptor));
        rest = &after[descriptor_end..];
    }
    entries
}

fn descriptor_width(descriptor: Option<&str>, intrinsic_width: Option<u32>) -> u32 {
    let density = match descriptor.map(|d| d.trim().to_ascii_lowercase()) {
        Some(d) if d.ends_with('w') => {
            return d.trim_end_matches('w').parse::<u32>().unwrap_or(0);
        }
        Some(d) if d.ends_with('x') => d.trim_end_matches('x').parse::<f64>().unwrap_or(1.0),
        _ => 1.0,
    };
    let scale = intrinsic_width.map(f64::from).unwrap_or(DENSITY_SCALE);
    (density.max(0.0) * scale).round() as u32
}

fn candidate(raw_url: &str, width: u32, page_url: &Url) -> Option<ImageCandidate> {
    let raw_url = raw_url.trim();
    if raw_url.is_empty() || raw_url.starts_with("data:") {
        return None;
    }
    let full = page_url.join(raw_url).ok()?;
    Some(ImageCandidate {
        base_url: base_address(&full),
        width,
        full_url: full.to_string(),
    })
}

/// Address of the logical photo: no query, no fragment, no size suffix on
/// the file stem (`photo-640x480.jpg`, `photo_640w.jpg`, `photo@2x.jpg`).
pub fn base_address(url: &Url) -> String {
    static SIZE_SUFFIX: OnceLock<Regex> = OnceLock::new();
    let size_suffix = SIZE_SUFFIX.get_or_init(|| {
        Regex::new(r"(?i)(?:[-_](?:\d+x\d+|\d+w)|@\d+(?:\.\d+)?x)$").unwrap()
    });

    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let path = base.path().to_string();
    let (dir, segment) = match path.rfind('/') {
        Some(i) => path.split_at(i + 1),
        None => ("", path.as_str()),
    };
    let (stem, ext) = match segment.rfind('.') {
        Some(i) if i > 0 => segment.split_at(i),
        _ => (segment, ""),
    };
    let stripped = size_suffix.replace(stem, "");
    if stripped.len() != stem.len() && !stripped.is_empty() {
        base.set_path(&format!("{dir}{stripped}{ext}"));
    }
    base.to_string()
}
