//! Archive file name derivation

use reqwest::Url;

use crate::layout::ARCHIVE_EXTENSION;

/// Reduce a display string to a safe file name component
pub fn sanitize_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+') {
            out.push(c);
        } else if (c.is_whitespace() || c == '-') && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches(|c| c == '-' || c == '.').to_string()
}

/// Build `<name>-<version>.jar` from display metadata
pub fn derive_file_name(name: Option<&str>, version: Option<&str>) -> Option<String> {
    let name = sanitize_component(name?);
    if name.is_empty() {
        return None;
    }
    let version = version.map(sanitize_component).filter(|v| !v.is_empty());
    Some(match version {
        Some(version) => format!("{}-{}{}", name, version, ARCHIVE_EXTENSION),
        None => format!("{}{}", name, ARCHIVE_EXTENSION),
    })
}

/// Last path segment of a download URL, with the archive extension ensured
pub fn file_name_from_url(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let segment = url.path_segments()?.next_back()?.to_string();
    if segment.is_empty() || segment.contains(['/', '\\']) {
        return None;
    }
    if segment.ends_with(ARCHIVE_EXTENSION) {
        Some(segment)
    } else {
        Some(format!("{}{}", segment, ARCHIVE_EXTENSION))
    }
}
