// src/fetch/urls.rs
use url::Url;

use crate::error::{LoadError, LoadResult};

const EXPORT_MARKER: &str = "export?format=csv";
const SHEETS_BASE: &str = "https://docs.google.com/spreadsheets/d/";

/// Turn a Google Sheets share link into its CSV export URL.
///
/// Links that already point at the export are returned unchanged. Otherwise the
/// document ID is the path segment after `/d/`; a `gid` (tab) in the query or
/// fragment is carried over.
pub fn sheet_csv_url(share_url: &str) -> LoadResult<String> {
    let share_url = share_url.trim();
    if share_url.contains(EXPORT_MARKER) {
        return Ok(share_url.to_string());
    }

    let id = share_url
        .split_once("/d/")
        .map(|(_, rest)| rest.split(['/', '?', '#']).next().unwrap_or_default())
        .unwrap_or_default();
    if id.is_empty() {
        return Err(LoadError::InvalidUrl(share_url.to_string()));
    }

    let mut out = format!("{SHEETS_BASE}{id}/{EXPORT_MARKER}");
    if let Some(gid) = find_gid(share_url) {
        out.push_str("&gid=");
        out.push_str(&gid);
    }
    Ok(out)
}

fn find_gid(share_url: &str) -> Option<String> {
    let parsed = Url::parse(share_url).ok()?;
    if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k == "gid") {
        return Some(v.into_owned()).filter(|v| !v.is_empty());
    }
    parsed
        .fragment()?
        .split('&')
        .find_map(|kv| kv.strip_prefix("gid="))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
