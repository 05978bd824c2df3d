use std::ffi::OsString;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::load::{Candidate, is_file};
use crate::resolve::relative::normalize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceMap {
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    source_root: Option<String>,
    #[serde(default)]
    sources_content: Vec<Option<String>>,
}

/// TypeScript sources listed by the source map of a JavaScript `entry`.
pub(crate) async fn map_sources(entry: &Path) -> Vec<Candidate> {
    let Some((text, map_dir)) = load_map(entry).await else {
        debug!(entry = %entry.display(), "no source map");
        return Vec::new();
    };
    let map: SourceMap = match serde_json::from_str(&text) {
        Ok(map) => map,
        Err(err) => {
            warn!(entry = %entry.display(), %err, "malformed source map");
            return Vec::new();
        }
    };
    let root = map
        .source_root
        .as_deref()
        .filter(|root| !root.contains("://"))
        .unwrap_or("");
    let mut candidates = Vec::new();
    for (index, source) in map.sources.iter().enumerate() {
        let Some(source) = source.as_deref() else {
            continue;
        };
        if !is_typescript_source(source) {
            continue;
        }
        let relative = source
            .split_once("://")
            .map_or(source, |(_, rest)| rest.trim_start_matches('/'));
        let path = normalize(&map_dir.join(root).join(relative));
        debug!(path = %path.display(), "source map candidate");
        if is_file(&path).await {
            candidates.push(Candidate::file(path));
        } else if let Some(Some(content)) = map.sources_content.get(index) {
            candidates.push(Candidate::embedded(path, content.clone()));
        }
    }
    candidates
}

fn is_typescript_source(source: &str) -> bool {
    (source.ends_with(".ts") || source.ends_with(".tsx")) && !source.ends_with(".d.ts")
}

/// The map text and the directory its `sources` are relative to.
async fn load_map(entry: &Path) -> Option<(String, PathBuf)> {
    let entry_dir = entry.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    match tokio::fs::read_to_string(entry).await {
        Ok(code) => {
            if let Some(url) = mapping_url(&code) {
                if let Some(payload) = url.strip_prefix("data:") {
                    match decode_data_url(payload) {
                        Some(text) => return Some((text, entry_dir)),
                        None => debug!(entry = %entry.display(), "undecodable inline source map"),
                    }
                } else {
                    let path = normalize(&entry_dir.join(url));
                    match tokio::fs::read_to_string(&path).await {
                        Ok(text) => {
                            let dir = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
                            return Some((text, dir));
                        }
                        Err(err) => warn!(path = %path.display(), %err, "unreadable source map"),
                    }
                }
            }
        }
        Err(err) => warn!(entry = %entry.display(), %err, "unreadable package entry"),
    }
    let mut fallback = OsString::from(entry.as_os_str());
    fallback.push(".map");
    let fallback = PathBuf::from(fallback);
    debug!(path = %fallback.display(), "source map fallback");
    let text = tokio::fs::read_to_string(&fallback).await.ok()?;
    Some((text, entry_dir))
}

/// The last `sourceMappingURL` comment of generated code.
fn mapping_url(code: &str) -> Option<&str> {
    code.lines().rev().find_map(|line| {
        let line = line.trim();
        line.strip_prefix("//# sourceMappingURL=")
            .or_else(|| line.strip_prefix("//@ sourceMappingURL="))
            .map(str::trim)
            .filter(|url| !url.is_empty())
    })
}

/// Decodes `application/json;base64,<payload>`; other encodings are not supported.
fn decode_data_url(payload: &str) -> Option<String> {
    let (header, data) = payload.split_once(',')?;
    if !header.split(';').any(|part| part == "base64") {
        return None;
    }
    let bytes = STANDARD.decode(data.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_the_last_mapping_comment() {
        let code = "export{};\n//# sourceMappingURL=old.map\nx();\n//# sourceMappingURL=index.js.map\n";
        assert_eq!(mapping_url(code), Some("index.js.map"));
        assert_eq!(mapping_url("x();\n"), None);
    }

    #[test]
    fn decodes_base64_data_urls() {
        let encoded = STANDARD.encode(r#"{"sources":["a.ts"]}"#);
        let payload = format!("application/json;charset=utf-8;base64,{encoded}");
        assert_eq!(decode_data_url(&payload).as_deref(), Some(r#"{"sources":["a.ts"]}"#));
        assert_eq!(decode_data_url("application/json,%7B%7D"), None);
    }

    #[test]
    fn declaration_files_are_not_sources() {
        assert!(is_typescript_source("../src/index.ts"));
        assert!(is_typescript_source("view.tsx"));
        assert!(!is_typescript_source("index.d.ts"));
        assert!(!is_typescript_source("index.js"));
    }
}
