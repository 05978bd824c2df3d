use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::config::ResolveConfig;
use crate::load::is_file;

/// The file a relative specifier written in `importer` names, trying the path
/// as-is and then each configured suffix.
pub(crate) async fn module_file(
    importer: &Path,
    specifier: &str,
    config: &ResolveConfig,
) -> Option<PathBuf> {
    let base = importer.parent().unwrap_or_else(|| Path::new(""));
    let target = normalize(&base.join(specifier));
    probe(&target, &config.relative_suffixes).await
}

/// `path` itself, then `path` + each suffix; finally the TypeScript source of a
/// `.js` specifier written for compiled output.
pub(crate) async fn probe(path: &Path, suffixes: &[String]) -> Option<PathBuf> {
    debug!(path = %path.display(), "module candidate");
    if is_file(path).await {
        return Some(path.to_path_buf());
    }
    for suffix in suffixes {
        let mut candidate = OsString::from(path.as_os_str());
        candidate.push(suffix);
        let candidate = PathBuf::from(candidate);
        debug!(path = %candidate.display(), "module candidate");
        if is_file(&candidate).await {
            return Some(candidate);
        }
    }
    let extension = path.extension().and_then(|ext| ext.to_str());
    if matches!(extension, Some("js" | "jsx" | "mjs")) {
        return typescript_sibling(path).await;
    }
    None
}

/// `entry.ts` or `entry.tsx` next to a JavaScript `entry`.
pub(crate) async fn typescript_sibling(entry: &Path) -> Option<PathBuf> {
    for extension in ["ts", "tsx"] {
        let candidate = entry.with_extension(extension);
        debug!(path = %candidate.display(), "typescript sibling");
        if is_file(&candidate).await {
            return Some(candidate);
        }
    }
    None
}

/// Lexically removes `.` and `..` components.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                ) && normalized.pop();
                if !popped {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
