use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ResolveConfig;
use crate::load::{Candidate, is_dir};
use crate::resolve::relative::{normalize, probe, typescript_sibling};
use crate::resolve::source_map::map_sources;

/// Conditions honored in `exports`, in preference order.
const CONDITIONS: [&str; 5] = ["import", "module", "default", "require", "node"];

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    exports: Option<Value>,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    main: Option<String>,
}

/// Files that may hold the definitions a package specifier exports.
pub(crate) async fn entry_candidates(
    importer: &Path,
    specifier: &str,
    root: &Path,
    config: &ResolveConfig,
) -> Vec<Candidate> {
    let Some((name, subpath)) = split_specifier(specifier) else {
        debug!(specifier, "not a package specifier");
        return Vec::new();
    };
    let Some(package_dir) = find_package_dir(importer, name, root, config).await else {
        debug!(package = name, "package not installed");
        return Vec::new();
    };
    let manifest = read_manifest(&package_dir).await;
    let key = match subpath {
        "" => ".".to_string(),
        sub => format!("./{sub}"),
    };
    let target = manifest
        .exports
        .as_ref()
        .and_then(|exports| export_target(exports, &key))
        .or_else(|| {
            if subpath.is_empty() {
                manifest.module.clone().or_else(|| manifest.main.clone())
            } else {
                Some(subpath.to_string())
            }
        })
        .unwrap_or_else(|| "index.js".to_string());
    let target = normalize(&package_dir.join(target.trim_start_matches("./")));
    let entry_suffixes: Vec<String> = [".ts", ".tsx", ".js", ".mjs", "/index.ts", "/index.js"]
        .into_iter()
        .map(str::to_string)
        .collect();
    let Some(entry) = probe(&target, &entry_suffixes).await else {
        debug!(path = %target.display(), "package entry missing");
        return Vec::new();
    };
    debug!(entry = %entry.display(), "package entry");

    let extension = entry.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    let is_declaration = entry.to_str().is_some_and(|path| path.ends_with(".d.ts"));
    if matches!(extension, "ts" | "tsx") && !is_declaration {
        return vec![Candidate::file(entry)];
    }
    if let Some(sibling) = typescript_sibling(&entry).await {
        return vec![Candidate::file(sibling)];
    }
    if config.source_maps {
        return map_sources(&entry).await;
    }
    Vec::new()
}

/// `("@scope/pkg", "sub/path")` from `"@scope/pkg/sub/path"`.
fn split_specifier(specifier: &str) -> Option<(&str, &str)> {
    if specifier.is_empty() || specifier.starts_with('/') {
        return None;
    }
    let segments = if specifier.starts_with('@') { 2 } else { 1 };
    let mut end = 0;
    for _ in 0..segments {
        let rest = &specifier[end..];
        match rest.find('/') {
            Some(slash) => end += slash + 1,
            None => return Some((specifier, "")),
        }
    }
    Some((&specifier[..end - 1], &specifier[end..]))
}

/// Walks up from the importing file looking for `<node_modules>/<name>`,
/// stopping at the workspace root.
async fn find_package_dir(
    importer: &Path,
    name: &str,
    root: &Path,
    config: &ResolveConfig,
) -> Option<PathBuf> {
    for dir in importer.ancestors().skip(1) {
        let candidate = dir.join(&config.node_modules).join(name);
        debug!(path = %candidate.display(), "package candidate");
        if is_dir(&candidate).await {
            return Some(candidate);
        }
        if dir == root {
            break;
        }
    }
    let candidate = root.join(&config.node_modules).join(name);
    is_dir(&candidate).await.then_some(candidate)
}

async fn read_manifest(package_dir: &Path) -> PackageJson {
    let path = package_dir.join("package.json");
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(err) => {
            debug!(path = %path.display(), %err, "no package.json");
            return PackageJson::default();
        }
    };
    serde_json::from_str(&text).unwrap_or_else(|err| {
        warn!(path = %path.display(), %err, "malformed package.json");
        PackageJson::default()
    })
}

/// The target `exports` maps `key` (`"."` or `"./sub"`) to.
fn export_target(exports: &Value, key: &str) -> Option<String> {
    match exports {
        Value::Object(map) if map.keys().any(|entry| entry.starts_with('.')) => {
            map.get(key).and_then(conditional_target)
        }
        _ if key == "." => conditional_target(exports),
        _ => None,
    }
}

fn conditional_target(value: &Value) -> Option<String> {
    match value {
        Value::String(target) => Some(target.clone()),
        Value::Object(map) => CONDITIONS
            .iter()
            .find_map(|condition| map.get(*condition).and_then(conditional_target)),
        Value::Array(targets) => targets.iter().find_map(conditional_target),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_scoped_and_plain_specifiers() {
        assert_eq!(split_specifier("mathkit"), Some(("mathkit", "")));
        assert_eq!(split_specifier("mathkit/round"), Some(("mathkit", "round")));
        assert_eq!(split_specifier("@acme/ui"), Some(("@acme/ui", "")));
        assert_eq!(split_specifier("@acme/ui/button/x"), Some(("@acme/ui", "button/x")));
        assert_eq!(split_specifier("/abs"), None);
    }

    #[test]
    fn picks_export_conditions_in_order() {
        let exports = json!({
            ".": { "types": "./index.d.ts", "require": "./index.cjs", "import": "./index.mjs" },
            "./extra": ["./extra.js"]
        });
        assert_eq!(export_target(&exports, ".").as_deref(), Some("./index.mjs"));
        assert_eq!(export_target(&exports, "./extra").as_deref(), Some("./extra.js"));
        assert_eq!(export_target(&exports, "./missing"), None);
        assert_eq!(export_target(&json!("./main.js"), ".").as_deref(), Some("./main.js"));
        assert_eq!(
            export_target(&json!({ "default": "./d.js" }), ".").as_deref(),
            Some("./d.js")
        );
    }
}
