use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::InlinerError;

pub const CONFIG_FILE: &str = "inliner.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlinerConfig {
    #[serde(default)]
    pub resolve: ResolveConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveConfig {
    /// Tried in order after the bare relative path.
    #[serde(default = "default_relative_suffixes")]
    pub relative_suffixes: Vec<String>,
    #[serde(default = "default_node_modules")]
    pub node_modules: String,
    #[serde(default = "default_true")]
    pub source_maps: bool,
    #[serde(default = "default_true")]
    pub follow_reexports: bool,
    #[serde(default = "default_max_reexport_depth")]
    pub max_reexport_depth: usize,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            relative_suffixes: default_relative_suffixes(),
            node_modules: default_node_modules(),
            source_maps: true,
            follow_reexports: true,
            max_reexport_depth: default_max_reexport_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Add the package imports an inlined body needs.
    #[serde(default = "default_true")]
    pub imports: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { imports: true }
    }
}

fn default_relative_suffixes() -> Vec<String> {
    [".ts", ".tsx", "/index.ts", "/index.tsx"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_node_modules() -> String {
    "node_modules".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_reexport_depth() -> usize {
    4
}

pub fn parse_config(text: &str, path: &Path) -> Result<InlinerConfig, InlinerError> {
    toml::from_str(text)
        .map_err(|err| InlinerError::Config(format!("failed to parse {}: {err}", path.display())))
}

/// Reads `explicit` when given, otherwise `inliner.toml` under `root` if present.
pub async fn load_config(root: &Path, explicit: Option<&Path>) -> Result<InlinerConfig, InlinerError> {
    let path: PathBuf = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = root.join(CONFIG_FILE);
            if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Ok(InlinerConfig::default());
            }
            candidate
        }
    };
    let text = tokio::fs::read_to_string(&path).await?;
    parse_config(&text, &path)
}
