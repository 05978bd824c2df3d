use std::path::{Path, PathBuf};

use inliner_core::{SourceFile, parse_source};
use tracing::warn;

use crate::InlinerError;

/// Reads and parses a file the user asked about; failures are reported.
pub async fn load_source(path: &Path) -> Result<SourceFile, InlinerError> {
    let source = tokio::fs::read_to_string(path).await?;
    Ok(parse_source(path, source)?)
}

pub(crate) async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}

pub(crate) async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_dir())
}

/// A file the resolver may search, either on disk or embedded in a source map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Candidate {
    pub path: PathBuf,
    pub contents: Option<String>,
}

impl Candidate {
    pub fn file(path: PathBuf) -> Self {
        Self {
            path,
            contents: None,
        }
    }

    pub fn embedded(path: PathBuf, contents: String) -> Self {
        Self {
            path,
            contents: Some(contents),
        }
    }

    /// Loads the candidate; an unreadable or unparsable file only fails this candidate.
    pub async fn load(self) -> Option<SourceFile> {
        let source = match self.contents {
            Some(contents) => contents,
            None => match tokio::fs::read_to_string(&self.path).await {
                Ok(source) => source,
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "unreadable candidate");
                    return None;
                }
            },
        };
        match parse_source(&self.path, source) {
            Ok(file) => Some(file),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "unparsable candidate");
                None
            }
        }
    }
}
