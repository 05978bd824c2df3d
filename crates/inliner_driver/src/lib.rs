#![deny(clippy::unwrap_used)]

mod config;
mod edit;
mod load;
mod resolve;

use std::path::{Path, PathBuf};

use inliner_core::{
    FunctionDef, InlineError, Span, bind_and_inline, collect_visible_constants, literal_fold,
    literal_inline_comprehension, render_expr_at,
};
use thiserror::Error;
use tracing::info;

pub use config::{CONFIG_FILE, InlinerConfig, OutputConfig, ResolveConfig, load_config, parse_config};
pub use edit::{TextEdit, apply_edits, import_edits};
pub use load::load_source;
pub use resolve::{Resolved, resolve_definition};

#[derive(Debug, Error)]
pub enum InlinerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Diagnostics emitted")]
    Diagnostics,
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error(transparent)]
    Inline(#[from] InlineError),
}

/// A replacement computed for one file, not yet written.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    pub path: PathBuf,
    pub source: String,
    /// Span of the replaced call or expression.
    pub span: Span,
    pub replacement: String,
    /// Import statements the replacement needs, as they would be written on their own.
    pub imports: Vec<String>,
    pub edits: Vec<TextEdit>,
}

impl Rewrite {
    pub fn rewritten(&self) -> String {
        apply_edits(&self.source, &self.edits)
    }

    pub async fn write(&self) -> Result<(), InlinerError> {
        tokio::fs::write(&self.path, self.rewritten()).await?;
        info!(path = %self.path.display(), edits = self.edits.len(), "rewrote file");
        Ok(())
    }
}

/// The directory package imports resolve from, with its configuration.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: InlinerConfig,
}

impl Workspace {
    pub async fn open(root: &Path, config_path: Option<&Path>) -> Result<Self, InlinerError> {
        let metadata = tokio::fs::metadata(root)
            .await
            .map_err(|_| InlinerError::InvalidPath(root.display().to_string()))?;
        if !metadata.is_dir() {
            return Err(InlinerError::InvalidPath(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let config = load_config(root, config_path).await?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    pub fn with_config(root: impl Into<PathBuf>, config: InlinerConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Replaces the call at `offset` with the callee body.
    pub async fn inline_call_at(&self, path: &Path, offset: usize) -> Result<Rewrite, InlinerError> {
        let file = load_source(path).await?;
        let site = file.call_at(offset)?;
        let name = site.callee_name()?;
        let resolved = resolve_definition(name, &file, &self.root, &self.config.resolve).await?;
        let env = collect_visible_constants(&file, site.span.start);
        let outcome = bind_and_inline(
            &site,
            &resolved.definition,
            resolved.callee_file(&file),
            &file,
            &env,
        )?;
        let needed = if self.config.output.imports {
            outcome.needed_imports
        } else {
            Vec::new()
        };
        let mut edits = vec![TextEdit {
            span: site.span,
            text: outcome.text.clone(),
        }];
        edits.extend(import_edits(&file, &needed));
        Ok(Rewrite {
            path: path.to_path_buf(),
            source: file.source().to_string(),
            span: site.span,
            replacement: outcome.text,
            imports: needed.iter().map(|import| import.to_statement()).collect(),
            edits,
        })
    }

    /// Folds the expression at `offset` against the constants visible there.
    pub async fn fold_at(&self, path: &Path, offset: usize) -> Result<Rewrite, InlinerError> {
        let file = load_source(path).await?;
        let site = file.expr_at(offset)?;
        let env = collect_visible_constants(&file, site.span.start);
        let folded = literal_fold(&site.expr, &env)?;
        Ok(single_edit(path, file.source(), site.span, render_expr_at(&folded, site.min_precedence)))
    }

    /// Collapses the `.map` / `Object.fromEntries` chain at `offset` into a literal.
    pub async fn comprehension_at(&self, path: &Path, offset: usize) -> Result<Rewrite, InlinerError> {
        let file = load_source(path).await?;
        let site = file.comprehension_at(offset)?;
        let env = collect_visible_constants(&file, site.span.start);
        let collapsed = literal_inline_comprehension(&site.expr, &env)?;
        Ok(single_edit(
            path,
            file.source(),
            site.span,
            render_expr_at(&collapsed, site.min_precedence),
        ))
    }

    /// Where `name`, as seen from `path`, is defined.
    pub async fn resolve_name(&self, path: &Path, name: &str) -> Result<FunctionDef, InlinerError> {
        let file = load_source(path).await?;
        let resolved = resolve_definition(name, &file, &self.root, &self.config.resolve).await?;
        Ok(resolved.definition)
    }
}

fn single_edit(path: &Path, source: &str, span: Span, replacement: String) -> Rewrite {
    Rewrite {
        path: path.to_path_buf(),
        source: source.to_string(),
        span,
        edits: vec![TextEdit {
            span,
            text: replacement.clone(),
        }],
        replacement,
        imports: Vec::new(),
    }
}
