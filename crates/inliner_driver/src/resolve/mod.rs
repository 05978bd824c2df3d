//! Finding the definition a call refers to: the caller's own file first, then
//! the module a relative import names, then the sources behind a package import.
//!
//! Every candidate failure (missing file, unreadable file, parse error) only
//! moves on to the next candidate; exhausting all of them is `NotFound`.

mod package;
mod relative;
mod source_map;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use inliner_core::syntax::is_relative_specifier;
use inliner_core::{FunctionDef, InlineError, ReExport, SourceFile};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::config::ResolveConfig;
use crate::load::Candidate;
use relative::module_file;

/// A located definition, with the file it lives in when that is not the caller.
#[derive(Debug)]
pub struct Resolved {
    pub definition: FunctionDef,
    pub callee: Option<SourceFile>,
}

impl Resolved {
    pub fn callee_file<'a>(&'a self, caller: &'a SourceFile) -> &'a SourceFile {
        self.callee.as_ref().unwrap_or(caller)
    }
}

pub async fn resolve_definition(
    name: &str,
    caller: &SourceFile,
    root: &Path,
    config: &ResolveConfig,
) -> Result<Resolved, InlineError> {
    debug!(callee = name, strategy = "same-file", "resolving");
    if let Some(definition) = caller.find_function(name) {
        return Ok(Resolved {
            definition,
            callee: None,
        });
    }

    let Some(import) = caller.import_for(name) else {
        return Err(InlineError::not_found(format!(
            "`{name}` is neither defined nor imported in {}",
            caller.path().display()
        )));
    };
    if import.namespace.as_deref() == Some(name) {
        return Err(InlineError::unsupported(format!(
            "`{name}` is a namespace import; only its members can be called"
        )));
    }
    let Some(exported) = import.imported_name(name) else {
        return Err(InlineError::not_found(format!("`{name}` has no import specifier")));
    };

    let candidates = if import.is_relative() {
        debug!(callee = name, module = %import.module, strategy = "relative", "resolving");
        module_file(caller.path(), &import.module, config)
            .await
            .map(Candidate::file)
            .into_iter()
            .collect()
    } else {
        debug!(callee = name, module = %import.module, strategy = "package", "resolving");
        package::entry_candidates(caller.path(), &import.module, root, config).await
    };
    for candidate in candidates {
        if let Some(resolved) = find_in_module(candidate, exported, config).await {
            return Ok(resolved);
        }
    }
    Err(InlineError::not_found(format!(
        "no definition of `{exported}` found for \"{}\"",
        import.module
    )))
}

/// Searches `start` for `exported`, following relative re-exports breadth first.
async fn find_in_module(
    start: Candidate,
    exported: &str,
    config: &ResolveConfig,
) -> Option<Resolved> {
    let mut queue: VecDeque<(Candidate, String, usize)> = VecDeque::new();
    let mut seen: FxHashSet<(PathBuf, String)> = FxHashSet::default();
    queue.push_back((start, exported.to_string(), 0));

    while let Some((candidate, name, depth)) = queue.pop_front() {
        if !seen.insert((candidate.path.clone(), name.clone())) {
            continue;
        }
        debug!(path = %candidate.path.display(), name = %name, depth, "searching module");
        let Some(file) = candidate.load().await else {
            continue;
        };
        if let Some(definition) = file.find_exported(&name) {
            return Some(Resolved {
                definition,
                callee: Some(file),
            });
        }
        if !config.follow_reexports || depth >= config.max_reexport_depth {
            continue;
        }
        for reexport in file.reexports() {
            let (module, imported) = match &reexport {
                ReExport::Named {
                    module,
                    imported,
                    exported,
                } if *exported == name => (module, imported.clone()),
                ReExport::All { module } if name != "default" => (module, name.clone()),
                _ => continue,
            };
            if !is_relative_specifier(module) {
                debug!(module = %module, "skipping package re-export");
                continue;
            }
            if let Some(path) = module_file(file.path(), module, config).await {
                queue.push_back((Candidate::file(path), imported, depth + 1));
            }
        }
    }
    None
}
