//! Package imports of a file, and the imports an inlined expression needs.

use rustc_hash::FxHashMap;

use crate::syntax::{ImportDecl, quote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    Named,
    Default,
    Namespace,
}

/// One local name brought in from a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportBinding {
    pub module: String,
    /// Exported name; `"default"` for default imports, `"*"` for namespaces.
    pub imported: String,
    pub local: String,
    pub kind: ImportKind,
}

/// An import the caller must add so the inlined expression keeps referring to
/// the same binding it did in the callee.
pub type NeededImport = ImportBinding;

impl ImportBinding {
    /// Same binding under the same local name.
    pub fn same_as(&self, other: &ImportBinding) -> bool {
        self.module == other.module && self.imported == other.imported && self.kind == other.kind
    }

    pub fn to_statement(&self) -> String {
        let module = quote(&self.module);
        match self.kind {
            ImportKind::Default => format!("import {} from {module};", self.local),
            ImportKind::Namespace => format!("import * as {} from {module};", self.local),
            ImportKind::Named if self.imported == self.local => {
                format!("import {{ {} }} from {module};", self.local)
            }
            ImportKind::Named => {
                format!("import {{ {} as {} }} from {module};", self.imported, self.local)
            }
        }
    }

    /// Text of the specifier inside `{ ... }`; `None` for default and namespace imports.
    pub fn named_specifier(&self) -> Option<String> {
        match self.kind {
            ImportKind::Named if self.imported == self.local => Some(self.local.clone()),
            ImportKind::Named => Some(format!("{} as {}", self.imported, self.local)),
            ImportKind::Default | ImportKind::Namespace => None,
        }
    }
}

/// Non-relative, value-level imports of one file, indexed by local name and by module.
#[derive(Debug, Clone, Default)]
pub struct ImportIndex {
    bindings: Vec<ImportBinding>,
    by_local: FxHashMap<String, usize>,
    by_module: FxHashMap<String, Vec<usize>>,
}

impl ImportIndex {
    pub fn build(imports: &[ImportDecl]) -> Self {
        let mut index = Self::default();
        for (decl_index, decl) in imports.iter().enumerate() {
            if decl.type_only || decl.is_relative() {
                continue;
            }
            let mut push = |imported: &str, local: &str, kind: ImportKind| {
                let position = index.bindings.len();
                index.bindings.push(ImportBinding {
                    module: decl.module.clone(),
                    imported: imported.to_string(),
                    local: local.to_string(),
                    kind,
                });
                index.by_local.insert(local.to_string(), position);
                index.by_module.entry(decl.module.clone()).or_default().push(decl_index);
            };
            if let Some(local) = &decl.default {
                push("default", local, ImportKind::Default);
            }
            if let Some(local) = &decl.namespace {
                push("*", local, ImportKind::Namespace);
            }
            for spec in &decl.named {
                push(&spec.imported, &spec.local, ImportKind::Named);
            }
        }
        for declarations in index.by_module.values_mut() {
            declarations.dedup();
        }
        index
    }

    pub fn lookup(&self, local: &str) -> Option<&ImportBinding> {
        self.by_local.get(local).map(|&position| &self.bindings[position])
    }

    /// Positions (in the file's import list) of the declarations importing `module`.
    pub fn declarations_for(&self, module: &str) -> &[usize] {
        self.by_module
            .get(module)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn bindings(&self) -> &[ImportBinding] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;

    fn index(source: &str) -> ImportIndex {
        let file = parse_source("index.ts", source).unwrap();
        ImportIndex::build(file.imports())
    }

    #[test]
    fn indexes_package_imports_only() {
        let index = index(
            r#"
import React, { useMemo as memo, useState } from "react";
import * as path from "node:path";
import type { Props } from "react";
import { helper } from "./helper";
"#,
        );
        assert_eq!(index.bindings().len(), 4);
        let memo = index.lookup("memo").unwrap();
        assert_eq!((memo.imported.as_str(), memo.kind), ("useMemo", ImportKind::Named));
        assert_eq!(index.lookup("React").unwrap().kind, ImportKind::Default);
        assert_eq!(index.lookup("path").unwrap().kind, ImportKind::Namespace);
        assert!(index.lookup("Props").is_none());
        assert!(index.lookup("helper").is_none());
        assert_eq!(index.declarations_for("react"), &[0]);
        assert!(index.declarations_for("lodash").is_empty());
    }

    #[test]
    fn renders_import_statements() {
        let index = index(
            r#"import clamp, { max as upper, min } from "lodash"; import * as fs from "fs";"#,
        );
        let statements: Vec<String> = index
            .bindings()
            .iter()
            .map(ImportBinding::to_statement)
            .collect();
        insta::assert_snapshot!(statements.join("\n"), @r#"
        import clamp from "lodash";
        import { max as upper } from "lodash";
        import { min } from "lodash";
        import * as fs from "fs";
        "#);
    }
}
