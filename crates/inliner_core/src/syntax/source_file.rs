use std::fmt;
use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser, Tree};

use crate::diagnostics::{Position, Span};
use crate::error::InlineError;
use crate::scope::{ScopeArena, build_scopes};
use crate::syntax::ast::*;
use crate::syntax::lower::{
    Lowering, first_named_child, has_token, is_expression_kind, is_function_kind, is_same_node,
    span_of,
};
use crate::syntax::render::{ASSIGNMENT, STATEMENT_POSITION};
use crate::syntax::strings::unescape;

/// A parsed TypeScript file: the tree-sitter tree plus everything the inliner
/// asks about it repeatedly (imports, scopes).
pub struct SourceFile {
    path: PathBuf,
    source: String,
    tree: Tree,
    imports: Vec<ImportDecl>,
    scopes: ScopeArena,
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("path", &self.path)
            .field("imports", &self.imports.len())
            .field("scopes", &self.scopes.len())
            .finish()
    }
}

/// The call expression under a cursor, with what the inliner needs to know
/// about where it sits.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub expr: Expr,
    pub span: Span,
    /// The call is the operand of `await` (parentheses aside).
    pub awaited: bool,
    /// The nearest enclosing function is `async`, or there is none (module top level).
    pub in_async_function: bool,
    /// Precedence the replacement needs to keep its position's parse.
    pub min_precedence: u8,
}

impl CallSite {
    /// The called identifier; member and namespace calls are not inlinable.
    pub fn callee_name(&self) -> Result<&str, InlineError> {
        let Expr::Call { callee, .. } = &self.expr else {
            return Err(InlineError::unsupported("selection is not a call expression"));
        };
        match callee.unparen() {
            Expr::Ident(name) => Ok(&name.name),
            Expr::Member { .. } | Expr::Index { .. } => Err(InlineError::unsupported(
                "namespace-qualified and method calls cannot be inlined",
            )),
            _ => Err(InlineError::unsupported("callee is not a plain identifier")),
        }
    }

    pub fn args(&self) -> &[Element] {
        match &self.expr {
            Expr::Call { args, .. } => args,
            _ => &[],
        }
    }
}

/// An expression under a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprSite {
    pub expr: Expr,
    pub span: Span,
    pub min_precedence: u8,
}

fn language_for(path: &Path) -> tree_sitter::Language {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("tsx" | "jsx") => tree_sitter_typescript::LANGUAGE_TSX.into(),
        _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    }
}

fn parse_tree(path: &Path, source: &str) -> Result<Tree, InlineError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language_for(path))
        .map_err(|err| InlineError::Parse(err.to_string()))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| InlineError::Parse(format!("{}: parser produced no tree", path.display())))?;
    let root = tree.root_node();
    if root.has_error() {
        let offset = first_error(root).map_or(0, |node| node.start_byte());
        let position = Position::of(source, offset);
        return Err(InlineError::Parse(format!(
            "{}:{}:{}: syntax error",
            path.display(),
            position.line,
            position.column
        )));
    }
    Ok(tree)
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}

pub fn parse_source(
    path: impl Into<PathBuf>,
    source: impl Into<String>,
) -> Result<SourceFile, InlineError> {
    let path = path.into();
    let source = source.into();
    let tree = parse_tree(&path, &source)?;
    let lowering = Lowering::new(&source);
    let root = tree.root_node();
    let imports = collect_imports(root, &lowering);
    let scopes = build_scopes(root, &lowering);
    Ok(SourceFile {
        path,
        source,
        tree,
        imports,
        scopes,
    })
}

/// Parses a standalone expression, e.g. `a + 1` or `{ k: [1, 2] }`.
pub fn parse_expression(text: &str) -> Result<Expr, InlineError> {
    let source = format!("({text});");
    let tree = parse_tree(Path::new("<expression>"), &source)?;
    let root = tree.root_node();
    let statement = first_named_child(root)
        .filter(|node| node.kind() == "expression_statement")
        .ok_or_else(|| InlineError::Parse(format!("`{text}` is not an expression")))?;
    let wrapped = first_named_child(statement)
        .ok_or_else(|| InlineError::Parse(format!("`{text}` is not an expression")))?;
    let inner = match wrapped.kind() {
        "parenthesized_expression" => first_named_child(wrapped).unwrap_or(wrapped),
        _ => wrapped,
    };
    Ok(Lowering::new(&source).expr(inner))
}

fn collect_imports(root: Node, lowering: &Lowering) -> Vec<ImportDecl> {
    let mut imports = Vec::new();
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        if node.kind() != "import_statement" {
            continue;
        }
        let Some(module) = node
            .child_by_field_name("source")
            .and_then(|source| string_value(lowering, source))
        else {
            continue;
        };
        let mut decl = ImportDecl {
            module,
            default: None,
            namespace: None,
            named: Vec::new(),
            type_only: has_token(node, "type") || has_token(node, "typeof"),
            span: span_of(node),
        };
        let mut clause_cursor = node.walk();
        for clause in node.named_children(&mut clause_cursor) {
            if clause.kind() != "import_clause" {
                continue;
            }
            let mut part_cursor = clause.walk();
            for part in clause.named_children(&mut part_cursor) {
                match part.kind() {
                    "identifier" => decl.default = Some(lowering.node_text(part).to_string()),
                    "namespace_import" => {
                        decl.namespace = first_named_child(part)
                            .map(|name| lowering.node_text(name).to_string());
                    }
                    "named_imports" => {
                        let mut spec_cursor = part.walk();
                        for spec in part.named_children(&mut spec_cursor) {
                            if spec.kind() != "import_specifier" || has_token(spec, "type") {
                                continue;
                            }
                            let Some(imported) = spec
                                .child_by_field_name("name")
                                .and_then(|name| module_export_name(lowering, name))
                            else {
                                continue;
                            };
                            let local = spec
                                .child_by_field_name("alias")
                                .map_or_else(|| imported.clone(), |alias| {
                                    lowering.node_text(alias).to_string()
                                });
                            decl.named.push(ImportSpecifier { imported, local });
                        }
                    }
                    _ => {}
                }
            }
        }
        imports.push(decl);
    }
    imports
}

fn string_value(lowering: &Lowering, node: Node) -> Option<String> {
    let text = lowering.node_text(node);
    unescape(text.get(1..text.len().checked_sub(1)?)?)
}

fn module_export_name(lowering: &Lowering, node: Node) -> Option<String> {
    match node.kind() {
        "string" => string_value(lowering, node),
        _ => Some(lowering.node_text(node).to_string()),
    }
}

/// Strips wrappers that leave a function initializer's runtime value unchanged.
fn peel_initializer(node: Node) -> Node {
    let mut current = node;
    while matches!(
        current.kind(),
        "parenthesized_expression" | "as_expression" | "satisfies_expression"
    ) {
        match first_named_child(current) {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

impl SourceFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn imports(&self) -> &[ImportDecl] {
        &self.imports
    }

    pub fn scopes(&self) -> &ScopeArena {
        &self.scopes
    }

    /// The value import that binds `local`, if any.
    pub fn import_for(&self, local: &str) -> Option<&ImportDecl> {
        self.imports
            .iter()
            .filter(|decl| !decl.type_only)
            .find(|decl| decl.local_names().any(|name| name == local))
    }

    fn lowering(&self) -> Lowering<'_> {
        Lowering::new(&self.source)
    }

    fn top_level_nodes(&self) -> Vec<Node<'_>> {
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        root.named_children(&mut cursor).collect()
    }

    fn definition(&self, function: Node, name: &str, exported: bool) -> FunctionDef {
        FunctionDef {
            name: name.to_string(),
            function: self.lowering().function(function),
            exported,
            path: self.path.clone(),
        }
    }

    fn definition_in(&self, node: Node, name: &str, exported: bool) -> Option<FunctionDef> {
        let lowering = self.lowering();
        match node.kind() {
            "function_declaration" => {
                let declared = node.child_by_field_name("name")?;
                node.child_by_field_name("body")?;
                (lowering.node_text(declared) == name)
                    .then(|| self.definition(node, name, exported))
            }
            "lexical_declaration" => {
                let kind = node.child_by_field_name("kind")?;
                if lowering.node_text(kind) != "const" {
                    return None;
                }
                let mut cursor = node.walk();
                let declarators: Vec<Node> = node.named_children(&mut cursor).collect();
                declarators.into_iter().find_map(|declarator| {
                    if declarator.kind() != "variable_declarator" {
                        return None;
                    }
                    let declared = declarator.child_by_field_name("name")?;
                    if declared.kind() != "identifier" || lowering.node_text(declared) != name {
                        return None;
                    }
                    let value = peel_initializer(declarator.child_by_field_name("value")?);
                    (is_function_kind(value.kind()) && value.kind() != "function_declaration")
                        .then(|| self.definition(value, name, exported))
                })
            }
            "export_statement" => {
                if has_token(node, "default") {
                    return None;
                }
                let declaration = node.child_by_field_name("declaration")?;
                self.definition_in(declaration, name, true)
            }
            _ => None,
        }
    }

    /// A top-level `function` declaration or `const` arrow / function expression named `name`.
    pub fn find_function(&self, name: &str) -> Option<FunctionDef> {
        self.top_level_nodes()
            .into_iter()
            .find_map(|node| self.definition_in(node, name, false))
    }

    /// The definition this module exports as `exported` (`"default"` for the default export).
    pub fn find_exported(&self, exported: &str) -> Option<FunctionDef> {
        let lowering = self.lowering();
        for node in self.top_level_nodes() {
            if node.kind() != "export_statement" {
                continue;
            }
            if node.child_by_field_name("source").is_some() {
                continue;
            }
            let is_default = has_token(node, "default");
            if is_default {
                if exported != "default" {
                    continue;
                }
                let target = node
                    .child_by_field_name("declaration")
                    .or_else(|| node.child_by_field_name("value"))
                    .map(peel_initializer);
                match target {
                    Some(target) if target.kind() == "identifier" => {
                        if let Some(found) = self.find_function(lowering.node_text(target)) {
                            return Some(FunctionDef {
                                exported: true,
                                ..found
                            });
                        }
                    }
                    Some(target) if is_function_kind(target.kind()) => {
                        if target.child_by_field_name("body").is_some() {
                            return Some(self.definition(target, "default", true));
                        }
                    }
                    _ => {}
                }
                continue;
            }
            if let Some(declaration) = node.child_by_field_name("declaration") {
                if let Some(found) = self.definition_in(declaration, exported, true) {
                    return Some(found);
                }
                continue;
            }
            for (local, name) in self.export_clause(node) {
                if name == exported {
                    if let Some(found) = self.find_function(&local) {
                        return Some(FunctionDef {
                            exported: true,
                            ..found
                        });
                    }
                }
            }
        }
        None
    }

    /// `(local, exported)` pairs of an `export { a as b }` clause.
    fn export_clause(&self, node: Node) -> Vec<(String, String)> {
        let lowering = self.lowering();
        let mut pairs = Vec::new();
        let mut cursor = node.walk();
        for clause in node.named_children(&mut cursor) {
            if clause.kind() != "export_clause" {
                continue;
            }
            let mut spec_cursor = clause.walk();
            for spec in clause.named_children(&mut spec_cursor) {
                if spec.kind() != "export_specifier" || has_token(spec, "type") {
                    continue;
                }
                let Some(local) = spec
                    .child_by_field_name("name")
                    .and_then(|name| module_export_name(&lowering, name))
                else {
                    continue;
                };
                let exported = spec
                    .child_by_field_name("alias")
                    .and_then(|alias| module_export_name(&lowering, alias))
                    .unwrap_or_else(|| local.clone());
                pairs.push((local, exported));
            }
        }
        pairs
    }

    /// `export ... from` declarations, in source order.
    pub fn reexports(&self) -> Vec<ReExport> {
        let lowering = self.lowering();
        let mut reexports = Vec::new();
        for node in self.top_level_nodes() {
            if node.kind() != "export_statement" {
                continue;
            }
            let Some(module) = node
                .child_by_field_name("source")
                .and_then(|source| string_value(&lowering, source))
            else {
                continue;
            };
            let pairs = self.export_clause(node);
            if !pairs.is_empty() {
                reexports.extend(pairs.into_iter().map(|(imported, exported)| {
                    ReExport::Named {
                        module: module.clone(),
                        imported,
                        exported,
                    }
                }));
                continue;
            }
            let mut cursor = node.walk();
            let has_namespace = node
                .named_children(&mut cursor)
                .any(|child| child.kind() == "namespace_export");
            if has_token(node, "*") && !has_namespace {
                reexports.push(ReExport::All { module });
            }
        }
        reexports
    }

    fn innermost_at(&self, offset: usize) -> Result<Node<'_>, InlineError> {
        if offset > self.source.len() {
            return Err(InlineError::not_found(format!(
                "offset {offset} is past the end of {}",
                self.path.display()
            )));
        }
        self.tree
            .root_node()
            .descendant_for_byte_range(offset, offset)
            .ok_or_else(|| InlineError::not_found(format!("nothing at offset {offset}")))
    }

    fn enclosing_call(&self, offset: usize) -> Result<Node<'_>, InlineError> {
        let mut node = self.innermost_at(offset)?;
        while node.kind() != "call_expression" {
            node = node.parent().ok_or_else(|| {
                InlineError::not_found(format!("no call expression at offset {offset}"))
            })?;
        }
        Ok(node)
    }

    /// The innermost call expression containing `offset`.
    pub fn call_at(&self, offset: usize) -> Result<CallSite, InlineError> {
        let node = self.enclosing_call(offset)?;
        let mut outer = node.parent();
        while let Some(parent) = outer.filter(|parent| parent.kind() == "parenthesized_expression")
        {
            outer = parent.parent();
        }
        Ok(CallSite {
            expr: self.lowering().expr(node),
            span: span_of(node),
            awaited: outer.is_some_and(|parent| parent.kind() == "await_expression"),
            in_async_function: in_async_context(node),
            min_precedence: self.context_precedence(node),
        })
    }

    /// The expression at `offset`, widened to the whole operator tree around it.
    pub fn expr_at(&self, offset: usize) -> Result<ExprSite, InlineError> {
        let mut node = self.innermost_at(offset)?;
        while !is_expression_kind(node.kind()) {
            node = node.parent().ok_or_else(|| {
                InlineError::not_found(format!("no expression at offset {offset}"))
            })?;
        }
        while let Some(parent) = node.parent() {
            let widen = match parent.kind() {
                "binary_expression" | "unary_expression" | "ternary_expression"
                | "parenthesized_expression" | "template_substitution" | "template_string" => true,
                "member_expression" | "subscript_expression" => {
                    is_same_node(parent.child_by_field_name("object"), node)
                        || is_same_node(parent.child_by_field_name("index"), node)
                }
                _ => false,
            };
            if !widen {
                break;
            }
            node = parent;
        }
        Ok(self.site(node))
    }

    /// The outermost `.map(...)` / `Object.fromEntries(...)` chain around `offset`.
    pub fn comprehension_at(&self, offset: usize) -> Result<ExprSite, InlineError> {
        let mut node = self.enclosing_call(offset)?;
        let lowering = self.lowering();
        loop {
            let Some(parent) = node.parent() else { break };
            let Some(grand) = parent.parent() else { break };
            let chained = parent.kind() == "member_expression"
                && is_same_node(parent.child_by_field_name("object"), node)
                && grand.kind() == "call_expression"
                && is_same_node(grand.child_by_field_name("function"), parent);
            let collected = parent.kind() == "arguments"
                && grand.kind() == "call_expression"
                && grand
                    .child_by_field_name("function")
                    .is_some_and(|callee| lowering.node_text(callee) == "Object.fromEntries");
            if !(chained || collected) {
                break;
            }
            node = grand;
        }
        Ok(self.site(node))
    }

    fn site(&self, node: Node) -> ExprSite {
        ExprSite {
            expr: self.lowering().expr(node),
            span: span_of(node),
            min_precedence: self.context_precedence(node),
        }
    }

    fn context_precedence(&self, node: Node) -> u8 {
        let Some(parent) = node.parent() else {
            return 0;
        };
        let is_field = |field: &str| is_same_node(parent.child_by_field_name(field), node);
        match parent.kind() {
            "binary_expression" => parent
                .child_by_field_name("operator")
                .and_then(|op| BinaryOp::from_token(self.lowering().node_text(op)))
                .map_or(18, |op| op.precedence() + 1),
            "unary_expression" | "await_expression" | "type_assertion" => 16,
            "member_expression" | "subscript_expression" if is_field("object") => 18,
            "call_expression" if is_field("function") => 18,
            "new_expression" if is_field("constructor") => 19,
            "as_expression" | "satisfies_expression" | "non_null_expression" => 17,
            "ternary_expression" if is_field("condition") => 4,
            "expression_statement" | "arrow_function" => STATEMENT_POSITION,
            "ternary_expression" | "parenthesized_expression" | "template_substitution"
            | "subscript_expression" | "return_statement" | "variable_declarator" | "pair"
            | "arguments" | "array" | "spread_element" | "assignment_expression"
            | "augmented_assignment_expression" | "sequence_expression" | "switch_case"
            | "throw_statement" | "export_statement" | "public_field_definition"
            | "required_parameter" | "optional_parameter" => ASSIGNMENT,
            _ => 17,
        }
    }
}

/// Whether `await` is legal at `node`: inside an `async` function, or at module top level.
fn in_async_context(node: Node) -> bool {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        match ancestor.kind() {
            "function_declaration" | "function_expression" | "function" | "arrow_function"
            | "method_definition" | "generator_function" | "generator_function_declaration" => {
                return has_token(ancestor, "async");
            }
            "class_body" => return false,
            _ => current = ancestor.parent(),
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> SourceFile {
        parse_source("main.ts", source).unwrap()
    }

    #[test]
    fn finds_declarations_and_const_arrows() {
        let file = parse(
            "function twice(x: number) { return x * 2; }\n\
             export const addTwo = (a: number) => a + 2;\n\
             declare function ambient(x: number): number;\n\
             let mutable = () => 1;\n",
        );
        assert!(file.find_function("twice").is_some());
        let add_two = file.find_function("addTwo").unwrap();
        assert!(add_two.exported);
        assert!(add_two.function.is_arrow);
        assert!(file.find_function("ambient").is_none());
        assert!(file.find_function("mutable").is_none());
    }

    #[test]
    fn finds_exports_through_clauses_and_default() {
        let file = parse(
            "function helper(v: number) { return v; }\n\
             const hidden = (v: number) => v;\n\
             export { helper as publicHelper };\n\
             export default hidden;\n",
        );
        assert_eq!(file.find_exported("publicHelper").unwrap().name, "helper");
        assert_eq!(file.find_exported("default").unwrap().name, "hidden");
        assert!(file.find_exported("helper").is_none());
    }

    #[test]
    fn collects_imports_and_reexports() {
        let file = parse(
            "import fmt, { pad as leftPad, type Width } from \"fmt-kit\";\n\
             import * as path from 'node:path';\n\
             import type { Shape } from './shape';\n\
             export { area } from './geometry';\n\
             export * from './more';\n\
             export * as ns from './ns';\n",
        );
        let imports = file.imports();
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[0].default.as_deref(), Some("fmt"));
        assert_eq!(imports[0].imported_name("leftPad"), Some("pad"));
        assert_eq!(imports[0].named.len(), 1);
        assert_eq!(imports[1].namespace.as_deref(), Some("path"));
        assert!(imports[2].type_only);
        assert_eq!(
            file.reexports(),
            vec![
                ReExport::Named {
                    module: "./geometry".to_string(),
                    imported: "area".to_string(),
                    exported: "area".to_string(),
                },
                ReExport::All {
                    module: "./more".to_string(),
                },
            ]
        );
    }

    #[test]
    fn call_site_reports_await_and_async_context() {
        let source = "async function run() { return await (load(1)); }\nfunction sync() { return load(2) * 3; }\n";
        let file = parse(source);
        let first = file.call_at(source.find("load(1)").unwrap()).unwrap();
        assert!(first.awaited);
        assert!(first.in_async_function);
        let second = file.call_at(source.find("load(2)").unwrap()).unwrap();
        assert!(!second.awaited);
        assert!(!second.in_async_function);
        assert_eq!(second.min_precedence, 15);
        assert_eq!(second.callee_name().unwrap(), "load");
    }

    #[test]
    fn top_level_counts_as_async() {
        let source = "const data = await fetchAll();\n";
        let file = parse(source);
        let site = file.call_at(source.find("fetchAll").unwrap()).unwrap();
        assert!(site.awaited);
        assert!(site.in_async_function);
    }

    #[test]
    fn comprehension_site_widens_to_outer_call() {
        let source = "const table = Object.fromEntries(Object.entries(RAW).map(([k, v]) => [k, v]));\n";
        let file = parse(source);
        let site = file.comprehension_at(source.find("entries").unwrap()).unwrap();
        let text = &source[site.span.start..site.span.end];
        assert!(text.starts_with("Object.fromEntries("));
    }

    #[test]
    fn rejects_syntax_errors() {
        let err = parse_source("bad.ts", "const = ;").unwrap_err();
        assert!(matches!(err, InlineError::Parse(_)));
    }
}
