//! Lexical scopes of a file, built once per parse and queried by byte offset.
//!
//! Scopes are allocated in pre-order, so among the scopes containing an offset
//! the one with the highest id is the innermost.

use rustc_hash::FxHashSet;
use tree_sitter::Node;

use crate::constants::{ConstEnv, resolve};
use crate::diagnostics::Span;
use crate::literal::is_deep_literal;
use crate::simplify::evaluate;
use crate::syntax::lower::{Lowering, first_named_child, span_of};
use crate::syntax::{Expr, SourceFile, expr_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// A `const` binding with an initializer, visible once its declaration has completed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: String,
    pub init: Expr,
    /// End of the enclosing declaration statement.
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub span: Span,
    /// Every binding the scope introduces, of any kind.
    pub declared: FxHashSet<String>,
    pub consts: Vec<ConstDecl>,
}

#[derive(Debug, Clone, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    fn alloc(&mut self, parent: Option<ScopeId>, span: Span) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent,
            span,
            declared: FxHashSet::default(),
            consts: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// The program scope.
    pub fn root(&self) -> Option<&Scope> {
        self.scopes.first()
    }

    pub fn innermost(&self, offset: usize) -> Option<ScopeId> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find(|(_, scope)| scope.span.start <= offset && offset < scope.span.end.max(1))
            .map(|(index, _)| ScopeId(index))
            .or_else(|| (!self.scopes.is_empty()).then_some(ScopeId(0)))
    }

    /// Scopes enclosing `offset`, innermost first.
    pub fn chain(&self, offset: usize) -> Vec<&Scope> {
        let mut chain = Vec::new();
        let mut current = self.innermost(offset);
        while let Some(id) = current {
            let scope = self.get(id);
            chain.push(scope);
            current = scope.parent;
        }
        chain
    }

    /// Whether `name` is bound by a scope around `offset` other than the program scope.
    pub fn is_locally_declared(&self, offset: usize, name: &str) -> bool {
        let chain = self.chain(offset);
        chain
            .iter()
            .take(chain.len().saturating_sub(1))
            .any(|scope| scope.declared.contains(name))
    }
}

pub(crate) fn build_scopes(root: Node, lowering: &Lowering) -> ScopeArena {
    let mut builder = ScopeBuilder {
        arena: ScopeArena::default(),
        lowering,
    };
    let program = builder.arena.alloc(None, span_of(root));
    builder.visit_children(root, program, program);
    builder.arena
}

struct ScopeBuilder<'a, 'src> {
    arena: ScopeArena,
    lowering: &'a Lowering<'src>,
}

impl ScopeBuilder<'_, '_> {
    fn declare(&mut self, scope: ScopeId, name: &str) {
        self.arena.get_mut(scope).declared.insert(name.to_string());
    }

    fn visit_children(&mut self, node: Node, scope: ScopeId, function_scope: ScopeId) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child, scope, function_scope);
        }
    }

    fn visit(&mut self, node: Node, scope: ScopeId, function_scope: ScopeId) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.declare(scope, self.lowering.node_text(name));
                }
                self.visit_function(node, scope);
            }
            "arrow_function" | "function_expression" | "function" | "generator_function"
            | "method_definition" => self.visit_function(node, scope),
            "class_declaration" | "abstract_class_declaration" | "enum_declaration"
            | "internal_module" | "module" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.declare(scope, self.lowering.node_text(name));
                }
                self.visit_children(node, scope, function_scope);
            }
            "import_statement" => {
                let mut names = Vec::new();
                let mut cursor = node.walk();
                for clause in node.named_children(&mut cursor) {
                    if clause.kind() == "import_clause" {
                        self.collect_import_names(clause, &mut names);
                    }
                }
                for name in names {
                    self.declare(scope, &name);
                }
            }
            "lexical_declaration" => {
                let is_const = node
                    .child_by_field_name("kind")
                    .is_some_and(|kind| self.lowering.node_text(kind) == "const");
                self.visit_declarators(node, scope, function_scope, is_const.then_some(scope));
            }
            "variable_declaration" => {
                self.visit_declarators(node, function_scope, function_scope, None);
            }
            "statement_block" | "switch_body" | "for_statement" | "for_in_statement"
            | "class_body" => {
                let inner = self.arena.alloc(Some(scope), span_of(node));
                self.visit_children(node, inner, function_scope);
            }
            "catch_clause" => {
                let inner = self.arena.alloc(Some(scope), span_of(node));
                if let Some(parameter) = node.child_by_field_name("parameter") {
                    for name in self.binding_names(parameter) {
                        self.declare(inner, &name);
                    }
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit_children(body, inner, function_scope);
                }
            }
            _ => self.visit_children(node, scope, function_scope),
        }
    }

    fn visit_function(&mut self, node: Node, scope: ScopeId) {
        let inner = self.arena.alloc(Some(scope), span_of(node));
        if node.kind() != "function_declaration" {
            if let Some(name) = node.child_by_field_name("name") {
                self.declare(inner, self.lowering.node_text(name));
            }
        }
        let params = node
            .child_by_field_name("parameter")
            .or_else(|| node.child_by_field_name("parameters"));
        if let Some(params) = params {
            for name in self.binding_names(params) {
                self.declare(inner, &name);
            }
            self.visit_children(params, inner, inner);
        }
        if let Some(body) = node.child_by_field_name("body") {
            // The body block shares the parameter scope.
            if body.kind() == "statement_block" {
                self.visit_children(body, inner, inner);
            } else {
                self.visit(body, inner, inner);
            }
        }
    }

    fn visit_declarators(
        &mut self,
        node: Node,
        scope: ScopeId,
        function_scope: ScopeId,
        const_scope: Option<ScopeId>,
    ) {
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node.named_children(&mut cursor).collect();
        for declarator in declarators {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            for bound in self.binding_names(name) {
                self.declare(scope, &bound);
            }
            let value = declarator.child_by_field_name("value");
            if let (Some(const_scope), Some(value)) = (const_scope, value) {
                if name.kind() == "identifier" {
                    let decl = ConstDecl {
                        name: self.lowering.node_text(name).to_string(),
                        init: self.lowering.const_init(value),
                        end: node.end_byte(),
                    };
                    self.arena.get_mut(const_scope).consts.push(decl);
                }
            }
            if let Some(value) = value {
                self.visit(value, scope, function_scope);
            }
        }
    }

    fn collect_import_names(&self, clause: Node, out: &mut Vec<String>) {
        let mut cursor = clause.walk();
        for part in clause.named_children(&mut cursor) {
            match part.kind() {
                "identifier" => out.push(self.lowering.node_text(part).to_string()),
                "namespace_import" => {
                    if let Some(name) = first_named_child(part) {
                        out.push(self.lowering.node_text(name).to_string());
                    }
                }
                "named_imports" => {
                    let mut spec_cursor = part.walk();
                    for spec in part.named_children(&mut spec_cursor) {
                        let local = spec
                            .child_by_field_name("alias")
                            .or_else(|| spec.child_by_field_name("name"));
                        if let Some(local) = local {
                            out.push(self.lowering.node_text(local).to_string());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Names bound by a parameter list or binding pattern.
    fn binding_names(&self, node: Node) -> Vec<String> {
        let mut out = Vec::new();
        self.push_binding_names(node, &mut out);
        out
    }

    fn push_binding_names(&self, node: Node, out: &mut Vec<String>) {
        match node.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => {
                out.push(self.lowering.node_text(node).to_string());
            }
            "required_parameter" | "optional_parameter" => {
                if let Some(pattern) = node.child_by_field_name("pattern") {
                    self.push_binding_names(pattern, out);
                }
            }
            "pair_pattern" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.push_binding_names(value, out);
                }
            }
            "assignment_pattern" | "object_assignment_pattern" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.push_binding_names(left, out);
                }
            }
            "formal_parameters" | "object_pattern" | "array_pattern" | "rest_pattern" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.push_binding_names(child, out);
                }
            }
            _ => {}
        }
    }
}

/// Every `const` visible at `offset` whose value resolves to a deep literal.
///
/// Scopes are walked outermost first. Each scope's own bindings hide outer
/// constants of the same name before its constants declared before `offset`
/// are admitted, so shadowing and the temporal dead zone both fail closed.
pub fn collect_visible_constants(file: &SourceFile, offset: usize) -> ConstEnv {
    let mut env = ConstEnv::new();
    let chain = file.scopes().chain(offset);
    for scope in chain.into_iter().rev() {
        for name in &scope.declared {
            env.remove(name);
        }
        for decl in &scope.consts {
            if decl.end > offset {
                continue;
            }
            let value = resolve(&decl.init, &env)
                .or_else(|| evaluate(&decl.init, &env).map(|value| value.to_expr(expr_span(&decl.init))));
            if let Some(value) = value.filter(is_deep_literal) {
                tracing::trace!(name = %decl.name, "admitted constant");
                env.insert(decl.name.clone(), value);
            }
        }
    }
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_source, render_expr};

    fn visible(source: &str, marker: &str) -> Vec<(String, String)> {
        let file = parse_source("scope.ts", source).unwrap();
        let offset = source.find(marker).unwrap();
        let env = collect_visible_constants(&file, offset);
        let mut entries: Vec<(String, String)> = env
            .iter()
            .map(|(name, expr)| (name.to_string(), render_expr(expr)))
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn admits_literal_constants_declared_before_offset() {
        let source = "const A = 1;\nconst B = [A, 2] as const;\nconst C = f();\nuse(A);\nconst D = 4;\n";
        assert_eq!(
            visible(source, "use(A)"),
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "[1, 2]".to_string()),
            ]
        );
    }

    #[test]
    fn inner_bindings_shadow_outer_constants() {
        let source = "const X = 1;\nconst Y = 2;\nfunction f(X: number) {\n  let Y = 5;\n  return g(X, Y);\n}\n";
        assert!(visible(source, "g(X").is_empty());
    }

    #[test]
    fn block_constants_are_scoped() {
        let source = "const K = \"outer\";\n{\n  const K = \"inner\";\n  const L = K + \"!\";\n  here(K);\n}\nthere(K);\n";
        assert_eq!(
            visible(source, "here"),
            vec![
                ("K".to_string(), "\"inner\"".to_string()),
                ("L".to_string(), "\"inner!\"".to_string()),
            ]
        );
        assert_eq!(
            visible(source, "there"),
            vec![("K".to_string(), "\"outer\"".to_string())]
        );
    }

    #[test]
    fn later_declaration_hides_outer_constant() {
        let source = "const N = 1;\nfunction f() {\n  use(N);\n  const N = 2;\n}\n";
        assert!(visible(source, "use(N)").is_empty());
    }

    #[test]
    fn local_declarations_are_reported() {
        let source = "const LIMIT = 1;\nfunction g() {\n  const LIMIT = 5;\n  return f(1);\n}\n";
        let file = parse_source("scope.ts", source).unwrap();
        let offset = source.find("f(1)").unwrap();
        assert!(file.scopes().is_locally_declared(offset, "LIMIT"));
        assert!(!file.scopes().is_locally_declared(0, "LIMIT"));
    }
}
