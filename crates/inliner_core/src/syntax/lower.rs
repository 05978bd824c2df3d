//! Lowering from tree-sitter nodes to the closed syntax types.
//!
//! Lowering never fails. Shapes the engine does not model become [`Expr::Other`]
//! (children still reachable) or [`Expr::Opaque`] (never substituted into), and
//! the folding engine decides later whether that is acceptable.

use tree_sitter::Node;

use crate::diagnostics::Span;
use crate::syntax::ast::*;
use crate::syntax::strings::{parse_number_literal, unescape};

pub(crate) struct Lowering<'a> {
    source: &'a str,
}

pub(crate) fn span_of(node: Node) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

pub(crate) fn first_named_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .find(|child| child.kind() != "comment")
}

pub(crate) fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token)
}

pub(crate) fn is_same_node(left: Option<Node>, right: Node) -> bool {
    left.is_some_and(|left| left.id() == right.id())
}

pub(crate) fn is_function_kind(kind: &str) -> bool {
    matches!(
        kind,
        "arrow_function" | "function_expression" | "function" | "function_declaration"
    )
}

/// Node kinds lowered as expressions. Anything else inside an `Other` node is kept as text.
pub(crate) fn is_expression_kind(kind: &str) -> bool {
    matches!(
        kind,
        "identifier"
            | "undefined"
            | "this"
            | "super"
            | "number"
            | "string"
            | "template_string"
            | "true"
            | "false"
            | "null"
            | "regex"
            | "array"
            | "object"
            | "member_expression"
            | "subscript_expression"
            | "call_expression"
            | "new_expression"
            | "ternary_expression"
            | "binary_expression"
            | "unary_expression"
            | "update_expression"
            | "parenthesized_expression"
            | "await_expression"
            | "yield_expression"
            | "arrow_function"
            | "function_expression"
            | "function"
            | "generator_function"
            | "class"
            | "assignment_expression"
            | "augmented_assignment_expression"
            | "sequence_expression"
            | "as_expression"
            | "satisfies_expression"
            | "non_null_expression"
            | "type_assertion"
            | "instantiation_expression"
    )
}

impl<'a> Lowering<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self { source }
    }

    pub(crate) fn node_text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        self.source.get(start..end).unwrap_or("")
    }

    pub(crate) fn expr(&self, node: Node) -> Expr {
        let span = span_of(node);
        match node.kind() {
            "identifier" | "undefined" | "shorthand_property_identifier" => {
                Expr::ident(self.node_text(node), span)
            }
            "number" => {
                let raw = self.node_text(node);
                match parse_number_literal(raw) {
                    Some(value) => Expr::Number {
                        value,
                        raw: Some(raw.to_string()),
                        span,
                    },
                    None => self.opaque(node),
                }
            }
            "string" => {
                let raw = self.node_text(node);
                let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or("");
                match unescape(inner) {
                    Some(value) => Expr::String {
                        value,
                        raw: Some(raw.to_string()),
                        span,
                    },
                    None => self.opaque(node),
                }
            }
            "true" => Expr::Bool { value: true, span },
            "false" => Expr::Bool { value: false, span },
            "null" => Expr::Null { span },
            "template_string" => self.template(node),
            "array" => Expr::Array {
                elements: self.elements(node),
                span,
            },
            "object" => self.object(node),
            "member_expression" => self.member(node),
            "subscript_expression" => {
                let (Some(object), Some(index)) = (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("index"),
                ) else {
                    return self.opaque(node);
                };
                Expr::Index {
                    base: Box::new(self.expr(object)),
                    index: Box::new(self.expr(index)),
                    optional: node.child_by_field_name("optional_chain").is_some(),
                    span,
                }
            }
            "call_expression" => self.call(node),
            "ternary_expression" => {
                let (Some(cond), Some(then_branch), Some(else_branch)) = (
                    node.child_by_field_name("condition"),
                    node.child_by_field_name("consequence"),
                    node.child_by_field_name("alternative"),
                ) else {
                    return self.opaque(node);
                };
                Expr::Conditional {
                    cond: Box::new(self.expr(cond)),
                    then_branch: Box::new(self.expr(then_branch)),
                    else_branch: Box::new(self.expr(else_branch)),
                    span,
                }
            }
            "binary_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .and_then(|op| BinaryOp::from_token(self.node_text(op)));
                let (Some(op), Some(left), Some(right)) = (
                    op,
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) else {
                    return self.other(node);
                };
                Expr::Binary {
                    op,
                    left: Box::new(self.expr(left)),
                    right: Box::new(self.expr(right)),
                    span,
                }
            }
            "unary_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .and_then(|op| UnaryOp::from_token(self.node_text(op)));
                let (Some(op), Some(argument)) = (op, node.child_by_field_name("argument")) else {
                    return self.other(node);
                };
                if op == UnaryOp::Delete {
                    return self.opaque(node);
                }
                Expr::Unary {
                    op,
                    expr: Box::new(self.expr(argument)),
                    span,
                }
            }
            "parenthesized_expression" => match first_named_child(node) {
                Some(inner) if inner.kind() != "sequence_expression" => Expr::Paren {
                    inner: Box::new(self.expr(inner)),
                    span,
                },
                _ => self.other(node),
            },
            "await_expression" => match first_named_child(node) {
                Some(inner) => Expr::Await {
                    expr: Box::new(self.expr(inner)),
                    span,
                },
                None => self.opaque(node),
            },
            "arrow_function" | "function_expression" | "function" => {
                Expr::Function(Box::new(self.function(node)))
            }
            "this" | "super" | "update_expression" | "assignment_expression"
            | "augmented_assignment_expression" | "yield_expression" | "class"
            | "generator_function" | "regex" => self.opaque(node),
            _ if node.named_child_count() > 0 => self.other(node),
            _ => self.opaque(node),
        }
    }

    /// Initializer of a `const`, with `as const`, `satisfies T` and parentheses peeled off.
    pub(crate) fn const_init(&self, node: Node) -> Expr {
        let mut current = node;
        loop {
            match current.kind() {
                "as_expression" | "satisfies_expression" | "parenthesized_expression" => {
                    match first_named_child(current) {
                        Some(inner) if is_expression_kind(inner.kind()) => current = inner,
                        _ => break,
                    }
                }
                _ => break,
            }
        }
        self.expr(current)
    }

    fn opaque(&self, node: Node) -> Expr {
        let mut names = Vec::new();
        collect_identifiers(self, node, &mut names);
        Expr::Opaque {
            text: self.node_text(node).to_string(),
            names,
            span: span_of(node),
        }
    }

    fn other(&self, node: Node) -> Expr {
        let mut fragments = Vec::new();
        let mut position = node.start_byte();
        self.push_fragments(node, &mut position, &mut fragments);
        push_text(&mut fragments, self.slice(position, node.end_byte()));
        Expr::Other {
            kind: node.kind().to_string(),
            fragments,
            span: span_of(node),
        }
    }

    fn push_fragments(&self, node: Node, position: &mut usize, out: &mut Vec<Fragment>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if is_expression_kind(child.kind()) {
                push_text(out, self.slice(*position, child.start_byte()));
                out.push(Fragment::Expr(self.expr(child)));
                *position = child.end_byte();
            } else if child.named_child_count() > 0 && !child.kind().contains("type") {
                self.push_fragments(child, position, out);
            }
        }
    }

    fn template(&self, node: Node) -> Expr {
        let mut parts = Vec::new();
        let mut position = node.start_byte() + 1;
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "template_substitution" {
                continue;
            }
            let text = self.slice(position, child.start_byte());
            if !text.is_empty() {
                parts.push(TemplatePart::Text(text.to_string()));
            }
            let expr = match first_named_child(child) {
                Some(inner) => self.expr(inner),
                None => return self.opaque(node),
            };
            parts.push(TemplatePart::Expr(expr));
            position = child.end_byte();
        }
        let tail = self.slice(position, node.end_byte().saturating_sub(1));
        if !tail.is_empty() {
            parts.push(TemplatePart::Text(tail.to_string()));
        }
        Expr::Template {
            parts,
            span: span_of(node),
        }
    }

    fn elements(&self, node: Node) -> Vec<Element> {
        let mut elements = Vec::new();
        let mut expecting = true;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "," => {
                    if expecting {
                        elements.push(Element::Hole);
                    }
                    expecting = true;
                }
                "comment" => {}
                "spread_element" => {
                    let inner = first_named_child(child)
                        .map_or_else(|| self.opaque(child), |inner| self.expr(inner));
                    elements.push(Element::Spread(inner));
                    expecting = false;
                }
                _ if child.is_named() => {
                    elements.push(Element::Expr(self.expr(child)));
                    expecting = false;
                }
                _ => {}
            }
        }
        elements
    }

    fn object(&self, node: Node) -> Expr {
        let mut props = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let span = span_of(child);
            match child.kind() {
                "pair" => {
                    let (Some(key), Some(value)) = (
                        child.child_by_field_name("key"),
                        child.child_by_field_name("value"),
                    ) else {
                        return self.opaque(node);
                    };
                    let Some(key) = self.prop_key(key) else {
                        return self.opaque(node);
                    };
                    props.push(Property::KeyValue {
                        key,
                        value: self.expr(value),
                        span,
                    });
                }
                "shorthand_property_identifier" => {
                    props.push(Property::Shorthand(SpannedName::new(
                        self.node_text(child),
                        span,
                    )));
                }
                "spread_element" => {
                    let expr = first_named_child(child)
                        .map_or_else(|| self.opaque(child), |inner| self.expr(inner));
                    props.push(Property::Spread { expr, span });
                }
                "comment" => {}
                _ => {
                    let mut names = Vec::new();
                    collect_identifiers(self, child, &mut names);
                    props.push(Property::Method {
                        text: self.node_text(child).to_string(),
                        names,
                        span,
                    });
                }
            }
        }
        Expr::Object {
            props,
            span: span_of(node),
        }
    }

    pub(crate) fn prop_key(&self, node: Node) -> Option<PropKey> {
        let text = self.node_text(node);
        match node.kind() {
            "property_identifier" | "private_property_identifier" | "identifier" => {
                Some(PropKey::Ident(text.to_string()))
            }
            "string" => {
                let inner = text.get(1..text.len().saturating_sub(1))?;
                Some(PropKey::String(unescape(inner)?))
            }
            "number" => Some(PropKey::Number {
                value: parse_number_literal(text)?,
                raw: text.to_string(),
            }),
            "computed_property_name" => {
                let inner = first_named_child(node)?;
                Some(PropKey::Computed(Box::new(self.expr(inner))))
            }
            _ => None,
        }
    }

    fn member(&self, node: Node) -> Expr {
        let (Some(object), Some(property)) = (
            node.child_by_field_name("object"),
            node.child_by_field_name("property"),
        ) else {
            return self.opaque(node);
        };
        Expr::Member {
            base: Box::new(self.expr(object)),
            name: SpannedName::new(self.node_text(property), span_of(property)),
            optional: node.child_by_field_name("optional_chain").is_some(),
            span: span_of(node),
        }
    }

    fn call(&self, node: Node) -> Expr {
        let (Some(function), Some(arguments)) = (
            node.child_by_field_name("function"),
            node.child_by_field_name("arguments"),
        ) else {
            return self.opaque(node);
        };
        if arguments.kind() != "arguments" {
            // Tagged template.
            return self.other(node);
        }
        let args = self
            .elements(arguments)
            .into_iter()
            .filter(|element| !matches!(element, Element::Hole))
            .collect();
        Expr::Call {
            callee: Box::new(self.expr(function)),
            args,
            optional: node.child_by_field_name("optional_chain").is_some(),
            span: span_of(node),
        }
    }

    pub(crate) fn function(&self, node: Node) -> Function {
        let name = node
            .child_by_field_name("name")
            .map(|name| SpannedName::new(self.node_text(name), span_of(name)));
        let params = if let Some(parameter) = node.child_by_field_name("parameter") {
            vec![Param {
                pattern: self.pattern(parameter),
                default: None,
                span: span_of(parameter),
            }]
        } else if let Some(parameters) = node.child_by_field_name("parameters") {
            let mut cursor = parameters.walk();
            parameters
                .named_children(&mut cursor)
                .filter(|param| param.kind() != "comment")
                .map(|param| self.param(param))
                .collect()
        } else {
            Vec::new()
        };
        let params_node = node
            .child_by_field_name("parameter")
            .or_else(|| node.child_by_field_name("parameters"));
        let head_start = node
            .child_by_field_name("type_parameters")
            .or(params_node)
            .map(|start| start.start_byte());
        let head_end = node
            .child_by_field_name("return_type")
            .or(params_node)
            .map(|end| end.end_byte());
        let head = match (head_start, head_end) {
            (Some(start), Some(end)) => self.slice(start, end).to_string(),
            _ => "()".to_string(),
        };
        let body = match node.child_by_field_name("body") {
            Some(body) if body.kind() == "statement_block" => FunctionBody::Block {
                stmts: self.block_stmts(body),
                text: self.node_text(body).to_string(),
            },
            Some(body) => FunctionBody::Expr(Box::new(self.expr(body))),
            None => FunctionBody::Block {
                stmts: Vec::new(),
                text: "{}".to_string(),
            },
        };
        Function {
            name,
            head,
            params,
            body,
            is_async: has_token(node, "async"),
            is_arrow: node.kind() == "arrow_function",
            span: span_of(node),
        }
    }

    fn param(&self, node: Node) -> Param {
        let span = span_of(node);
        match node.kind() {
            "required_parameter" | "optional_parameter" => Param {
                pattern: node.child_by_field_name("pattern").map_or_else(
                    || Pattern::Unsupported {
                        text: self.node_text(node).to_string(),
                        span,
                    },
                    |pattern| self.pattern(pattern),
                ),
                default: node.child_by_field_name("value").map(|value| self.expr(value)),
                span,
            },
            "assignment_pattern" => match (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) {
                (Some(left), Some(right)) => Param {
                    pattern: self.pattern(left),
                    default: Some(self.expr(right)),
                    span,
                },
                _ => Param {
                    pattern: self.pattern(node),
                    default: None,
                    span,
                },
            },
            _ => Param {
                pattern: self.pattern(node),
                default: None,
                span,
            },
        }
    }

    pub(crate) fn pattern(&self, node: Node) -> Pattern {
        let span = span_of(node);
        let unsupported = || Pattern::Unsupported {
            text: self.node_text(node).to_string(),
            span,
        };
        match node.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => {
                Pattern::Ident(SpannedName::new(self.node_text(node), span))
            }
            "object_pattern" => {
                let mut props = Vec::new();
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    let child_span = span_of(child);
                    match child.kind() {
                        "shorthand_property_identifier_pattern" => {
                            let name = self.node_text(child);
                            props.push(ObjectPatternProp::Field {
                                key: PropKey::Ident(name.to_string()),
                                value: Pattern::Ident(SpannedName::new(name, child_span)),
                                span: child_span,
                            });
                        }
                        "pair_pattern" => {
                            let key = child
                                .child_by_field_name("key")
                                .and_then(|key| self.prop_key(key));
                            let value = child.child_by_field_name("value");
                            let (Some(key), Some(value)) = (key, value) else {
                                return unsupported();
                            };
                            props.push(ObjectPatternProp::Field {
                                key,
                                value: self.pattern(value),
                                span: child_span,
                            });
                        }
                        "object_assignment_pattern" => {
                            let (Some(left), Some(right)) = (
                                child.child_by_field_name("left"),
                                child.child_by_field_name("right"),
                            ) else {
                                return unsupported();
                            };
                            props.push(ObjectPatternProp::Field {
                                key: PropKey::Ident(self.node_text(left).to_string()),
                                value: Pattern::Assign {
                                    target: Box::new(self.pattern(left)),
                                    default: Box::new(self.expr(right)),
                                    span: child_span,
                                },
                                span: child_span,
                            });
                        }
                        "rest_pattern" => props.push(ObjectPatternProp::Rest(self.pattern(child))),
                        "comment" => {}
                        _ => return unsupported(),
                    }
                }
                Pattern::Object { props, span }
            }
            "array_pattern" => {
                let mut elements = Vec::new();
                let mut expecting = true;
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    match child.kind() {
                        "," => {
                            if expecting {
                                elements.push(None);
                            }
                            expecting = true;
                        }
                        "comment" => {}
                        _ if child.is_named() => {
                            elements.push(Some(self.pattern(child)));
                            expecting = false;
                        }
                        _ => {}
                    }
                }
                Pattern::Array { elements, span }
            }
            "rest_pattern" => match first_named_child(node) {
                Some(inner) => Pattern::Rest {
                    inner: Box::new(self.pattern(inner)),
                    span,
                },
                None => unsupported(),
            },
            "assignment_pattern" => match (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) {
                (Some(left), Some(right)) => Pattern::Assign {
                    target: Box::new(self.pattern(left)),
                    default: Box::new(self.expr(right)),
                    span,
                },
                _ => unsupported(),
            },
            _ => unsupported(),
        }
    }

    pub(crate) fn block_stmts(&self, node: Node) -> Vec<Stmt> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|child| !matches!(child.kind(), "comment" | "empty_statement"))
            .map(|child| self.stmt(child))
            .collect()
    }

    pub(crate) fn stmt(&self, node: Node) -> Stmt {
        let span = span_of(node);
        match node.kind() {
            "return_statement" => Stmt::Return {
                value: first_named_child(node).map(|value| self.expr(value)),
                span,
            },
            "if_statement" => {
                let (Some(cond), Some(consequence)) = (
                    node.child_by_field_name("condition"),
                    node.child_by_field_name("consequence"),
                ) else {
                    return self.other_stmt(node);
                };
                let else_branch = node
                    .child_by_field_name("alternative")
                    .and_then(first_named_child)
                    .map(|alternative| Box::new(self.stmt(alternative)));
                Stmt::If {
                    cond: self.expr(cond),
                    then_branch: Box::new(self.stmt(consequence)),
                    else_branch,
                    span,
                }
            }
            "switch_statement" => {
                let (Some(value), Some(body)) = (
                    node.child_by_field_name("value"),
                    node.child_by_field_name("body"),
                ) else {
                    return self.other_stmt(node);
                };
                let mut cases = Vec::new();
                let mut cursor = body.walk();
                for case in body.named_children(&mut cursor) {
                    if !matches!(case.kind(), "switch_case" | "switch_default") {
                        continue;
                    }
                    let mut body_cursor = case.walk();
                    let body = case
                        .children_by_field_name("body", &mut body_cursor)
                        .filter(|stmt| !matches!(stmt.kind(), "comment" | "empty_statement"))
                        .map(|stmt| self.stmt(stmt))
                        .collect();
                    cases.push(SwitchCase {
                        test: case.child_by_field_name("value").map(|test| self.expr(test)),
                        body,
                        span: span_of(case),
                    });
                }
                Stmt::Switch {
                    discriminant: self.expr(value),
                    cases,
                    span,
                }
            }
            "statement_block" => Stmt::Block {
                body: self.block_stmts(node),
                span,
            },
            "expression_statement" => match first_named_child(node) {
                Some(expr) => Stmt::Expr {
                    expr: self.expr(expr),
                    span,
                },
                None => self.other_stmt(node),
            },
            _ => self.other_stmt(node),
        }
    }

    fn other_stmt(&self, node: Node) -> Stmt {
        let mut names = Vec::new();
        collect_identifiers(self, node, &mut names);
        Stmt::Other {
            kind: node.kind().to_string(),
            names,
            span: span_of(node),
        }
    }
}

fn push_text(out: &mut Vec<Fragment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Fragment::Text(previous)) = out.last_mut() {
        previous.push_str(text);
    } else {
        out.push(Fragment::Text(text.to_string()));
    }
}

/// Every identifier-like name mentioned under `node`, in source order, without duplicates.
pub(crate) fn collect_identifiers(lowering: &Lowering, node: Node, out: &mut Vec<String>) {
    match node.kind() {
        "identifier"
        | "shorthand_property_identifier"
        | "shorthand_property_identifier_pattern"
        | "this"
        | "super"
        | "undefined" => {
            let name = lowering.node_text(node);
            if !out.iter().any(|known| known == name) {
                out.push(name.to_string());
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_identifiers(lowering, child, out);
            }
        }
    }
}
