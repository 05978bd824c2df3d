//! Precedence-aware printer for lowered expressions.
//!
//! Parentheses are emitted only where the surrounding precedence requires them.
//! Literals that kept their source spelling print it unchanged; synthesized
//! strings use double quotes and numbers use `Number::toString` formatting.

use crate::syntax::ast::*;
use crate::syntax::strings::{format_number, is_identifier_name, quote};

/// Minimum precedence for an expression that starts a statement or an arrow
/// body, where a leading `{` or `function` would change the parse.
pub const STATEMENT_POSITION: u8 = 1;
/// Assignment-expression level: call arguments, array elements, property values.
pub const ASSIGNMENT: u8 = 2;
const CONDITIONAL: u8 = 3;
const UNARY: u8 = 16;
const POSTFIX: u8 = 17;
const CALL: u8 = 18;
const PRIMARY: u8 = 20;

pub fn render_expr(expr: &Expr) -> String {
    render_expr_at(expr, 0)
}

/// Renders `expr` for a position that requires at least `min_precedence`.
pub fn render_expr_at(expr: &Expr, min_precedence: u8) -> String {
    let mut out = String::new();
    write_expr(expr, min_precedence, &mut out);
    out
}

pub fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Number { value, raw, .. } => {
            let negative = raw.is_none() && (*value < 0.0 || *value == f64::NEG_INFINITY);
            if negative { UNARY } else { PRIMARY }
        }
        Expr::Ident(_)
        | Expr::String { .. }
        | Expr::Bool { .. }
        | Expr::Null { .. }
        | Expr::Template { .. }
        | Expr::Array { .. }
        | Expr::Object { .. }
        | Expr::Paren { .. } => PRIMARY,
        Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => CALL,
        Expr::Conditional { .. } => CONDITIONAL,
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary { .. } | Expr::Await { .. } => UNARY,
        Expr::Function(function) => {
            if function.is_arrow {
                ASSIGNMENT
            } else {
                PRIMARY
            }
        }
        Expr::Other { kind, .. } => match kind.as_str() {
            "new_expression" | "non_null_expression" | "instantiation_expression" => POSTFIX,
            "type_assertion" => UNARY,
            "parenthesized_expression" => PRIMARY,
            "as_expression" | "satisfies_expression" => 11,
            _ => ASSIGNMENT,
        },
        Expr::Opaque { text, .. } => {
            if is_identifier_name(text) || text.starts_with('/') {
                PRIMARY
            } else {
                ASSIGNMENT
            }
        }
    }
}

/// Whether the printed form begins with `{`, `function` or `class`.
fn starts_ambiguously(expr: &Expr) -> bool {
    match expr {
        Expr::Object { .. } => true,
        Expr::Function(function) => !function.is_arrow,
        Expr::Binary { left, .. } => starts_ambiguously(left),
        Expr::Member { base, .. } | Expr::Index { base, .. } => starts_ambiguously(base),
        Expr::Call { callee, .. } => starts_ambiguously(callee),
        Expr::Conditional { cond, .. } => starts_ambiguously(cond),
        Expr::Other { fragments, .. } => match fragments.first() {
            Some(Fragment::Expr(first)) => starts_ambiguously(first),
            Some(Fragment::Text(text)) => text.starts_with('{'),
            None => false,
        },
        Expr::Opaque { text, .. } => {
            text.starts_with('{') || text.starts_with("function") || text.starts_with("class")
        }
        _ => false,
    }
}

fn write_expr(expr: &Expr, min_precedence: u8, out: &mut String) {
    let wrap = precedence(expr) < min_precedence
        || (min_precedence == STATEMENT_POSITION && starts_ambiguously(expr));
    if wrap {
        out.push('(');
        write_bare(expr, out);
        out.push(')');
    } else {
        write_bare(expr, out);
    }
}

fn write_bare(expr: &Expr, out: &mut String) {
    match expr {
        Expr::Ident(name) => out.push_str(&name.name),
        Expr::Number { value, raw, .. } => match raw {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&format_number(*value)),
        },
        Expr::String { value, raw, .. } => match raw {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&quote(value)),
        },
        Expr::Bool { value, .. } => out.push_str(if *value { "true" } else { "false" }),
        Expr::Null { .. } => out.push_str("null"),
        Expr::Template { parts, .. } => {
            out.push('`');
            for part in parts {
                match part {
                    TemplatePart::Text(text) => out.push_str(text),
                    TemplatePart::Expr(expr) => {
                        out.push_str("${");
                        write_expr(expr, 0, out);
                        out.push('}');
                    }
                }
            }
            out.push('`');
        }
        Expr::Array { elements, .. } => {
            out.push('[');
            write_elements(elements, out);
            if matches!(elements.last(), Some(Element::Hole)) {
                out.push(',');
            }
            out.push(']');
        }
        Expr::Object { props, .. } => write_object(props, out),
        Expr::Member {
            base,
            name,
            optional,
            ..
        } => {
            write_member_base(base, out);
            out.push_str(if *optional { "?." } else { "." });
            out.push_str(&name.name);
        }
        Expr::Index {
            base,
            index,
            optional,
            ..
        } => {
            write_member_base(base, out);
            if *optional {
                out.push_str("?.");
            }
            out.push('[');
            write_expr(index, 0, out);
            out.push(']');
        }
        Expr::Call {
            callee,
            args,
            optional,
            ..
        } => {
            write_member_base(callee, out);
            if *optional {
                out.push_str("?.");
            }
            out.push('(');
            write_elements(args, out);
            out.push(')');
        }
        Expr::Conditional {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            write_expr(cond, CONDITIONAL + 1, out);
            out.push_str(" ? ");
            write_expr(then_branch, ASSIGNMENT, out);
            out.push_str(" : ");
            write_expr(else_branch, ASSIGNMENT, out);
        }
        Expr::Binary {
            op, left, right, ..
        } => {
            let precedence = op.precedence();
            let (left_min, right_min) = if *op == BinaryOp::Exp {
                (POSTFIX, precedence)
            } else {
                (precedence, precedence + 1)
            };
            write_operand(*op, left, left_min, out);
            out.push(' ');
            out.push_str(op.as_str());
            out.push(' ');
            write_operand(*op, right, right_min, out);
        }
        Expr::Unary { op, expr, .. } => {
            out.push_str(op.as_str());
            let operand = render_expr_at(expr, UNARY);
            let word = op.as_str().chars().all(char::is_alphabetic);
            let sign_clash = matches!(op, UnaryOp::Neg | UnaryOp::Plus)
                && operand.starts_with(op.as_str());
            if word {
                out.push(' ');
            }
            if sign_clash {
                out.push('(');
                out.push_str(&operand);
                out.push(')');
            } else {
                out.push_str(&operand);
            }
        }
        Expr::Paren { inner, .. } => {
            out.push('(');
            write_expr(inner, 0, out);
            out.push(')');
        }
        Expr::Await { expr, .. } => {
            out.push_str("await ");
            write_expr(expr, UNARY, out);
        }
        Expr::Function(function) => write_function(function, out),
        Expr::Other { kind, fragments, .. } => {
            let new_callee = if kind == "new_expression" {
                fragments
                    .iter()
                    .position(|fragment| matches!(fragment, Fragment::Expr(_)))
            } else {
                None
            };
            for (index, fragment) in fragments.iter().enumerate() {
                match fragment {
                    Fragment::Text(text) => out.push_str(text),
                    Fragment::Expr(expr) if new_callee == Some(index) && calls_in_chain(expr) => {
                        out.push('(');
                        write_bare(expr, out);
                        out.push(')');
                    }
                    Fragment::Expr(expr) => {
                        let min = if in_list_slot(fragments, index) {
                            ASSIGNMENT
                        } else {
                            CALL
                        };
                        write_expr(expr, min, out);
                    }
                }
            }
        }
        Expr::Opaque { text, .. } => out.push_str(text),
    }
}

fn write_operand(parent: BinaryOp, operand: &Expr, min_precedence: u8, out: &mut String) {
    let mixes_nullish = match operand {
        Expr::Binary { op, .. } => {
            (parent == BinaryOp::Nullish && matches!(op, BinaryOp::And | BinaryOp::Or))
                || (matches!(parent, BinaryOp::And | BinaryOp::Or) && *op == BinaryOp::Nullish)
        }
        _ => false,
    };
    if mixes_nullish {
        out.push('(');
        write_bare(operand, out);
        out.push(')');
    } else {
        write_expr(operand, min_precedence, out);
    }
}

fn write_member_base(base: &Expr, out: &mut String) {
    let bare_number = matches!(base, Expr::Number { .. });
    if bare_number {
        out.push('(');
        write_bare(base, out);
        out.push(')');
    } else {
        write_expr(base, CALL, out);
    }
}

/// A `new` callee containing a call would take that call's argument list as
/// its own, and `new` rejects optional chains outright.
fn calls_in_chain(expr: &Expr) -> bool {
    match expr {
        Expr::Call { .. } => true,
        Expr::Member { base, optional, .. } | Expr::Index { base, optional, .. } => {
            *optional || calls_in_chain(base)
        }
        _ => false,
    }
}

fn write_elements(elements: &[Element], out: &mut String) {
    for (index, element) in elements.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        match element {
            Element::Expr(expr) => write_expr(expr, ASSIGNMENT, out),
            Element::Spread(expr) => {
                out.push_str("...");
                write_expr(expr, ASSIGNMENT, out);
            }
            Element::Hole => {}
        }
    }
}

fn write_object(props: &[Property], out: &mut String) {
    if props.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push_str("{ ");
    for (index, prop) in props.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        match prop {
            Property::KeyValue { key, value, .. } => {
                write_prop_key(key, out);
                out.push_str(": ");
                write_expr(value, ASSIGNMENT, out);
            }
            Property::Shorthand(name) => out.push_str(&name.name),
            Property::Spread { expr, .. } => {
                out.push_str("...");
                write_expr(expr, ASSIGNMENT, out);
            }
            Property::Method { text, .. } => out.push_str(text),
        }
    }
    out.push_str(" }");
}

pub fn write_prop_key(key: &PropKey, out: &mut String) {
    match key {
        PropKey::Ident(name) => out.push_str(name),
        PropKey::String(value) => out.push_str(&quote(value)),
        PropKey::Number { raw, .. } => out.push_str(raw),
        PropKey::Computed(expr) => {
            out.push('[');
            write_expr(expr, ASSIGNMENT, out);
            out.push(']');
        }
    }
}

fn write_function(function: &Function, out: &mut String) {
    if function.is_async {
        out.push_str("async ");
    }
    if !function.is_arrow {
        out.push_str("function");
        if let Some(name) = &function.name {
            out.push(' ');
            out.push_str(&name.name);
        }
    }
    out.push_str(&function.head);
    match &function.body {
        FunctionBody::Expr(body) => {
            out.push_str(" => ");
            write_expr(body, STATEMENT_POSITION, out);
        }
        FunctionBody::Block { text, .. } => {
            out.push_str(if function.is_arrow { " => " } else { " " });
            out.push_str(text);
        }
    }
}

/// True when the fragment sits between `(`/`,` and `)`/`,`, i.e. in an argument or element list.
fn in_list_slot(fragments: &[Fragment], index: usize) -> bool {
    let before = match index.checked_sub(1).and_then(|prev| fragments.get(prev)) {
        Some(Fragment::Text(text)) => text.trim_end(),
        _ => return false,
    };
    let after = match fragments.get(index + 1) {
        Some(Fragment::Text(text)) => text.trim_start(),
        _ => return false,
    };
    (before.ends_with('(') || before.ends_with(',') || before.ends_with('['))
        && (after.starts_with(')') || after.starts_with(',') || after.starts_with(']'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;
    use crate::syntax::parse_expression;

    fn roundtrip(text: &str) -> String {
        render_expr(&parse_expression(text).unwrap())
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: Span::default(),
        }
    }

    fn name(text: &str) -> Expr {
        Expr::ident(text, Span::default())
    }

    #[test]
    fn keeps_source_spelling() {
        assert_eq!(roundtrip("'single' + 0x1F"), "'single' + 0x1F");
        assert_eq!(roundtrip("a?.b[c](...rest)"), "a?.b[c](...rest)");
    }

    #[test]
    fn inserts_parens_by_precedence() {
        let sum = binary(BinaryOp::Add, name("a"), name("b"));
        let product = binary(BinaryOp::Mul, sum.clone(), name("c"));
        assert_eq!(render_expr(&product), "(a + b) * c");
        let nested = binary(BinaryOp::Sub, name("x"), sum);
        assert_eq!(render_expr(&nested), "x - (a + b)");
        let neg = Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(name("a")),
            span: Span::default(),
        };
        let power = binary(BinaryOp::Exp, neg, Expr::number(2.0, Span::default()));
        assert_eq!(render_expr(&power), "(-a) ** 2");
    }

    #[test]
    fn separates_nullish_from_logical() {
        let or = binary(BinaryOp::Or, name("a"), name("b"));
        let nullish = binary(BinaryOp::Nullish, or, name("c"));
        assert_eq!(render_expr(&nullish), "(a || b) ?? c");
    }

    #[test]
    fn prints_aggregates_and_synthesized_literals() {
        let array = Expr::Array {
            elements: vec![
                Element::Expr(Expr::number(2.0, Span::default())),
                Element::Expr(Expr::string("two", Span::default())),
                Element::Hole,
            ],
            span: Span::default(),
        };
        assert_eq!(render_expr(&array), "[2, \"two\", ,]");
        assert_eq!(roundtrip("{}"), "{}");
        assert_eq!(roundtrip("{a: 1, 'b-c': [x]}"), "{ a: 1, \"b-c\": [x] }");
    }

    #[test]
    fn wraps_object_bodies_and_number_bases() {
        assert_eq!(roundtrip("(x: number) => ({ x })"), "(x: number) => ({ x })");
        let member = Expr::Member {
            base: Box::new(Expr::number(1.0, Span::default())),
            name: SpannedName::new("toFixed", Span::default()),
            optional: false,
            span: Span::default(),
        };
        assert_eq!(render_expr(&member), "(1).toFixed");
        assert_eq!(render_expr_at(&roundtrip_expr("{ a: 1 }"), STATEMENT_POSITION), "({ a: 1 })");
    }

    fn roundtrip_expr(text: &str) -> Expr {
        parse_expression(text).unwrap()
    }

    fn new_with_callee(callee: &str) -> Expr {
        let mut expr = roundtrip_expr("new C(1)");
        let Expr::Other { fragments, .. } = &mut expr else {
            panic!("expected a new expression");
        };
        let slot = fragments
            .iter_mut()
            .find(|fragment| matches!(fragment, Fragment::Expr(_)))
            .unwrap();
        *slot = Fragment::Expr(roundtrip_expr(callee));
        expr
    }

    #[test]
    fn wraps_new_callees_that_contain_calls() {
        assert_eq!(render_expr(&new_with_callee("factory()")), "new (factory())(1)");
        assert_eq!(render_expr(&new_with_callee("ns.load().Kind")), "new (ns.load().Kind)(1)");
        assert_eq!(render_expr(&new_with_callee("a?.B")), "new (a?.B)(1)");
        assert_eq!(render_expr(&new_with_callee("ns.Kind")), "new ns.Kind(1)");
    }

    #[test]
    fn keeps_parenthesized_optional_chains() {
        assert_eq!(roundtrip("(a?.b).x"), "(a?.b).x");
        assert_eq!(roundtrip("a?.b.x"), "a?.b.x");
    }
}
