//! Primitive literal values and the operator semantics the folder applies to them.

use crate::diagnostics::Span;
use crate::syntax::{
    Element, Expr, PropKey, Property, TemplatePart, UnaryOp, BinaryOp, format_number, unescape,
};

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Undefined,
}

impl LiteralValue {
    /// Reads a literal node. Sees through parentheses and signed numbers, never through names
    /// other than `undefined`, `NaN` and `Infinity`.
    pub fn from_expr(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::Number { value, .. } => Some(Self::Number(*value)),
            Expr::String { value, .. } => Some(Self::String(value.clone())),
            Expr::Bool { value, .. } => Some(Self::Bool(*value)),
            Expr::Null { .. } => Some(Self::Null),
            Expr::Ident(name) => match name.name.as_str() {
                "undefined" => Some(Self::Undefined),
                "NaN" => Some(Self::Number(f64::NAN)),
                "Infinity" => Some(Self::Number(f64::INFINITY)),
                _ => None,
            },
            Expr::Paren { inner, .. } => Self::from_expr(inner),
            Expr::Unary {
                op: op @ (UnaryOp::Neg | UnaryOp::Plus),
                expr,
                ..
            } => match Self::from_expr(expr)? {
                Self::Number(value) if *op == UnaryOp::Neg => Some(Self::Number(-value)),
                Self::Number(value) => Some(Self::Number(value)),
                _ => None,
            },
            Expr::Template { parts, .. } => {
                let mut raw = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => raw.push_str(text),
                        TemplatePart::Expr(_) => return None,
                    }
                }
                unescape(&raw).map(Self::String)
            }
            _ => None,
        }
    }

    /// Literal node for the value. Negative numbers become a negation of their magnitude.
    pub fn to_expr(&self, span: Span) -> Expr {
        match self {
            Self::Number(value) if value.is_nan() => Expr::ident("NaN", span),
            Self::Number(value) if value.is_sign_negative() && *value != 0.0 => Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(Self::Number(-value).to_expr(span)),
                span,
            },
            Self::Number(value) if value.is_infinite() => Expr::ident("Infinity", span),
            Self::Number(value) => Expr::number(*value, span),
            Self::String(value) => Expr::string(value.clone(), span),
            Self::Bool(value) => Expr::Bool {
                value: *value,
                span,
            },
            Self::Null => Expr::Null { span },
            Self::Undefined => Expr::ident("undefined", span),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Number(value) => *value != 0.0 && !value.is_nan(),
            Self::String(value) => !value.is_empty(),
            Self::Bool(value) => *value,
            Self::Null | Self::Undefined => false,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    /// Number, string or boolean.
    pub fn is_primitive_key(&self) -> bool {
        matches!(self, Self::Number(_) | Self::String(_) | Self::Bool(_))
    }

    pub fn to_js_string(&self) -> String {
        match self {
            Self::Number(value) => format_number(*value),
            Self::String(value) => value.clone(),
            Self::Bool(value) => value.to_string(),
            Self::Null => "null".to_string(),
            Self::Undefined => "undefined".to_string(),
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Number(value) => *value,
            Self::String(value) => string_to_number(value),
            Self::Bool(value) => f64::from(u8::from(*value)),
            Self::Null => 0.0,
            Self::Undefined => f64::NAN,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Bool(_) => "boolean",
            Self::Null => "object",
            Self::Undefined => "undefined",
        }
    }

    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::String(left), Self::String(right)) => left == right,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Null, Self::Null) | (Self::Undefined, Self::Undefined) => true,
            _ => false,
        }
    }

    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (left, right) if left.is_nullish() || right.is_nullish() => {
                left.is_nullish() && right.is_nullish()
            }
            (Self::String(left), Self::String(right)) => left == right,
            (left, right) => left.to_number() == right.to_number(),
        }
    }
}

/// ECMAScript `StringToNumber`.
fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let lower = trimmed.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            if digits.is_empty() {
                return f64::NAN;
            }
            return digits
                .chars()
                .try_fold(0f64, |acc, ch| {
                    ch.to_digit(radix)
                        .map(|digit| acc * f64::from(radix) + f64::from(digit))
                })
                .unwrap_or(f64::NAN);
        }
    }
    let numeric = trimmed
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-'));
    if !numeric {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn compare(left: &LiteralValue, right: &LiteralValue) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (LiteralValue::String(left), LiteralValue::String(right)) => {
            Some(left.encode_utf16().cmp(right.encode_utf16()))
        }
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

/// Applies a binary operator to two literal operands. `None` for operators the
/// folder leaves alone (bitwise, `in`, `instanceof`).
pub fn apply_binary(op: BinaryOp, left: &LiteralValue, right: &LiteralValue) -> Option<LiteralValue> {
    use std::cmp::Ordering;

    let number = |value: f64| Some(LiteralValue::Number(value));
    let boolean = |value: bool| Some(LiteralValue::Bool(value));
    match op {
        BinaryOp::Add => match (left, right) {
            (LiteralValue::String(_), _) | (_, LiteralValue::String(_)) => Some(
                LiteralValue::String(format!("{}{}", left.to_js_string(), right.to_js_string())),
            ),
            _ => number(left.to_number() + right.to_number()),
        },
        BinaryOp::Sub => number(left.to_number() - right.to_number()),
        BinaryOp::Mul => number(left.to_number() * right.to_number()),
        BinaryOp::Div => number(left.to_number() / right.to_number()),
        BinaryOp::Rem => number(left.to_number() % right.to_number()),
        BinaryOp::Exp => number(left.to_number().powf(right.to_number())),
        BinaryOp::StrictEq => boolean(left.strict_eq(right)),
        BinaryOp::StrictNotEq => boolean(!left.strict_eq(right)),
        BinaryOp::Eq => boolean(left.loose_eq(right)),
        BinaryOp::NotEq => boolean(!left.loose_eq(right)),
        BinaryOp::Lt => boolean(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Gt => boolean(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::LtEq => boolean(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::GtEq => boolean(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::And => Some(if left.truthy() { right.clone() } else { left.clone() }),
        BinaryOp::Or => Some(if left.truthy() { left.clone() } else { right.clone() }),
        BinaryOp::Nullish => Some(if left.is_nullish() { right.clone() } else { left.clone() }),
        BinaryOp::BitAnd
        | BinaryOp::BitOr
        | BinaryOp::BitXor
        | BinaryOp::Shl
        | BinaryOp::Shr
        | BinaryOp::UShr
        | BinaryOp::In
        | BinaryOp::InstanceOf => None,
    }
}

pub fn apply_unary(op: UnaryOp, value: &LiteralValue) -> Option<LiteralValue> {
    match op {
        UnaryOp::Not => Some(LiteralValue::Bool(!value.truthy())),
        UnaryOp::Neg => Some(LiteralValue::Number(-value.to_number())),
        UnaryOp::Plus => Some(LiteralValue::Number(value.to_number())),
        UnaryOp::TypeOf => Some(LiteralValue::String(value.type_of().to_string())),
        UnaryOp::Void => Some(LiteralValue::Undefined),
        UnaryOp::BitNot | UnaryOp::Delete => None,
    }
}

/// Whether `expr` is a literal all the way down: numbers (optionally signed),
/// strings, booleans, and arrays / objects built only from those.
pub fn is_deep_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Number { .. } | Expr::String { .. } | Expr::Bool { .. } => true,
        Expr::Unary {
            op: UnaryOp::Neg | UnaryOp::Plus,
            expr,
            ..
        } => matches!(**expr, Expr::Number { .. }),
        Expr::Template { parts, .. } => parts
            .iter()
            .all(|part| matches!(part, TemplatePart::Text(_))),
        Expr::Array { elements, .. } => elements.iter().all(|element| match element {
            Element::Expr(expr) => is_deep_literal(expr),
            Element::Spread(_) | Element::Hole => false,
        }),
        Expr::Object { props, .. } => props.iter().all(|prop| match prop {
            Property::KeyValue { key, value, .. } => {
                !matches!(key, PropKey::Computed(_)) && is_deep_literal(value)
            }
            Property::Shorthand(_) | Property::Spread { .. } | Property::Method { .. } => false,
        }),
        _ => false,
    }
}

/// Property name a key denotes at runtime; `None` for computed keys.
pub fn key_name(key: &PropKey) -> Option<String> {
    match key {
        PropKey::Ident(name) | PropKey::String(name) => Some(name.clone()),
        PropKey::Number { value, .. } => Some(format_number(*value)),
        PropKey::Computed(_) => None,
    }
}

/// Whether evaluating `expr` can have no side effects and is cheap to duplicate.
pub fn is_trivially_pure(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(_)
        | Expr::Number { .. }
        | Expr::String { .. }
        | Expr::Bool { .. }
        | Expr::Null { .. }
        | Expr::Function(_) => true,
        Expr::Paren { inner, .. } => is_trivially_pure(inner),
        Expr::Member { base, .. } => is_trivially_pure(base),
        Expr::Index { base, index, .. } => is_trivially_pure(base) && is_trivially_pure(index),
        Expr::Unary { op, expr, .. } => {
            matches!(op, UnaryOp::Neg | UnaryOp::Plus | UnaryOp::Not) && is_trivially_pure(expr)
        }
        Expr::Template { parts, .. } => parts.iter().all(|part| match part {
            TemplatePart::Text(_) => true,
            TemplatePart::Expr(expr) => is_trivially_pure(expr),
        }),
        Expr::Array { elements, .. } => elements.iter().all(|element| match element {
            Element::Expr(expr) => is_trivially_pure(expr),
            Element::Hole => true,
            Element::Spread(_) => false,
        }),
        Expr::Object { props, .. } => props.iter().all(|prop| match prop {
            Property::KeyValue { key, value, .. } => {
                !matches!(key, PropKey::Computed(_)) && is_trivially_pure(value)
            }
            Property::Shorthand(_) => true,
            Property::Spread { .. } | Property::Method { .. } => false,
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_expression;

    fn lit(text: &str) -> LiteralValue {
        LiteralValue::from_expr(&parse_expression(text).unwrap()).unwrap()
    }

    #[test]
    fn reads_signed_numbers_and_plain_templates() {
        assert_eq!(lit("-1"), LiteralValue::Number(-1.0));
        assert_eq!(lit("(+2)"), LiteralValue::Number(2.0));
        assert_eq!(lit("`a\\tb`"), LiteralValue::String("a\tb".to_string()));
        assert_eq!(lit("undefined"), LiteralValue::Undefined);
        assert!(LiteralValue::from_expr(&parse_expression("`${x}`").unwrap()).is_none());
    }

    #[test]
    fn arithmetic_follows_number_semantics() {
        let add = apply_binary(BinaryOp::Add, &lit("1"), &lit("'2'"));
        assert_eq!(add, Some(LiteralValue::String("12".to_string())));
        let rem = apply_binary(BinaryOp::Rem, &lit("-7"), &lit("3"));
        assert_eq!(rem, Some(LiteralValue::Number(-1.0)));
        let div = apply_binary(BinaryOp::Div, &lit("1"), &lit("0"));
        assert_eq!(div, Some(LiteralValue::Number(f64::INFINITY)));
        let sub = apply_binary(BinaryOp::Sub, &lit("'5'"), &lit("true"));
        assert_eq!(sub, Some(LiteralValue::Number(4.0)));
    }

    #[test]
    fn equality_and_comparison() {
        assert_eq!(
            apply_binary(BinaryOp::Eq, &lit("null"), &lit("undefined")),
            Some(LiteralValue::Bool(true))
        );
        assert_eq!(
            apply_binary(BinaryOp::StrictEq, &lit("1"), &lit("'1'")),
            Some(LiteralValue::Bool(false))
        );
        assert_eq!(
            apply_binary(BinaryOp::Eq, &lit("1"), &lit("'1'")),
            Some(LiteralValue::Bool(true))
        );
        assert_eq!(
            apply_binary(BinaryOp::Lt, &lit("'b'"), &lit("'a'")),
            Some(LiteralValue::Bool(false))
        );
        assert_eq!(
            apply_binary(BinaryOp::GtEq, &lit("NaN"), &lit("1")),
            Some(LiteralValue::Bool(false))
        );
        assert_eq!(apply_binary(BinaryOp::BitOr, &lit("1"), &lit("2")), None);
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(
            apply_binary(BinaryOp::Or, &lit("''"), &lit("'fallback'")),
            Some(LiteralValue::String("fallback".to_string()))
        );
        assert_eq!(
            apply_binary(BinaryOp::Nullish, &lit("0"), &lit("5")),
            Some(LiteralValue::Number(0.0))
        );
    }

    #[test]
    fn deep_literal_classification() {
        let yes = ["1", "-1", "'s'", "true", "[1, [2, 'x']]", "{ a: 1, 'b': [true], 3: -2 }"];
        for text in yes {
            assert!(is_deep_literal(&parse_expression(text).unwrap()), "{text}");
        }
        let no = ["x", "null", "[1, ...xs]", "[1, , 2]", "{ [k]: 1 }", "{ a }", "f()", "-x"];
        for text in no {
            assert!(!is_deep_literal(&parse_expression(text).unwrap()), "{text}");
        }
    }

    #[test]
    fn negative_values_round_trip_through_expressions() {
        let expr = LiteralValue::Number(-2.5).to_expr(Span::default());
        assert_eq!(LiteralValue::from_expr(&expr), Some(LiteralValue::Number(-2.5)));
        assert!(is_deep_literal(&expr));
    }

    #[test]
    fn string_to_number_rejects_words() {
        assert_eq!(lit("' 42 '").to_number(), 42.0);
        assert_eq!(lit("''").to_number(), 0.0);
        assert!(lit("'inf'").to_number().is_nan());
        assert_eq!(lit("'0x10'").to_number(), 16.0);
    }
}
