//! Constant environments and literal resolution through them.

use rustc_hash::FxHashMap;

use crate::diagnostics::Span;
use crate::literal::{LiteralValue, apply_binary, apply_unary, is_trivially_pure, key_name};
use crate::syntax::{Element, Expr, PropKey, Property, TemplatePart, expr_span, format_number, unescape};

/// How many identifier bindings `resolve` follows before giving up.
pub const MAX_RESOLVE_DEPTH: usize = 8;

/// Names bound to expressions known to be deep literals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstEnv {
    bindings: FxHashMap<String, Expr>,
}

impl ConstEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Expr) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.bindings.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Expr> {
        self.bindings.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.bindings.iter().map(|(name, expr)| (name.as_str(), expr))
    }

    /// `self` without `names`, for scopes that rebind them.
    pub fn without<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> ConstEnv {
        let mut pruned = self.clone();
        for name in names {
            pruned.remove(name);
        }
        pruned
    }
}

/// Resolves `expr` to a deep literal through `env`: identifiers are followed,
/// aggregates are materialized with spreads spliced, member / index access on
/// resolvable aggregates selects the member, and operators over resolved
/// operands are applied. `None` when anything along the way is not literal.
pub fn resolve(expr: &Expr, env: &ConstEnv) -> Option<Expr> {
    resolve_at(expr, env, 0)
}

pub fn resolve_at(expr: &Expr, env: &ConstEnv, depth: usize) -> Option<Expr> {
    if depth > MAX_RESOLVE_DEPTH {
        return None;
    }
    match expr {
        Expr::Ident(name) => {
            let bound = env.get(&name.name)?;
            resolve_at(bound, env, depth + 1)
        }
        Expr::Number { .. } | Expr::String { .. } | Expr::Bool { .. } => Some(expr.clone()),
        Expr::Template { parts, span } => {
            let mut text = String::new();
            for part in parts {
                match part {
                    TemplatePart::Text(raw) => text.push_str(&unescape(raw)?),
                    TemplatePart::Expr(part) => {
                        let value = LiteralValue::from_expr(&resolve_at(part, env, depth)?)?;
                        text.push_str(&value.to_js_string());
                    }
                }
            }
            Some(Expr::string(text, *span))
        }
        Expr::Paren { inner, .. } => resolve_at(inner, env, depth),
        Expr::Unary {
            op,
            expr: operand,
            span,
        } => {
            let value = LiteralValue::from_expr(&resolve_at(operand, env, depth)?)?;
            literal_expr(apply_unary(*op, &value)?, *span)
        }
        Expr::Binary {
            op,
            left,
            right,
            span,
        } => {
            let left = LiteralValue::from_expr(&resolve_at(left, env, depth)?)?;
            let right = LiteralValue::from_expr(&resolve_at(right, env, depth)?)?;
            literal_expr(apply_binary(*op, &left, &right)?, *span)
        }
        Expr::Conditional {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            let cond = LiteralValue::from_expr(&resolve_at(cond, env, depth)?)?;
            let chosen = if cond.truthy() { then_branch } else { else_branch };
            resolve_at(chosen, env, depth)
        }
        Expr::Array { elements, span } => {
            let mut resolved = Vec::with_capacity(elements.len());
            for element in elements {
                match element {
                    Element::Expr(item) => resolved.push(Element::Expr(resolve_at(item, env, depth)?)),
                    Element::Spread(source) => match resolve_at(source, env, depth)? {
                        Expr::Array { elements, .. } => resolved.extend(elements),
                        _ => return None,
                    },
                    Element::Hole => return None,
                }
            }
            Some(Expr::Array {
                elements: resolved,
                span: *span,
            })
        }
        Expr::Object { props, span } => {
            let mut resolved = Vec::with_capacity(props.len());
            for prop in props {
                match prop {
                    Property::KeyValue { key, value, span } => {
                        if matches!(key, PropKey::Computed(_)) {
                            return None;
                        }
                        let value = resolve_at(value, env, depth)?;
                        merge_property(
                            &mut resolved,
                            Property::KeyValue {
                                key: key.clone(),
                                value,
                                span: *span,
                            },
                        );
                    }
                    Property::Shorthand(name) => {
                        let value = resolve_at(&Expr::Ident(name.clone()), env, depth)?;
                        merge_property(
                            &mut resolved,
                            Property::KeyValue {
                                key: PropKey::Ident(name.name.clone()),
                                value,
                                span: name.span,
                            },
                        );
                    }
                    Property::Spread { expr, .. } => match resolve_at(expr, env, depth)? {
                        Expr::Object { props, .. } => {
                            for prop in props {
                                merge_property(&mut resolved, prop);
                            }
                        }
                        _ => return None,
                    },
                    Property::Method { .. } => return None,
                }
            }
            Some(Expr::Object {
                props: resolved,
                span: *span,
            })
        }
        Expr::Member { base, name, .. } => {
            let base = resolve_at(base, env, depth)?;
            select(&base, &name.name, expr_span(expr))
        }
        Expr::Index { base, index, .. } => {
            let base = resolve_at(base, env, depth)?;
            let index = resolve_at(index, env, depth)?;
            match LiteralValue::from_expr(&index)? {
                LiteralValue::Number(position) => select_index(&base, position),
                LiteralValue::String(key) => select(&base, &key, expr_span(expr)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Only finite numbers, strings and booleans are deep literals.
fn literal_expr(value: LiteralValue, span: Span) -> Option<Expr> {
    match value {
        LiteralValue::Number(number) if number.is_finite() => Some(value.to_expr(span)),
        LiteralValue::String(_) | LiteralValue::Bool(_) => Some(value.to_expr(span)),
        _ => None,
    }
}

/// Member `name` of a literal aggregate: an object property or an array / string `length`.
pub fn select(base: &Expr, name: &str, span: Span) -> Option<Expr> {
    match base {
        Expr::Object { props, .. } => {
            for prop in props.iter().rev() {
                match prop {
                    Property::KeyValue { key, value, .. } => {
                        if key_name(key).as_deref() == Some(name) {
                            return Some(value.clone());
                        }
                    }
                    Property::Shorthand(shorthand) => {
                        if shorthand.name == name {
                            return Some(Expr::Ident(shorthand.clone()));
                        }
                    }
                    Property::Spread { .. } | Property::Method { .. } => return None,
                }
            }
            None
        }
        Expr::Array { elements, .. } if name == "length" => elements
            .iter()
            .all(|element| !matches!(element, Element::Spread(_)))
            .then(|| Expr::number(elements.len() as f64, span)),
        Expr::String { value, .. } if name == "length" => {
            Some(Expr::number(value.encode_utf16().count() as f64, span))
        }
        _ => None,
    }
}

/// Element at a non-negative, in-range integer position of a literal array.
pub fn select_index(base: &Expr, position: f64) -> Option<Expr> {
    let Expr::Array { elements, .. } = base else {
        return match base {
            Expr::Object { .. } => select(base, &format_number(position), expr_span(base)),
            _ => None,
        };
    };
    if position < 0.0 || position.fract() != 0.0 || position >= elements.len() as f64 {
        return None;
    }
    let position = position as usize;
    if elements[..position]
        .iter()
        .any(|element| matches!(element, Element::Spread(_)))
    {
        return None;
    }
    match elements.get(position)? {
        Element::Expr(item) => Some(item.clone()),
        Element::Spread(_) | Element::Hole => None,
    }
}

/// Adds `prop` to an object under construction. A key that already exists is
/// overwritten in place, keeping its first position, unless a spread or method
/// sits between the two or either value has side effects; then the new
/// property is appended.
pub fn merge_property(props: &mut Vec<Property>, prop: Property) {
    let (name, pure) = match &prop {
        Property::KeyValue { key, value, .. } => (key_name(key), is_trivially_pure(value)),
        Property::Shorthand(name) => (Some(name.name.clone()), true),
        Property::Spread { .. } | Property::Method { .. } => (None, false),
    };
    let Some(name) = name else {
        props.push(prop);
        return;
    };
    for index in (0..props.len()).rev() {
        let replaceable = match &props[index] {
            Property::KeyValue { key, value, .. } => {
                if key_name(key).as_deref() != Some(name.as_str()) {
                    continue;
                }
                pure && is_trivially_pure(value)
            }
            Property::Shorthand(existing) => {
                if existing.name != name {
                    continue;
                }
                pure
            }
            Property::Spread { .. } | Property::Method { .. } => false,
        };
        if replaceable {
            props[index] = prop;
            return;
        }
        break;
    }
    props.push(prop);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_expression, render_expr};

    fn env(bindings: &[(&str, &str)]) -> ConstEnv {
        let mut env = ConstEnv::new();
        for (name, text) in bindings {
            env.insert(*name, parse_expression(text).unwrap());
        }
        env
    }

    fn resolved(text: &str, env: &ConstEnv) -> Option<String> {
        resolve(&parse_expression(text).unwrap(), env).map(|expr| render_expr(&expr))
    }

    #[test]
    fn follows_aliases_and_selects_members() {
        let env = env(&[
            ("CONFIG", "{ mode: 'fast', sizes: [1, 2, 3] }"),
            ("ALIAS", "CONFIG"),
            ("KEY", "'mode'"),
        ]);
        assert_eq!(resolved("ALIAS.mode", &env).as_deref(), Some("'fast'"));
        assert_eq!(resolved("CONFIG[KEY]", &env).as_deref(), Some("'fast'"));
        assert_eq!(resolved("CONFIG.sizes[2]", &env).as_deref(), Some("3"));
        assert_eq!(resolved("CONFIG.sizes.length", &env).as_deref(), Some("3"));
        assert_eq!(resolved("-CONFIG.sizes[0]", &env).as_deref(), Some("-1"));
    }

    #[test]
    fn rejects_out_of_range_and_unknown_access() {
        let env = env(&[("LIST", "[10, 20]")]);
        assert_eq!(resolved("LIST[2]", &env), None);
        assert_eq!(resolved("LIST[-1]", &env), None);
        assert_eq!(resolved("LIST[0.5]", &env), None);
        assert_eq!(resolved("LIST.missing", &env), None);
        assert_eq!(resolved("other[0]", &env), None);
    }

    #[test]
    fn splices_spreads_with_last_write_wins() {
        let env = env(&[("BASE", "{ a: 1, b: 2 }"), ("MORE", "[3, 4]")]);
        assert_eq!(
            resolved("{ ...BASE, c: 3, a: 9 }", &env).as_deref(),
            Some("{ a: 9, b: 2, c: 3 }")
        );
        assert_eq!(resolved("[0, ...MORE]", &env).as_deref(), Some("[0, 3, 4]"));
    }

    #[test]
    fn terminates_on_self_reference() {
        let env = env(&[("A", "B"), ("B", "A"), ("SELF", "[SELF]")]);
        assert_eq!(resolved("A", &env), None);
        assert_eq!(resolved("SELF", &env), None);
    }

    #[test]
    fn respects_the_depth_ceiling() {
        let mut chain = ConstEnv::new();
        chain.insert("N0", parse_expression("1").unwrap());
        for depth in 1..=MAX_RESOLVE_DEPTH + 1 {
            let previous = format!("N{}", depth - 1);
            chain.insert(format!("N{depth}"), parse_expression(&previous).unwrap());
        }
        let within = format!("N{}", MAX_RESOLVE_DEPTH - 1);
        let beyond = format!("N{}", MAX_RESOLVE_DEPTH + 1);
        assert_eq!(resolved(&within, &chain).as_deref(), Some("1"));
        assert_eq!(resolved(&beyond, &chain), None);
    }

    #[test]
    fn merging_keeps_first_position() {
        let mut props = Vec::new();
        let parsed = parse_expression("{ x: 1, y: f(), z: 3 }").unwrap();
        let Expr::Object { props: source, .. } = parsed else {
            panic!("expected an object");
        };
        for prop in source {
            merge_property(&mut props, prop);
        }
        let replacement = parse_expression("{ x: 10, y: 20 }").unwrap();
        let Expr::Object { props: later, .. } = replacement else {
            panic!("expected an object");
        };
        for prop in later {
            merge_property(&mut props, prop);
        }
        let merged = Expr::Object {
            props,
            span: Span::default(),
        };
        assert_eq!(render_expr(&merged), "{ x: 10, y: f(), z: 3, y: 20 }");
    }
}
