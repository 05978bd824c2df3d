//! Collapsing `.map` over constant arrays and `Object.fromEntries` over constant
//! entries into literals.

use tracing::debug;

use crate::bind::bind_parameters;
use crate::constants::{ConstEnv, merge_property, resolve};
use crate::diagnostics::Span;
use crate::error::InlineError;
use crate::literal::{is_trivially_pure, key_name};
use crate::reduce::reduce_block;
use crate::simplify::{ArgMap, evaluate, simplify};
use crate::syntax::{
    Element, Expr, FunctionBody, PropKey, Property, expr_span, format_number, is_identifier_name,
    render_expr,
};

/// Collapses `xs.map(cb)`, `Object.entries(o).map(cb)` (also `keys` / `values`)
/// or `Object.fromEntries(entries)` into an array or object literal.
pub fn literal_inline_comprehension(call: &Expr, env: &ConstEnv) -> Result<Expr, InlineError> {
    let call = call.unparen();
    let Expr::Call {
        callee, args, span, ..
    } = call
    else {
        return Err(InlineError::unsupported("selection is not a call expression"));
    };
    match (callee.unparen(), args.as_slice()) {
        (Expr::Member { base, name, .. }, [Element::Expr(callback)]) if name.name == "map" => {
            let items = source_items(base, env)?;
            map_items(&items, callback, env, *span)
        }
        (Expr::Member { base, name, .. }, [Element::Expr(entries)])
            if name.name == "fromEntries" && base.as_ident() == Some("Object") =>
        {
            from_entries(entries, env, *span)
        }
        _ => Err(InlineError::unsupported(format!(
            "`{}` is not a `.map` or `Object.fromEntries` call",
            render_expr(call)
        ))),
    }
}

/// The elements `base` stands for: a constant array, a literal array, an
/// `Object.entries/keys/values` of a constant object, or another collapsible `.map`.
fn source_items(base: &Expr, env: &ConstEnv) -> Result<Vec<Expr>, InlineError> {
    let base = base.unparen();
    if let Expr::Call { callee, args, .. } = base {
        if let (Expr::Member { base: object, name, .. }, [Element::Expr(source)]) =
            (callee.unparen(), args.as_slice())
        {
            if object.as_ident() == Some("Object") {
                return object_items(&name.name, source, env);
            }
        }
        return match literal_inline_comprehension(base, env)? {
            Expr::Array { elements, .. } => array_items(elements),
            _ => Err(InlineError::unsupported("`.map` source is not an array")),
        };
    }
    if let Some(Expr::Array { elements, .. }) = resolve(base, env) {
        return array_items(elements);
    }
    match simplify(base, &ArgMap::default(), env)? {
        Expr::Array { elements, .. } => array_items(elements),
        other => Err(InlineError::non_constant(format!(
            "`{}` is not a constant array",
            render_expr(&other)
        ))),
    }
}

fn array_items(elements: Vec<Element>) -> Result<Vec<Expr>, InlineError> {
    elements
        .into_iter()
        .map(|element| match element {
            Element::Expr(item) => Ok(item),
            Element::Spread(source) => Err(InlineError::non_constant(format!(
                "spread of `{}` has unknown length",
                render_expr(&source)
            ))),
            Element::Hole => Err(InlineError::unsupported("arrays with holes are not mapped")),
        })
        .collect()
}

/// Property order of `Object.keys`: integer keys ascending, then the rest in insertion order.
fn ordered_entries(props: Vec<Property>) -> Result<Vec<(String, Expr)>, InlineError> {
    let mut indexed = Vec::new();
    let mut named = Vec::new();
    for prop in props {
        let Property::KeyValue { key, value, .. } = prop else {
            return Err(InlineError::non_constant("object has non-literal members"));
        };
        let Some(name) = key_name(&key) else {
            return Err(InlineError::non_constant("object has computed keys"));
        };
        match array_index(&name) {
            Some(index) => indexed.push((index, name, value)),
            None => named.push((name, value)),
        }
    }
    indexed.sort_by_key(|(index, ..)| *index);
    Ok(indexed
        .into_iter()
        .map(|(_, name, value)| (name, value))
        .chain(named)
        .collect())
}

fn array_index(name: &str) -> Option<u32> {
    let index: u32 = name.parse().ok()?;
    (index != u32::MAX && index.to_string() == name).then_some(index)
}

fn object_items(method: &str, source: &Expr, env: &ConstEnv) -> Result<Vec<Expr>, InlineError> {
    let Some(Expr::Object { props, .. }) = resolve(source, env) else {
        return Err(InlineError::non_constant(format!(
            "`{}` is not a constant object",
            render_expr(source)
        )));
    };
    let span = expr_span(source);
    let entries = ordered_entries(props)?;
    Ok(match method {
        "entries" => entries
            .into_iter()
            .map(|(name, value)| Expr::Array {
                elements: vec![
                    Element::Expr(Expr::string(name, span)),
                    Element::Expr(value),
                ],
                span,
            })
            .collect(),
        "keys" => entries
            .into_iter()
            .map(|(name, _)| Expr::string(name, span))
            .collect(),
        "values" => entries.into_iter().map(|(_, value)| value).collect(),
        other => {
            return Err(InlineError::unsupported(format!(
                "`Object.{other}` is not a supported source"
            )));
        }
    })
}

fn map_items(
    items: &[Expr],
    callback: &Expr,
    env: &ConstEnv,
    span: Span,
) -> Result<Expr, InlineError> {
    let Expr::Function(function) = callback.unparen() else {
        return Err(InlineError::unsupported(format!(
            "callback `{}` is not an inline arrow function",
            render_expr(callback)
        )));
    };
    if function.is_async || !function.is_arrow {
        return Err(InlineError::unsupported(
            "only synchronous arrow callbacks can be collapsed",
        ));
    }
    let array = Expr::Array {
        elements: items.iter().cloned().map(Element::Expr).collect(),
        span,
    };
    let arity = function.params.len().min(3);
    let mut mapped = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let args: Vec<Element> = [
            item.clone(),
            Expr::number(index as f64, span),
            array.clone(),
        ]
        .into_iter()
        .take(arity)
        .map(Element::Expr)
        .collect();
        let bindings = bind_parameters(function, &args, env)?;
        let value = match &function.body {
            FunctionBody::Expr(body) => simplify(body, &bindings.args, env)?,
            FunctionBody::Block { stmts, .. } => reduce_block(stmts, &bindings.args, env)?,
        };
        mapped.push(Element::Expr(value));
    }
    debug!(count = mapped.len(), "collapsed map");
    Ok(Expr::Array {
        elements: mapped,
        span,
    })
}

fn from_entries(entries: &Expr, env: &ConstEnv, span: Span) -> Result<Expr, InlineError> {
    let items = source_items(entries, env)?;
    let mut props = Vec::with_capacity(items.len());
    for entry in items {
        let pair = match resolve(&entry, env).unwrap_or(entry) {
            Expr::Array { elements, .. } => array_items(elements)?,
            other => {
                return Err(InlineError::non_constant(format!(
                    "entry `{}` is not a [key, value] pair",
                    render_expr(&other)
                )));
            }
        };
        let mut pair = pair.into_iter();
        let Some(key) = pair.next() else {
            return Err(InlineError::non_constant("entry has no key"));
        };
        let value = pair
            .next()
            .unwrap_or_else(|| Expr::ident("undefined", expr_span(&key)));
        if let Some(extra) = pair.find(|extra| !is_trivially_pure(extra)) {
            return Err(InlineError::unsupported(format!(
                "entry element `{}` has side effects and would be dropped",
                render_expr(&extra)
            )));
        }
        let Some(name) = evaluate(&key, env).map(|key| key.to_js_string()) else {
            return Err(InlineError::non_constant(format!(
                "entry key `{}` is not constant",
                render_expr(&key)
            )));
        };
        let key_span = expr_span(&key);
        merge_property(
            &mut props,
            Property::KeyValue {
                key: entry_key(name),
                value,
                span: key_span,
            },
        );
    }
    debug!(count = props.len(), "collapsed fromEntries");
    Ok(Expr::Object { props, span })
}

fn entry_key(name: String) -> PropKey {
    if is_identifier_name(&name) {
        return PropKey::Ident(name);
    }
    match array_index(&name) {
        Some(index) => PropKey::Number {
            value: f64::from(index),
            raw: format_number(f64::from(index)),
        },
        None => PropKey::String(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_expression;

    fn env(bindings: &[(&str, &str)]) -> ConstEnv {
        let mut env = ConstEnv::new();
        for (name, text) in bindings {
            env.insert(*name, parse_expression(text).unwrap());
        }
        env
    }

    fn collapse(text: &str, env: &ConstEnv) -> Result<String, InlineError> {
        literal_inline_comprehension(&parse_expression(text).unwrap(), env)
            .map(|expr| render_expr(&expr))
    }

    #[test]
    fn maps_constant_arrays() {
        let env = env(&[("myArray", "[1, 2, 3]")]);
        assert_eq!(collapse("myArray.map(x => x * 2)", &env).unwrap(), "[2, 4, 6]");
        assert_eq!(
            collapse("myArray.map((x, i) => `${i}:${x}`)", &env).unwrap(),
            "[\"0:1\", \"1:2\", \"2:3\"]"
        );
        assert_eq!(
            collapse("myArray.map((x, i, all) => all.length - i)", &env).unwrap(),
            "[3, 2, 1]"
        );
    }

    #[test]
    fn maps_object_entries_keys_and_values() {
        let env = env(&[("SIZES", "{ small: 8, 2: 'two', large: 16, 1: 'one' }")]);
        assert_eq!(
            collapse("Object.keys(SIZES).map(k => k)", &env).unwrap(),
            "[\"1\", \"2\", \"small\", \"large\"]"
        );
        assert_eq!(
            collapse("Object.entries(SIZES).map(([k, v]) => `${k}=${v}`)", &env).unwrap(),
            "[\"1=one\", \"2=two\", \"small=8\", \"large=16\"]"
        );
        assert_eq!(
            collapse("Object.values(SIZES).map(v => typeof v)", &env).unwrap(),
            "[\"string\", \"string\", \"number\", \"number\"]"
        );
    }

    #[test]
    fn builds_objects_from_entries_in_order() {
        let env = ConstEnv::new();
        assert_eq!(
            collapse(r#"Object.fromEntries([["a", 1], ["b", 2]])"#, &env).unwrap(),
            "{ a: 1, b: 2 }"
        );
        assert_eq!(
            collapse(r#"Object.fromEntries([["b", 1], ["a", 2], ["b", 3]])"#, &env).unwrap(),
            "{ b: 3, a: 2 }"
        );
        assert_eq!(
            collapse(r#"Object.fromEntries([["x-y", 1], [3, true]])"#, &env).unwrap(),
            "{ \"x-y\": 1, 3: true }"
        );
    }

    #[test]
    fn extra_entry_elements_must_be_pure() {
        let env = ConstEnv::new();
        assert_eq!(
            collapse(r#"Object.fromEntries([["a", 1, "note"]])"#, &env).unwrap(),
            "{ a: 1 }"
        );
        let err = collapse(r#"Object.fromEntries([["a", 1, log()]])"#, &env).unwrap_err();
        assert!(matches!(err, InlineError::Unsupported(_)));
    }

    #[test]
    fn collapses_nested_pipelines() {
        let env = env(&[("RAW", "{ a: 1, b: 2 }")]);
        assert_eq!(
            collapse(
                "Object.fromEntries(Object.entries(RAW).map(([k, v]) => [k, v * 10]))",
                &env
            )
            .unwrap(),
            "{ a: 10, b: 20 }"
        );
        assert_eq!(
            collapse("[1, 2].map(x => x + 1).map(y => y * y)", &env).unwrap(),
            "[4, 9]"
        );
    }

    #[test]
    fn block_callbacks_reduce_per_element() {
        let env = env(&[("LEVELS", "[0, 5, 10]")]);
        let text = "LEVELS.map((n) => { if (n > 6) return 'high'; else if (n > 0) return 'mid'; else return 'low'; })";
        assert_eq!(
            collapse(text, &env).unwrap(),
            "['low', 'mid', 'high']"
        );
    }

    #[test]
    fn fails_closed_on_runtime_inputs() {
        let env = ConstEnv::new();
        let err = collapse("items.map(x => x)", &env).unwrap_err();
        assert!(matches!(err, InlineError::NonConstant(_)));
        let err = collapse("[1, 2].map(fn)", &env).unwrap_err();
        assert!(matches!(err, InlineError::Unsupported(_)));
        let err = collapse("[1, 2].map(async x => x)", &env).unwrap_err();
        assert!(matches!(err, InlineError::Unsupported(_)));
        let err = collapse("Object.fromEntries([[key, 1]])", &env).unwrap_err();
        assert!(matches!(err, InlineError::NonConstant(_)));
        let err = collapse("[1, 2].filter(x => x)", &env).unwrap_err();
        assert!(matches!(err, InlineError::Unsupported(_)));
    }
}
