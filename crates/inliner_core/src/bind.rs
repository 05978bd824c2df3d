//! Binding call arguments to callee parameters.

use tracing::trace;

use crate::constants::{ConstEnv, resolve};
use crate::error::InlineError;
use crate::literal::{LiteralValue, is_deep_literal, is_trivially_pure};
use crate::simplify::{ArgMap, simplify};
use crate::syntax::{
    Element, Evaluation, Expr, Function, ObjectPatternProp, Pattern, PropKey, SpannedName,
    evaluation_order, expr_span, render_expr,
};

/// What a call binds: parameter names to the caller expressions they stand
/// for, and the parameters whose values are deep literals at the call site.
///
/// `env` is keyed by callee names. Substituted expressions are written in the
/// caller's names, so the body is folded against the caller's constants only
/// and `env` is never layered over them.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    pub args: ArgMap,
    pub env: ConstEnv,
}

/// A side-effecting argument and the parameter names it was bound to.
struct ImpureArg {
    names: Vec<String>,
    text: String,
}

pub fn bind_parameters(
    function: &Function,
    call_args: &[Element],
    caller_env: &ConstEnv,
) -> Result<Bindings, InlineError> {
    let mut supplied = Vec::with_capacity(call_args.len());
    for arg in call_args {
        match arg {
            Element::Expr(expr) => supplied.push(expr),
            Element::Spread(expr) => {
                return Err(InlineError::unsupported(format!(
                    "spread argument `...{}` cannot be matched to parameters",
                    render_expr(expr)
                )));
            }
            Element::Hole => {}
        }
    }
    if let Some(extra) = supplied
        .iter()
        .skip(function.params.len())
        .find(|extra| !is_trivially_pure(extra))
    {
        return Err(InlineError::unsupported(format!(
            "extra argument `{}` has side effects and would be dropped",
            render_expr(extra)
        )));
    }

    let mut bindings = Bindings::default();
    let mut impure_args = Vec::new();
    let mut impure_defaults = Vec::new();
    for (position, param) in function.params.iter().enumerate() {
        let given = supplied
            .get(position)
            .copied()
            .filter(|arg| LiteralValue::from_expr(arg) != Some(LiteralValue::Undefined));
        let effective = match (given, &param.default) {
            (Some(arg), _) => arg.clone(),
            (None, Some(default)) => simplify(default, &bindings.args, caller_env)?,
            (None, None) => match supplied.get(position) {
                Some(undefined) => (*undefined).clone(),
                None => {
                    return Err(InlineError::unsupported(format!(
                        "no argument for parameter `{}` and no default",
                        param_label(&param.pattern)
                    )));
                }
            },
        };

        let bound = bind_pattern(&param.pattern, &effective)?;
        if !is_trivially_pure(&effective) {
            let impure = ImpureArg {
                names: bound.iter().map(|(name, _)| name.clone()).collect(),
                text: render_expr(&effective),
            };
            // Defaults run on entry, after every supplied argument.
            if given.is_some() {
                impure_args.push(impure);
            } else {
                impure_defaults.push(impure);
            }
        }
        for (name, access) in bound {
            if let Some(value) = resolve(&access, caller_env).filter(is_deep_literal) {
                trace!(parameter = %name, value = %render_expr(&value), "literal parameter");
                bindings.env.insert(name.clone(), value);
            } else {
                bindings.env.remove(&name);
            }
            bindings.args.insert(name, access);
        }
    }
    impure_args.append(&mut impure_defaults);
    check_side_effects(function, &impure_args)?;
    Ok(bindings)
}

/// Side-effecting arguments are substituted in place of their parameters, so
/// each must be read exactly once, unconditionally, in parameter order and
/// before anything else the body does can have an effect.
fn check_side_effects(function: &Function, impure: &[ImpureArg]) -> Result<(), InlineError> {
    if impure.is_empty() {
        return Ok(());
    }
    let tracked: Vec<String> = impure
        .iter()
        .flat_map(|arg| arg.names.iter().cloned())
        .collect();
    let order = evaluation_order(&function.body, &tracked);
    let mut steps = order.iter();
    for arg in impure {
        let uses = order
            .iter()
            .filter(|step| {
                matches!(step, Evaluation::Read(name) | Evaluation::GuardedRead(name) if arg.names.contains(name))
            })
            .count();
        if uses != 1 {
            return Err(InlineError::unsupported(format!(
                "argument `{}` has side effects and would be evaluated {uses} times",
                arg.text
            )));
        }
        match steps.next() {
            Some(Evaluation::Read(name)) if arg.names.contains(name) => {}
            Some(Evaluation::GuardedRead(name)) if arg.names.contains(name) => {
                return Err(InlineError::unsupported(format!(
                    "argument `{}` has side effects and would only be evaluated conditionally",
                    arg.text
                )));
            }
            _ => {
                return Err(InlineError::unsupported(format!(
                    "argument `{}` has side effects and would be evaluated out of order",
                    arg.text
                )));
            }
        }
    }
    Ok(())
}

fn param_label(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Ident(name) => name.name.clone(),
        Pattern::Object { .. } => "{ ... }".to_string(),
        Pattern::Array { .. } => "[ ... ]".to_string(),
        Pattern::Rest { .. } => "...".to_string(),
        Pattern::Assign { target, .. } => param_label(target),
        Pattern::Unsupported { text, .. } => text.clone(),
    }
}

/// Names introduced by `pattern`, each with the access path into `arg` it stands for.
fn bind_pattern(pattern: &Pattern, arg: &Expr) -> Result<Vec<(String, Expr)>, InlineError> {
    let span = expr_span(arg);
    // `(a?.b).x` throws when `a` is nullish; `a?.b.x` does not.
    let base = if arg.has_optional_link() {
        Expr::Paren {
            inner: Box::new(arg.clone()),
            span,
        }
    } else {
        arg.clone()
    };
    match pattern {
        Pattern::Ident(name) => Ok(vec![(name.name.clone(), arg.clone())]),
        Pattern::Object { props, .. } => {
            let mut bound = Vec::with_capacity(props.len());
            for prop in props {
                let ObjectPatternProp::Field { key, value, .. } = prop else {
                    return Err(InlineError::unsupported(
                        "rest element in a destructured parameter",
                    ));
                };
                let Pattern::Ident(name) = value else {
                    return Err(InlineError::unsupported(
                        "nested destructuring or defaults inside a parameter pattern",
                    ));
                };
                let access = match key {
                    PropKey::Ident(key) => Expr::Member {
                        base: Box::new(base.clone()),
                        name: SpannedName::new(key.clone(), span),
                        optional: false,
                        span,
                    },
                    PropKey::String(key) => Expr::Index {
                        base: Box::new(base.clone()),
                        index: Box::new(Expr::string(key.clone(), span)),
                        optional: false,
                        span,
                    },
                    PropKey::Number { value, raw } => Expr::Index {
                        base: Box::new(base.clone()),
                        index: Box::new(Expr::Number {
                            value: *value,
                            raw: Some(raw.clone()),
                            span,
                        }),
                        optional: false,
                        span,
                    },
                    PropKey::Computed(_) => {
                        return Err(InlineError::unsupported(
                            "computed key in a destructured parameter",
                        ));
                    }
                };
                bound.push((name.name.clone(), access));
            }
            Ok(bound)
        }
        Pattern::Array { elements, .. } => {
            let mut bound = Vec::with_capacity(elements.len());
            for (position, element) in elements.iter().enumerate() {
                match element {
                    None => {}
                    Some(Pattern::Ident(name)) => bound.push((
                        name.name.clone(),
                        Expr::Index {
                            base: Box::new(base.clone()),
                            index: Box::new(Expr::number(position as f64, span)),
                            optional: false,
                            span,
                        },
                    )),
                    Some(Pattern::Rest { .. }) => {
                        return Err(InlineError::unsupported(
                            "rest element in a destructured parameter",
                        ));
                    }
                    Some(_) => {
                        return Err(InlineError::unsupported(
                            "nested destructuring or defaults inside a parameter pattern",
                        ));
                    }
                }
            }
            Ok(bound)
        }
        Pattern::Rest { .. } => Err(InlineError::unsupported("rest parameters are not supported")),
        Pattern::Assign { .. } | Pattern::Unsupported { .. } => Err(InlineError::unsupported(
            format!("unsupported parameter `{}`", param_label(pattern)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_expression;

    fn function(text: &str) -> Function {
        match parse_expression(text).unwrap() {
            Expr::Function(function) => *function,
            other => panic!("expected a function, got {other:?}"),
        }
    }

    fn call_args(text: &str) -> Vec<Element> {
        match parse_expression(text).unwrap() {
            Expr::Call { args, .. } => args,
            other => panic!("expected a call, got {other:?}"),
        }
    }

    fn bound(function_text: &str, call_text: &str, env: &ConstEnv) -> Result<Vec<(String, String)>, InlineError> {
        let bindings = bind_parameters(&function(function_text), &call_args(call_text), env)?;
        let mut rendered: Vec<(String, String)> = bindings
            .args
            .iter()
            .map(|(name, expr)| (name.clone(), render_expr(expr)))
            .collect();
        rendered.sort();
        Ok(rendered)
    }

    fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
        expected
            .iter()
            .map(|(name, text)| (name.to_string(), text.to_string()))
            .collect()
    }

    #[test]
    fn binds_destructured_object_and_array_parameters() {
        let env = ConstEnv::new();
        assert_eq!(
            bound("({ a, b }) => a + b", "f(pair)", &env).unwrap(),
            pairs(&[("a", "pair.a"), ("b", "pair.b")])
        );
        assert_eq!(
            bound("([x, y]) => x + y", "f(tup)", &env).unwrap(),
            pairs(&[("x", "tup[0]"), ("y", "tup[1]")])
        );
        assert_eq!(
            bound("([, second]) => second", "f(tup)", &env).unwrap(),
            pairs(&[("second", "tup[1]")])
        );
        assert_eq!(
            bound("({ 'my-key': k, 0: z }) => k + z", "f(o)", &env).unwrap(),
            pairs(&[("k", "o[\"my-key\"]"), ("z", "o[0]")])
        );
        assert_eq!(
            bound("({ a }) => a", "f(cfg?.inner)", &env).unwrap(),
            pairs(&[("a", "(cfg?.inner).a")])
        );
    }

    #[test]
    fn falls_back_to_defaults() {
        let env = ConstEnv::new();
        assert_eq!(
            bound("(a, b = a * 2) => a + b", "f(4)", &env).unwrap(),
            pairs(&[("a", "4"), ("b", "8")])
        );
        assert_eq!(
            bound("(a = 1) => a", "f(undefined)", &env).unwrap(),
            pairs(&[("a", "1")])
        );
        let err = bound("(a, b) => a + b", "f(1)", &env).unwrap_err();
        assert!(matches!(err, InlineError::Unsupported(_)));
    }

    #[test]
    fn rejects_unsupported_parameter_shapes() {
        let env = ConstEnv::new();
        for (function, call) in [
            ("(...rest) => rest", "f(1, 2)"),
            ("({ a: { b } }) => b", "f(o)"),
            ("({ a = 1 }) => a", "f(o)"),
            ("([x, ...xs]) => x", "f(list)"),
            ("(a) => a", "f(...list)"),
        ] {
            let err = bound(function, call, &env).unwrap_err();
            assert!(matches!(err, InlineError::Unsupported(_)), "{function}");
        }
    }

    #[test]
    fn guards_side_effecting_arguments() {
        let env = ConstEnv::new();
        assert!(bound("(a) => a + 1", "f(next())", &env).is_ok());
        assert!(bound("(a) => a + a", "f(next())", &env).is_err());
        assert!(bound("(a) => 1", "f(next())", &env).is_err());
        assert!(bound("({ x, y }) => x + y", "f(load())", &env).is_err());
        assert!(bound("(a) => a", "f(1, log())", &env).is_err());
        assert!(bound("(a) => a", "f(1, extra)", &env).is_ok());
    }

    #[test]
    fn side_effects_must_run_exactly_once() {
        let env = ConstEnv::new();
        for (function, call) in [
            ("(a) => items.map((x) => x + a)", "f(next())"),
            ("(a) => flag ? a : 0", "f(next())"),
            ("(a) => flag && a", "f(next())"),
            ("(a) => cache?.[a]", "f(next())"),
            ("(a) => { if (ready) { return a; } return 0; }", "f(next())"),
        ] {
            let err = bound(function, call, &env).unwrap_err();
            assert!(matches!(err, InlineError::Unsupported(_)), "{function}");
        }
        assert!(bound("(a) => flag ? a : 0", "f(value)", &env).is_ok());
        assert!(bound("(a) => format(a, flag ? 1 : 2)", "f(next())", &env).is_ok());
    }

    #[test]
    fn side_effects_keep_argument_order() {
        let env = ConstEnv::new();
        let err = bound("(a, b) => b - a", "f(first(), second())", &env).unwrap_err();
        assert!(matches!(err, InlineError::Unsupported(_)));
        assert!(bound("(a, b) => a - b", "f(first(), second())", &env).is_ok());
        assert!(bound("(a) => log() + a", "f(next())", &env).is_err());
        assert!(bound("(a, b) => b(a)", "f(next(), handler)", &env).is_ok());
    }

    #[test]
    fn records_literal_parameters_from_the_caller() {
        let mut env = ConstEnv::new();
        env.insert("POINT", parse_expression("{ x: 3, y: 4 }").unwrap());
        let bindings = bind_parameters(
            &function("({ x, y }, label) => x + y"),
            &call_args("f(POINT, name)"),
            &env,
        )
        .unwrap();
        assert_eq!(render_expr(bindings.env.get("x").unwrap()), "3");
        assert_eq!(render_expr(bindings.env.get("y").unwrap()), "4");
        assert!(!bindings.env.contains("label"));
        assert_eq!(render_expr(&bindings.args["x"]), "POINT.x");
        assert_eq!(render_expr(&bindings.args["label"]), "name");
    }
}
