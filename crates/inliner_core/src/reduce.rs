//! Collapses `if`-chains and `switch` statements into the selected return expression.

use tracing::trace;

use crate::constants::ConstEnv;
use crate::error::InlineError;
use crate::literal::LiteralValue;
use crate::simplify::{ArgMap, evaluate, simplify};
use crate::syntax::{Expr, Stmt, SwitchCase, render_expr};

/// Reduces a statement body to a single expression with `args` substituted.
///
/// Accepted shapes are a lone `return`, an `if`-chain whose every branch is a
/// single `return` (optionally followed by a `return` acting as the final
/// `else`), and a `switch` whose every case is a single `return`.
pub fn reduce_block(stmts: &[Stmt], args: &ArgMap, env: &ConstEnv) -> Result<Expr, InlineError> {
    match stmts {
        [Stmt::Block { body, .. }] => reduce_block(body, args, env),
        [Stmt::Return { value, .. }] => simplify(&return_value(value.as_ref()), args, env),
        [stmt @ Stmt::If { .. }] => reduce_if(stmt, None, args, env),
        [stmt @ Stmt::If { .. }, Stmt::Return { value, .. }] => {
            let fallback = return_value(value.as_ref());
            reduce_if(stmt, Some(&fallback), args, env)
        }
        [
            Stmt::Switch {
                discriminant,
                cases,
                ..
            },
        ] => reduce_switch(discriminant, cases, args, env),
        [] => Err(InlineError::unsupported("function body is empty")),
        _ => Err(InlineError::unsupported(
            "function body is not a single return, if-chain or switch",
        )),
    }
}

struct Branch<'a> {
    cond: Option<&'a Expr>,
    value: Expr,
}

fn return_value(value: Option<&Expr>) -> Expr {
    value
        .cloned()
        .unwrap_or_else(|| Expr::ident("undefined", Default::default()))
}

/// The return expression of `stmt` when it is `return e` or `{ return e }`.
fn sole_return(stmt: &Stmt) -> Option<Expr> {
    match stmt {
        Stmt::Return { value, .. } => Some(return_value(value.as_ref())),
        Stmt::Block { body, .. } => match body.as_slice() {
            [only] => sole_return(only),
            _ => None,
        },
        _ => None,
    }
}

/// Flattens `if / else if / else` into branches; the whole chain is checked
/// before any condition is looked at.
fn if_chain<'a>(stmt: &'a Stmt, branches: &mut Vec<Branch<'a>>) -> Result<(), InlineError> {
    let Stmt::If {
        cond,
        then_branch,
        else_branch,
        ..
    } = stmt
    else {
        return Err(InlineError::unsupported("expected an if statement"));
    };
    let value = sole_return(then_branch).ok_or_else(|| {
        InlineError::unsupported("every if branch must be a single return statement")
    })?;
    branches.push(Branch {
        cond: Some(cond),
        value,
    });
    let Some(else_branch) = else_branch else {
        return Ok(());
    };
    match else_branch.as_ref() {
        nested @ Stmt::If { .. } => if_chain(nested, branches),
        Stmt::Block { body, .. } if matches!(body.as_slice(), [Stmt::If { .. }]) => {
            if_chain(&body[0], branches)
        }
        other => {
            let value = sole_return(other).ok_or_else(|| {
                InlineError::unsupported("else branch must be a single return statement")
            })?;
            branches.push(Branch { cond: None, value });
            Ok(())
        }
    }
}

fn reduce_if(
    stmt: &Stmt,
    fallback: Option<&Expr>,
    args: &ArgMap,
    env: &ConstEnv,
) -> Result<Expr, InlineError> {
    let mut branches = Vec::new();
    if_chain(stmt, &mut branches)?;
    let has_else = branches.iter().any(|branch| branch.cond.is_none());
    if has_else && fallback.is_some() {
        return Err(InlineError::unsupported("unreachable statement after if-chain"));
    }
    for branch in &branches {
        let Some(cond) = branch.cond else {
            trace!("taking else branch");
            return simplify(&branch.value, args, env);
        };
        let cond = simplify(cond, args, env)?;
        let Some(decided) = evaluate(&cond, env) else {
            return Err(InlineError::non_constant(format!(
                "condition `{}` is not constant at this call",
                render_expr(&cond)
            )));
        };
        trace!(condition = %render_expr(&cond), truthy = decided.truthy(), "if condition");
        if decided.truthy() {
            return simplify(&branch.value, args, env);
        }
    }
    match fallback {
        Some(value) => {
            trace!("taking trailing return");
            simplify(value, args, env)
        }
        None => Err(InlineError::NoMatchingBranch(
            "no if branch applies and there is no else".to_string(),
        )),
    }
}

fn switch_literal(expr: &Expr, args: &ArgMap, env: &ConstEnv, what: &str) -> Result<LiteralValue, InlineError> {
    let simplified = simplify(expr, args, env)?;
    match evaluate(&simplified, env) {
        Some(value) if value.is_primitive_key() => Ok(value),
        _ => Err(InlineError::non_constant(format!(
            "switch {what} `{}` is not a number, string or boolean literal",
            render_expr(&simplified)
        ))),
    }
}

fn reduce_switch(
    discriminant: &Expr,
    cases: &[SwitchCase],
    args: &ArgMap,
    env: &ConstEnv,
) -> Result<Expr, InlineError> {
    let mut bodies = Vec::with_capacity(cases.len());
    for case in cases {
        let value = match case.body.as_slice() {
            [] => {
                return Err(InlineError::unsupported(
                    "switch cases that fall through are not supported",
                ));
            }
            [only] => sole_return(only),
            _ => None,
        };
        let value = value.ok_or_else(|| {
            InlineError::unsupported("every switch case must be a single return statement")
        })?;
        bodies.push(value);
    }
    if cases.iter().filter(|case| case.test.is_none()).count() > 1 {
        return Err(InlineError::unsupported("switch has more than one default"));
    }

    let scrutinee = switch_literal(discriminant, args, env, "discriminant")?;
    let mut default = None;
    for (case, value) in cases.iter().zip(&bodies) {
        let Some(test) = &case.test else {
            default = Some(value);
            continue;
        };
        let label = switch_literal(test, args, env, "case label")?;
        if scrutinee.strict_eq(&label) {
            trace!(label = %label.to_js_string(), "switch case matched");
            return simplify(value, args, env);
        }
    }
    match default {
        Some(value) => {
            trace!("taking switch default");
            simplify(value, args, env)
        }
        None => Err(InlineError::NoMatchingBranch(format!(
            "no case matches `{}` and there is no default",
            scrutinee.to_js_string()
        ))),
    }
}
