//! Argument substitution and literal folding.
//!
//! Folding is structural: operators are applied only when their operands are
//! literal nodes after substitution, so a reference such as `three + 2` keeps
//! its name. Decisions (conditions, spread sources) look through the constant
//! environment with [`evaluate`] and [`resolve`].

use rustc_hash::FxHashMap;

use crate::constants::{ConstEnv, merge_property, resolve, select, select_index};
use crate::diagnostics::Span;
use crate::error::InlineError;
use crate::literal::{LiteralValue, apply_binary, apply_unary, is_trivially_pure};
use crate::syntax::{
    BinaryOp, Element, Expr, Fragment, Function, FunctionBody, ObjectPatternProp, Pattern,
    PropKey, Property, TemplatePart, escape_template_text, expr_span, format_number, free_names,
    function_bound_names, function_free_names, is_identifier_name, render_expr, stmt_free_names,
    unescape,
};

/// Parameter name to the caller expression it stands for.
pub type ArgMap = FxHashMap<String, Expr>;

/// Substitutes `args` into `expr` and folds what becomes literal.
pub fn simplify(expr: &Expr, args: &ArgMap, env: &ConstEnv) -> Result<Expr, InlineError> {
    Folder { args, env }.fold(expr)
}

/// Literal value of `expr`, seeing through `env`. `None` when any part is not constant.
pub fn evaluate(expr: &Expr, env: &ConstEnv) -> Option<LiteralValue> {
    if let Some(resolved) = resolve(expr, env) {
        return LiteralValue::from_expr(&resolved);
    }
    match expr {
        Expr::Ident(name) if env.contains(&name.name) => None,
        Expr::Ident(_)
        | Expr::Number { .. }
        | Expr::String { .. }
        | Expr::Bool { .. }
        | Expr::Null { .. } => LiteralValue::from_expr(expr),
        Expr::Paren { inner, .. } => evaluate(inner, env),
        Expr::Template { parts, .. } => {
            let mut text = String::new();
            for part in parts {
                match part {
                    TemplatePart::Text(raw) => text.push_str(&unescape(raw)?),
                    TemplatePart::Expr(expr) => text.push_str(&evaluate(expr, env)?.to_js_string()),
                }
            }
            Some(LiteralValue::String(text))
        }
        Expr::Binary {
            op, left, right, ..
        } => {
            let left = evaluate(left, env)?;
            match op {
                BinaryOp::And if !left.truthy() => Some(left),
                BinaryOp::Or if left.truthy() => Some(left),
                BinaryOp::Nullish if !left.is_nullish() => Some(left),
                BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => evaluate(right, env),
                _ => apply_binary(*op, &left, &evaluate(right, env)?),
            }
        }
        Expr::Unary { op, expr, .. } => apply_unary(*op, &evaluate(expr, env)?),
        Expr::Conditional {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            if evaluate(cond, env)?.truthy() {
                evaluate(then_branch, env)
            } else {
                evaluate(else_branch, env)
            }
        }
        _ => None,
    }
}

struct Folder<'a> {
    args: &'a ArgMap,
    env: &'a ConstEnv,
}

impl Folder<'_> {
    fn fold(&self, expr: &Expr) -> Result<Expr, InlineError> {
        Ok(match expr {
            Expr::Ident(name) => match self.args.get(&name.name) {
                Some(bound) => simplify(bound, &ArgMap::default(), self.env)?,
                None => expr.clone(),
            },
            Expr::Number { .. } | Expr::String { .. } | Expr::Bool { .. } | Expr::Null { .. } => {
                expr.clone()
            }
            Expr::Template { parts, span } => self.template(parts, *span)?,
            Expr::Array { elements, span } => Expr::Array {
                elements: self.array_elements(elements)?,
                span: *span,
            },
            Expr::Object { props, span } => self.object(props, *span)?,
            Expr::Member {
                base,
                name,
                optional,
                span,
            } => {
                let base = self.chain_base(base)?;
                if is_trivially_pure(&base) {
                    if let Some(selected) = select(&base, &name.name, *span) {
                        return Ok(selected);
                    }
                }
                Expr::Member {
                    base: Box::new(base),
                    name: name.clone(),
                    optional: *optional,
                    span: *span,
                }
            }
            Expr::Index {
                base,
                index,
                optional,
                span,
            } => {
                let base = self.chain_base(base)?;
                let index = self.fold(index)?;
                if is_trivially_pure(&base) {
                    let selected = match LiteralValue::from_expr(&index) {
                        Some(LiteralValue::Number(position)) => select_index(&base, position),
                        Some(LiteralValue::String(key)) => select(&base, &key, *span),
                        _ => None,
                    };
                    if let Some(selected) = selected {
                        return Ok(selected);
                    }
                }
                Expr::Index {
                    base: Box::new(base),
                    index: Box::new(index),
                    optional: *optional,
                    span: *span,
                }
            }
            Expr::Call {
                callee,
                args,
                optional,
                span,
            } => Expr::Call {
                callee: Box::new(self.callee(callee)?),
                args: self.call_args(args)?,
                optional: *optional,
                span: *span,
            },
            Expr::Conditional {
                cond,
                then_branch,
                else_branch,
                span,
            } => {
                let cond = self.fold(cond)?;
                match evaluate(&cond, self.env) {
                    Some(value) if value.truthy() => self.fold(then_branch)?,
                    Some(_) => self.fold(else_branch)?,
                    None => Expr::Conditional {
                        cond: Box::new(cond),
                        then_branch: Box::new(self.fold(then_branch)?),
                        else_branch: Box::new(self.fold(else_branch)?),
                        span: *span,
                    },
                }
            }
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => self.binary(*op, left, right, *span)?,
            Expr::Unary { op, expr, span } => {
                let operand = self.fold(expr)?;
                let folded = LiteralValue::from_expr(&operand)
                    .and_then(|value| apply_unary(*op, &value));
                match folded {
                    Some(value) => value.to_expr(*span),
                    None => Expr::Unary {
                        op: *op,
                        expr: Box::new(operand),
                        span: *span,
                    },
                }
            }
            Expr::Paren { inner, span } => {
                let inner = self.fold(inner)?;
                if inner.has_optional_link() {
                    Expr::Paren {
                        inner: Box::new(inner),
                        span: *span,
                    }
                } else {
                    inner
                }
            }
            Expr::Await { expr, span } => Expr::Await {
                expr: Box::new(self.fold(expr)?),
                span: *span,
            },
            Expr::Function(function) => self.function(function)?,
            Expr::Other {
                kind,
                fragments,
                span,
            } => Expr::Other {
                kind: kind.clone(),
                fragments: fragments
                    .iter()
                    .map(|fragment| match fragment {
                        Fragment::Text(text) => Ok(Fragment::Text(text.clone())),
                        Fragment::Expr(expr) => self.fold(expr).map(Fragment::Expr),
                    })
                    .collect::<Result<_, _>>()?,
                span: *span,
            },
            Expr::Opaque { text, names, .. } => {
                if let Some(name) = names.iter().find(|name| self.args.contains_key(*name)) {
                    return Err(InlineError::unsupported(format!(
                        "cannot substitute `{name}` into `{text}`"
                    )));
                }
                expr.clone()
            }
        })
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr, span: Span) -> Result<Expr, InlineError> {
        let left = self.fold(left)?;
        let left_value = LiteralValue::from_expr(&left);
        if op.is_logical() {
            if let Some(value) = &left_value {
                let short_circuits = match op {
                    BinaryOp::And => !value.truthy(),
                    BinaryOp::Or => value.truthy(),
                    _ => !value.is_nullish(),
                };
                return if short_circuits {
                    Ok(left)
                } else {
                    self.fold(right)
                };
            }
        }
        let right = self.fold(right)?;
        if let (Some(left_value), Some(right_value)) = (&left_value, LiteralValue::from_expr(&right)) {
            if let Some(value) = apply_binary(op, left_value, &right_value) {
                return Ok(value.to_expr(span));
            }
        }
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span,
        })
    }

    fn template(&self, parts: &[TemplatePart], span: Span) -> Result<Expr, InlineError> {
        let mut folded: Vec<TemplatePart> = Vec::with_capacity(parts.len());
        let push_text = |folded: &mut Vec<TemplatePart>, text: &str| {
            if let Some(TemplatePart::Text(previous)) = folded.last_mut() {
                previous.push_str(text);
            } else {
                folded.push(TemplatePart::Text(text.to_string()));
            }
        };
        for part in parts {
            match part {
                TemplatePart::Text(text) => push_text(&mut folded, text),
                TemplatePart::Expr(expr) => {
                    let expr = self.fold(expr)?;
                    match LiteralValue::from_expr(&expr) {
                        Some(
                            value @ (LiteralValue::String(_)
                            | LiteralValue::Number(_)
                            | LiteralValue::Bool(_)),
                        ) => push_text(&mut folded, &escape_template_text(&value.to_js_string())),
                        _ => folded.push(TemplatePart::Expr(expr)),
                    }
                }
            }
        }
        let only_text = folded
            .iter()
            .all(|part| matches!(part, TemplatePart::Text(_)));
        if only_text {
            let raw: String = folded
                .iter()
                .filter_map(|part| match part {
                    TemplatePart::Text(text) => Some(text.as_str()),
                    TemplatePart::Expr(_) => None,
                })
                .collect();
            if let Some(value) = unescape(&raw) {
                return Ok(Expr::string(value, span));
            }
        }
        Ok(Expr::Template {
            parts: folded,
            span,
        })
    }

    fn array_elements(&self, elements: &[Element]) -> Result<Vec<Element>, InlineError> {
        let mut folded = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                Element::Expr(expr) => folded.push(Element::Expr(self.fold(expr)?)),
                Element::Hole => folded.push(Element::Hole),
                Element::Spread(source) => {
                    let source = self.fold(source)?;
                    match resolve(&source, self.env) {
                        Some(Expr::Array { elements, .. }) => folded.extend(elements),
                        _ => match source {
                            Expr::Array { elements, .. }
                                if !elements.iter().any(|item| matches!(item, Element::Hole)) =>
                            {
                                folded.extend(elements)
                            }
                            other => folded.push(Element::Spread(other)),
                        },
                    }
                }
            }
        }
        Ok(folded)
    }

    fn object(&self, props: &[Property], span: Span) -> Result<Expr, InlineError> {
        let mut folded = Vec::with_capacity(props.len());
        for prop in props {
            match prop {
                Property::KeyValue { key, value, span } => {
                    let key = match key {
                        PropKey::Computed(key) => computed_key(self.fold(key)?),
                        other => other.clone(),
                    };
                    let value = self.fold(value)?;
                    merge_property(
                        &mut folded,
                        Property::KeyValue {
                            key,
                            value,
                            span: *span,
                        },
                    );
                }
                Property::Shorthand(name) => {
                    if self.args.contains_key(&name.name) {
                        let value = self.fold(&Expr::Ident(name.clone()))?;
                        merge_property(
                            &mut folded,
                            Property::KeyValue {
                                key: PropKey::Ident(name.name.clone()),
                                value,
                                span: name.span,
                            },
                        );
                    } else {
                        merge_property(&mut folded, prop.clone());
                    }
                }
                Property::Spread { expr, span } => {
                    let source = self.fold(expr)?;
                    let spliced = resolve(&source, self.env).or_else(|| match &source {
                        Expr::Object { props, .. }
                            if !props
                                .iter()
                                .any(|prop| matches!(prop, Property::Method { .. })) =>
                        {
                            Some(source.clone())
                        }
                        _ => None,
                    });
                    match spliced {
                        Some(Expr::Object { props, .. }) => {
                            for prop in props {
                                merge_property(&mut folded, prop);
                            }
                        }
                        _ => folded.push(Property::Spread {
                            expr: source,
                            span: *span,
                        }),
                    }
                }
                Property::Method { text, names, .. } => {
                    if let Some(name) = names.iter().find(|name| self.args.contains_key(*name)) {
                        return Err(InlineError::unsupported(format!(
                            "cannot substitute `{name}` into method `{text}`"
                        )));
                    }
                    folded.push(prop.clone());
                }
            }
        }
        Ok(Expr::Object {
            props: folded,
            span,
        })
    }

    /// Folds the base of a member access. A substituted optional chain keeps
    /// its own parentheses so the access does not join its short-circuit.
    fn chain_base(&self, base: &Expr) -> Result<Expr, InlineError> {
        let folded = self.fold(base)?;
        let substituted = base
            .as_ident()
            .is_some_and(|name| self.args.contains_key(name));
        Ok(if substituted {
            parenthesize_chain(folded)
        } else {
            folded
        })
    }

    /// Substitutes into a callee without folding it away.
    fn callee(&self, callee: &Expr) -> Result<Expr, InlineError> {
        match callee {
            Expr::Ident(name) => match self.args.get(&name.name) {
                Some(bound) => {
                    let bound = simplify(bound, &ArgMap::default(), self.env)?;
                    if matches!(bound.unparen(), Expr::Member { .. } | Expr::Index { .. }) {
                        return Err(InlineError::unsupported(format!(
                            "calling `{}` through parameter `{}` would change its `this`",
                            render_expr(&bound),
                            name.name
                        )));
                    }
                    Ok(parenthesize_chain(bound))
                }
                None => Ok(callee.clone()),
            },
            Expr::Member {
                base,
                name,
                optional,
                span,
            } => Ok(Expr::Member {
                base: Box::new(self.chain_base(base)?),
                name: name.clone(),
                optional: *optional,
                span: *span,
            }),
            Expr::Index {
                base,
                index,
                optional,
                span,
            } => Ok(Expr::Index {
                base: Box::new(self.chain_base(base)?),
                index: Box::new(self.fold(index)?),
                optional: *optional,
                span: *span,
            }),
            Expr::Paren { inner, .. } if !inner.has_optional_link() => self.callee(inner),
            other => self.fold(other),
        }
    }

    fn call_args(&self, args: &[Element]) -> Result<Vec<Element>, InlineError> {
        args.iter()
            .map(|arg| {
                Ok(match arg {
                    Element::Expr(expr) => Element::Expr(self.fold(expr)?),
                    Element::Spread(expr) => Element::Spread(self.fold(expr)?),
                    Element::Hole => Element::Hole,
                })
            })
            .collect()
    }

    fn function(&self, function: &Function) -> Result<Expr, InlineError> {
        let bound = function_bound_names(function);
        let args: ArgMap = self
            .args
            .iter()
            .filter(|(name, _)| !bound.contains(name))
            .map(|(name, expr)| (name.clone(), expr.clone()))
            .collect();
        let mut default_names = Vec::new();
        for param in &function.params {
            pattern_default_names(&param.pattern, &mut default_names);
            if let Some(default) = &param.default {
                default_names.extend(free_names(default));
            }
        }
        if let Some(name) = default_names.iter().find(|name| args.contains_key(*name)) {
            return Err(InlineError::unsupported(format!(
                "parameter default of a nested function refers to `{name}`"
            )));
        }
        let used = function_free_names(function);
        for (name, expr) in &args {
            if !used.contains(name) {
                continue;
            }
            if let Some(captured) = free_names(expr).into_iter().find(|free| bound.contains(free)) {
                return Err(InlineError::unsupported(format!(
                    "argument for `{name}` would be captured by nested binding `{captured}`"
                )));
            }
        }
        match &function.body {
            FunctionBody::Expr(body) => {
                let env = self.env.without(bound.iter().map(String::as_str));
                let body = Folder {
                    args: &args,
                    env: &env,
                }
                .fold(body)?;
                Ok(Expr::Function(Box::new(Function {
                    body: FunctionBody::Expr(Box::new(body)),
                    ..function.clone()
                })))
            }
            FunctionBody::Block { stmts, .. } => {
                let captured = stmt_free_names(stmts);
                if let Some(name) = captured.iter().find(|name| args.contains_key(*name)) {
                    return Err(InlineError::unsupported(format!(
                        "block-bodied nested function captures parameter `{name}`"
                    )));
                }
                Ok(Expr::Function(Box::new(function.clone())))
            }
        }
    }
}

fn parenthesize_chain(expr: Expr) -> Expr {
    if expr.has_optional_link() {
        Expr::Paren {
            span: expr_span(&expr),
            inner: Box::new(expr),
        }
    } else {
        expr
    }
}

fn pattern_default_names(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Assign {
            target, default, ..
        } => {
            out.extend(free_names(default));
            pattern_default_names(target, out);
        }
        Pattern::Object { props, .. } => {
            for prop in props {
                match prop {
                    ObjectPatternProp::Field { key, value, .. } => {
                        if let PropKey::Computed(key) = key {
                            out.extend(free_names(key));
                        }
                        pattern_default_names(value, out);
                    }
                    ObjectPatternProp::Rest(inner) => pattern_default_names(inner, out),
                }
            }
        }
        Pattern::Array { elements, .. } => {
            for element in elements.iter().flatten() {
                pattern_default_names(element, out);
            }
        }
        Pattern::Rest { inner, .. } => pattern_default_names(inner, out),
        Pattern::Ident(_) | Pattern::Unsupported { .. } => {}
    }
}

/// A computed key that folded to a literal becomes a plain key.
fn computed_key(key: Expr) -> PropKey {
    match LiteralValue::from_expr(&key) {
        Some(LiteralValue::Number(value)) if value >= 0.0 && value.is_finite() => PropKey::Number {
            value,
            raw: format_number(value),
        },
        Some(value) => {
            let name = value.to_js_string();
            if is_identifier_name(&name) {
                PropKey::Ident(name)
            } else {
                PropKey::String(name)
            }
        }
        None => PropKey::Computed(Box::new(key)),
    }
}
