//! Name queries over lowered syntax: free identifiers, evaluation order and
//! the names a pattern binds.

use crate::syntax::ast::*;

/// Names bound by a destructuring or simple pattern, in source order.
pub fn pattern_names(pattern: &Pattern) -> Vec<String> {
    let mut out = Vec::new();
    push_pattern_names(pattern, &mut out);
    out
}

fn push_pattern_names(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Ident(name) => out.push(name.name.clone()),
        Pattern::Object { props, .. } => {
            for prop in props {
                match prop {
                    ObjectPatternProp::Field { value, .. } => push_pattern_names(value, out),
                    ObjectPatternProp::Rest(inner) => push_pattern_names(inner, out),
                }
            }
        }
        Pattern::Array { elements, .. } => {
            for element in elements.iter().flatten() {
                push_pattern_names(element, out);
            }
        }
        Pattern::Rest { inner, .. } => push_pattern_names(inner, out),
        Pattern::Assign { target, .. } => push_pattern_names(target, out),
        Pattern::Unsupported { .. } => {}
    }
}

/// Names a function introduces for its own body: its parameters and, for named
/// function expressions, its own name.
pub fn function_bound_names(function: &Function) -> Vec<String> {
    let mut names: Vec<String> = function
        .params
        .iter()
        .flat_map(|param| pattern_names(&param.pattern))
        .collect();
    if let Some(name) = &function.name {
        names.push(name.name.clone());
    }
    names
}

/// Identifiers `expr` reads from its enclosing scope, in first-occurrence order.
pub fn free_names(expr: &Expr) -> Vec<String> {
    let mut walker = NameWalker::default();
    walker.expr(expr);
    walker.out
}

/// Free identifiers of a function body, excluding the function's own bindings.
pub fn function_free_names(function: &Function) -> Vec<String> {
    let mut walker = NameWalker::default();
    walker.function(function);
    walker.out
}

pub fn stmt_free_names(stmts: &[Stmt]) -> Vec<String> {
    let mut walker = NameWalker::default();
    for stmt in stmts {
        walker.stmt(stmt);
    }
    walker.out
}

/// A step of evaluating a function body that matters when arguments are
/// substituted in place of their parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// A read of a tracked name that happens exactly when the body runs.
    Read(String),
    /// A read under a branch, a short-circuit, an optional link or a nested
    /// function: it may happen never or many times.
    GuardedRead(String),
    /// A call or another step that may have side effects.
    Effect,
}

/// Reads of `names` and possible side effects of `body`, in evaluation order.
pub fn evaluation_order(body: &FunctionBody, names: &[String]) -> Vec<Evaluation> {
    let mut walker = OrderWalker {
        names,
        bound: Vec::new(),
        guarded: 0,
        deferred: 0,
        out: Vec::new(),
    };
    walker.body(body);
    walker.out
}

struct OrderWalker<'a> {
    names: &'a [String],
    bound: Vec<String>,
    guarded: usize,
    /// Inside a nested function, whose effects do not run at definition.
    deferred: usize,
    out: Vec<Evaluation>,
}

impl OrderWalker<'_> {
    fn read(&mut self, name: &str) {
        if !self.names.iter().any(|tracked| tracked == name)
            || self.bound.iter().any(|bound| bound == name)
        {
            return;
        }
        let step = if self.guarded > 0 {
            Evaluation::GuardedRead(name.to_string())
        } else {
            Evaluation::Read(name.to_string())
        };
        self.out.push(step);
    }

    fn effect(&mut self) {
        if self.deferred == 0 {
            self.out.push(Evaluation::Effect);
        }
    }

    fn guarded_expr(&mut self, expr: &Expr) {
        self.guarded += 1;
        self.expr(expr);
        self.guarded -= 1;
    }

    fn body(&mut self, body: &FunctionBody) {
        match body {
            FunctionBody::Expr(expr) => self.expr(expr),
            FunctionBody::Block { stmts, .. } => {
                for stmt in stmts {
                    self.stmt(stmt);
                }
            }
        }
    }

    fn elements(&mut self, elements: &[Element]) {
        for element in elements {
            match element {
                Element::Expr(expr) => self.expr(expr),
                Element::Spread(expr) => {
                    self.expr(expr);
                    // Spreading runs the iterator protocol.
                    self.effect();
                }
                Element::Hole => {}
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(name) => self.read(&name.name),
            Expr::Number { .. } | Expr::String { .. } | Expr::Bool { .. } | Expr::Null { .. } => {}
            Expr::Template { parts, .. } => {
                for part in parts {
                    if let TemplatePart::Expr(expr) = part {
                        self.expr(expr);
                    }
                }
            }
            Expr::Array { elements, .. } => self.elements(elements),
            Expr::Object { props, .. } => {
                for prop in props {
                    match prop {
                        Property::KeyValue { key, value, .. } => {
                            if let PropKey::Computed(key) = key {
                                self.expr(key);
                            }
                            self.expr(value);
                        }
                        Property::Shorthand(name) => self.read(&name.name),
                        Property::Spread { expr, .. } => self.expr(expr),
                        Property::Method { names, .. } => {
                            self.guarded += 1;
                            for name in names {
                                self.read(name);
                            }
                            self.guarded -= 1;
                        }
                    }
                }
            }
            Expr::Member { base, .. } => self.expr(base),
            Expr::Index {
                base,
                index,
                optional,
                ..
            } => {
                self.expr(base);
                if *optional || base.has_optional_link() {
                    self.guarded_expr(index);
                } else {
                    self.expr(index);
                }
            }
            Expr::Call {
                callee,
                args,
                optional,
                ..
            } => {
                self.expr(callee);
                if *optional || callee.has_optional_link() {
                    self.guarded += 1;
                    self.elements(args);
                    self.guarded -= 1;
                } else {
                    self.elements(args);
                }
                self.effect();
            }
            Expr::Conditional {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.expr(cond);
                self.guarded_expr(then_branch);
                self.guarded_expr(else_branch);
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                self.expr(left);
                if op.is_logical() {
                    self.guarded_expr(right);
                } else {
                    self.expr(right);
                }
            }
            Expr::Unary { expr, .. } | Expr::Paren { inner: expr, .. } => self.expr(expr),
            Expr::Await { expr, .. } => {
                self.expr(expr);
                self.effect();
            }
            Expr::Function(function) => {
                let depth = self.bound.len();
                self.bound.extend(function_bound_names(function));
                let guarded = self.guarded;
                self.guarded += 1;
                self.deferred += 1;
                for param in &function.params {
                    if let Some(default) = &param.default {
                        self.expr(default);
                    }
                }
                self.body(&function.body);
                self.deferred -= 1;
                self.guarded = guarded;
                self.bound.truncate(depth);
            }
            Expr::Other {
                kind, fragments, ..
            } => {
                for fragment in fragments {
                    if let Fragment::Expr(expr) = fragment {
                        self.expr(expr);
                    }
                }
                let type_only = matches!(
                    kind.as_str(),
                    "as_expression"
                        | "satisfies_expression"
                        | "non_null_expression"
                        | "type_assertion"
                        | "instantiation_expression"
                        | "parenthesized_expression"
                );
                if !type_only {
                    self.effect();
                }
            }
            Expr::Opaque { names, .. } => {
                self.guarded += 1;
                for name in names {
                    self.read(name);
                }
                self.guarded -= 1;
                self.effect();
            }
        }
    }

    /// Statements after an `if` or `switch` may be skipped by a `return` inside
    /// it, so the guard is never lifted for the rest of the body.
    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.expr(cond);
                self.guarded += 1;
                self.stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch);
                }
            }
            Stmt::Switch {
                discriminant,
                cases,
                ..
            } => {
                self.expr(discriminant);
                self.guarded += 1;
                for case in cases {
                    if let Some(test) = &case.test {
                        self.expr(test);
                    }
                    for stmt in &case.body {
                        self.stmt(stmt);
                    }
                }
            }
            Stmt::Block { body, .. } => {
                for stmt in body {
                    self.stmt(stmt);
                }
            }
            Stmt::Expr { expr, .. } => self.expr(expr),
            Stmt::Other { names, .. } => {
                self.guarded += 1;
                for name in names {
                    self.read(name);
                }
                self.effect();
            }
        }
    }
}

#[derive(Default)]
struct NameWalker {
    bound: Vec<String>,
    out: Vec<String>,
}

impl NameWalker {
    fn mention(&mut self, name: &str) {
        if self.bound.iter().any(|bound| bound == name) {
            return;
        }
        if !self.out.iter().any(|known| known == name) {
            self.out.push(name.to_string());
        }
    }

    fn function(&mut self, function: &Function) {
        let names = function_bound_names(function);
        let depth = self.bound.len();
        self.bound.extend(names);
        for param in &function.params {
            self.pattern_defaults(&param.pattern);
            if let Some(default) = &param.default {
                self.expr(default);
            }
        }
        match &function.body {
            FunctionBody::Expr(body) => self.expr(body),
            FunctionBody::Block { stmts, .. } => {
                for stmt in stmts {
                    self.stmt(stmt);
                }
            }
        }
        self.bound.truncate(depth);
    }

    fn pattern_defaults(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Object { props, .. } => {
                for prop in props {
                    match prop {
                        ObjectPatternProp::Field { key, value, .. } => {
                            if let PropKey::Computed(key) = key {
                                self.expr(key);
                            }
                            self.pattern_defaults(value);
                        }
                        ObjectPatternProp::Rest(inner) => self.pattern_defaults(inner),
                    }
                }
            }
            Pattern::Array { elements, .. } => {
                for element in elements.iter().flatten() {
                    self.pattern_defaults(element);
                }
            }
            Pattern::Rest { inner, .. } => self.pattern_defaults(inner),
            Pattern::Assign {
                target, default, ..
            } => {
                self.pattern_defaults(target);
                self.expr(default);
            }
            Pattern::Ident(_) | Pattern::Unsupported { .. } => {}
        }
    }

    fn elements(&mut self, elements: &[Element]) {
        for element in elements {
            match element {
                Element::Expr(expr) | Element::Spread(expr) => self.expr(expr),
                Element::Hole => {}
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(name) => self.mention(&name.name),
            Expr::Number { .. } | Expr::String { .. } | Expr::Bool { .. } | Expr::Null { .. } => {}
            Expr::Template { parts, .. } => {
                for part in parts {
                    if let TemplatePart::Expr(expr) = part {
                        self.expr(expr);
                    }
                }
            }
            Expr::Array { elements, .. } => self.elements(elements),
            Expr::Object { props, .. } => {
                for prop in props {
                    match prop {
                        Property::KeyValue { key, value, .. } => {
                            if let PropKey::Computed(key) = key {
                                self.expr(key);
                            }
                            self.expr(value);
                        }
                        Property::Shorthand(name) => self.mention(&name.name),
                        Property::Spread { expr, .. } => self.expr(expr),
                        Property::Method { names, .. } => {
                            for name in names {
                                self.mention(name);
                            }
                        }
                    }
                }
            }
            Expr::Member { base, .. } => self.expr(base),
            Expr::Index { base, index, .. } => {
                self.expr(base);
                self.expr(index);
            }
            Expr::Call { callee, args, .. } => {
                self.expr(callee);
                self.elements(args);
            }
            Expr::Conditional {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.expr(cond);
                self.expr(then_branch);
                self.expr(else_branch);
            }
            Expr::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Unary { expr, .. } | Expr::Paren { inner: expr, .. } | Expr::Await { expr, .. } => {
                self.expr(expr)
            }
            Expr::Function(function) => self.function(function),
            Expr::Other { fragments, .. } => {
                for fragment in fragments {
                    if let Fragment::Expr(expr) = fragment {
                        self.expr(expr);
                    }
                }
            }
            Expr::Opaque { names, .. } => {
                for name in names {
                    self.mention(name);
                }
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.expr(cond);
                self.stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch);
                }
            }
            Stmt::Switch {
                discriminant,
                cases,
                ..
            } => {
                self.expr(discriminant);
                for case in cases {
                    if let Some(test) = &case.test {
                        self.expr(test);
                    }
                    for stmt in &case.body {
                        self.stmt(stmt);
                    }
                }
            }
            Stmt::Block { body, .. } => {
                for stmt in body {
                    self.stmt(stmt);
                }
            }
            Stmt::Expr { expr, .. } => self.expr(expr),
            Stmt::Other { names, .. } => {
                for name in names {
                    self.mention(name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_expression;

    #[test]
    fn free_names_skip_members_and_nested_params() {
        let expr = parse_expression("a.b + items.map((x) => x * factor) + { k: v, w }.k").unwrap();
        assert_eq!(free_names(&expr), vec!["a", "items", "factor", "v", "w"]);
    }

    fn order(function_text: &str, names: &[&str]) -> Vec<Evaluation> {
        let Expr::Function(function) = parse_expression(function_text).unwrap() else {
            panic!("expected a function");
        };
        let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        evaluation_order(&function.body, &names)
    }

    fn read(name: &str) -> Evaluation {
        Evaluation::Read(name.to_string())
    }

    fn guarded(name: &str) -> Evaluation {
        Evaluation::GuardedRead(name.to_string())
    }

    #[test]
    fn evaluation_order_follows_operands_and_calls() {
        assert_eq!(
            order("(p, q) => p + q + ((p) => p)(1)", &["p", "q"]),
            vec![read("p"), read("q"), Evaluation::Effect]
        );
        assert_eq!(
            order("(a, b) => log(b) - a", &["a", "b"]),
            vec![read("b"), Evaluation::Effect, read("a")]
        );
    }

    #[test]
    fn branches_and_nested_functions_guard_reads() {
        assert_eq!(order("(a) => flag ? a : 0", &["a"]), vec![guarded("a")]);
        assert_eq!(order("(a) => ok && a", &["a"]), vec![guarded("a")]);
        assert_eq!(order("(a) => box?.[a]", &["a"]), vec![guarded("a")]);
        assert_eq!(
            order("(a) => items.map((x) => x + a)", &["a"]),
            vec![guarded("a"), Evaluation::Effect]
        );
        assert_eq!(
            order("(a) => { if (ready) { return a; } return 0; }", &["a"]),
            vec![guarded("a")]
        );
    }

    #[test]
    fn pattern_names_follow_destructuring() {
        let expr = parse_expression("({ a, b: [c, , d], ...rest }) => a").unwrap();
        let Expr::Function(function) = expr else {
            panic!("expected a function");
        };
        assert_eq!(
            pattern_names(&function.params[0].pattern),
            vec!["a", "c", "d", "rest"]
        );
    }
}
