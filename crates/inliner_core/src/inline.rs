//! The full inline pipeline: bind, fold or reduce, then check that every name
//! the callee contributed still means the same thing at the call site.

use tracing::debug;

use crate::bind::bind_parameters;
use crate::constants::{ConstEnv, resolve};
use crate::error::InlineError;
use crate::imports::{ImportIndex, NeededImport};
use crate::reduce::reduce_block;
use crate::simplify::{ArgMap, evaluate, simplify};
use crate::syntax::{
    CallSite, Expr, FunctionBody, FunctionDef, SourceFile, expr_span, free_names,
    function_free_names, render_expr, render_expr_at,
};

/// A call replaced by the callee body.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineOutcome {
    pub expr: Expr,
    /// `expr` rendered for the call's position, parenthesized when needed.
    pub text: String,
    /// Package imports the caller must add, in first-use order.
    pub needed_imports: Vec<NeededImport>,
}

pub fn bind_and_inline(
    site: &CallSite,
    definition: &FunctionDef,
    callee_file: &SourceFile,
    caller_file: &SourceFile,
    caller_env: &ConstEnv,
) -> Result<InlineOutcome, InlineError> {
    let function = &definition.function;
    if function.is_async && !(site.awaited && site.in_async_function) {
        return Err(InlineError::NotAwaited(definition.name.clone()));
    }
    let callee_free = function_free_names(function);
    if let Some(name) = callee_free
        .iter()
        .find(|name| matches!(name.as_str(), "this" | "arguments" | "super"))
    {
        return Err(InlineError::unsupported(format!(
            "`{}` uses `{name}`, which would change meaning at the call site",
            definition.name
        )));
    }

    let same_file = definition.path == caller_file.path();
    let offset = site.span.start;
    let caller_scopes = caller_file.scopes();
    // Callee names the caller binds differently must not fold through the caller's constants.
    let caller_env = caller_env.without(callee_free.iter().map(String::as_str).filter(|name| {
        !same_file || caller_scopes.is_locally_declared(offset, name)
    }));

    let bindings = bind_parameters(function, site.args(), &caller_env)?;
    let expr = match &function.body {
        FunctionBody::Expr(body) => simplify(body, &bindings.args, &caller_env)?,
        FunctionBody::Block { stmts, .. } => reduce_block(stmts, &bindings.args, &caller_env)?,
    };
    let needed_imports = captured_names(&expr, &callee_free, site, same_file, callee_file, caller_file)?;
    let text = render_expr_at(&expr, site.min_precedence);
    debug!(
        callee = %definition.name,
        imports = needed_imports.len(),
        "inlined call"
    );
    Ok(InlineOutcome {
        expr,
        text,
        needed_imports,
    })
}

/// Checks every name the callee body contributed to `expr` and collects the
/// package imports the caller lacks.
fn captured_names(
    expr: &Expr,
    callee_free: &[String],
    site: &CallSite,
    same_file: bool,
    callee_file: &SourceFile,
    caller_file: &SourceFile,
) -> Result<Vec<NeededImport>, InlineError> {
    let offset = site.span.start;
    let caller_scopes = caller_file.scopes();
    let caller_top = caller_scopes.root();
    let callee_top = callee_file.scopes().root();
    let callee_imports = ImportIndex::build(callee_file.imports());
    let caller_imports = ImportIndex::build(caller_file.imports());
    let mut needed: Vec<NeededImport> = Vec::new();

    for name in free_names(expr) {
        if !callee_free.contains(&name) {
            continue;
        }
        if caller_scopes.is_locally_declared(offset, &name) {
            return Err(InlineError::unsupported(format!(
                "`{name}` is shadowed by a local declaration at the call site"
            )));
        }
        if same_file {
            continue;
        }
        let caller_declares = caller_top.is_some_and(|scope| scope.declared.contains(&name));
        if let Some(binding) = callee_imports.lookup(&name) {
            match caller_imports.lookup(&name) {
                Some(existing) if existing.same_as(binding) => {}
                Some(existing) => {
                    return Err(InlineError::unsupported(format!(
                        "`{name}` is imported from \"{}\" here but from \"{}\" in {}",
                        existing.module,
                        binding.module,
                        callee_file.path().display()
                    )));
                }
                None if caller_declares => {
                    return Err(InlineError::unsupported(format!(
                        "`{name}` is imported by {} but declared differently here",
                        callee_file.path().display()
                    )));
                }
                None => {
                    if !needed.contains(binding) {
                        needed.push(binding.clone());
                    }
                }
            }
        } else if callee_top.is_some_and(|scope| scope.declared.contains(&name)) {
            return Err(InlineError::unsupported(format!(
                "`{name}` is private to {}",
                callee_file.path().display()
            )));
        } else if caller_declares {
            return Err(InlineError::unsupported(format!(
                "global `{name}` is redeclared in {}",
                caller_file.path().display()
            )));
        }
    }
    Ok(needed)
}

/// Folds an expression on its own: a literal value when it evaluates to one,
/// otherwise its resolved or simplified form.
pub fn literal_fold(expr: &Expr, env: &ConstEnv) -> Result<Expr, InlineError> {
    if let Some(value) = evaluate(expr, env) {
        return Ok(value.to_expr(expr_span(expr)));
    }
    if let Some(resolved) = resolve(expr, env) {
        return Ok(resolved);
    }
    let simplified = simplify(expr, &ArgMap::default(), env)?;
    if render_expr(&simplified) == render_expr(expr.unparen()) {
        return Err(InlineError::non_constant(format!(
            "`{}` has nothing to fold",
            render_expr(expr)
        )));
    }
    Ok(simplified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::collect_visible_constants;
    use crate::syntax::parse_source;

    fn inline_in(source: &str, callee: &str, marker: &str) -> Result<InlineOutcome, InlineError> {
        let file = parse_source("main.ts", source).unwrap();
        let offset = source.find(marker).unwrap();
        let site = file.call_at(offset).unwrap();
        let definition = file.find_function(callee).unwrap();
        let env = collect_visible_constants(&file, offset);
        bind_and_inline(&site, &definition, &file, &file, &env)
    }

    #[test]
    fn inlines_within_one_file() {
        let source = "const addTwo = (a: number) => a + 2;\nconst three = 3;\nconst five = addTwo(three) * 10;\n";
        let outcome = inline_in(source, "addTwo", "addTwo(three)").unwrap();
        assert_eq!(outcome.text, "(three + 2)");
        assert!(outcome.needed_imports.is_empty());
    }

    #[test]
    fn async_callee_requires_await() {
        let source = "async function load(id: number) { return fetchItem(id); }\n\
                      function sync() { return load(1); }\n\
                      async function run() { return await load(2); }\n";
        let err = inline_in(source, "load", "load(1)").unwrap_err();
        assert!(matches!(err, InlineError::NotAwaited(_)));
        let outcome = inline_in(source, "load", "load(2)").unwrap();
        assert_eq!(outcome.text, "fetchItem(2)");
    }

    #[test]
    fn rejects_names_shadowed_at_the_call_site() {
        let source = "const LIMIT = 10;\nfunction cap(n: number) { return Math.min(n, LIMIT); }\n\
                      function g(LIMIT: number) { return cap(4); }\n";
        let err = inline_in(source, "cap", "cap(4)").unwrap_err();
        assert!(matches!(err, InlineError::Unsupported(_)));
    }

    #[test]
    fn shadowed_constants_do_not_fold_the_callee() {
        let source = "const MODE = 'a';\nconst pick = () => MODE === 'a' ? 1 : 2;\n\
                      function g() { const MODE = 'b'; return pick(); }\n";
        let err = inline_in(source, "pick", "pick()").unwrap_err();
        assert!(matches!(err, InlineError::Unsupported(_)));
    }

    #[test]
    fn parameter_names_never_fold_caller_expressions() {
        let source = "const pick = (x: boolean, y: boolean) => y ? 'yes' : 'no';\n\
                      function g(x: boolean) { return pick(true, x); }\n";
        let outcome = inline_in(source, "pick", "pick(true, x)").unwrap();
        assert_eq!(render_expr(&outcome.expr), "x ? 'yes' : 'no'");

        let constant = "const pick = (x: boolean, y: boolean) => y ? 'yes' : 'no';\n\
                        const x = false;\nconst v = pick(true, x);\n";
        let outcome = inline_in(constant, "pick", "pick(true, x)").unwrap();
        assert_eq!(outcome.text, "'no'");
    }

    #[test]
    fn rejects_this_and_arguments() {
        let source = "function total() { return arguments.length; }\nconst n = total(1, 2);\n";
        let err = inline_in(source, "total", "total(1, 2)").unwrap_err();
        assert!(matches!(err, InlineError::Unsupported(_)));
    }

    fn inline_across(callee_source: &str, caller_source: &str, marker: &str) -> Result<InlineOutcome, InlineError> {
        let callee_file = parse_source("lib/format.ts", callee_source).unwrap();
        let caller_file = parse_source("app/main.ts", caller_source).unwrap();
        let offset = caller_source.find(marker).unwrap();
        let site = caller_file.call_at(offset).unwrap();
        let name = site.callee_name().unwrap().to_string();
        let definition = callee_file.find_exported(&name).unwrap();
        let env = collect_visible_constants(&caller_file, offset);
        bind_and_inline(&site, &definition, &callee_file, &caller_file, &env)
    }

    #[test]
    fn reports_imports_the_caller_lacks() {
        let callee = "import { round } from \"mathkit\";\nexport const price = (n: number) => `$${round(n)}`;\n";
        let caller = "import { price } from \"../lib/format\";\nconst label = price(cost);\n";
        let outcome = inline_across(callee, caller, "price(cost)").unwrap();
        assert_eq!(outcome.text, "`$${round(cost)}`");
        let statements: Vec<String> = outcome
            .needed_imports
            .iter()
            .map(|import| import.to_statement())
            .collect();
        assert_eq!(statements, vec!["import { round } from \"mathkit\";".to_string()]);
    }

    #[test]
    fn reuses_identical_caller_imports() {
        let callee = "import { round } from \"mathkit\";\nexport const price = (n: number) => round(n);\n";
        let caller = "import { round } from \"mathkit\";\nimport { price } from \"../lib/format\";\nprice(2.5);\n";
        let outcome = inline_across(callee, caller, "price(2.5)").unwrap();
        assert_eq!(outcome.text, "round(2.5)");
        assert!(outcome.needed_imports.is_empty());
    }

    #[test]
    fn rejects_private_callee_names_and_conflicts() {
        let private = "const RATE = 3;\nexport const scale = (n: number) => n * RATE;\n";
        let err = inline_across(private, "scale(x);\n", "scale(x)").unwrap_err();
        assert!(matches!(err, InlineError::Unsupported(_)));

        let callee = "import { round } from \"mathkit\";\nexport const price = (n: number) => round(n);\n";
        let conflicting = "import { round } from \"other\";\nprice(1);\n";
        let err = inline_across(callee, conflicting, "price(1)").unwrap_err();
        assert!(matches!(err, InlineError::Unsupported(_)));
    }

    #[test]
    fn literal_fold_sees_through_constants() {
        let source = "const BASE = { a: 1 };\nconst N = 4;\nconst v = N * 2 + 1;\nconst o = { ...BASE, b: N };\nconst w = x + 1;\n";
        let file = parse_source("main.ts", source).unwrap();
        let fold_at = |marker: &str| {
            let offset = source.find(marker).unwrap();
            let site = file.expr_at(offset).unwrap();
            let env = collect_visible_constants(&file, offset);
            literal_fold(&site.expr, &env).map(|expr| render_expr(&expr))
        };
        assert_eq!(fold_at("N * 2").unwrap(), "9");
        assert_eq!(fold_at("{ ...BASE").unwrap(), "{ a: 1, b: 4 }");
        assert!(matches!(fold_at("x + 1"), Err(InlineError::NonConstant(_))));
    }
}
