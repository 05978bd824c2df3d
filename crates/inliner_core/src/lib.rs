#![deny(clippy::unwrap_used)]

mod bind;
mod comprehension;
mod constants;
mod diagnostics;
mod error;
mod imports;
mod inline;
mod literal;
mod reduce;
mod scope;
mod simplify;
pub mod syntax;

pub use bind::{Bindings, bind_parameters};
pub use comprehension::literal_inline_comprehension;
pub use constants::{ConstEnv, MAX_RESOLVE_DEPTH, merge_property, resolve, resolve_at};
pub use diagnostics::{Diagnostic, Position, Span, render_diagnostics};
pub use error::InlineError;
pub use imports::{ImportBinding, ImportIndex, ImportKind, NeededImport};
pub use inline::{InlineOutcome, bind_and_inline, literal_fold};
pub use literal::{LiteralValue, is_deep_literal, is_trivially_pure};
pub use reduce::reduce_block;
pub use scope::{ConstDecl, Scope, ScopeArena, ScopeId, collect_visible_constants};
pub use simplify::{ArgMap, evaluate, simplify};
pub use syntax::{
    CallSite, Expr, ExprSite, FunctionDef, ImportDecl, ReExport, SourceFile, parse_expression,
    parse_source, render_expr, render_expr_at,
};
