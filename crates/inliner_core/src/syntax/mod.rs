mod ast;
pub(crate) mod lower;
mod names;
mod render;
mod source_file;
mod strings;

pub use ast::*;
pub use names::{
    Evaluation, evaluation_order, free_names, function_bound_names, function_free_names,
    pattern_names, stmt_free_names,
};
pub use render::{ASSIGNMENT, STATEMENT_POSITION, precedence, render_expr, render_expr_at};
pub use source_file::{CallSite, ExprSite, SourceFile, parse_expression, parse_source};
pub use strings::{escape_template_text, format_number, is_identifier_name, quote, unescape};
