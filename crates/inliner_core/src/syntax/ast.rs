use std::path::PathBuf;

use crate::diagnostics::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedName {
    pub name: String,
    pub span: Span,
}

impl SpannedName {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    Eq,
    StrictEq,
    NotEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Nullish,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    InstanceOf,
}

impl BinaryOp {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            "**" => Self::Exp,
            "==" => Self::Eq,
            "===" => Self::StrictEq,
            "!=" => Self::NotEq,
            "!==" => Self::StrictNotEq,
            "<" => Self::Lt,
            "<=" => Self::LtEq,
            ">" => Self::Gt,
            ">=" => Self::GtEq,
            "&&" => Self::And,
            "||" => Self::Or,
            "??" => Self::Nullish,
            "&" => Self::BitAnd,
            "|" => Self::BitOr,
            "^" => Self::BitXor,
            "<<" => Self::Shl,
            ">>" => Self::Shr,
            ">>>" => Self::UShr,
            "in" => Self::In,
            "instanceof" => Self::InstanceOf,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Exp => "**",
            Self::Eq => "==",
            Self::StrictEq => "===",
            Self::NotEq => "!=",
            Self::StrictNotEq => "!==",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Nullish => "??",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::UShr => ">>>",
            Self::In => "in",
            Self::InstanceOf => "instanceof",
        }
    }

    /// ECMAScript binding power; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Nullish => 4,
            Self::Or => 5,
            Self::And => 6,
            Self::BitOr => 7,
            Self::BitXor => 8,
            Self::BitAnd => 9,
            Self::Eq | Self::StrictEq | Self::NotEq | Self::StrictNotEq => 10,
            Self::Lt | Self::LtEq | Self::Gt | Self::GtEq | Self::In | Self::InstanceOf => 11,
            Self::Shl | Self::Shr | Self::UShr => 12,
            Self::Add | Self::Sub => 13,
            Self::Mul | Self::Div | Self::Rem => 14,
            Self::Exp => 15,
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Nullish)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
    TypeOf,
    Void,
    Delete,
}

impl UnaryOp {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "!" => Self::Not,
            "-" => Self::Neg,
            "+" => Self::Plus,
            "~" => Self::BitNot,
            "typeof" => Self::TypeOf,
            "void" => Self::Void,
            "delete" => Self::Delete,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "-",
            Self::Plus => "+",
            Self::BitNot => "~",
            Self::TypeOf => "typeof",
            Self::Void => "void",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// Raw template text, escapes still in source form.
    Text(String),
    Expr(Expr),
}

/// A slot of an array literal or argument list.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Expr(Expr),
    Spread(Expr),
    Hole,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Ident(String),
    String(String),
    Number { value: f64, raw: String },
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    KeyValue {
        key: PropKey,
        value: Expr,
        span: Span,
    },
    Shorthand(SpannedName),
    Spread {
        expr: Expr,
        span: Span,
    },
    /// Methods and accessors; carried as text and never substituted into.
    Method {
        text: String,
        names: Vec<String>,
        span: Span,
    },
}

/// Source text around expression children of a node the engine does not model,
/// e.g. `new Point(x, y)` or `value as Shape`.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(SpannedName),
    Number {
        value: f64,
        raw: Option<String>,
        span: Span,
    },
    String {
        value: String,
        raw: Option<String>,
        span: Span,
    },
    Bool {
        value: bool,
        span: Span,
    },
    Null {
        span: Span,
    },
    Template {
        parts: Vec<TemplatePart>,
        span: Span,
    },
    Array {
        elements: Vec<Element>,
        span: Span,
    },
    Object {
        props: Vec<Property>,
        span: Span,
    },
    Member {
        base: Box<Expr>,
        name: SpannedName,
        optional: bool,
        span: Span,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Element>,
        optional: bool,
        span: Span,
    },
    Conditional {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Paren {
        inner: Box<Expr>,
        span: Span,
    },
    Await {
        expr: Box<Expr>,
        span: Span,
    },
    Function(Box<Function>),
    Other {
        kind: String,
        fragments: Vec<Fragment>,
        span: Span,
    },
    /// Shapes that must never be substituted into (assignments, classes, generators, ...).
    Opaque {
        text: String,
        names: Vec<String>,
        span: Span,
    },
}

impl Expr {
    pub fn ident(name: impl Into<String>, span: Span) -> Self {
        Self::Ident(SpannedName::new(name, span))
    }

    pub fn number(value: f64, span: Span) -> Self {
        Self::Number {
            value,
            raw: None,
            span,
        }
    }

    pub fn string(value: impl Into<String>, span: Span) -> Self {
        Self::String {
            value: value.into(),
            raw: None,
            span,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Self::Ident(name) => Some(name.name.as_str()),
            _ => None,
        }
    }

    /// Strips redundant source parentheses.
    pub fn unparen(&self) -> &Expr {
        let mut expr = self;
        while let Self::Paren { inner, .. } = expr {
            expr = inner;
        }
        expr
    }

    /// Whether this member or call chain short-circuits at some `?.` link.
    /// Extending such a chain without parentheses widens the short-circuit.
    pub fn has_optional_link(&self) -> bool {
        match self {
            Self::Member { base, optional, .. } | Self::Index { base, optional, .. } => {
                *optional || base.has_optional_link()
            }
            Self::Call {
                callee, optional, ..
            } => *optional || callee.has_optional_link(),
            _ => false,
        }
    }
}

pub fn expr_span(expr: &Expr) -> Span {
    match expr {
        Expr::Ident(name) => name.span,
        Expr::Function(function) => function.span,
        Expr::Number { span, .. }
        | Expr::String { span, .. }
        | Expr::Bool { span, .. }
        | Expr::Null { span }
        | Expr::Template { span, .. }
        | Expr::Array { span, .. }
        | Expr::Object { span, .. }
        | Expr::Member { span, .. }
        | Expr::Index { span, .. }
        | Expr::Call { span, .. }
        | Expr::Conditional { span, .. }
        | Expr::Binary { span, .. }
        | Expr::Unary { span, .. }
        | Expr::Paren { span, .. }
        | Expr::Await { span, .. }
        | Expr::Other { span, .. }
        | Expr::Opaque { span, .. } => *span,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(SpannedName),
    Object {
        props: Vec<ObjectPatternProp>,
        span: Span,
    },
    /// `None` entries are elision holes (`[, second]`).
    Array {
        elements: Vec<Option<Pattern>>,
        span: Span,
    },
    Rest {
        inner: Box<Pattern>,
        span: Span,
    },
    /// A default inside a destructuring pattern: `{ a = 1 }` or `[x = 0]`.
    Assign {
        target: Box<Pattern>,
        default: Box<Expr>,
        span: Span,
    },
    Unsupported {
        text: String,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectPatternProp {
    Field { key: PropKey, value: Pattern, span: Span },
    Rest(Pattern),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Expr(Box<Expr>),
    /// Statement block plus its source text; block bodies are rendered verbatim.
    Block { stmts: Vec<Stmt>, text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<SpannedName>,
    /// Source text of the type parameters, parameter list and return type.
    pub head: String,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    pub is_async: bool,
    pub is_arrow: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default:`.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Return {
        value: Option<Expr>,
        span: Span,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
        span: Span,
    },
    Block {
        body: Vec<Stmt>,
        span: Span,
    },
    Expr {
        expr: Expr,
        span: Span,
    },
    /// Declarations, loops and the rest; only their kind and names are kept.
    Other {
        kind: String,
        names: Vec<String>,
        span: Span,
    },
}

/// A callable definition found in some source file.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub function: Function,
    pub exported: bool,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    pub imported: String,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub module: String,
    pub default: Option<String>,
    pub namespace: Option<String>,
    pub named: Vec<ImportSpecifier>,
    pub type_only: bool,
    pub span: Span,
}

impl ImportDecl {
    /// Every local binding the declaration introduces.
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.default
            .iter()
            .chain(self.namespace.iter())
            .map(String::as_str)
            .chain(self.named.iter().map(|spec| spec.local.as_str()))
    }

    /// The exported name `local` refers to: `"default"` for default imports.
    pub fn imported_name(&self, local: &str) -> Option<&str> {
        if self.default.as_deref() == Some(local) {
            return Some("default");
        }
        self.named
            .iter()
            .find(|spec| spec.local == local)
            .map(|spec| spec.imported.as_str())
    }

    pub fn is_relative(&self) -> bool {
        is_relative_specifier(&self.module)
    }
}

pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
}

/// `export { local as exported } from "module"` or `export * from "module"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReExport {
    Named {
        module: String,
        imported: String,
        exported: String,
    },
    All {
        module: String,
    },
}
