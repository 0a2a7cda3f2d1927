use crate::lexer::Token;
use crate::tags::CustomTag;
use crate::template::TemplateTree;
use crate::value::Value;
use std::sync::Arc;

/// A node of the document tree
#[derive(Debug, Clone)]
pub enum Node {
    /// Literal markup, emitted verbatim
    Html(String),
    /// `{{ expression }}`
    Output(Expr),
    /// `{% tag ... %}`
    Tag(TagNode),
}

/// Parsed tag, produced by a registered tag parser
#[derive(Debug, Clone)]
pub enum TagNode {
    /// Placeholder for a named block; the body lives in the template's block map
    Block { name: String },
    /// `extends` only links the parent at parse time, it renders nothing
    Extends,
    Include(IncludeNode),
    If(IfNode),
    For(ForNode),
    /// Tag supplied by an embedder through `EngineBuilder::register_tag`
    Custom(Arc<dyn CustomTag>),
}

#[derive(Debug, Clone)]
pub struct IncludeNode {
    /// Name of the template the tag appeared in, used for relative lookups
    pub origin: String,
    pub source: IncludeSource,
    pub with: Vec<(String, Expr)>,
    pub only: bool,
}

#[derive(Debug, Clone)]
pub enum IncludeSource {
    /// Filename given as a string literal, compiled together with the includer
    Static(Arc<TemplateTree>),
    /// Filename computed per render
    Deferred(Expr),
}

#[derive(Debug, Clone)]
pub struct IfNode {
    pub branches: Vec<(Expr, Vec<Node>)>,
    pub otherwise: Option<Vec<Node>>,
}

#[derive(Debug, Clone)]
pub struct ForNode {
    pub key: String,
    pub value: Option<String>,
    pub iterable: Expr,
    pub body: Vec<Node>,
    pub empty: Option<Vec<Node>>,
}

/// Expression tree
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Variable(Variable),
    /// A variable or literal followed by `|filter(:arg)` applications
    Filtered {
        base: Box<Expr>,
        filters: Vec<FilterCall>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        token: Token,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negative,
    Positive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
    Add,
    Subtract,
    Multiply,
    Power,
}

impl BinaryOp {
    /// Map an operator token to its binary operation
    pub fn from_token(token: &Token) -> Option<Self> {
        let op = match token.value.as_str() {
            "||" | "or" => BinaryOp::Or,
            "&&" | "and" => BinaryOp::And,
            "==" => BinaryOp::Equal,
            "!=" | "<>" => BinaryOp::NotEqual,
            "<" => BinaryOp::Less,
            "<=" => BinaryOp::LessEqual,
            ">" => BinaryOp::Greater,
            ">=" => BinaryOp::GreaterEqual,
            "in" => BinaryOp::In,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Subtract,
            "*" => BinaryOp::Multiply,
            "^" => BinaryOp::Power,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub token: Token,
    pub parts: Vec<PathPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathPart {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone)]
pub struct FilterCall {
    pub name: String,
    pub token: Token,
    pub arg: Option<Expr>,
}
