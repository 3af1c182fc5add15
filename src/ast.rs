use serde::Serialize;

pub use crate::parser::tokenizer::Position;

/// Abstract Syntax Tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ast {
    pub segments: Vec<Segment>,
}

impl Ast {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

/// Top-level unit of a parsed template
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Segment {
    // Markup
    Literal(Literal),
    Html(Html),
    HtmlComment(HtmlComment),
    HtmlDocType(HtmlDocType),

    // Embedded language
    InlineExpression(InlineExpression),
    Block(Block),
    Statement(Statement),
    Expression(Expression),

    // Directives
    Helper(Helper),
    Section(Section),
    Comment(Comment),
}

/// Verbatim markup text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Literal {
    pub text: String,
}

impl Literal {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// HTML element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Html {
    pub tag_name: String,
    pub leading_whitespace: String,
    pub attributes: Vec<HtmlAttribute>,
    /// Whitespace between the last attribute and `>` or `/>`
    pub whitespace_before_end: String,
    pub end: ElementEnd,
}

impl Html {
    pub fn is_self_closing(&self) -> bool {
        matches!(self.end, ElementEnd::SelfClosing)
    }

    pub fn children(&self) -> &[Segment] {
        match &self.end {
            ElementEnd::Closed { children, .. } => children,
            ElementEnd::SelfClosing | ElementEnd::Void => &[],
        }
    }
}

/// How an element's start tag is terminated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ElementEnd {
    /// `<br/>`
    SelfClosing,
    /// `<br>` for a void element
    Void,
    /// `<div>...</div>`
    Closed {
        children: Vec<Segment>,
        whitespace_before_close: String,
        /// Name as written in the end tag; may differ in case from the start tag
        closing_name: String,
        /// Whitespace between the closing name and `>`
        whitespace_in_close: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtmlAttribute {
    pub name: String,
    pub leading_whitespace: String,
    /// `=` with any whitespace around it; empty for a valueless attribute
    pub separator: String,
    /// `None` for a valueless attribute such as `disabled`
    pub quote: Option<char>,
    pub values: Vec<AttributeValue>,
}

impl HtmlAttribute {
    pub fn has_expressions(&self) -> bool {
        self.values.iter().any(|value| matches!(value, AttributeValue::Expression(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttributeValue {
    Literal(Literal),
    Expression(InlineExpression),
}

/// `<!-- text -->`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtmlComment {
    pub leading_whitespace: String,
    pub text: String,
}

/// `<!DOCTYPE html>`; `declaration` is everything between `<!` and `>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtmlDocType {
    pub leading_whitespace: String,
    pub declaration: String,
}

/// `@expr` written in markup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineExpression {
    pub expression: Expression,
    pub leading_whitespace: String,
}

/// `{ ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub statements: Vec<Segment>,
}

/// `@helper name(params) { ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Helper {
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Block,
}

/// `@section name { ... }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub name: String,
    pub body: Block,
}

/// `@* text *@`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    VariableDeclaration(VariableDeclaration),
    If(IfStatement),
    For(ForLoop),
    ForEach(ForEachLoop),
}

/// `var name [= initializer]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDeclaration {
    pub name: String,
    pub initializer: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfStatement {
    pub test: Expression,
    pub body: Block,
    pub else_if: Option<Box<IfStatement>>,
    pub else_body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForLoop {
    pub initialization: VariableDeclaration,
    pub condition: Expression,
    pub iteration: Expression,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForEachLoop {
    pub loop_variable: String,
    pub collection: Expression,
    pub body: Block,
}

/// Embedded-language expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    VariableAccess(VariableAccess),
    Literal(LiteralExpression),
    MethodCall(MethodCall),
    ArrayAccess(ArrayAccess),
    ArrayLiteral(Vec<Expression>),
    Unary(UnaryExpression),
    Binary(BinaryExpression),
    Ternary(TernaryExpression),
}

/// `name` or `object.name`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableAccess {
    pub name: String,
    pub object: Option<Box<Expression>>,
    pub position: Position,
}

impl VariableAccess {
    /// True for a bare identifier with no receiver.
    pub fn is_unqualified(&self) -> bool {
        self.object.is_none()
    }
}

/// Literal in source form: `42`, `"text"`, `true`, `null`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiteralExpression {
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodCall {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayAccess {
    pub target: Box<Expression>,
    pub index: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Fixity {
    Prefix,
    Postfix,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnaryExpression {
    pub operator: String,
    pub operand: Box<Expression>,
    pub fixity: Fixity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryExpression {
    pub left: Box<Expression>,
    pub operator: String,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TernaryExpression {
    pub test: Box<Expression>,
    pub when_true: Box<Expression>,
    pub when_false: Box<Expression>,
}
