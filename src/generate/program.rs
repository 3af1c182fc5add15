//! Intermediate program produced by the generator.
//!
//! A [`Program`] is a tree of [`Op`]s. The runtime interprets it directly and
//! [`Program::to_source`] renders it as imperative program text for inspection.

use super::output::{quote_string, Output};
use crate::runtime::Value;

/// Executable body of a view, helper or section
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub ops: Vec<Op>,
}

/// Program compiled from a helper or section body
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub parameters: Vec<String>,
    pub program: Program,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Append markup verbatim
    Text(String),
    /// Append the escaped value of an expression
    Emit(Expr),
    /// Start collecting a conditional attribute, `prefix` is ` name="`
    BeginAttribute { prefix: String },
    /// Add a fragment to the attribute being collected
    AttributePart(AttributePart),
    /// Close the attribute. Falsy fragments are dropped and the rest joined
    /// with a space; nothing is written when the joined value is empty.
    EndAttribute { suffix: String },
    Declare { name: String, init: Option<Expr> },
    /// Evaluate for side effects
    Eval(Expr),
    If {
        test: Expr,
        then_branch: Vec<Op>,
        else_branch: Vec<Op>,
    },
    For {
        variable: String,
        init: Option<Expr>,
        condition: Expr,
        iteration: Expr,
        body: Vec<Op>,
    },
    ForEach {
        variable: String,
        collection: Expr,
        body: Vec<Op>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributePart {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Value),
    /// Variable declared in the template
    Local(String),
    /// Property of the model
    Model(String),
    /// The model itself
    ModelRoot,
    Member { object: Box<Expr>, name: String },
    Index { target: Box<Expr>, index: Box<Expr> },
    /// Unqualified call: builtin, template helper or host helper
    CallHelper { name: String, arguments: Vec<Expr> },
    CallMethod { receiver: Box<Expr>, name: String, arguments: Vec<Expr> },
    Array(Vec<Expr>),
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// `++`/`--` on a local
    Update { name: String, delta: f64, prefix: bool },
    Binary { left: Box<Expr>, op: BinaryOp, right: Box<Expr> },
    Assign { name: String, value: Box<Expr> },
    Conditional { test: Box<Expr>, when_true: Box<Expr>, when_false: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    New,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_operator(operator: &str) -> Option<Self> {
        Some(match operator {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Subtract,
            "*" => BinaryOp::Multiply,
            "/" => BinaryOp::Divide,
            "%" => BinaryOp::Remainder,
            "==" => BinaryOp::Equal,
            "!=" => BinaryOp::NotEqual,
            "===" => BinaryOp::StrictEqual,
            "!==" => BinaryOp::StrictNotEqual,
            "<" => BinaryOp::Less,
            ">" => BinaryOp::Greater,
            "<=" => BinaryOp::LessEqual,
            ">=" => BinaryOp::GreaterEqual,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::StrictEqual => "===",
            BinaryOp::StrictNotEqual => "!==",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl Program {
    pub fn new(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    /// Number of ops, counting nested bodies.
    pub fn len(&self) -> usize {
        count_ops(&self.ops)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Render as a `render(model)` function building an `html` array.
    pub fn to_source(&self) -> String {
        let mut output = Output::new();
        output.line("function render(model) {");
        output.indent();
        write_body(&self.ops, &mut output);
        output.dedent();
        output.push("}");
        output.finish()
    }
}

impl Fragment {
    /// Render as an entry of the `helpers` (or sections) table.
    pub fn to_source(&self, table: &str, name: &str) -> String {
        let mut output = Output::new();
        output.line(&format!("{}.{} = function({}) {{", table, name, self.parameters.join(", ")));
        output.indent();
        write_body(&self.program.ops, &mut output);
        output.dedent();
        output.push("};");
        output.finish()
    }
}

fn count_ops(ops: &[Op]) -> usize {
    ops.iter()
        .map(|op| {
            1 + match op {
                Op::If { then_branch, else_branch, .. } => count_ops(then_branch) + count_ops(else_branch),
                Op::For { body, .. } | Op::ForEach { body, .. } => count_ops(body),
                _ => 0,
            }
        })
        .sum()
}

fn write_body(ops: &[Op], output: &mut Output) {
    output.line("var html = [];");
    write_ops(ops, output);
    output.line("return html.join(\"\");");
}

fn write_ops(ops: &[Op], output: &mut Output) {
    for op in ops {
        match op {
            Op::Text(text) => output.line(&format!("html.push({});", quote_string(text))),
            Op::Emit(expr) => output.line(&format!("html.push(escape({}));", expr_source(expr))),
            Op::BeginAttribute { prefix } => output.line(&format!("beginAttribute({});", quote_string(prefix))),
            Op::AttributePart(AttributePart::Text(text)) => output.line(&format!("attributePart({});", quote_string(text))),
            Op::AttributePart(AttributePart::Expr(expr)) => output.line(&format!("attributePart({});", expr_source(expr))),
            Op::EndAttribute { suffix } => output.line(&format!("endAttribute({});", quote_string(suffix))),
            Op::Declare { name, init: Some(init) } => output.line(&format!("var {} = {};", name, expr_source(init))),
            Op::Declare { name, init: None } => output.line(&format!("var {};", name)),
            Op::Eval(expr) => output.line(&format!("{};", expr_source(expr))),
            Op::If { test, then_branch, else_branch } => {
                output.line(&format!("if ({}) {{", expr_source(test)));
                write_nested(then_branch, output);
                if !else_branch.is_empty() {
                    output.line("} else {");
                    write_nested(else_branch, output);
                }
                output.line("}");
            }
            Op::For { variable, init, condition, iteration, body } => {
                let init = init.as_ref().map(|init| format!(" = {}", expr_source(init))).unwrap_or_default();
                output.line(&format!(
                    "for (var {}{}; {}; {}) {{",
                    variable,
                    init,
                    expr_source(condition),
                    expr_source(iteration)
                ));
                write_nested(body, output);
                output.line("}");
            }
            Op::ForEach { variable, collection, body } => {
                output.line(&format!("for (var {} of {}) {{", variable, expr_source(collection)));
                write_nested(body, output);
                output.line("}");
            }
        }
    }
}

fn write_nested(ops: &[Op], output: &mut Output) {
    output.indent();
    write_ops(ops, output);
    output.dedent();
}

fn expr_source(expr: &Expr) -> String {
    match expr {
        Expr::Constant(value) => constant_source(value),
        Expr::Local(name) => name.clone(),
        Expr::Model(name) => format!("model.{}", name),
        Expr::ModelRoot => "model".to_string(),
        Expr::Member { object, name } => format!("{}.{}", expr_source(object), name),
        Expr::Index { target, index } => format!("{}[{}]", expr_source(target), expr_source(index)),
        Expr::CallHelper { name, arguments } => format!("helpers.{}({})", name, list_source(arguments)),
        Expr::CallMethod { receiver, name, arguments } => {
            format!("{}.{}({})", expr_source(receiver), name, list_source(arguments))
        }
        Expr::Array(items) => format!("[{}]", list_source(items)),
        Expr::Unary { op, operand } => match op {
            UnaryOp::Not => format!("!{}", expr_source(operand)),
            UnaryOp::Negate => format!("-{}", expr_source(operand)),
            UnaryOp::New => format!("new {}", expr_source(operand)),
        },
        Expr::Update { name, delta, prefix } => {
            let operator = if *delta < 0.0 { "--" } else { "++" };
            if *prefix {
                format!("{}{}", operator, name)
            } else {
                format!("{}{}", name, operator)
            }
        }
        Expr::Binary { left, op, right } => {
            format!("({} {} {})", expr_source(left), op.as_str(), expr_source(right))
        }
        Expr::Assign { name, value } => format!("{} = {}", name, expr_source(value)),
        Expr::Conditional { test, when_true, when_false } => format!(
            "({} ? {} : {})",
            expr_source(test),
            expr_source(when_true),
            expr_source(when_false)
        ),
    }
}

fn list_source(items: &[Expr]) -> String {
    items.iter().map(expr_source).collect::<Vec<_>>().join(", ")
}

fn constant_source(value: &Value) -> String {
    match value {
        Value::String(text) | Value::Raw(text) => quote_string(text),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(constant_source).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
