use super::builder::CodeBuilder;
use super::program::{AttributePart, BinaryOp, Expr, Fragment, Op, UnaryOp};
use super::{GenerateResult, Generator};
use crate::ast::*;
use crate::error::CodeGenError;
use crate::runtime::Value;
use crate::transform::TransformMetadata;
use crate::{IdentifierCasing, Options};
use std::collections::BTreeMap;
use tracing::debug;

/// Name that resolves to the whole model instead of one of its properties
const MODEL: &str = "model";

/// Lowers a template AST into a [`Program`](super::Program)
pub struct Transpiler {
    casing: IdentifierCasing,
}

impl Transpiler {
    pub fn new(options: &Options) -> Self {
        Self {
            casing: options.identifier_casing,
        }
    }
}

impl Default for Transpiler {
    fn default() -> Self {
        Self::new(&Options::default())
    }
}

impl Generator for Transpiler {
    fn generate(&self, ast: &Ast, metadata: &TransformMetadata) -> Result<GenerateResult, CodeGenError> {
        if let Some(name) = metadata.duplicate_helpers.first() {
            return Err(CodeGenError::new(format!("helper `{}` is declared more than once", name), ""));
        }
        if let Some(name) = metadata.duplicate_sections.first() {
            return Err(CodeGenError::new(format!("section `{}` is declared more than once", name), ""));
        }

        let mut lowering = Lowering {
            casing: self.casing,
            helpers: BTreeMap::new(),
            sections: BTreeMap::new(),
        };
        let mut builder = CodeBuilder::new();
        lowering.segments(&ast.segments, &mut builder)?;
        let program = builder.finish();

        debug!(
            ops = program.len(),
            helpers = ?lowering.helpers.keys().collect::<Vec<_>>(),
            sections = ?lowering.sections.keys().collect::<Vec<_>>(),
            external = ?metadata.external_helpers(),
            "generated program"
        );

        Ok(GenerateResult {
            program,
            helpers: lowering.helpers,
            sections: lowering.sections,
        })
    }
}

/// State of one generation run. Helpers and sections declared anywhere in the
/// template, nested ones included, land in the same tables.
struct Lowering {
    casing: IdentifierCasing,
    helpers: BTreeMap<String, Fragment>,
    sections: BTreeMap<String, Fragment>,
}

impl Lowering {
    fn segments(&mut self, segments: &[Segment], builder: &mut CodeBuilder) -> Result<(), CodeGenError> {
        for segment in segments {
            self.segment(segment, builder)?;
        }
        Ok(())
    }

    fn segment(&mut self, segment: &Segment, builder: &mut CodeBuilder) -> Result<(), CodeGenError> {
        match segment {
            Segment::Literal(literal) => {
                builder.start_markup();
                builder.literal(&literal.text)?;
            }
            Segment::Html(html) => self.html(html, builder)?,
            Segment::HtmlComment(comment) => {
                builder.start_markup();
                builder.literal(&format!("{}<!--{}-->", comment.leading_whitespace, comment.text))?;
            }
            Segment::HtmlDocType(doctype) => {
                builder.start_markup();
                builder.literal(&format!("{}<!{}>", doctype.leading_whitespace, doctype.declaration))?;
            }
            Segment::InlineExpression(inline) => {
                builder.start_markup();
                builder.literal(&inline.leading_whitespace)?;
                let expr = self.expression(&inline.expression, builder)?;
                builder.emit(expr);
            }
            // `@{ }` shares the scope of its surroundings
            Segment::Block(block) => self.segments(&block.statements, builder)?,
            Segment::Statement(statement) => {
                builder.start_code();
                self.statement(statement, builder)?;
            }
            Segment::Expression(expression) => {
                builder.start_code();
                let expr = self.expression(expression, builder)?;
                builder.push(Op::Eval(expr));
            }
            Segment::Helper(helper) => {
                let fragment = self.fragment(&helper.parameters, &helper.body)?;
                self.helpers.insert(helper.name.clone(), fragment);
            }
            Segment::Section(section) => {
                let fragment = self.fragment(&[], &section.body)?;
                self.sections.insert(section.name.clone(), fragment);
            }
            Segment::Comment(_) => {}
        }
        Ok(())
    }

    /// Compile a helper or section body on its own builder. Only `parameters`
    /// are locals there; every other name resolves against the model.
    fn fragment(&mut self, parameters: &[String], body: &Block) -> Result<Fragment, CodeGenError> {
        let mut builder = CodeBuilder::with_locals(parameters);
        self.segments(&body.statements, &mut builder)?;
        Ok(Fragment {
            parameters: parameters.to_vec(),
            program: builder.finish(),
        })
    }

    fn html(&mut self, html: &Html, builder: &mut CodeBuilder) -> Result<(), CodeGenError> {
        builder.start_markup();
        builder.literal(&format!("{}<{}", html.leading_whitespace, html.tag_name))?;
        for attribute in &html.attributes {
            self.attribute(attribute, builder)?;
        }
        builder.literal(&html.whitespace_before_end)?;

        match &html.end {
            ElementEnd::SelfClosing => builder.literal("/>")?,
            ElementEnd::Void => builder.literal(">")?,
            ElementEnd::Closed {
                children,
                whitespace_before_close,
                closing_name,
                whitespace_in_close,
            } => {
                builder.literal(">")?;
                self.segments(children, builder)?;
                builder.start_markup();
                builder.literal(&format!("{}</{}{}>", whitespace_before_close, closing_name, whitespace_in_close))?;
            }
        }
        Ok(())
    }

    fn attribute(&mut self, attribute: &HtmlAttribute, builder: &mut CodeBuilder) -> Result<(), CodeGenError> {
        let Some(quote) = attribute.quote else {
            builder.literal(&format!("{}{}", attribute.leading_whitespace, attribute.name))?;
            return Ok(());
        };
        let prefix = format!("{}{}{}{}", attribute.leading_whitespace, attribute.name, attribute.separator, quote);

        if !attribute.has_expressions() {
            let mut text = prefix;
            for value in &attribute.values {
                if let AttributeValue::Literal(literal) = value {
                    text.push_str(&literal.text);
                }
            }
            text.push(quote);
            builder.literal(&text)?;
            return Ok(());
        }

        builder.begin_attribute(prefix);
        for value in &attribute.values {
            match value {
                AttributeValue::Literal(literal) => {
                    builder.attribute_part(AttributePart::Text(literal.text.trim().to_string()));
                }
                AttributeValue::Expression(inline) => {
                    let expr = self.expression(&inline.expression, builder)?;
                    builder.attribute_part(AttributePart::Expr(expr));
                }
            }
        }
        builder.end_attribute(quote.to_string());
        Ok(())
    }

    fn statement(&mut self, statement: &Statement, builder: &mut CodeBuilder) -> Result<(), CodeGenError> {
        match statement {
            Statement::VariableDeclaration(declaration) => {
                // The initializer cannot see the name it initializes
                let init = self.initializer(declaration, builder)?;
                builder.declare(&declaration.name);
                builder.push(Op::Declare {
                    name: declaration.name.clone(),
                    init,
                });
            }
            Statement::If(if_statement) => {
                let op = self.if_statement(if_statement, builder)?;
                builder.push(op);
            }
            Statement::For(for_loop) => {
                builder.push_scope();
                let init = self.initializer(&for_loop.initialization, builder)?;
                builder.declare(&for_loop.initialization.name);
                let condition = self.expression(&for_loop.condition, builder)?;
                let iteration = self.expression(&for_loop.iteration, builder)?;
                let body = self.body(&for_loop.body, builder, None)?;
                builder.pop_scope();
                builder.push(Op::For {
                    variable: for_loop.initialization.name.clone(),
                    init,
                    condition,
                    iteration,
                    body,
                });
            }
            Statement::ForEach(foreach) => {
                let collection = self.expression(&foreach.collection, builder)?;
                let body = self.body(&foreach.body, builder, Some(&foreach.loop_variable))?;
                builder.push(Op::ForEach {
                    variable: foreach.loop_variable.clone(),
                    collection,
                    body,
                });
            }
        }
        Ok(())
    }

    fn initializer(&mut self, declaration: &VariableDeclaration, builder: &CodeBuilder) -> Result<Option<Expr>, CodeGenError> {
        declaration
            .initializer
            .as_ref()
            .map(|initializer| self.expression(initializer, builder))
            .transpose()
    }

    fn if_statement(&mut self, statement: &IfStatement, builder: &mut CodeBuilder) -> Result<Op, CodeGenError> {
        let test = self.expression(&statement.test, builder)?;
        let then_branch = self.body(&statement.body, builder, None)?;
        let else_branch = if let Some(else_if) = &statement.else_if {
            vec![self.if_statement(else_if, builder)?]
        } else if let Some(else_body) = &statement.else_body {
            self.body(else_body, builder, None)?
        } else {
            Vec::new()
        };
        Ok(Op::If {
            test,
            then_branch,
            else_branch,
        })
    }

    /// Lower a block into a nested body, optionally declaring a loop variable in it.
    fn body(&mut self, block: &Block, builder: &mut CodeBuilder, variable: Option<&str>) -> Result<Vec<Op>, CodeGenError> {
        builder.open_body();
        if let Some(variable) = variable {
            builder.declare(variable);
        }
        let lowered = self.segments(&block.statements, builder);
        builder.start_code();
        let ops = builder.close_body();
        lowered.map(|_| ops)
    }

    fn expression(&self, expression: &Expression, builder: &CodeBuilder) -> Result<Expr, CodeGenError> {
        Ok(match expression {
            Expression::VariableAccess(access) => match &access.object {
                None => self.resolve(&access.name, builder),
                Some(object) => Expr::Member {
                    object: Box::new(self.expression(object, builder)?),
                    name: self.casing.apply(&access.name),
                },
            },
            Expression::Literal(literal) => Expr::Constant(literal_value(&literal.raw).ok_or_else(|| {
                builder.error(format!("`{}` is not a valid literal", literal.raw))
            })?),
            Expression::MethodCall(call) => {
                let arguments = self.list(&call.arguments, builder)?;
                match call.callee.as_ref() {
                    Expression::VariableAccess(access) => match &access.object {
                        None if builder.is_declared(&access.name) => {
                            return Err(builder.error(format!("local `{}` cannot be called", access.name)));
                        }
                        None => Expr::CallHelper {
                            name: access.name.clone(),
                            arguments,
                        },
                        Some(object) => Expr::CallMethod {
                            receiver: Box::new(self.expression(object, builder)?),
                            name: self.casing.apply(&access.name),
                            arguments,
                        },
                    },
                    _ => return Err(builder.error("only helpers and methods can be called")),
                }
            }
            Expression::ArrayAccess(access) => Expr::Index {
                target: Box::new(self.expression(&access.target, builder)?),
                index: Box::new(self.expression(&access.index, builder)?),
            },
            Expression::ArrayLiteral(items) => Expr::Array(self.list(items, builder)?),
            Expression::Unary(unary) => self.unary(unary, builder)?,
            Expression::Binary(binary) => self.binary(binary, builder)?,
            Expression::Ternary(ternary) => Expr::Conditional {
                test: Box::new(self.expression(&ternary.test, builder)?),
                when_true: Box::new(self.expression(&ternary.when_true, builder)?),
                when_false: Box::new(self.expression(&ternary.when_false, builder)?),
            },
        })
    }

    fn list(&self, expressions: &[Expression], builder: &CodeBuilder) -> Result<Vec<Expr>, CodeGenError> {
        expressions
            .iter()
            .map(|expression| self.expression(expression, builder))
            .collect()
    }

    /// Locals win over model properties.
    fn resolve(&self, name: &str, builder: &CodeBuilder) -> Expr {
        if builder.is_declared(name) {
            return Expr::Local(name.to_string());
        }
        let name = self.casing.apply(name);
        if name == MODEL {
            Expr::ModelRoot
        } else {
            Expr::Model(name)
        }
    }

    fn unary(&self, unary: &UnaryExpression, builder: &CodeBuilder) -> Result<Expr, CodeGenError> {
        let op = match unary.operator.as_str() {
            "!" => UnaryOp::Not,
            "-" => UnaryOp::Negate,
            "new" => UnaryOp::New,
            "++" | "--" => {
                let name = assignable(&unary.operand, builder).ok_or_else(|| {
                    builder.error(format!("`{}` needs a declared local variable", unary.operator))
                })?;
                return Ok(Expr::Update {
                    name,
                    delta: if unary.operator == "++" { 1.0 } else { -1.0 },
                    prefix: unary.fixity == Fixity::Prefix,
                });
            }
            other => return Err(builder.error(format!("unsupported unary operator `{}`", other))),
        };
        Ok(Expr::Unary {
            op,
            operand: Box::new(self.expression(&unary.operand, builder)?),
        })
    }

    fn binary(&self, binary: &BinaryExpression, builder: &CodeBuilder) -> Result<Expr, CodeGenError> {
        let right = self.expression(&binary.right, builder)?;
        if let Some(op) = BinaryOp::from_operator(&binary.operator) {
            return Ok(Expr::Binary {
                left: Box::new(self.expression(&binary.left, builder)?),
                op,
                right: Box::new(right),
            });
        }

        let Some(compound) = binary.operator.strip_suffix('=') else {
            return Err(builder.error(format!("unsupported operator `{}`", binary.operator)));
        };
        let name = assignable(&binary.left, builder)
            .ok_or_else(|| builder.error("only declared local variables can be assigned"))?;
        let value = if compound.is_empty() {
            right
        } else {
            let op = BinaryOp::from_operator(compound)
                .ok_or_else(|| builder.error(format!("unsupported operator `{}`", binary.operator)))?;
            Expr::Binary {
                left: Box::new(Expr::Local(name.clone())),
                op,
                right: Box::new(right),
            }
        };
        Ok(Expr::Assign {
            name,
            value: Box::new(value),
        })
    }
}

/// Name of the local an assignment or update targets.
fn assignable(expression: &Expression, builder: &CodeBuilder) -> Option<String> {
    match expression {
        Expression::VariableAccess(access) if access.is_unqualified() && builder.is_declared(&access.name) => {
            Some(access.name.clone())
        }
        _ => None,
    }
}

fn literal_value(raw: &str) -> Option<Value> {
    match raw {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }
    let mut chars = raw.chars();
    match chars.next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = raw.strip_prefix(quote)?.strip_suffix(quote)?;
            Some(Value::String(unescape(inner)))
        }
        _ => raw.parse::<f64>().ok().map(Value::Number),
    }
}

fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}
