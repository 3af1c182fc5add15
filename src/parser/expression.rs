//! Expression grammar of the embedded language.
//!
//! Binary operators are parsed by precedence climbing over [`BINARY_PRECEDENCE`],
//! loosest first. All levels are left-associative. The ternary sits above `||`.

use super::tokenizer::{Category, Expected, Token, TokenSource};
use super::tree_builder::{ParseResult, TreeBuilder};
use crate::ast::*;
use crate::error::{ErrorKind, ParseError};

const BINARY_PRECEDENCE: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["==", "!=", "===", "!=="],
    &["<", ">", "<=", ">="],
    &["+", "-"],
    &["*", "/", "%"],
];

const PREFIX_OPERATORS: &[&str] = &["!", "-", "++", "--"];

impl<'a> TreeBuilder<'a> {
    pub(super) fn parse_expression(&mut self) -> ParseResult<Expression> {
        let test = self.parse_binary(0)?;
        if !self.ws().peek().is("?") {
            return Ok(test);
        }
        self.ws().consume()?;
        let when_true = self.parse_expression()?;
        self.ws().expect(":")?;
        let when_false = self.parse_expression()?;
        Ok(Expression::Ternary(TernaryExpression {
            test: Box::new(test),
            when_true: Box::new(when_true),
            when_false: Box::new(when_false),
        }))
    }

    fn parse_binary(&mut self, level: usize) -> ParseResult<Expression> {
        let Some(operators) = BINARY_PRECEDENCE.get(level) else {
            return self.parse_unary();
        };
        let mut left = self.parse_binary(level + 1)?;
        loop {
            let next = self.ws().peek();
            if next.category != Category::Operator || !operators.contains(&next.text) {
                return Ok(left);
            }
            self.ws().consume()?;
            let right = self.parse_binary(level + 1)?;
            left = Expression::Binary(BinaryExpression {
                left: Box::new(left),
                operator: next.text.to_string(),
                right: Box::new(right),
            });
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let next = self.ws().peek();
        let is_prefix = (next.category == Category::Operator && PREFIX_OPERATORS.contains(&next.text))
            || (next.is_alphanumeric() && next.text == "new");
        if is_prefix {
            self.ws().consume()?;
            let operand = self.parse_unary()?;
            return Ok(unary(next, operand, Fixity::Prefix));
        }

        let operand = self.parse_primary()?;
        let operand = self.parse_chain(operand, false)?;
        let next = self.ws().peek();
        if next.is("++") || next.is("--") {
            self.ws().consume()?;
            return Ok(unary(next, operand, Fixity::Postfix));
        }
        Ok(operand)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let token = self.ws().peek();
        match token.category {
            Category::Numeric => {
                self.ws().consume()?;
                Ok(Expression::Literal(LiteralExpression {
                    raw: token.text.to_string(),
                }))
            }
            Category::Alphanumeric => {
                self.ws().consume()?;
                Ok(identifier(token))
            }
            Category::Operator if token.is("\"") || token.is("'") => self.parse_string_literal(),
            Category::Operator if token.is("(") => {
                self.ws().consume()?;
                let inner = self.parse_expression()?;
                self.ws().expect(")")?;
                Ok(inner)
            }
            Category::Operator if token.is("[") => {
                self.ws().consume()?;
                Ok(Expression::ArrayLiteral(self.parse_list("]")?))
            }
            Category::EndOfInput => Err(ParseError::new(
                ErrorKind::UnexpectedEndOfInput,
                "expected an expression but the template ended",
                token.position,
            )
            .into()),
            _ => Err(ParseError::new(
                ErrorKind::UnexpectedToken,
                format!("expected an expression but found {}", token.describe()),
                token.position,
            )
            .into()),
        }
    }

    /// Apply `.member`, `[index]` and `(arguments)` suffixes to `expression`.
    ///
    /// With `significant_whitespace` (inline `@expr` in markup) the chain ends at
    /// the first whitespace, and a `.` only continues it when a name follows.
    pub(super) fn parse_chain(&mut self, mut expression: Expression, significant_whitespace: bool) -> ParseResult<Expression> {
        loop {
            let (next, after) = if significant_whitespace {
                (self.tokens.peek(), self.tokens.peek_next())
            } else {
                let mut ws = self.ws();
                (ws.peek(), ws.peek_next())
            };

            if next.is(".") {
                if significant_whitespace && !after.is_alphanumeric() {
                    return Ok(expression);
                }
                self.ws().consume()?;
                let member = self.ws().consume_expected(Expected::Category(Category::Alphanumeric))?;
                expression = Expression::VariableAccess(VariableAccess {
                    name: member.text.to_string(),
                    object: Some(Box::new(expression)),
                    position: member.position,
                });
            } else if next.is("[") {
                self.ws().consume()?;
                let index = self.parse_expression()?;
                self.ws().expect("]")?;
                expression = Expression::ArrayAccess(ArrayAccess {
                    target: Box::new(expression),
                    index: Box::new(index),
                });
            } else if next.is("(") {
                self.ws().consume()?;
                let arguments = self.parse_list(")")?;
                expression = Expression::MethodCall(MethodCall {
                    callee: Box::new(expression),
                    arguments,
                });
            } else {
                return Ok(expression);
            }
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_list(&mut self, close: &str) -> ParseResult<Vec<Expression>> {
        let mut items = Vec::new();
        if self.ws().peek().is(close) {
            self.ws().consume()?;
            return Ok(items);
        }
        loop {
            items.push(self.parse_expression()?);
            if self.ws().peek().is(",") {
                self.ws().consume()?;
                continue;
            }
            self.ws().expect(close)?;
            return Ok(items);
        }
    }

    /// Quoted string, kept in source form including quotes and escapes.
    fn parse_string_literal(&mut self) -> ParseResult<Expression> {
        let open = self.ws().consume()?;
        let mut raw = String::from(open.text);
        loop {
            if self.tokens.at_end() {
                return Err(ParseError::new(
                    ErrorKind::UnexpectedEndOfInput,
                    "string literal is never closed",
                    open.position,
                )
                .with_help(format!("Close the string with {}", open.text))
                .into());
            }
            let token = self.tokens.consume()?;
            raw.push_str(token.text);
            if token.text == "\\" {
                raw.push_str(self.tokens.consume()?.text);
            } else if token.is(open.text) {
                return Ok(Expression::Literal(LiteralExpression { raw }));
            }
        }
    }
}

/// Bare identifier, or one of the keyword literals.
pub(super) fn identifier(token: Token<'_>) -> Expression {
    match token.text {
        "true" | "false" | "null" => Expression::Literal(LiteralExpression {
            raw: token.text.to_string(),
        }),
        name => Expression::VariableAccess(VariableAccess {
            name: name.to_string(),
            object: None,
            position: token.position,
        }),
    }
}

fn unary(operator: Token<'_>, operand: Expression, fixity: Fixity) -> Expression {
    Expression::Unary(UnaryExpression {
        operator: operator.text.to_string(),
        operand: Box::new(operand),
        fixity,
    })
}
