use super::expression::identifier;
use super::tokenizer::{Category, Expected, Position, SkipWhitespace, Token, TokenSource, TokenStream};
use crate::ast::*;
use crate::error::{CompileError, ErrorKind, ParseError};
use crate::html;
use std::mem;

pub(super) type ParseResult<T> = Result<T, CompileError>;

/// Tokens that end a run of markup text
const LITERAL_STOPS: &[&str] = &["<", "/", ">", "\"", "'", "=", "@"];

/// Keywords that may follow `@` and open a code construct
const DIRECTIVES: &[&str] = &["helper", "section", "if", "for", "foreach"];

/// Statement-level assignment operators
const ASSIGNMENT_OPERATORS: &[&str] = &["=", "+=", "-=", "*=", "/=", "%="];

/// Builds an AST from a token stream
pub struct TreeBuilder<'a> {
    pub(super) tokens: TokenStream<'a>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            tokens: TokenStream::new(source),
        }
    }

    pub fn build(&mut self) -> ParseResult<Vec<Segment>> {
        let mut segments = Vec::new();

        while !self.tokens.at_end() {
            segments.push(self.parse_segment()?);
        }

        Ok(segments)
    }

    pub(super) fn ws(&mut self) -> SkipWhitespace<'_, 'a> {
        self.tokens.skipping_whitespace()
    }

    /// Consume a whitespace run if one is next, returning its text.
    fn take_whitespace(&mut self) -> ParseResult<String> {
        if self.tokens.peek().is_whitespace() {
            Ok(self.tokens.consume()?.text.to_string())
        } else {
            Ok(String::new())
        }
    }

    /// Markup opens with `<` directly followed by a tag name or `!`.
    fn starts_markup(&mut self) -> bool {
        let offset = usize::from(self.tokens.peek().is_whitespace());
        let open = self.tokens.peek_nth(offset);
        let after = self.tokens.peek_nth(offset + 1);
        open.is("<") && (after.is_alphanumeric() || after.is("!"))
    }

    /// True when the token `offset` places ahead (past `@`) opens a code construct
    /// rather than an inline expression.
    fn opens_code_construct(&mut self, offset: usize) -> bool {
        let token = self.tokens.peek_nth(offset);
        token.is("{") || token.is("*") || (token.is_alphanumeric() && DIRECTIVES.contains(&token.text))
    }

    fn parse_segment(&mut self) -> ParseResult<Segment> {
        if self.ws().peek().is_delimiter() {
            // Whitespace in front of a code construct stays markup
            if self.tokens.peek().is_whitespace() && self.opens_code_construct(2) {
                return Ok(Segment::Literal(Literal::new(self.take_whitespace()?)));
            }
            return self.parse_embedded();
        }
        if self.starts_markup() {
            return self.parse_markup();
        }
        Ok(Segment::Literal(self.parse_literal()?))
    }

    fn parse_literal(&mut self) -> ParseResult<Literal> {
        // The first token is always taken so stray stop characters make progress
        let mut text = String::from(self.tokens.consume()?.text);
        loop {
            let token = self.tokens.peek();
            if token.is_end() {
                break;
            }
            if token.is_delimiter() && self.is_email_at(&text) {
                text.push_str(self.tokens.consume()?.text);
                continue;
            }
            if LITERAL_STOPS.iter().any(|stop| token.is(stop)) {
                break;
            }
            text.push_str(self.tokens.consume()?.text);
        }
        Ok(Literal::new(text))
    }

    /// `user@example` reads as text: `@` sits between two alphanumeric runs.
    fn is_email_at(&mut self, text: &str) -> bool {
        text.chars().last().is_some_and(|c| c.is_alphanumeric()) && self.tokens.peek_next().is_alphanumeric()
    }

    fn parse_markup(&mut self) -> ParseResult<Segment> {
        let leading_whitespace = self.take_whitespace()?;
        let open = self.tokens.expect("<")?;

        if self.tokens.peek().is("!") {
            self.tokens.consume()?;
            if self.tokens.peek().is("--") {
                return self.parse_html_comment(leading_whitespace, open.position);
            }
            return self.parse_doctype(leading_whitespace, open.position);
        }

        let tag_name = self.read_name()?;
        let attributes = self.parse_attributes(&tag_name, open.position)?;
        let whitespace_before_end = self.take_whitespace()?;

        let end = if self.tokens.peek().is("/") {
            self.tokens.expect("/")?;
            self.tokens.expect(">")?;
            ElementEnd::SelfClosing
        } else {
            self.tokens.expect(">")?;
            if html::is_void_element(&tag_name) {
                ElementEnd::Void
            } else {
                self.parse_children(&tag_name, open.position)?
            }
        };

        Ok(Segment::Html(Html {
            tag_name,
            leading_whitespace,
            attributes,
            whitespace_before_end,
            end,
        }))
    }

    fn parse_children(&mut self, tag_name: &str, start: Position) -> ParseResult<ElementEnd> {
        let mut children = Vec::new();
        loop {
            if self.tokens.at_end() {
                return Err(ParseError::new(
                    ErrorKind::UnclosedElement,
                    format!("`<{}>` is never closed", tag_name),
                    start,
                )
                .with_help(format!("Add `</{}>` after the element's content", tag_name))
                .into());
            }
            let mut ws = self.ws();
            if ws.peek().is("<") && ws.peek_next().is("/") {
                break;
            }
            children.push(self.parse_segment()?);
        }

        let whitespace_before_close = self.take_whitespace()?;
        let close = self.tokens.expect("<")?;
        self.tokens.expect("/")?;
        let closing_name = self.read_name()?;
        if !closing_name.eq_ignore_ascii_case(tag_name) {
            return Err(ParseError::new(
                ErrorKind::MismatchedCloseTag,
                format!("expected `</{}>` but found `</{}>`", tag_name, closing_name),
                close.position,
            )
            .with_help(format!(
                "`<{}>` was opened at {}; close it before `</{}>`",
                tag_name, start, closing_name
            ))
            .into());
        }
        let whitespace_in_close = self.take_whitespace()?;
        self.tokens.expect(">")?;

        Ok(ElementEnd::Closed {
            children,
            whitespace_before_close,
            closing_name,
            whitespace_in_close,
        })
    }

    /// Tag or attribute name: identifier runs joined by `-` or `:`.
    fn read_name(&mut self) -> ParseResult<String> {
        let mut name = self
            .tokens
            .consume_expected(Expected::Category(Category::Alphanumeric))?
            .text
            .to_string();
        loop {
            let joiner = self.tokens.peek();
            if !(joiner.is("-") || joiner.is(":")) {
                break;
            }
            let next = self.tokens.peek_next();
            if !(next.is_alphanumeric() || next.category == Category::Numeric) {
                break;
            }
            name.push_str(self.tokens.consume()?.text);
            name.push_str(self.tokens.consume()?.text);
        }
        Ok(name)
    }

    fn parse_attributes(&mut self, tag_name: &str, start: Position) -> ParseResult<Vec<HtmlAttribute>> {
        let mut attributes = Vec::new();
        loop {
            let next = self.ws().peek();
            if next.is(">") || next.is("/") {
                return Ok(attributes);
            }
            if next.is_end() {
                return Err(ParseError::new(
                    ErrorKind::UnexpectedEndOfInput,
                    format!("start tag `<{}` is never finished", tag_name),
                    start,
                )
                .with_help("End the tag with `>` or `/>`")
                .into());
            }
            attributes.push(self.parse_attribute()?);
        }
    }

    fn parse_attribute(&mut self) -> ParseResult<HtmlAttribute> {
        let leading_whitespace = self
            .tokens
            .consume_expected(Expected::Category(Category::Whitespace))?
            .text
            .to_string();
        let name = self.read_name()?;

        if !self.ws().peek().is("=") {
            return Ok(HtmlAttribute {
                name,
                leading_whitespace,
                separator: String::new(),
                quote: None,
                values: Vec::new(),
            });
        }

        let mut separator = self.take_whitespace()?;
        separator.push_str(self.tokens.expect("=")?.text);
        separator.push_str(&self.take_whitespace()?);
        let quote = self.tokens.consume_expected(Expected::OneOf(&["\"", "'"]))?;
        let values = self.parse_attribute_values(quote)?;
        self.tokens.expect(quote.text)?;

        Ok(HtmlAttribute {
            name,
            leading_whitespace,
            separator,
            quote: quote.text.chars().next(),
            values,
        })
    }

    fn parse_attribute_values(&mut self, quote: Token<'a>) -> ParseResult<Vec<AttributeValue>> {
        let mut values = Vec::new();
        let mut text = String::new();
        loop {
            let token = self.tokens.peek();
            if token.is(quote.text) {
                break;
            }
            if token.is_end() {
                return Err(ParseError::new(
                    ErrorKind::UnexpectedEndOfInput,
                    "attribute value is never closed",
                    quote.position,
                )
                .with_help(format!("Close the value with `{}`", quote.text))
                .into());
            }

            let starts_expression = (token.is_delimiter() && !self.is_email_at(&text))
                || (token.is_whitespace() && self.tokens.peek_next().is_delimiter());
            if !starts_expression {
                text.push_str(self.tokens.consume()?.text);
                continue;
            }

            if !text.is_empty() {
                values.push(AttributeValue::Literal(Literal::new(mem::take(&mut text))));
            }
            match self.parse_embedded()? {
                Segment::InlineExpression(expression) => values.push(AttributeValue::Expression(expression)),
                // `@@` joins the surrounding text
                Segment::Literal(literal) => text.push_str(&literal.text),
                Segment::Comment(_) => {}
                _ => {
                    return Err(ParseError::new(
                        ErrorKind::UnexpectedToken,
                        "only expressions are allowed inside attribute values",
                        token.position,
                    )
                    .with_help("Compute the value in a `@{ }` block first and write `@name` here")
                    .into());
                }
            }
        }
        if !text.is_empty() {
            values.push(AttributeValue::Literal(Literal::new(text)));
        }
        Ok(values)
    }

    fn parse_html_comment(&mut self, leading_whitespace: String, start: Position) -> ParseResult<Segment> {
        self.tokens.expect("--")?;
        let mut text = String::new();
        loop {
            if self.tokens.at_end() {
                return Err(ParseError::new(ErrorKind::UnexpectedEndOfInput, "HTML comment is never closed", start)
                    .with_help("Close the comment with `-->`")
                    .into());
            }
            text.push_str(self.tokens.consume()?.text);
            if let Some(body) = text.strip_suffix("-->") {
                return Ok(Segment::HtmlComment(HtmlComment {
                    leading_whitespace,
                    text: body.to_string(),
                }));
            }
        }
    }

    fn parse_doctype(&mut self, leading_whitespace: String, start: Position) -> ParseResult<Segment> {
        let mut declaration = String::new();
        while !self.tokens.peek().is(">") {
            if self.tokens.at_end() {
                return Err(ParseError::new(ErrorKind::UnexpectedEndOfInput, "`<!` declaration is never closed", start).into());
            }
            declaration.push_str(self.tokens.consume()?.text);
        }
        self.tokens.expect(">")?;
        Ok(Segment::HtmlDocType(HtmlDocType {
            leading_whitespace,
            declaration,
        }))
    }

    /// Parse the construct introduced by `@`.
    fn parse_embedded(&mut self) -> ParseResult<Segment> {
        let leading_whitespace = self.take_whitespace()?;
        let at = self.tokens.consume_expected(Expected::Category(Category::Delimiter))?;
        let next = self.tokens.peek();

        if next.is_delimiter() {
            self.tokens.consume()?;
            return Ok(Segment::Literal(Literal::new(leading_whitespace + "@")));
        }
        if next.is("*") {
            return self.parse_comment(at.position);
        }
        if next.is("(") {
            self.tokens.consume()?;
            let expression = self.parse_expression()?;
            self.ws().expect(")")?;
            return Ok(Segment::InlineExpression(InlineExpression {
                expression,
                leading_whitespace,
            }));
        }
        if next.is("{") {
            return Ok(Segment::Block(self.parse_block()?));
        }
        if next.is_alphanumeric() {
            return match next.text {
                "helper" => Ok(Segment::Helper(self.parse_helper()?)),
                "section" => Ok(Segment::Section(self.parse_section()?)),
                "if" | "for" | "foreach" => Ok(Segment::Statement(self.parse_control_flow()?)),
                _ => {
                    let name = self.tokens.consume()?;
                    let expression = identifier(name);
                    let expression = self.parse_chain(expression, true)?;
                    Ok(Segment::InlineExpression(InlineExpression {
                        expression,
                        leading_whitespace,
                    }))
                }
            };
        }

        Err(ParseError::new(
            ErrorKind::UnknownDirective,
            format!("expected an expression, block or directive after `@` but found {}", next.describe()),
            next.position,
        )
        .with_help("Write `@@` for a literal `@`")
        .into())
    }

    fn parse_comment(&mut self, start: Position) -> ParseResult<Segment> {
        self.tokens.expect("*")?;
        let mut text = String::new();
        loop {
            let token = self.tokens.peek();
            if token.is_end() {
                return Err(ParseError::new(ErrorKind::UnexpectedEndOfInput, "comment is never closed", start)
                    .with_help("Close the comment with `*@`")
                    .into());
            }
            if token.is("*") && self.tokens.peek_next().is_delimiter() {
                self.tokens.consume()?;
                self.tokens.consume()?;
                return Ok(Segment::Comment(Comment { text }));
            }
            text.push_str(self.tokens.consume()?.text);
        }
    }

    pub(super) fn parse_block(&mut self) -> ParseResult<Block> {
        let open = self.ws().expect("{")?;
        let mut statements = Vec::new();
        loop {
            let next = self.ws().peek();
            if next.is("}") {
                break;
            }
            if next.is_end() {
                return Err(ParseError::new(ErrorKind::UnexpectedEndOfInput, "block is never closed", open.position)
                    .with_help("Add the closing `}`")
                    .into());
            }
            statements.push(self.parse_block_statement()?);
        }
        self.ws().expect("}")?;
        Ok(Block { statements })
    }

    fn parse_block_statement(&mut self) -> ParseResult<Segment> {
        if self.starts_markup() {
            return self.parse_markup();
        }
        let next = self.ws().peek();
        if next.is_delimiter() {
            return self.parse_embedded();
        }
        if next.is_alphanumeric() {
            match next.text {
                "if" | "for" | "foreach" => return Ok(Segment::Statement(self.parse_control_flow()?)),
                "var" => {
                    let declaration = self.parse_declaration()?;
                    self.ws().expect(";")?;
                    return Ok(Segment::Statement(Statement::VariableDeclaration(declaration)));
                }
                _ => {}
            }
        }
        let expression = self.parse_expression_statement()?;
        self.ws().expect(";")?;
        Ok(Segment::Expression(expression))
    }

    /// Expression, optionally followed by an assignment to it.
    fn parse_expression_statement(&mut self) -> ParseResult<Expression> {
        let target = self.parse_expression()?;
        let next = self.ws().peek();
        if next.category != Category::Operator || !ASSIGNMENT_OPERATORS.contains(&next.text) {
            return Ok(target);
        }
        self.ws().consume()?;
        let value = self.parse_expression()?;
        Ok(Expression::Binary(BinaryExpression {
            left: Box::new(target),
            operator: next.text.to_string(),
            right: Box::new(value),
        }))
    }

    fn parse_declaration(&mut self) -> ParseResult<VariableDeclaration> {
        self.ws().expect("var")?;
        let name = self
            .ws()
            .consume_expected(Expected::Category(Category::Alphanumeric))?
            .text
            .to_string();
        let initializer = if self.ws().peek().is("=") {
            self.ws().consume()?;
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(VariableDeclaration { name, initializer })
    }

    fn parse_control_flow(&mut self) -> ParseResult<Statement> {
        match self.ws().peek().text {
            "if" => Ok(Statement::If(self.parse_if()?)),
            "for" => Ok(Statement::For(self.parse_for()?)),
            _ => Ok(Statement::ForEach(self.parse_foreach()?)),
        }
    }

    fn parse_if(&mut self) -> ParseResult<IfStatement> {
        self.ws().expect("if")?;
        self.ws().expect("(")?;
        let test = self.parse_expression()?;
        self.ws().expect(")")?;
        let body = self.parse_block()?;

        let mut statement = IfStatement {
            test,
            body,
            else_if: None,
            else_body: None,
        };
        if self.ws().peek().is("else") {
            self.ws().consume()?;
            if self.ws().peek().is("if") {
                statement.else_if = Some(Box::new(self.parse_if()?));
            } else {
                statement.else_body = Some(self.parse_block()?);
            }
        }
        Ok(statement)
    }

    fn parse_for(&mut self) -> ParseResult<ForLoop> {
        self.ws().expect("for")?;
        self.ws().expect("(")?;
        let next = self.ws().peek();
        if !next.is("var") {
            return Err(ParseError::new(
                ErrorKind::InvalidForInitializer,
                format!("a for loop must declare its counter, found {}", next.describe()),
                next.position,
            )
            .with_help("Write `for (var i = 0; i < n; i++) { ... }`")
            .into());
        }
        let initialization = self.parse_declaration()?;
        self.ws().expect(";")?;
        let condition = self.parse_expression()?;
        self.ws().expect(";")?;
        let iteration = self.parse_expression_statement()?;
        self.ws().expect(")")?;
        let body = self.parse_block()?;
        Ok(ForLoop {
            initialization,
            condition,
            iteration,
            body,
        })
    }

    fn parse_foreach(&mut self) -> ParseResult<ForEachLoop> {
        self.ws().expect("foreach")?;
        self.ws().expect("(")?;
        self.ws().expect("var")?;
        let loop_variable = self
            .ws()
            .consume_expected(Expected::Category(Category::Alphanumeric))?
            .text
            .to_string();
        self.ws().expect("in")?;
        let start = self.ws().peek().position;
        let collection = self.parse_expression()?;
        if !matches!(collection, Expression::VariableAccess(_)) {
            return Err(ParseError::new(
                ErrorKind::InvalidLoopCollection,
                "foreach can only iterate over a variable or a member of one",
                start,
            )
            .with_help("Assign the collection first: `var items = ...;` then `foreach (var item in items)`")
            .into());
        }
        self.ws().expect(")")?;
        let body = self.parse_block()?;
        Ok(ForEachLoop {
            loop_variable,
            collection,
            body,
        })
    }

    fn parse_helper(&mut self) -> ParseResult<Helper> {
        self.ws().expect("helper")?;
        let name = self
            .ws()
            .consume_expected(Expected::Category(Category::Alphanumeric))?
            .text
            .to_string();
        self.ws().expect("(")?;
        let mut parameters = Vec::new();
        if !self.ws().peek().is(")") {
            loop {
                let parameter = self.ws().consume_expected(Expected::Category(Category::Alphanumeric))?;
                parameters.push(parameter.text.to_string());
                if !self.ws().peek().is(",") {
                    break;
                }
                self.ws().consume()?;
            }
        }
        self.ws().expect(")")?;
        let body = self.parse_block()?;
        Ok(Helper { name, parameters, body })
    }

    fn parse_section(&mut self) -> ParseResult<Section> {
        self.ws().expect("section")?;
        let name = self
            .ws()
            .consume_expected(Expected::Category(Category::Alphanumeric))?
            .text
            .to_string();
        let body = self.parse_block()?;
        Ok(Section { name, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<Segment> {
        TreeBuilder::new(source).build().unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        match TreeBuilder::new(source).build() {
            Err(CompileError::Parse(err)) => err,
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    fn only_html(segments: &[Segment]) -> &Html {
        match segments {
            [Segment::Html(html)] => html,
            other => panic!("expected a single element, got {:?}", other),
        }
    }

    #[test]
    fn test_self_closing_whitespace_before_end() {
        let segments = parse("<div   />");
        let html = only_html(&segments);
        assert_eq!(html.tag_name, "div");
        assert!(html.is_self_closing());
        assert_eq!(html.whitespace_before_end.len(), 3);
    }

    #[test]
    fn test_attribute_leading_whitespace() {
        let segments = parse(r#"<a  b="c"/>"#);
        let html = only_html(&segments);
        assert_eq!(html.attributes.len(), 1);
        let attribute = &html.attributes[0];
        assert_eq!(attribute.name, "b");
        assert_eq!(attribute.leading_whitespace, "  ");
        assert_eq!(attribute.separator, "=");
        assert_eq!(attribute.quote, Some('"'));
        assert_eq!(attribute.values, vec![AttributeValue::Literal(Literal::new("c"))]);
    }

    #[test]
    fn test_element_leading_whitespace() {
        let segments = parse("  <div/>");
        assert_eq!(only_html(&segments).leading_whitespace, "  ");
    }

    #[test]
    fn test_whitespace_before_close() {
        let segments = parse("<div>  </div>");
        let html = only_html(&segments);
        match &html.end {
            ElementEnd::Closed { children, whitespace_before_close, .. } => {
                assert!(children.is_empty());
                assert_eq!(whitespace_before_close, "  ");
            }
            other => panic!("expected closed element, got {:?}", other),
        }
    }

    #[test]
    fn test_close_tag_kept_as_written() {
        let segments = parse("<DIV>x</div >");
        match &only_html(&segments).end {
            ElementEnd::Closed { closing_name, whitespace_in_close, .. } => {
                assert_eq!(closing_name, "div");
                assert_eq!(whitespace_in_close, " ");
            }
            other => panic!("expected closed element, got {:?}", other),
        }
    }

    #[test]
    fn test_attribute_separator_whitespace() {
        let segments = parse("<a b = 'c' d/>");
        let attributes = &only_html(&segments).attributes;
        assert_eq!(attributes[0].separator, " = ");
        assert_eq!(attributes[0].quote, Some('\''));
        assert_eq!(attributes[1].separator, "");
    }

    #[test]
    fn test_email_in_attribute_value_is_text() {
        let segments = parse(r#"<a href="mailto:ada@example.com"/>"#);
        let attribute = &only_html(&segments).attributes[0];
        assert!(!attribute.has_expressions());
        assert_eq!(attribute.values, vec![AttributeValue::Literal(Literal::new("mailto:ada@example.com"))]);
    }

    #[test]
    fn test_nested_children() {
        let segments = parse("<ul><li>one</li><li>two</li></ul>");
        let html = only_html(&segments);
        assert_eq!(html.children().len(), 2);
        match &html.children()[1] {
            Segment::Html(li) => assert_eq!(li.children(), &[Segment::Literal(Literal::new("two"))]),
            other => panic!("expected <li>, got {:?}", other),
        }
    }

    #[test]
    fn test_attribute_expression() {
        let segments = parse(r#"<div class="@model.test"></div>"#);
        let attribute = &only_html(&segments).attributes[0];
        assert!(attribute.has_expressions());
        match &attribute.values[..] {
            [AttributeValue::Expression(inline)] => match &inline.expression {
                Expression::VariableAccess(access) => {
                    assert_eq!(access.name, "test");
                    assert!(!access.is_unqualified());
                }
                other => panic!("expected member access, got {:?}", other),
            },
            other => panic!("expected one expression, got {:?}", other),
        }
    }

    #[test]
    fn test_attribute_mixed_values_keep_separators() {
        let segments = parse(r#"<p class="a @x b"/>"#);
        let values = &only_html(&segments).attributes[0].values;
        assert_eq!(values.len(), 3);
        assert_eq!(values[0], AttributeValue::Literal(Literal::new("a")));
        match &values[1] {
            AttributeValue::Expression(inline) => assert_eq!(inline.leading_whitespace, " "),
            other => panic!("expected expression, got {:?}", other),
        }
        assert_eq!(values[2], AttributeValue::Literal(Literal::new(" b")));
    }

    #[test]
    fn test_valueless_attribute_and_void_element() {
        let segments = parse("<input disabled><br>");
        match &segments[..] {
            [Segment::Html(input), Segment::Html(br)] => {
                assert_eq!(input.attributes[0].name, "disabled");
                assert_eq!(input.attributes[0].quote, None);
                assert_eq!(input.end, ElementEnd::Void);
                assert_eq!(br.end, ElementEnd::Void);
            }
            other => panic!("expected two void elements, got {:?}", other),
        }
    }

    #[test]
    fn test_hyphenated_names() {
        let segments = parse(r#"<my-widget data-item-id="3"></my-widget>"#);
        let html = only_html(&segments);
        assert_eq!(html.tag_name, "my-widget");
        assert_eq!(html.attributes[0].name, "data-item-id");
    }

    #[test]
    fn test_html_comment_and_doctype() {
        let segments = parse("<!DOCTYPE html>\n<!-- note -->");
        assert_eq!(
            segments,
            vec![
                Segment::HtmlDocType(HtmlDocType {
                    leading_whitespace: String::new(),
                    declaration: "DOCTYPE html".to_string(),
                }),
                Segment::HtmlComment(HtmlComment {
                    leading_whitespace: "\n".to_string(),
                    text: " note ".to_string(),
                }),
            ]
        );
    }

    #[test]
    fn test_text_with_less_than() {
        let segments = parse("1 < 2");
        let text: String = segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(literal) => literal.text.clone(),
                other => panic!("expected literal, got {:?}", other),
            })
            .collect();
        assert_eq!(text, "1 < 2");
    }

    #[test]
    fn test_escaped_delimiter() {
        let segments = parse("a @@ b");
        assert_eq!(
            segments,
            vec![
                Segment::Literal(Literal::new("a ")),
                Segment::Literal(Literal::new("@")),
                Segment::Literal(Literal::new(" b")),
            ]
        );
    }

    #[test]
    fn test_email_address_is_text() {
        let segments = parse("mail user@example.com");
        assert_eq!(segments, vec![Segment::Literal(Literal::new("mail user@example.com"))]);
    }

    #[test]
    fn test_comment() {
        let segments = parse("@* hidden *@");
        assert_eq!(segments, vec![Segment::Comment(Comment { text: " hidden ".to_string() })]);
    }

    #[test]
    fn test_inline_chain_stops_at_sentence_period() {
        let segments = parse("Hi @name.");
        match &segments[1] {
            Segment::InlineExpression(inline) => match &inline.expression {
                Expression::VariableAccess(access) => assert_eq!(access.name, "name"),
                other => panic!("expected variable, got {:?}", other),
            },
            other => panic!("expected inline expression, got {:?}", other),
        }
        assert_eq!(segments[2], Segment::Literal(Literal::new(".")));
    }

    #[test]
    fn test_whitespace_before_code_construct_is_markup() {
        let segments = parse("<b></b> @{ var x = 1; }");
        assert_eq!(segments[1], Segment::Literal(Literal::new(" ")));
        assert!(matches!(segments[2], Segment::Block(_)));
    }

    #[test]
    fn test_helper() {
        let segments = parse("@helper cup(drink, size){<div>cup of @drink</div>}");
        match &segments[..] {
            [Segment::Helper(helper)] => {
                assert_eq!(helper.name, "cup");
                assert_eq!(helper.parameters, vec!["drink".to_string(), "size".to_string()]);
                assert_eq!(helper.body.statements.len(), 1);
            }
            other => panic!("expected helper, got {:?}", other),
        }
    }

    #[test]
    fn test_section() {
        let segments = parse("@section scripts {<script></script>}");
        match &segments[..] {
            [Segment::Section(section)] => assert_eq!(section.name, "scripts"),
            other => panic!("expected section, got {:?}", other),
        }
    }

    #[test]
    fn test_block_statements() {
        let segments = parse("@{ var x = 1; x = x + 1; <b>@x</b> }");
        match &segments[..] {
            [Segment::Block(block)] => {
                assert!(matches!(block.statements[0], Segment::Statement(Statement::VariableDeclaration(_))));
                match &block.statements[1] {
                    Segment::Expression(Expression::Binary(binary)) => assert_eq!(binary.operator, "="),
                    other => panic!("expected assignment, got {:?}", other),
                }
                assert!(matches!(block.statements[2], Segment::Html(_)));
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn test_if_else_chain() {
        let segments = parse("@if(a){<i/>} else if(b){<b/>} else {<u/>}");
        match &segments[..] {
            [Segment::Statement(Statement::If(statement))] => {
                let else_if = statement.else_if.as_ref().unwrap();
                assert!(else_if.else_body.is_some());
                assert!(statement.else_body.is_none());
            }
            other => panic!("expected if statement, got {:?}", other),
        }
    }

    #[test]
    fn test_for_loop() {
        let segments = parse("@for(var i = 0; i < 3; ++i){<li>@i</li>}");
        match &segments[..] {
            [Segment::Statement(Statement::For(for_loop))] => {
                assert_eq!(for_loop.initialization.name, "i");
                assert!(matches!(for_loop.condition, Expression::Binary(_)));
                assert!(matches!(for_loop.iteration, Expression::Unary(_)));
            }
            other => panic!("expected for loop, got {:?}", other),
        }
    }

    #[test]
    fn test_foreach_member_collection() {
        let segments = parse("@foreach(var item in model.items){<li>@item</li>}");
        assert!(matches!(segments[..], [Segment::Statement(Statement::ForEach(_))]));
    }

    #[test]
    fn test_foreach_requires_variable_collection() {
        let err = parse_err("@foreach(var item in [1, 2]){<li>@item</li>}");
        assert_eq!(err.kind, ErrorKind::InvalidLoopCollection);
    }

    #[test]
    fn test_for_requires_declaration() {
        let err = parse_err("@for(i = 0; i < 3; ++i){}");
        assert_eq!(err.kind, ErrorKind::InvalidForInitializer);
    }

    #[test]
    fn test_unclosed_element() {
        let err = parse_err("<div>");
        assert_eq!(err.kind, ErrorKind::UnclosedElement);
        assert_eq!(err.position.column, 0);
    }

    #[test]
    fn test_mismatched_close_tag() {
        let err = parse_err("<ul>\n<li></ul>");
        assert_eq!(err.kind, ErrorKind::MismatchedCloseTag);
        assert_eq!(err.position.line, 1);
        assert!(err.help.is_some());
    }

    #[test]
    fn test_unknown_directive() {
        let err = parse_err("@#");
        assert_eq!(err.kind, ErrorKind::UnknownDirective);
    }

    #[test]
    fn test_unclosed_block_is_error() {
        let err = parse_err("@{ var x = 1;");
        assert_eq!(err.kind, ErrorKind::UnexpectedEndOfInput);
    }

    #[test]
    fn test_missing_semicolon_is_lex_error() {
        let result = TreeBuilder::new("@{ var x = 1 }").build();
        assert!(matches!(result, Err(CompileError::Lex(_))));
    }
}
