use crate::error::LexError;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

/// Character that introduces an embedded-language construct.
pub const DELIMITER: char = '@';

/// Every operator and punctuation run the tokenizer recognizes.
/// Multi-character entries are matched greedily.
const OPERATORS: &[&str] = &[
    "+", "-", "++", "--", "*", "/", "%",
    "(", ")", "{", "}", ",", "?", ":", ".",
    "&", "^", "|", "~", "<<", ">>", ">>>",
    "<", ">", "<=", ">=",
    "!", "!=", "==", "!==", "===",
    "&&", "||",
    "=", "+=", "-=", "*=", "/=", "%=",
    "<<=", ">>=", ">>>=", "&=", "^=", "|=",
    "\"", "'",
    "[", "]",
    ";",
];

fn is_operator(text: &str) -> bool {
    OPERATORS.contains(&text)
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Position in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    /// Byte offset in source
    pub index: usize,
    /// Line number (0-indexed)
    pub line: usize,
    /// Column number (0-indexed, in characters)
    pub column: usize,
}

impl Position {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step over `c` on the current line.
    pub fn next(&mut self, c: char) {
        self.index += c.len_utf8();
        self.column += 1;
    }

    /// Step over a line feed.
    pub fn newline(&mut self) {
        self.index += 1;
        self.line += 1;
        self.column = 0;
    }

    fn advance(&mut self, c: char) {
        if c == '\n' {
            self.newline();
        } else {
            self.next(c);
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line + 1, self.column + 1)
    }
}

/// Lexical category of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Alphanumeric,
    Numeric,
    Whitespace,
    Operator,
    Delimiter,
    Unknown,
    EndOfInput,
}

impl Category {
    pub fn describe(self) -> &'static str {
        match self {
            Category::Alphanumeric => "an identifier",
            Category::Numeric => "a number",
            Category::Whitespace => "whitespace",
            Category::Operator => "an operator",
            Category::Delimiter => "`@`",
            Category::Unknown => "a character",
            Category::EndOfInput => "end of input",
        }
    }
}

/// Immutable lexical unit borrowed from the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token<'a> {
    pub position: Position,
    pub text: &'a str,
    pub category: Category,
}

impl<'a> Token<'a> {
    fn end_of_input(position: Position) -> Self {
        Self { position, text: "", category: Category::EndOfInput }
    }

    /// True when this is a structural token with exactly `text`.
    pub fn is(&self, text: &str) -> bool {
        self.category != Category::EndOfInput && self.text == text
    }

    pub fn is_whitespace(&self) -> bool {
        self.category == Category::Whitespace
    }

    pub fn is_delimiter(&self) -> bool {
        self.category == Category::Delimiter
    }

    pub fn is_alphanumeric(&self) -> bool {
        self.category == Category::Alphanumeric
    }

    pub fn is_end(&self) -> bool {
        self.category == Category::EndOfInput
    }

    /// Text used in diagnostics.
    pub fn describe(&self) -> String {
        if self.is_end() {
            Category::EndOfInput.describe().to_string()
        } else {
            format!("`{}`", self.text.escape_debug())
        }
    }
}

/// What a consuming call insists the next token is
#[derive(Debug, Clone, Copy)]
pub enum Expected<'e> {
    Text(&'e str),
    OneOf(&'e [&'e str]),
    Category(Category),
}

impl Expected<'_> {
    fn matches(&self, token: &Token<'_>) -> bool {
        match self {
            Expected::Text(text) => token.is(text),
            Expected::OneOf(texts) => texts.iter().any(|text| token.is(text)),
            Expected::Category(category) => token.category == *category,
        }
    }

    fn describe(&self) -> String {
        match self {
            Expected::Text(text) => format!("`{}`", text),
            Expected::OneOf(texts) => {
                let quoted: Vec<String> = texts.iter().map(|t| format!("`{}`", t)).collect();
                format!("one of {}", quoted.join(", "))
            }
            Expected::Category(category) => category.describe().to_string(),
        }
    }
}

/// Shared contract of the raw stream and its whitespace-skipping view
pub trait TokenSource<'a> {
    fn peek(&mut self) -> Token<'a>;
    fn peek_next(&mut self) -> Token<'a>;
    fn consume(&mut self) -> Result<Token<'a>, LexError>;
    fn at_end(&mut self) -> bool;

    /// Consume the next token, failing unless it satisfies `expected`.
    fn consume_expected(&mut self, expected: Expected<'_>) -> Result<Token<'a>, LexError> {
        let token = self.peek();
        if !expected.matches(&token) {
            return Err(LexError::new(token.position, expected.describe(), token.describe()));
        }
        self.consume()
    }

    fn expect(&mut self, text: &str) -> Result<Token<'a>, LexError> {
        self.consume_expected(Expected::Text(text))
    }
}

/// Read one token starting at `start`. Returns the token and the position after it.
fn read_token(source: &str, start: Position) -> (Token<'_>, Position) {
    let Some(first) = source[start.index..].chars().next() else {
        return (Token::end_of_input(start), start);
    };

    let mut end = start;
    end.advance(first);
    let following = source[end.index..].chars().next();

    let category = if first.is_alphabetic() || first == '_' {
        extend_while(source, start, &mut end, |_, c| c.is_alphanumeric() || c == '_');
        Category::Alphanumeric
    } else if first.is_ascii_digit() || (first == '.' && following.is_some_and(|c| c.is_ascii_digit())) {
        extend_while(source, start, &mut end, |text, c| {
            c.is_ascii_digit() || (c == '.' && !text.contains('.'))
        });
        Category::Numeric
    } else if first == DELIMITER {
        Category::Delimiter
    } else if is_operator(&source[start.index..end.index]) {
        let mut candidate = String::with_capacity(4);
        extend_while(source, start, &mut end, |text, c| {
            candidate.clear();
            candidate.push_str(text);
            candidate.push(c);
            is_operator(&candidate)
        });
        Category::Operator
    } else if is_whitespace(first) {
        extend_while(source, start, &mut end, |_, c| is_whitespace(c));
        Category::Whitespace
    } else {
        Category::Unknown
    };

    let token = Token {
        position: start,
        text: &source[start.index..end.index],
        category,
    };
    (token, end)
}

fn extend_while(source: &str, start: Position, end: &mut Position, mut accept: impl FnMut(&str, char) -> bool) {
    while let Some(c) = source[end.index..].chars().next() {
        if !accept(&source[start.index..end.index], c) {
            break;
        }
        end.advance(c);
    }
}

/// Lazily tokenized view over a template, buffering lookahead
pub struct TokenStream<'a> {
    source: &'a str,
    next: Position,
    queue: VecDeque<Token<'a>>,
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            next: Position::new(),
            queue: VecDeque::with_capacity(4),
        }
    }

    fn fill(&mut self, size: usize) {
        while self.queue.len() < size {
            let (token, next) = read_token(self.source, self.next);
            self.queue.push_back(token);
            self.next = next;
        }
    }

    /// Same stream, with whitespace tokens made invisible.
    pub fn skipping_whitespace(&mut self) -> SkipWhitespace<'_, 'a> {
        SkipWhitespace { stream: self }
    }

    /// Raw lookahead `n` tokens past the next one.
    pub fn peek_nth(&mut self, n: usize) -> Token<'a> {
        self.fill(n + 1);
        self.queue[n]
    }
}

impl<'a> TokenSource<'a> for TokenStream<'a> {
    fn peek(&mut self) -> Token<'a> {
        self.fill(1);
        self.queue[0]
    }

    fn peek_next(&mut self) -> Token<'a> {
        self.fill(2);
        self.queue[1]
    }

    fn consume(&mut self) -> Result<Token<'a>, LexError> {
        self.fill(1);
        let token = self.queue[0];
        if token.is_end() {
            return Err(LexError::new(token.position, "more input".to_string(), token.describe()));
        }
        self.queue.pop_front();
        Ok(token)
    }

    fn at_end(&mut self) -> bool {
        self.peek().is_end()
    }
}

/// Whitespace-insensitive view over a [`TokenStream`].
/// Whitespace runs are maximal, so at most one token is ever skipped.
pub struct SkipWhitespace<'s, 'a> {
    stream: &'s mut TokenStream<'a>,
}

impl<'a> TokenSource<'a> for SkipWhitespace<'_, 'a> {
    fn peek(&mut self) -> Token<'a> {
        self.stream.fill(2);
        let queue = &self.stream.queue;
        if queue[0].is_whitespace() { queue[1] } else { queue[0] }
    }

    fn peek_next(&mut self) -> Token<'a> {
        self.stream.fill(4);
        let queue = &self.stream.queue;
        if queue[0].is_whitespace() {
            if queue[2].is_whitespace() { queue[3] } else { queue[2] }
        } else if queue[1].is_whitespace() {
            queue[2]
        } else {
            queue[1]
        }
    }

    fn consume(&mut self) -> Result<Token<'a>, LexError> {
        if self.stream.peek().is_whitespace() {
            self.stream.consume()?;
        }
        self.stream.consume()
    }

    fn at_end(&mut self) -> bool {
        self.peek().is_end()
    }
}

/// Tokenize the entire source, ending with the end-of-input token
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut position = Position::new();
    loop {
        let (token, next) = read_token(source, position);
        tokens.push(token);
        if token.is_end() {
            return tokens;
        }
        position = next;
    }
}
