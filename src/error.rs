use crate::parser::positions::snippet;
use crate::parser::tokenizer::Position;
use thiserror::Error;

/// Kind of parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnexpectedToken,
    UnexpectedEndOfInput,
    MismatchedCloseTag,
    UnclosedElement,
    InvalidLoopCollection,
    InvalidForInitializer,
    UnknownDirective,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedToken => "Unexpected token",
            ErrorKind::UnexpectedEndOfInput => "Unexpected end of input",
            ErrorKind::MismatchedCloseTag => "Mismatched close tag",
            ErrorKind::UnclosedElement => "Unclosed element",
            ErrorKind::InvalidLoopCollection => "Invalid loop collection",
            ErrorKind::InvalidForInitializer => "Invalid for initializer",
            ErrorKind::UnknownDirective => "Unknown directive",
        }
    }
}

/// The token stream did not hold what the grammar required
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} but found {found} at {position}")]
pub struct LexError {
    pub position: Position,
    pub expected: String,
    pub found: String,
}

impl LexError {
    pub fn new(position: Position, expected: String, found: String) -> Self {
        Self { position, expected, found }
    }

    pub fn render(&self, source: &str, filename: &str) -> String {
        let message = format!("expected {} but found {}", self.expected, self.found);
        render_diagnostic(source, filename, self.position, &message, None)
    }
}

/// Error during parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {position}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub position: Position,
    pub help: Option<String>,
}

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            message: message.into(),
            position,
            help: None,
        }
    }

    /// Add help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render the error with source context
    pub fn render(&self, source: &str, filename: &str) -> String {
        let message = format!("{}: {}", self.kind.as_str(), self.message);
        render_diagnostic(source, filename, self.position, &message, self.help.as_deref())
    }
}

/// Lowering failed. `program` holds the program text generated up to the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CodeGenError {
    pub message: String,
    pub program: String,
}

impl CodeGenError {
    pub fn new(message: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            program: program.into(),
        }
    }
}

/// Error during compilation (tokenizing, parsing or generation)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("generation error: {0}")]
    CodeGen(#[from] CodeGenError),
}

impl CompileError {
    /// Source position of the failure, when it has one
    pub fn position(&self) -> Option<Position> {
        match self {
            CompileError::Lex(err) => Some(err.position),
            CompileError::Parse(err) => Some(err.position),
            CompileError::CodeGen(_) => None,
        }
    }

    /// Render the error with source context
    pub fn render(&self, source: &str, filename: &str) -> String {
        match self {
            CompileError::Lex(err) => err.render(source, filename),
            CompileError::Parse(err) => err.render(source, filename),
            CompileError::CodeGen(err) => {
                let mut output = format!("\n file: {}\nerror: {}\n", filename, err.message);
                if !err.program.is_empty() {
                    output.push_str("\n program so far:\n");
                    for line in err.program.lines() {
                        output.push_str("    ");
                        output.push_str(line);
                        output.push('\n');
                    }
                }
                output.push('\n');
                output
            }
        }
    }
}

/// Error raised while executing a compiled view
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("cannot read `{member}` of null")]
    NullReference { member: String },
    #[error("unknown helper `{0}`")]
    UnknownHelper(String),
    #[error("`{name}` is not a method of {type_name}")]
    UnknownMethod { name: String, type_name: &'static str },
    #[error("{type_name} is not iterable")]
    NotIterable { type_name: &'static str },
    #[error("`{0}` is not defined in this scope")]
    UndefinedLocal(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("helper `{name}` exceeded the maximum call depth of {limit}")]
    RecursionLimit { name: String, limit: usize },
    #[error("helper `{name}` failed: {message}")]
    Helper { name: String, message: String },
}

fn render_diagnostic(source: &str, filename: &str, position: Position, message: &str, help: Option<&str>) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!(
        " file: {}:{}:{}\n",
        filename,
        position.line + 1,
        position.column + 1
    ));
    output.push_str(&format!("error: {}\n", message));

    if let Some(context) = snippet(source, position, 1) {
        output.push_str(&context);
    }

    if let Some(help) = help {
        output.push('\n');
        for (i, help_line) in help.lines().enumerate() {
            if i == 0 {
                output.push_str(&format!(" help: {}\n", help_line));
            } else {
                output.push_str(&format!("       {}\n", help_line));
            }
        }
    }

    output.push('\n');
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: usize, column: usize) -> Position {
        Position { index: 0, line, column }
    }

    #[test]
    fn test_parse_error_render() {
        let source = "<ul>\n  <li>one\n</ul>";
        let err = ParseError::new(ErrorKind::MismatchedCloseTag, "expected `</li>` but found `</ul>`", at(2, 2))
            .with_help("close `<li>` before `</ul>`");
        let rendered = err.render(source, "list.cshtml");
        assert!(rendered.contains("list.cshtml:3:3"));
        assert!(rendered.contains("error: Mismatched close tag: expected `</li>`"));
        assert!(rendered.contains(" 3 | </ul>"));
        assert!(rendered.contains("help: close `<li>`"));
    }

    #[test]
    fn test_lex_error_display() {
        let err = LexError::new(at(0, 4), "`)`".to_string(), "end of input".to_string());
        assert_eq!(err.to_string(), "expected `)` but found end of input at line 1, column 5");
    }

    #[test]
    fn test_compile_error_conversions() {
        let err: CompileError = CodeGenError::new("cannot assign to `x`", "var html = [];").into();
        assert_eq!(err.position(), None);
        let rendered = err.render("", "view.cshtml");
        assert!(rendered.contains("error: cannot assign to `x`"));
        assert!(rendered.contains("    var html = [];"));

        let err: CompileError = ParseError::new(ErrorKind::UnclosedElement, "unclosed `<div>`", at(0, 0)).into();
        assert_eq!(err.position(), Some(at(0, 0)));
        assert!(err.to_string().starts_with("parse error: unclosed `<div>`"));
    }

    #[test]
    fn test_render_error_messages() {
        let err = RenderError::NullReference { member: "name".to_string() };
        assert_eq!(err.to_string(), "cannot read `name` of null");
        let err = RenderError::RecursionLimit { name: "tree".to_string(), limit: 64 };
        assert!(err.to_string().contains("64"));
    }
}
