pub mod positions;
pub mod tokenizer;
mod expression;
mod tree_builder;

pub use tokenizer::{tokenize, Category, Position, Token, TokenSource, TokenStream};
use tree_builder::TreeBuilder;

use crate::ast::Ast;
use crate::error::CompileError;
use tracing::debug;

/// Parser trait - converts template source to AST
pub trait Parser {
    fn parse(&self, source: &str) -> Result<Ast, CompileError>;
}

/// Razor template parser
pub struct RazorParser {
    // Configuration only, no state
}

impl RazorParser {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for RazorParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for RazorParser {
    fn parse(&self, source: &str) -> Result<Ast, CompileError> {
        let mut builder = TreeBuilder::new(source);
        let segments = builder.build()?;
        debug!(segments = segments.len(), bytes = source.len(), "parsed template");
        Ok(Ast::new(segments))
    }
}
