mod builder;
mod output;
mod program;
mod transpiler;

pub use builder::{CodeBuilder, Mode};
pub use output::{quote_string, Output};
pub use program::{AttributePart, BinaryOp, Expr, Fragment, Op, Program, UnaryOp};
pub use transpiler::Transpiler;

use crate::ast::Ast;
use crate::error::CodeGenError;
use crate::transform::TransformMetadata;
use std::collections::BTreeMap;

/// Generation result
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub program: Program,
    pub helpers: BTreeMap<String, Fragment>,
    pub sections: BTreeMap<String, Fragment>,
}

/// Generator trait - converts AST to an executable program
pub trait Generator {
    fn generate(&self, ast: &Ast, metadata: &TransformMetadata) -> Result<GenerateResult, CodeGenError>;
}
