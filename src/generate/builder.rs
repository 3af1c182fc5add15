use super::program::{AttributePart, Expr, Op, Program};
use crate::error::CodeGenError;
use std::collections::HashSet;
use std::mem;

/// Emission mode of the builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Literal text is appended to the output
    Markup,
    /// Ops are control structure and declarations
    Code,
}

/// Accumulates the ops of one program.
///
/// Literal markup is buffered and merged into a single `Text` op, so adjacent
/// literals never produce separate ops. Bodies of control structures are built
/// in nested frames, each with its own scope of declared locals.
pub struct CodeBuilder {
    mode: Mode,
    frames: Vec<Vec<Op>>,
    pending: String,
    scopes: Vec<HashSet<String>>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self {
            mode: Mode::Markup,
            frames: vec![Vec::new()],
            pending: String::new(),
            scopes: vec![HashSet::new()],
        }
    }

    /// Builder whose outermost scope already holds `locals`.
    pub fn with_locals(locals: &[String]) -> Self {
        let mut builder = Self::new();
        for local in locals {
            builder.declare(local);
        }
        builder
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn start_markup(&mut self) {
        self.mode = Mode::Markup;
    }

    pub fn start_code(&mut self) {
        self.flush();
        self.mode = Mode::Code;
    }

    /// Append literal markup. Markup is only written in markup mode.
    pub fn literal(&mut self, text: &str) -> Result<(), CodeGenError> {
        if self.mode == Mode::Code {
            return Err(self.error(format!("markup {:?} written while lowering code", text)));
        }
        self.pending.push_str(text);
        Ok(())
    }

    /// Append the escaped value of `expr`
    pub fn emit(&mut self, expr: Expr) {
        self.push(Op::Emit(expr));
    }

    pub fn push(&mut self, op: Op) {
        self.flush();
        self.current().push(op);
    }

    pub fn begin_attribute(&mut self, prefix: String) {
        self.push(Op::BeginAttribute { prefix });
    }

    pub fn attribute_part(&mut self, part: AttributePart) {
        self.push(Op::AttributePart(part));
    }

    pub fn end_attribute(&mut self, suffix: String) {
        self.push(Op::EndAttribute { suffix });
    }

    /// Start the body of a control structure.
    pub fn open_body(&mut self) {
        self.flush();
        self.frames.push(Vec::new());
        self.push_scope();
    }

    /// Finish the innermost body and return its ops.
    pub fn close_body(&mut self) -> Vec<Op> {
        self.flush();
        self.pop_scope();
        if self.frames.len() > 1 {
            self.frames.pop().unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashSet::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    /// True if `name` is declared in the innermost scope or any enclosing one.
    pub fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains(name))
    }

    pub fn finish(mut self) -> Program {
        self.flush();
        // Unclosed bodies are folded into the root so no op is lost
        let mut frames = mem::take(&mut self.frames).into_iter();
        let mut ops = frames.next().unwrap_or_default();
        ops.extend(frames.flatten());
        Program::new(ops)
    }

    /// Program text of everything built so far.
    pub fn partial_source(&self) -> String {
        let mut ops: Vec<Op> = self.frames.iter().flatten().cloned().collect();
        if !self.pending.is_empty() {
            ops.push(Op::Text(self.pending.clone()));
        }
        Program::new(ops).to_source()
    }

    pub fn error(&self, message: impl Into<String>) -> CodeGenError {
        CodeGenError::new(message, self.partial_source())
    }

    fn current(&mut self) -> &mut Vec<Op> {
        if self.frames.is_empty() {
            self.frames.push(Vec::new());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = mem::take(&mut self.pending);
        let ops = self.current();
        if let Some(Op::Text(previous)) = ops.last_mut() {
            previous.push_str(&text);
        } else {
            ops.push(Op::Text(text));
        }
    }
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals_are_merged() {
        let mut builder = CodeBuilder::new();
        builder.literal("<p>").unwrap();
        builder.literal("hi").unwrap();
        builder.start_code();
        builder.start_markup();
        builder.literal("</p>").unwrap();
        let program = builder.finish();
        assert_eq!(program.ops, vec![Op::Text("<p>hi</p>".to_string())]);
    }

    #[test]
    fn test_mode_switching() {
        let mut builder = CodeBuilder::new();
        assert_eq!(builder.mode(), Mode::Markup);
        builder.start_code();
        assert_eq!(builder.mode(), Mode::Code);
        builder.start_markup();
        assert_eq!(builder.mode(), Mode::Markup);
    }

    #[test]
    fn test_literal_in_code_mode_is_rejected() {
        let mut builder = CodeBuilder::new();
        builder.literal("<p>").unwrap();
        builder.start_code();
        let err = builder.literal("</p>").unwrap_err();
        assert!(err.message.contains("</p>"));
        assert!(err.program.contains(r#"html.push("<p>");"#));
        builder.start_markup();
        assert!(builder.literal("</p>").is_ok());
    }

    #[test]
    fn test_emit_flushes_text() {
        let mut builder = CodeBuilder::new();
        builder.literal("a").unwrap();
        builder.emit(Expr::Local("x".to_string()));
        builder.literal("b").unwrap();
        let program = builder.finish();
        assert_eq!(
            program.ops,
            vec![
                Op::Text("a".to_string()),
                Op::Emit(Expr::Local("x".to_string())),
                Op::Text("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_scopes() {
        let mut builder = CodeBuilder::with_locals(&["item".to_string()]);
        builder.declare("outer");
        builder.open_body();
        builder.declare("inner");
        assert!(builder.is_declared("inner"));
        assert!(builder.is_declared("outer"));
        assert!(builder.is_declared("item"));
        builder.literal("x").unwrap();
        let body = builder.close_body();
        assert_eq!(body, vec![Op::Text("x".to_string())]);
        assert!(!builder.is_declared("inner"));
        assert!(builder.is_declared("outer"));
    }

    #[test]
    fn test_error_carries_partial_program() {
        let mut builder = CodeBuilder::new();
        builder.literal("<ul>").unwrap();
        let err = builder.error("boom");
        assert_eq!(err.message, "boom");
        assert!(err.program.contains(r#"html.push("<ul>");"#));
    }
}
