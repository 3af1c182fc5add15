mod helper_detect;
mod metadata;
mod section_detect;

pub use helper_detect::HelperDetectionPlugin;
pub use metadata::TransformMetadata;
pub use section_detect::SectionDetectionPlugin;

use crate::ast::{Ast, AttributeValue, Expression, IfStatement, Segment, Statement};

/// Visitor trait for read-only analysis passes over the AST
pub trait Visitor {
    /// Called before visiting children. Return `false` to skip children.
    fn enter(&mut self, _segment: &Segment, _metadata: &mut TransformMetadata) -> bool {
        true
    }

    /// Called after visiting children.
    fn exit(&mut self, _segment: &Segment, _metadata: &mut TransformMetadata) {}

    /// Called for every expression node, outermost first.
    fn expression(&mut self, _expression: &Expression, _metadata: &mut TransformMetadata) {}
}

/// Transformer that applies a series of plugins to an AST
pub struct Transformer {
    plugins: Vec<Box<dyn Visitor>>,
    pub metadata: TransformMetadata,
}

impl Transformer {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            metadata: TransformMetadata::new(),
        }
    }

    pub fn add<V: Visitor + 'static>(mut self, visitor: V) -> Self {
        self.plugins.push(Box::new(visitor));
        self
    }

    pub fn transform(&mut self, ast: &Ast) -> &TransformMetadata {
        for plugin in &mut self.plugins {
            Self::visit_segments(&ast.segments, plugin.as_mut(), &mut self.metadata);
        }

        &self.metadata
    }

    fn visit_segments(segments: &[Segment], visitor: &mut dyn Visitor, metadata: &mut TransformMetadata) {
        for segment in segments {
            if visitor.enter(segment, metadata) {
                match segment {
                    Segment::Html(html) => {
                        for attribute in &html.attributes {
                            for value in &attribute.values {
                                if let AttributeValue::Expression(inline) = value {
                                    Self::visit_expression(&inline.expression, visitor, metadata);
                                }
                            }
                        }
                        Self::visit_segments(html.children(), visitor, metadata);
                    }
                    Segment::InlineExpression(inline) => {
                        Self::visit_expression(&inline.expression, visitor, metadata);
                    }
                    Segment::Expression(expression) => {
                        Self::visit_expression(expression, visitor, metadata);
                    }
                    Segment::Block(block) => {
                        Self::visit_segments(&block.statements, visitor, metadata);
                    }
                    Segment::Statement(statement) => {
                        Self::visit_statement(statement, visitor, metadata);
                    }
                    Segment::Helper(helper) => {
                        Self::visit_segments(&helper.body.statements, visitor, metadata);
                    }
                    Segment::Section(section) => {
                        Self::visit_segments(&section.body.statements, visitor, metadata);
                    }
                    // Leaf segments
                    Segment::Literal(_)
                    | Segment::HtmlComment(_)
                    | Segment::HtmlDocType(_)
                    | Segment::Comment(_) => {}
                }
            }
            visitor.exit(segment, metadata);
        }
    }

    fn visit_statement(statement: &Statement, visitor: &mut dyn Visitor, metadata: &mut TransformMetadata) {
        match statement {
            Statement::VariableDeclaration(declaration) => {
                if let Some(initializer) = &declaration.initializer {
                    Self::visit_expression(initializer, visitor, metadata);
                }
            }
            Statement::If(if_statement) => Self::visit_if(if_statement, visitor, metadata),
            Statement::For(for_loop) => {
                if let Some(initializer) = &for_loop.initialization.initializer {
                    Self::visit_expression(initializer, visitor, metadata);
                }
                Self::visit_expression(&for_loop.condition, visitor, metadata);
                Self::visit_expression(&for_loop.iteration, visitor, metadata);
                Self::visit_segments(&for_loop.body.statements, visitor, metadata);
            }
            Statement::ForEach(foreach) => {
                Self::visit_expression(&foreach.collection, visitor, metadata);
                Self::visit_segments(&foreach.body.statements, visitor, metadata);
            }
        }
    }

    fn visit_if(statement: &IfStatement, visitor: &mut dyn Visitor, metadata: &mut TransformMetadata) {
        Self::visit_expression(&statement.test, visitor, metadata);
        Self::visit_segments(&statement.body.statements, visitor, metadata);
        if let Some(else_if) = &statement.else_if {
            Self::visit_if(else_if, visitor, metadata);
        }
        if let Some(else_body) = &statement.else_body {
            Self::visit_segments(&else_body.statements, visitor, metadata);
        }
    }

    fn visit_expression(expression: &Expression, visitor: &mut dyn Visitor, metadata: &mut TransformMetadata) {
        visitor.expression(expression, metadata);
        match expression {
            Expression::VariableAccess(access) => {
                if let Some(object) = &access.object {
                    Self::visit_expression(object, visitor, metadata);
                }
            }
            Expression::Literal(_) => {}
            Expression::MethodCall(call) => {
                Self::visit_expression(&call.callee, visitor, metadata);
                for argument in &call.arguments {
                    Self::visit_expression(argument, visitor, metadata);
                }
            }
            Expression::ArrayAccess(access) => {
                Self::visit_expression(&access.target, visitor, metadata);
                Self::visit_expression(&access.index, visitor, metadata);
            }
            Expression::ArrayLiteral(items) => {
                for item in items {
                    Self::visit_expression(item, visitor, metadata);
                }
            }
            Expression::Unary(unary) => Self::visit_expression(&unary.operand, visitor, metadata),
            Expression::Binary(binary) => {
                Self::visit_expression(&binary.left, visitor, metadata);
                Self::visit_expression(&binary.right, visitor, metadata);
            }
            Expression::Ternary(ternary) => {
                Self::visit_expression(&ternary.test, visitor, metadata);
                Self::visit_expression(&ternary.when_true, visitor, metadata);
                Self::visit_expression(&ternary.when_false, visitor, metadata);
            }
        }
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a transformer with the standard plugins
pub fn standard_plugins() -> Transformer {
    Transformer::new()
        .add(HelperDetectionPlugin)
        .add(SectionDetectionPlugin)
}
