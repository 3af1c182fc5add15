pub mod ast;
pub mod error;
pub mod generate;
pub mod html;
pub mod parser;
pub mod runtime;
pub mod transform;

pub use ast::Ast;
pub use error::{CodeGenError, CompileError, ErrorKind, LexError, ParseError, RenderError};
pub use generate::{Generator, Program, Transpiler};
pub use parser::{Parser, RazorParser};
pub use runtime::{CompiledView, HelperFn, RenderContext, Value};
pub use transform::TransformMetadata;

use serde::Deserialize;
use tracing::debug;

/// How identifiers are mapped onto model property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentifierCasing {
    /// Use names as written
    #[default]
    Identity,
    /// Lower-case the first character: `Title` reads `title`
    PascalToCamel,
}

impl IdentifierCasing {
    pub fn apply(&self, name: &str) -> String {
        match self {
            IdentifierCasing::Identity => name.to_string(),
            IdentifierCasing::PascalToCamel => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => first.to_lowercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }
}

/// Configuration for compilation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    pub identifier_casing: IdentifierCasing,
    /// Deepest helper nesting allowed while rendering
    pub max_call_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            identifier_casing: IdentifierCasing::Identity,
            max_call_depth: 64,
        }
    }
}

impl Options {
    /// Parse options from a JSON document. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Parse, analyze and generate in one go.
pub struct Pipeline {
    parser: RazorParser,
    options: Options,
}

impl Pipeline {
    pub fn standard() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            parser: RazorParser::new(),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn parse(&self, source: &str) -> Result<Ast, CompileError> {
        self.parser.parse(source)
    }

    pub fn compile(&self, source: &str) -> Result<CompiledView, CompileError> {
        let ast = self.parse(source)?;

        let mut transformer = transform::standard_plugins();
        let metadata = transformer.transform(&ast).clone();

        let generated = Transpiler::new(&self.options).generate(&ast, &metadata)?;
        debug!(
            ops = generated.program.len(),
            helpers = generated.helpers.len(),
            sections = generated.sections.len(),
            "compiled view"
        );
        Ok(CompiledView::new(generated, metadata, &self.options))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

/// Compile a template with default options.
pub fn compile(source: &str) -> Result<CompiledView, CompileError> {
    Pipeline::standard().compile(source)
}

pub fn compile_with(source: &str, options: &Options) -> Result<CompiledView, CompileError> {
    Pipeline::with_options(options.clone()).compile(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_and_execute() {
        let view = compile("<h1>Hello @name!</h1>").unwrap();
        assert_eq!(view.execute(&json!({"name": "World"})).unwrap(), "<h1>Hello World!</h1>");
    }

    #[test]
    fn test_identifier_casing() {
        assert_eq!(IdentifierCasing::Identity.apply("Title"), "Title");
        assert_eq!(IdentifierCasing::PascalToCamel.apply("Title"), "title");
        assert_eq!(IdentifierCasing::PascalToCamel.apply("title"), "title");
        assert_eq!(IdentifierCasing::PascalToCamel.apply(""), "");
    }

    #[test]
    fn test_options_from_json() {
        let options = Options::from_json(r#"{"identifierCasing": "pascalToCamel"}"#).unwrap();
        assert_eq!(options.identifier_casing, IdentifierCasing::PascalToCamel);
        assert_eq!(options.max_call_depth, 64);
        assert_eq!(Options::from_json("{}").unwrap(), Options::default());
        assert!(Options::from_json(r#"{"identifierCasing": "snake"}"#).is_err());
    }

    #[test]
    fn test_pascal_case_model() {
        let options = Options {
            identifier_casing: IdentifierCasing::PascalToCamel,
            ..Options::default()
        };
        let view = compile_with("<p>@Model.UserName</p>", &options).unwrap();
        assert_eq!(view.execute(&json!({"userName": "ada"})).unwrap(), "<p>ada</p>");
    }

    #[test]
    fn test_pipeline_parse() {
        let ast = Pipeline::standard().parse("<p>@x</p>").unwrap();
        assert_eq!(ast.segments.len(), 1);
    }
}
