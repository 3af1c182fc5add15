mod escape;
mod interpreter;
mod value;

pub use escape::{escape_html, escape_value};
pub use value::Value;

use crate::error::RenderError;
use crate::generate::{Fragment, GenerateResult, Program};
use crate::transform::TransformMetadata;
use crate::Options;
use interpreter::Interpreter;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Callables every view provides without declaring them
pub const BUILTIN_HELPERS: &[&str] = &["raw", "renderSection", "renderBody"];

/// Helper implemented by the host application
pub type HelperFn = Arc<dyn Fn(&[Value]) -> Result<Value, RenderError> + Send + Sync>;

#[derive(Clone)]
pub enum Helper {
    /// Declared with `@helper` in the template
    Template(Fragment),
    Host(HelperFn),
}

/// Content a layout receives from the view it wraps
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Rendered sections, read by `renderSection(name)`
    pub sections: BTreeMap<String, String>,
    /// Rendered view, read by `renderBody()`
    pub body: Option<String>,
}

/// A compiled template, ready to render models.
///
/// Rendering never mutates the view, so one view can serve many models
/// concurrently.
pub struct CompiledView {
    program: Program,
    helpers: BTreeMap<String, Helper>,
    sections: BTreeMap<String, Fragment>,
    metadata: TransformMetadata,
    max_call_depth: usize,
}

impl CompiledView {
    pub fn new(generated: GenerateResult, metadata: TransformMetadata, options: &Options) -> Self {
        let helpers = generated
            .helpers
            .into_iter()
            .map(|(name, fragment)| (name, Helper::Template(fragment)))
            .collect();
        Self {
            program: generated.program,
            helpers,
            sections: generated.sections,
            metadata,
            max_call_depth: options.max_call_depth,
        }
    }

    /// Render the view against `model`.
    pub fn execute(&self, model: &serde_json::Value) -> Result<String, RenderError> {
        self.execute_with(model, &RenderContext::default())
    }

    /// Render the view as a layout around already rendered content.
    pub fn execute_with(&self, model: &serde_json::Value, context: &RenderContext) -> Result<String, RenderError> {
        let model = Value::from(model);
        let html = Interpreter::new(self, &model, context).run(&self.program)?;
        debug!(bytes = html.len(), sections = context.sections.len(), "executed view");
        Ok(html)
    }

    /// Call a builtin, template or host helper directly.
    pub fn call_helper(&self, name: &str, arguments: Vec<Value>, model: &serde_json::Value) -> Result<Value, RenderError> {
        let model = Value::from(model);
        let context = RenderContext::default();
        Interpreter::new(self, &model, &context).call(name, arguments, 0)
    }

    /// Render one section declared by this view; empty if there is none.
    pub fn render_section(&self, name: &str, model: &serde_json::Value) -> Result<String, RenderError> {
        let Some(fragment) = self.sections.get(name) else {
            return Ok(String::new());
        };
        let model = Value::from(model);
        let context = RenderContext::default();
        let rendered = Interpreter::new(self, &model, &context).invoke(name, fragment, Vec::new(), 0)?;
        Ok(rendered.to_string())
    }

    /// Render every declared section, keyed by name.
    pub fn render_sections(&self, model: &serde_json::Value) -> Result<BTreeMap<String, String>, RenderError> {
        self.sections
            .keys()
            .map(|name| Ok((name.clone(), self.render_section(name, model)?)))
            .collect()
    }

    /// Add a host helper, replacing any helper of the same name.
    pub fn register_helper<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&[Value]) -> Result<Value, RenderError> + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Helper::Host(Arc::new(helper)));
    }

    pub fn helper_names(&self) -> impl Iterator<Item = &str> {
        self.helpers.keys().map(String::as_str)
    }

    pub fn has_helper(&self, name: &str) -> bool {
        BUILTIN_HELPERS.contains(&name) || self.helpers.contains_key(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Helpers the template calls that are neither builtins, declared nor registered.
    pub fn missing_helpers(&self) -> Vec<&str> {
        self.metadata
            .external_helpers()
            .into_iter()
            .filter(|name| !self.helpers.contains_key(*name))
            .collect()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn metadata(&self) -> &TransformMetadata {
        &self.metadata
    }

    /// Program text of the view with its template helpers and sections.
    pub fn to_source(&self) -> String {
        let mut parts = vec!["var helpers = {};".to_string(), "var sections = {};".to_string()];
        for (name, helper) in &self.helpers {
            if let Helper::Template(fragment) = helper {
                parts.push(fragment.to_source("helpers", name));
            }
        }
        for (name, fragment) in &self.sections {
            parts.push(fragment.to_source("sections", name));
        }
        parts.push(self.program.to_source());
        parts.join("\n")
    }
}

impl fmt::Debug for CompiledView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledView")
            .field("ops", &self.program.len())
            .field("helpers", &self.helpers.keys().collect::<Vec<_>>())
            .field("sections", &self.sections.keys().collect::<Vec<_>>())
            .field("max_call_depth", &self.max_call_depth)
            .finish()
    }
}
