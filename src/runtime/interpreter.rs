use super::escape::escape_value;
use super::value::{binary, Value};
use super::{CompiledView, Helper, RenderContext};
use crate::error::RenderError;
use crate::generate::{AttributePart, BinaryOp, Expr, Fragment, Op, Program, UnaryOp};
use std::collections::HashMap;
use tracing::trace;

/// Tree-walking evaluator for the ops of a compiled view.
pub(super) struct Interpreter<'v> {
    view: &'v CompiledView,
    model: &'v Value,
    context: &'v RenderContext,
}

/// State of one program run: the view body or a single helper call.
struct Run {
    scopes: Vec<HashMap<String, Value>>,
    html: String,
    attribute: Option<AttributeBuffer>,
    depth: usize,
}

struct AttributeBuffer {
    prefix: String,
    parts: Vec<String>,
}

impl Run {
    fn new(depth: usize) -> Self {
        Self {
            scopes: vec![HashMap::new()],
            html: String::new(),
            attribute: None,
            depth,
        }
    }

    fn declare(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
    }

    fn lookup(&self, name: &str) -> Result<&Value, RenderError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .ok_or_else(|| RenderError::UndefinedLocal(name.to_string()))
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), RenderError> {
        let slot = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
            .ok_or_else(|| RenderError::UndefinedLocal(name.to_string()))?;
        *slot = value;
        Ok(())
    }
}

impl<'v> Interpreter<'v> {
    pub(super) fn new(view: &'v CompiledView, model: &'v Value, context: &'v RenderContext) -> Self {
        Self { view, model, context }
    }

    pub(super) fn run(&self, program: &Program) -> Result<String, RenderError> {
        let mut run = Run::new(0);
        self.exec(&program.ops, &mut run)?;
        Ok(run.html)
    }

    /// Resolve an unqualified call: builtins first, then the helpers table.
    pub(super) fn call(&self, name: &str, arguments: Vec<Value>, depth: usize) -> Result<Value, RenderError> {
        match name {
            "raw" => Ok(Value::Raw(match arguments.into_iter().next() {
                None | Some(Value::Null) => String::new(),
                Some(Value::Raw(markup)) => markup,
                Some(value) => value.to_string(),
            })),
            "renderSection" => match arguments.first() {
                Some(Value::String(section)) => Ok(Value::Raw(
                    self.context.sections.get(section).cloned().unwrap_or_default(),
                )),
                _ => Err(RenderError::Helper {
                    name: name.to_string(),
                    message: "expects a section name".to_string(),
                }),
            },
            "renderBody" => Ok(Value::Raw(self.context.body.clone().unwrap_or_default())),
            _ => match self.view.helpers.get(name) {
                Some(Helper::Template(fragment)) => self.invoke(name, fragment, arguments, depth),
                Some(Helper::Host(helper)) => helper(&arguments),
                None => Err(RenderError::UnknownHelper(name.to_string())),
            },
        }
    }

    /// Run a helper or section body. Its output comes back as raw markup.
    pub(super) fn invoke(&self, name: &str, fragment: &Fragment, arguments: Vec<Value>, depth: usize) -> Result<Value, RenderError> {
        if depth >= self.view.max_call_depth {
            return Err(RenderError::RecursionLimit {
                name: name.to_string(),
                limit: self.view.max_call_depth,
            });
        }
        trace!(helper = name, depth, arguments = arguments.len(), "invoking helper");

        let mut run = Run::new(depth + 1);
        let mut arguments = arguments.into_iter();
        for parameter in &fragment.parameters {
            run.declare(parameter, arguments.next().unwrap_or_default());
        }
        self.exec(&fragment.program.ops, &mut run)?;
        Ok(Value::Raw(run.html))
    }

    fn exec(&self, ops: &[Op], run: &mut Run) -> Result<(), RenderError> {
        for op in ops {
            match op {
                Op::Text(text) => run.html.push_str(text),
                Op::Emit(expr) => {
                    let value = self.eval(expr, run)?;
                    run.html.push_str(&escape_value(&value));
                }
                Op::BeginAttribute { prefix } => {
                    run.attribute = Some(AttributeBuffer {
                        prefix: prefix.clone(),
                        parts: Vec::new(),
                    });
                }
                Op::AttributePart(part) => {
                    let text = match part {
                        AttributePart::Text(text) => text.clone(),
                        AttributePart::Expr(expr) => {
                            let value = self.eval(expr, run)?;
                            if value.is_truthy() { escape_value(&value) } else { String::new() }
                        }
                    };
                    if let Some(buffer) = run.attribute.as_mut() {
                        if !text.is_empty() {
                            buffer.parts.push(text);
                        }
                    }
                }
                Op::EndAttribute { suffix } => {
                    if let Some(buffer) = run.attribute.take() {
                        let value = buffer.parts.join(" ");
                        if !value.is_empty() {
                            run.html.push_str(&buffer.prefix);
                            run.html.push_str(&value);
                            run.html.push_str(suffix);
                        }
                    }
                }
                Op::Declare { name, init } => {
                    let value = match init {
                        Some(init) => self.eval(init, run)?,
                        None => Value::Null,
                    };
                    run.declare(name, value);
                }
                Op::Eval(expr) => {
                    self.eval(expr, run)?;
                }
                Op::If {
                    test,
                    then_branch,
                    else_branch,
                } => {
                    if self.eval(test, run)?.is_truthy() {
                        self.exec_body(then_branch, run)?;
                    } else {
                        self.exec_body(else_branch, run)?;
                    }
                }
                Op::For {
                    variable,
                    init,
                    condition,
                    iteration,
                    body,
                } => {
                    run.scopes.push(HashMap::new());
                    let value = match init {
                        Some(init) => self.eval(init, run)?,
                        None => Value::Null,
                    };
                    run.declare(variable, value);
                    while self.eval(condition, run)?.is_truthy() {
                        self.exec_body(body, run)?;
                        self.eval(iteration, run)?;
                    }
                    run.scopes.pop();
                }
                Op::ForEach {
                    variable,
                    collection,
                    body,
                } => {
                    for item in self.eval(collection, run)?.iterate()? {
                        run.scopes.push(HashMap::new());
                        run.declare(variable, item);
                        self.exec(body, run)?;
                        run.scopes.pop();
                    }
                }
            }
        }
        Ok(())
    }

    fn exec_body(&self, ops: &[Op], run: &mut Run) -> Result<(), RenderError> {
        run.scopes.push(HashMap::new());
        self.exec(ops, run)?;
        run.scopes.pop();
        Ok(())
    }

    fn eval(&self, expr: &Expr, run: &mut Run) -> Result<Value, RenderError> {
        match expr {
            Expr::Constant(value) => Ok(value.clone()),
            Expr::Local(name) => run.lookup(name).cloned(),
            Expr::Model(name) => Ok(self.model.property(name)),
            Expr::ModelRoot => Ok(self.model.clone()),
            Expr::Member { object, name } => self.eval(object, run)?.member(name),
            Expr::Index { target, index } => {
                let target = self.eval(target, run)?;
                let index = self.eval(index, run)?;
                target.index(&index)
            }
            Expr::CallHelper { name, arguments } => {
                let arguments = self.eval_list(arguments, run)?;
                self.call(name, arguments, run.depth)
            }
            Expr::CallMethod {
                receiver,
                name,
                arguments,
            } => {
                let receiver = self.eval(receiver, run)?;
                let arguments = self.eval_list(arguments, run)?;
                receiver.call_method(name, &arguments)
            }
            Expr::Array(items) => Ok(Value::Array(self.eval_list(items, run)?)),
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand, run)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
                    UnaryOp::Negate => match operand {
                        Value::Array(_) | Value::Object(_) => Err(RenderError::Type(format!(
                            "cannot negate {}",
                            operand.type_name()
                        ))),
                        other => Ok(Value::Number(-other.to_number())),
                    },
                    UnaryOp::New => Ok(operand),
                }
            }
            Expr::Update { name, delta, prefix } => {
                let old = run.lookup(name)?.to_number();
                let new = old + delta;
                run.assign(name, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { left, op, right } => {
                let left = self.eval(left, run)?;
                match op {
                    BinaryOp::And if !left.is_truthy() => Ok(left),
                    BinaryOp::Or if left.is_truthy() => Ok(left),
                    _ => {
                        let right = self.eval(right, run)?;
                        binary(*op, &left, &right)
                    }
                }
            }
            Expr::Assign { name, value } => {
                let value = self.eval(value, run)?;
                run.assign(name, value.clone())?;
                Ok(value)
            }
            Expr::Conditional {
                test,
                when_true,
                when_false,
            } => {
                if self.eval(test, run)?.is_truthy() {
                    self.eval(when_true, run)
                } else {
                    self.eval(when_false, run)
                }
            }
        }
    }

    fn eval_list(&self, exprs: &[Expr], run: &mut Run) -> Result<Vec<Value>, RenderError> {
        exprs.iter().map(|expr| self.eval(expr, run)).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::RenderError;
    use crate::runtime::Value;
    use crate::{compile, compile_with, Options};
    use serde_json::json;

    fn render(source: &str, model: serde_json::Value) -> String {
        compile(source).unwrap().execute(&model).unwrap()
    }

    fn render_err(source: &str, model: serde_json::Value) -> RenderError {
        compile(source).unwrap().execute(&model).unwrap_err()
    }

    #[test]
    fn test_conditional_attribute() {
        let source = r#"<div class="@x"/>"#;
        assert_eq!(render(source, json!({"x": null})), "<div/>");
        assert_eq!(render(source, json!({"x": "a"})), r#"<div class="a"/>"#);
        assert_eq!(render(source, json!({"x": false})), "<div/>");
    }

    #[test]
    fn test_attribute_fragments_join_with_space() {
        let source = r#"<a class="btn @kind @size"></a>"#;
        assert_eq!(render(source, json!({"kind": "primary", "size": null})), r#"<a class="btn primary"></a>"#);
        assert_eq!(render(source, json!({"kind": "", "size": "lg"})), r#"<a class="btn lg"></a>"#);
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        assert_eq!(
            render(r#"<a title="@t"></a>"#, json!({"t": "\"quoted\""})),
            r#"<a title="&quot;quoted&quot;"></a>"#
        );
    }

    #[test]
    fn test_if_else_chain() {
        let source = "@if(n > 10){<b>big</b>}else if(n > 5){<i>mid</i>}else{<u>small</u>}";
        assert_eq!(render(source, json!({"n": 20})), "<b>big</b>");
        assert_eq!(render(source, json!({"n": 7})), "<i>mid</i>");
        assert_eq!(render(source, json!({"n": 1})), "<u>small</u>");
    }

    #[test]
    fn test_foreach_over_model() {
        let source = "<ul>@foreach(var item in items){<li>@item.name</li>}</ul>";
        let model = json!({"items": [{"name": "a"}, {"name": "b<"}]});
        assert_eq!(render(source, model), "<ul><li>a</li><li>b&lt;</li></ul>");
    }

    #[test]
    fn test_locals_and_assignment() {
        let source = "@{ var total = 0; }@foreach(var n in numbers){ @{ total += n; } }<p>@total</p>";
        assert_eq!(render(source, json!({"numbers": [1, 2, 3]})).trim(), "<p>6</p>");
    }

    #[test]
    fn test_short_circuit() {
        assert_eq!(render("@(user && user.name)", json!({"user": null})), "");
        assert_eq!(render("@(title || 'untitled')", json!({})), "untitled");
    }

    #[test]
    fn test_ternary_and_methods() {
        let source = "@(name.length > 3 ? name.toUpperCase() : name)";
        assert_eq!(render(source, json!({"name": "alice"})), "ALICE");
        assert_eq!(render(source, json!({"name": "bob"})), "bob");
    }

    #[test]
    fn test_null_member_access_fails() {
        assert_eq!(
            render_err("@user.name", json!({})),
            RenderError::NullReference {
                member: "name".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_helper() {
        assert_eq!(render_err("@missing(1)", json!({})), RenderError::UnknownHelper("missing".to_string()));
    }

    #[test]
    fn test_host_helper() {
        let mut view = compile("<p>@shout(word)</p>").unwrap();
        view.register_helper("shout", |arguments: &[Value]| {
            let word = arguments.first().cloned().unwrap_or_default();
            Ok(Value::from(format!("{}!", word)))
        });
        assert_eq!(view.execute(&json!({"word": "hey"})).unwrap(), "<p>hey!</p>");
    }

    #[test]
    fn test_helper_recursion_limit() {
        let options = Options {
            max_call_depth: 4,
            ..Options::default()
        };
        let view = compile_with("@helper loop(n){@loop(n)}@loop(1)", &options).unwrap();
        assert_eq!(
            view.execute(&json!({})).unwrap_err(),
            RenderError::RecursionLimit {
                name: "loop".to_string(),
                limit: 4
            }
        );
    }

    #[test]
    fn test_recursive_helper() {
        let source = "@helper count(n){@if(n > 0){@n @count(n - 1)}}@count(3)";
        assert_eq!(render(source, json!({})), "3 2 1 ");
    }

    #[test]
    fn test_missing_helper_arguments_are_null() {
        let source = "@helper greet(name, title){<b>@title@name</b>}@greet('Ada')";
        assert_eq!(render(source, json!({})), "<b>Ada</b>");
    }
}
