//! End-to-end rendering through `compile` and `CompiledView::execute`

use razor_transpiler::parser::tokenize;
use razor_transpiler::{compile, CompileError, Value};
use serde_json::json;

fn render(source: &str, model: serde_json::Value) -> String {
    let view = compile(source).unwrap_or_else(|err| panic!("compile failed: {}", err.render(source, "test.cshtml")));
    view.execute(&model).unwrap()
}

#[test]
fn test_static_markup_round_trips() {
    let source = "<!DOCTYPE html>\n<html lang=\"en\">\n  <head>\n    <meta charset=\"utf-8\">\n    <title>Static</title>\n  </head>\n  <body class=\"page\" data-id=\"7\">\n    <!-- banner -->\n    <p>Plain text, punctuation; and (parens).</p>\n    <img src=\"a.png\" alt=\"\" />\n    <input type=\"checkbox\" checked>\n  </body>\n</html>\n";
    assert_eq!(render(source, json!({})), source);
    assert_eq!(render(source, json!({"anything": [1, 2]})), source);
}

#[test]
fn test_conditional_attribute() {
    assert_eq!(render(r#"<div class="@x"/>"#, json!({"x": null})), "<div/>");
    assert_eq!(render(r#"<div class="@x"/>"#, json!({"x": "a"})), r#"<div class="a"/>"#);
}

#[test]
fn test_escaping() {
    assert_eq!(render("@value", json!({"value": "<br />"})), "&lt;br /&gt;");
    assert_eq!(render("@raw(value)", json!({"value": "<br />"})), "<br />");
}

#[test]
fn test_for_loop() {
    assert_eq!(
        render("@for(var i=0;i<3;++i){<li>@i</li>}", json!({})),
        "<li>0</li><li>1</li><li>2</li>"
    );
}

#[test]
fn test_local_shadows_model() {
    let source = "@{ var x = 1; }<p>@x @y</p>";
    assert_eq!(render(source, json!({"x": 99, "y": 2})), "<p>1 2</p>");
}

#[test]
fn test_helper() {
    assert_eq!(
        render("@helper cup(drink){<div>cup of @drink</div>}@cup('tea')", json!({})),
        "<div>cup of tea</div>"
    );
}

#[test]
fn test_helper_does_not_see_template_locals() {
    let source = "@{ var who = 'local'; }@helper show(){<b>@who</b>}@show()";
    assert_eq!(render(source, json!({"who": "model"})), "<b>model</b>");
}

#[test]
fn test_section_does_not_see_template_locals() {
    let view = compile("@{ var who = 'local'; }@section aside {<b>@who</b>}<p>@who</p>").unwrap();
    let model = json!({"who": "model"});
    assert_eq!(view.execute(&model).unwrap(), "<p>local</p>");
    assert_eq!(view.render_section("aside", &model).unwrap(), "<b>model</b>");
}

#[test]
fn test_email_in_attribute_stays_text() {
    let source = r#"<a href="mailto:ada@example.com" title="@name">mail</a>"#;
    assert_eq!(
        render(source, json!({"name": "Ada"})),
        r#"<a href="mailto:ada@example.com" title="Ada">mail</a>"#
    );
}

#[test]
fn test_markup_spelling_round_trips() {
    for source in [
        "<DIV>x</div>",
        "<div>x</div >",
        "<div class = \"a\">x</div>",
        "<p\n  id='main'\n  hidden\n>text</P\n>",
    ] {
        assert_eq!(render(source, json!({})), source);
    }
    assert_eq!(
        render("<div class = \"@c\">x</div >", json!({"c": "on"})),
        "<div class = \"on\">x</div >"
    );
}

#[test]
fn test_email_addresses_stay_text() {
    assert_eq!(
        render("<p>mail ada@example.com or @name</p>", json!({"name": "Ada"})),
        "<p>mail ada@example.com or Ada</p>"
    );
}

#[test]
fn test_escaped_delimiter() {
    assert_eq!(render("<p>@@handle</p>", json!({})), "<p>@handle</p>");
}

#[test]
fn test_comments_render_nothing() {
    assert_eq!(render("<p>a@* hidden *@b</p>", json!({})), "<p>ab</p>");
}

#[test]
fn test_nested_control_flow() {
    let source = "<ul>@foreach(var group in groups){<li>@group.name@foreach(var tag in group.tags){ <i>@tag</i>}</li>}</ul>";
    let model = json!({"groups": [
        {"name": "a", "tags": ["x", "y"]},
        {"name": "b", "tags": []}
    ]});
    assert_eq!(render(source, model), "<ul><li>a <i>x</i> <i>y</i></li><li>b</li></ul>");
}

#[test]
fn test_array_literal_and_index() {
    let source = "@{ var names = ['zero', 'one']; }@names[1] @names.length";
    assert_eq!(render(source, json!({})), "one 2");
}

#[test]
fn test_same_view_renders_many_models() {
    let view = compile("<b>@n</b>").unwrap();
    let outputs: Vec<String> = (0..3).map(|n| view.execute(&json!({ "n": n })).unwrap()).collect();
    assert_eq!(outputs, vec!["<b>0</b>", "<b>1</b>", "<b>2</b>"]);
}

#[test]
fn test_view_is_shareable_across_threads() {
    let view = std::sync::Arc::new(compile("<b>@n</b>").unwrap());
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let view = view.clone();
            std::thread::spawn(move || view.execute(&json!({ "n": n })).unwrap())
        })
        .collect();
    let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(outputs, vec!["<b>0</b>", "<b>1</b>", "<b>2</b>", "<b>3</b>"]);
}

#[test]
fn test_host_helper_output_is_escaped_unless_raw() {
    let mut view = compile("@bold(x)").unwrap();
    view.register_helper("bold", |arguments: &[Value]| {
        Ok(Value::from(format!("<b>{}</b>", arguments[0])))
    });
    assert_eq!(view.execute(&json!({"x": "hi"})).unwrap(), "&lt;b&gt;hi&lt;/b&gt;");

    view.register_helper("bold", |arguments: &[Value]| {
        Ok(Value::Raw(format!("<b>{}</b>", arguments[0])))
    });
    assert_eq!(view.execute(&json!({"x": "hi"})).unwrap(), "<b>hi</b>");
}

#[test]
fn test_unclosed_tag_is_a_parse_error() {
    match compile("<div>") {
        Err(CompileError::Parse(err)) => assert_eq!(err.position.column, 0),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_tokenize_whitespace() {
    let texts: Vec<&str> = tokenize("a b").iter().map(|token| token.text).collect();
    assert_eq!(texts, vec!["a", " ", "b", ""]);
}
