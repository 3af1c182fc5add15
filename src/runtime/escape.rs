use super::Value;

/// Replace `&`, `<`, `>`, `'` and `"` with HTML entities.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Text written for a rendered value: nothing for null, raw markup as is,
/// anything else escaped.
pub fn escape_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Raw(markup) => markup.clone(),
        other => escape_html(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<br />"), "&lt;br /&gt;");
        assert_eq!(escape_html(r#"Tom & "Jerry's""#), "Tom &amp; &quot;Jerry&apos;s&quot;");
        assert_eq!(escape_html("&lt;"), "&amp;lt;");
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value(&Value::Null), "");
        assert_eq!(escape_value(&Value::Raw("<b>".to_string())), "<b>");
        assert_eq!(escape_value(&Value::from("<b>")), "&lt;b&gt;");
        assert_eq!(escape_value(&Value::from(4.0)), "4");
    }
}
