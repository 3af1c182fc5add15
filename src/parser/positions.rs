//! Source-context helpers for diagnostics.
//!
//! Tokens record positions as (byte index, line, column). Diagnostics need the
//! text of the offending line and a caret underline beneath the column.

use super::tokenizer::Position;

/// Text of the zero-indexed `line`, without its line terminator.
pub fn line_text(source: &str, line: usize) -> Option<&str> {
    source.split('\n').nth(line).map(|text| text.strip_suffix('\r').unwrap_or(text))
}

/// Recompute the position of `byte_offset` by scanning from the start of `source`.
///
/// The offset is clamped to the source length and snapped back to a char boundary.
pub fn position_at(source: &str, byte_offset: usize) -> Position {
    let mut offset = byte_offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let mut position = Position::new();
    for c in source[..offset].chars() {
        if c == '\n' {
            position.newline();
        } else {
            position.next(c);
        }
    }
    position
}

/// Render a `line | text` gutter followed by a caret under `position`.
pub fn snippet(source: &str, position: Position, width: usize) -> Option<String> {
    let text = line_text(source, position.line)?;
    let number = position.line + 1;
    let gutter = format!("{}", number).len().max(2);
    let mut out = String::new();
    out.push_str(&format!("{:>gutter$} |\n", ""));
    out.push_str(&format!("{:>gutter$} | {}\n", number, text));
    out.push_str(&format!(
        "{:>gutter$} | {}{}\n",
        "",
        " ".repeat(position.column),
        "^".repeat(width.max(1))
    ));
    Some(out)
}
