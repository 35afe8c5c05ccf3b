//! Small helpers for building statements.

/// Render `value` as a single-quoted string literal.
///
/// Backslashes and single quotes are escaped so user input (symbols,
/// credentials) can never terminate the literal.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}
