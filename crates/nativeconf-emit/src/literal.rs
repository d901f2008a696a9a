//! Literal rendering for the embedded configuration

use nativeconf_core::EntryValue;

/// Quote `text` as a double-quoted source string
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render an entry value as the argument of a `configuration.config` call
pub fn render_literal(value: &EntryValue) -> String {
    match value {
        EntryValue::Integer(v) => v.to_string(),
        EntryValue::WideInteger(v) => format!("{}L", v),
        EntryValue::Bignum(digits) => format!("newBignum(context, {})", quote(digits)),
        EntryValue::Boolean(b) => b.to_string(),
        EntryValue::Text(text) => format!("string(context, {})", quote(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str) -> String {
        render_literal(&EntryValue::from_output(text))
    }

    #[test]
    fn test_integer_forms() {
        assert_eq!(render("2147483647"), "2147483647");
        assert_eq!(render("-2147483648"), "-2147483648");
        assert_eq!(render("2147483648"), "2147483648L");
        assert_eq!(render("9223372036854775807"), "9223372036854775807L");
        assert_eq!(
            render("99999999999999999999999999"),
            "newBignum(context, \"99999999999999999999999999\")"
        );
    }

    #[test]
    fn test_boolean_and_text() {
        assert_eq!(render("true"), "true");
        assert_eq!(render("pointer"), "string(context, \"pointer\")");
        assert_eq!(
            render_literal(&EntryValue::Text("a \"b\" \\ c".into())),
            r#"string(context, "a \"b\" \\ c")"#
        );
    }
}
