//! Textual encoding of compiler options.
//!
//! The compiler reads its options as one data literal on the command line:
//!
//! ```text
//! {:optimizations :advanced :closure-defines {"goog.DEBUG" false}}
//! ```

use std::fmt::Write;

use super::ConfigValue;

/// Encode a value into the compiler's notation.
pub fn encode(value: &ConfigValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Encode a value and quote it as a single shell argument.
pub fn encode_shell_arg(value: &ConfigValue) -> String {
    shell_quote(&encode(value))
}

/// Wrap text in single quotes, writing interior quotes as `'\''`.
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

fn write_value(out: &mut String, value: &ConfigValue) {
    match value {
        ConfigValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        ConfigValue::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        ConfigValue::Float(f) if f.is_nan() => out.push_str("##NaN"),
        ConfigValue::Float(f) if f.is_infinite() => {
            out.push_str(if *f > 0.0 { "##Inf" } else { "##-Inf" });
        }
        // Debug keeps the fractional part ("1.0", not "1").
        ConfigValue::Float(f) => {
            let _ = write!(out, "{:?}", f);
        }
        ConfigValue::Str(s) => write_string(out, s),
        ConfigValue::Literal(raw) => out.push_str(raw),
        ConfigValue::Vector(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        ConfigValue::Map(entries) => {
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_string(out, key);
                out.push(' ');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    if s.starts_with(':') {
        out.push_str(s);
        return;
    }
    if let Some(raw) = s.strip_prefix('\'') {
        out.push_str(raw);
        return;
    }

    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(encode(&ConfigValue::Bool(true)), "true");
        assert_eq!(encode(&ConfigValue::Bool(false)), "false");
        assert_eq!(encode(&ConfigValue::Integer(-42)), "-42");
        assert_eq!(encode(&ConfigValue::Float(1.0)), "1.0");
        assert_eq!(encode(&ConfigValue::Float(0.25)), "0.25");
    }

    #[test]
    fn test_non_finite_floats() {
        assert_eq!(encode(&ConfigValue::Float(f64::NAN)), "##NaN");
        assert_eq!(encode(&ConfigValue::Float(f64::INFINITY)), "##Inf");
        assert_eq!(encode(&ConfigValue::Float(f64::NEG_INFINITY)), "##-Inf");
        assert_eq!(
            encode(&ConfigValue::Vector(vec![ConfigValue::Float(f64::INFINITY)])),
            "[##Inf]"
        );
    }

    #[test]
    fn test_keyword_and_literal_pass_through() {
        assert_eq!(encode(&ConfigValue::from(":advanced")), ":advanced");
        assert_eq!(encode(&ConfigValue::from("'app.core/init")), "app.core/init");
        assert_eq!(
            encode(&ConfigValue::Literal("#js {:a 1}".to_string())),
            "#js {:a 1}"
        );
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(encode(&ConfigValue::from("plain")), "\"plain\"");
        assert_eq!(
            encode(&ConfigValue::from("say \"hi\"\n")),
            "\"say \\\"hi\\\"\\n\""
        );
        assert_eq!(encode(&ConfigValue::from("C:\\js")), "\"C:\\\\js\"");
        assert_eq!(encode(&ConfigValue::from("\u{1}")), "\"\\u0001\"");
    }

    #[test]
    fn test_nested_collections() {
        let value = ConfigValue::map([
            (":optimizations", ConfigValue::from(":advanced")),
            (
                ":closure-defines",
                ConfigValue::map([("goog.DEBUG", false)]),
            ),
            (":externs", ConfigValue::vector(["a.js", "b.js"])),
        ]);

        assert_eq!(
            encode(&value),
            "{:closure-defines {\"goog.DEBUG\" false} :externs [\"a.js\" \"b.js\"] :optimizations :advanced}"
        );
    }

    #[test]
    fn test_empty_collections() {
        assert_eq!(encode(&ConfigValue::empty_map()), "{}");
        assert_eq!(encode(&ConfigValue::Vector(Vec::new())), "[]");
    }

    #[test]
    fn test_shell_quoting() {
        assert_eq!(shell_quote("abc"), "'abc'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");

        let value = ConfigValue::map([(":banner", "it's")]);
        assert_eq!(encode_shell_arg(&value), "'{:banner \"it'\\''s\"}'");
    }
}
