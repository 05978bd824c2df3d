//! String and number spelling: escape decoding for literals and templates, and
//! the ECMAScript `Number::toString` format used for folded numbers.

/// Decodes the escapes of a string body or a template chunk. `None` for malformed escapes.
pub fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let escaped = chars.next()?;
        match escaped {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !chars.peek().is_some_and(|next| next.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let hex: String = (0..2).filter_map(|_| chars.next()).collect();
                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            'u' => {
                let code = if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut hex = String::new();
                    loop {
                        match chars.next()? {
                            '}' => break,
                            digit => hex.push(digit),
                        }
                    }
                    u32::from_str_radix(&hex, 16).ok()?
                } else {
                    let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                    if hex.len() != 4 {
                        return None;
                    }
                    u32::from_str_radix(&hex, 16).ok()?
                };
                out.push(char::from_u32(code)?);
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            digit if digit.is_ascii_digit() => return None,
            other => out.push(other),
        }
    }
    Some(out)
}

/// Double-quoted source spelling of a string value.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            ch if (ch as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", ch as u32)),
            ch => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Escapes a cooked string so it can be spliced into raw template text.
pub fn escape_template_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            ch => out.push(ch),
        }
    }
    out
}

/// Value of a numeric literal as written in source; `None` for bigints and legacy octals.
pub fn parse_number_literal(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|ch| *ch != '_').collect();
    if cleaned.ends_with('n') {
        return None;
    }
    let radix_digits = |digits: &str, radix: u32| {
        if digits.is_empty() {
            return None;
        }
        digits.chars().try_fold(0f64, |acc, ch| {
            ch.to_digit(radix)
                .map(|digit| acc * f64::from(radix) + f64::from(digit))
        })
    };
    let lower = cleaned.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return radix_digits(hex, 16);
    }
    if let Some(octal) = lower.strip_prefix("0o") {
        return radix_digits(octal, 8);
    }
    if let Some(binary) = lower.strip_prefix("0b") {
        return radix_digits(binary, 2);
    }
    if cleaned.len() > 1
        && cleaned.starts_with('0')
        && cleaned.chars().nth(1).is_some_and(|ch| ch.is_ascii_digit())
    {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// ECMAScript `Number::toString(10)`.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if (1e-6..1e21).contains(&value.abs()) {
        return format!("{value}");
    }
    let formatted = format!("{value:e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}

pub fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_common_sequences() {
        assert_eq!(unescape(r"a\nb").as_deref(), Some("a\nb"));
        assert_eq!(unescape(r"\x41B\u{43}").as_deref(), Some("ABC"));
        assert_eq!(unescape(r"it\'s").as_deref(), Some("it's"));
        assert_eq!(unescape("line\\\ncontinued").as_deref(), Some("linecontinued"));
        assert_eq!(unescape(r"\u12"), None);
    }

    #[test]
    fn quotes_with_escapes() {
        assert_eq!(quote("say \"hi\"\n"), r#""say \"hi\"\n""#);
        assert_eq!(quote("tab\there"), r#""tab\there""#);
    }

    #[test]
    fn template_text_escapes_interpolation_markers() {
        assert_eq!(escape_template_text("${x} costs $5 `now`"), r"\${x} costs $5 \`now\`");
    }

    #[test]
    fn parses_numeric_literal_forms() {
        assert_eq!(parse_number_literal("1_000"), Some(1000.0));
        assert_eq!(parse_number_literal("0xff"), Some(255.0));
        assert_eq!(parse_number_literal("0b101"), Some(5.0));
        assert_eq!(parse_number_literal("0o17"), Some(15.0));
        assert_eq!(parse_number_literal(".5"), Some(0.5));
        assert_eq!(parse_number_literal("1e3"), Some(1000.0));
        assert_eq!(parse_number_literal("10n"), None);
        assert_eq!(parse_number_literal("017"), None);
    }

    #[test]
    fn formats_like_number_to_string() {
        assert_eq!(format_number(6.0), "6");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }
}
