use regex::Regex;

lazy_static::lazy_static! {
    static ref PLAIN_NAME: Regex = Regex::new(r"^[-a-zA-Z$._][-a-zA-Z$._0-9]*$").unwrap();
}

/// Quotes a symbol or local name when it contains characters the textual
/// form cannot carry bare, e.g. `@"binary_+"`.
pub fn quote(name: &str) -> String {
    if PLAIN_NAME.is_match(name) {
        name.to_owned()
    } else {
        format!("\"{}\"", escape(name))
    }
}

/// Escapes bytes for a `c"..."` constant: printable ASCII stays as is,
/// everything else becomes `\XX`.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'"' | b'\\' => out.push_str(&format!("\\{:02X}", byte)),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{:02X}", byte)),
        }
    }
    out
}

/// Spells a double so the textual form reads it back exactly: finite
/// values always carry a `.` in the mantissa, infinities and NaNs use the
/// hexadecimal bit pattern.
pub fn float_literal(n: f64) -> String {
    if !n.is_finite() {
        return format!("0x{:016X}", n.to_bits());
    }

    let text = format!("{:?}", n);
    if text.contains('.') {
        text
    } else if let Some((mantissa, exponent)) = text.split_once('e') {
        format!("{}.0e{}", mantissa, exponent)
    } else {
        format!("{}.0", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_names_are_quoted() {
        assert_eq!(quote("main"), "main");
        assert_eq!(quote("for.header.3"), "for.header.3");
        assert_eq!(quote("binary_+"), "\"binary_+\"");
        assert_eq!(quote("größe"), "\"gr\\C3\\B6\\C3\\9Fe\"");
    }

    #[test]
    fn floats_keep_a_mantissa_point() {
        assert_eq!(float_literal(2.0), "2.0");
        assert_eq!(float_literal(0.5), "0.5");
        assert_eq!(float_literal(1e20), "1.0e20");
        assert_eq!(float_literal(-1e-7), "-1.0e-7");
        assert_eq!(float_literal(f64::INFINITY), "0x7FF0000000000000");
        assert!(float_literal(f64::NAN).starts_with("0x7FF"));
    }

    #[test]
    fn escapes_control_and_quote_bytes() {
        assert_eq!(escape("a\nb"), "a\\0Ab");
        assert_eq!(escape("say \"hi\""), "say \\22hi\\22");
    }
}
