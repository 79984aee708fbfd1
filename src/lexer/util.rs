use crate::lexer::token::Number;
use anyhow::{anyhow, bail, Result};

pub fn parse_number(text: &str, is_float: bool) -> Result<Number> {
    let number = match is_float {
        true => text.parse::<f64>().map(Number::Float)?,
        false => text
            .parse::<i64>()
            .map(Number::Int)
            .map_err(|_| anyhow!("integer literal '{}' does not fit in 64 bits", text))?,
    };

    Ok(number)
}

/// Decodes the code point at the start of `bytes`, returning it with its
/// encoded width.
pub fn decode_char(bytes: &[u8]) -> Result<(char, usize)> {
    let width = match bytes.first() {
        Some(0x00..=0x7f) => 1,
        Some(0xc2..=0xdf) => 2,
        Some(0xe0..=0xef) => 3,
        Some(0xf0..=0xf4) => 4,
        Some(_) => bail!("illegal UTF-8 encoding"),
        None => bail!("unexpected end of input"),
    };

    let chunk = bytes
        .get(..width)
        .ok_or_else(|| anyhow!("illegal UTF-8 encoding"))?;

    std::str::from_utf8(chunk)
        .ok()
        .and_then(|s| s.chars().next())
        .map(|ch| (ch, width))
        .ok_or_else(|| anyhow!("illegal UTF-8 encoding"))
}
