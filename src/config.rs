use std::env;

pub const NO_DIV_CHECK_VAR: &str = "NOVUM_NO_DIV_CHECK";
pub const NO_OPT_VAR: &str = "NOVUM_NO_OPT";

/// Compilation switches. Read once by the driver and carried through code
/// generation, never consulted from globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Guard every floating-point division against a zero divisor.
    pub div_guard: bool,
    pub optimize: bool,
    /// Reject unterminated strings and block comments instead of treating
    /// them as end of input.
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            div_guard: true,
            optimize: true,
            strict: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            div_guard: !is_set(env::var(NO_DIV_CHECK_VAR).ok().as_deref()),
            optimize: !is_set(env::var(NO_OPT_VAR).ok().as_deref()),
            ..Config::default()
        }
    }
}

pub fn is_set(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") | Some("0") => false,
        Some(v) => !v.eq_ignore_ascii_case("false"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values() {
        assert!(!is_set(None));
        assert!(!is_set(Some("")));
        assert!(!is_set(Some("0")));
        assert!(!is_set(Some("FALSE")));
        assert!(is_set(Some("1")));
        assert!(is_set(Some("yes")));
    }

    #[test]
    fn defaults_guard_and_optimize() {
        let config = Config::default();
        assert!(config.div_guard);
        assert!(config.optimize);
        assert!(!config.strict);
    }
}
