//! Pure renderers. Every function here is a deterministic function of its
//! arguments: equal inputs give byte-identical output.

pub mod cluster;
pub mod static_files;
pub mod templates;

pub use cluster::cluster_config;
pub use static_files::{consul_service, java_security, jvm_options, metrics_inputs, systemd_unit};

/// YAML double-quoted scalar.
pub(crate) fn yaml_quote(value: &str) -> String {
    quote_with(value, |c, out| match c {
        '\\' => out.push_str("\\\\"),
        '"' => out.push_str("\\\""),
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\r' => out.push_str("\\r"),
        c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
        c => out.push(c),
    })
}

/// Basic string for TOML and HCL (same escaping rules for what we emit).
pub(crate) fn basic_quote(value: &str) -> String {
    quote_with(value, |c, out| match c {
        '\\' => out.push_str("\\\\"),
        '"' => out.push_str("\\\""),
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\r' => out.push_str("\\r"),
        c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
        c => out.push(c),
    })
}

fn quote_with(value: &str, escape: impl Fn(char, &mut String)) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        escape(c, &mut out);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_quote_escapes() {
        assert_eq!(yaml_quote("dc1"), "\"dc1\"");
        assert_eq!(yaml_quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
        assert_eq!(yaml_quote("x\ny"), "\"x\\ny\"");
        assert_eq!(yaml_quote("\u{1}"), "\"\\x01\"");
    }

    #[test]
    fn basic_quote_escapes() {
        assert_eq!(basic_quote("services"), "\"services\"");
        assert_eq!(basic_quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(basic_quote("\u{1}"), "\"\\u0001\"");
    }
}
