#![forbid(unsafe_code)]

//! Placeholder substitution for content templates.
//!
//! Host templates mark insertion points as `{KEY}` for raw substitution
//! and `{%KEY}` for percent-encoded substitution (the latter for values
//! that land inside URLs). All occurrences of each placeholder are
//! replaced.

use crate::fragment::encode_component;

/// Replace `{KEY}` and `{%KEY}` placeholders in a template.
#[must_use]
pub fn substitute(template: &str, substitutions: &[(&str, &str)]) -> String {
    let mut out = template.to_owned();
    for (key, value) in substitutions {
        out = out.replace(&format!("{{%{key}}}"), &encode_component(value));
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_raw_placeholders() {
        let out = substitute("<td>{NUMBER}</td>", &[("NUMBER", "01234")]);
        assert_eq!(out, "<td>01234</td>");
    }

    #[test]
    fn replaces_encoded_placeholders() {
        let out = substitute(
            "<a href=\"/numbers/{%SIP_URI}\">{SIP_URI}</a>",
            &[("SIP_URI", "sip:alice@example.com")],
        );
        assert_eq!(
            out,
            "<a href=\"/numbers/sip%3Aalice%40example.com\">sip:alice@example.com</a>"
        );
    }

    #[test]
    fn replaces_every_occurrence() {
        let out = substitute("{X} and {X}", &[("X", "y")]);
        assert_eq!(out, "y and y");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let out = substitute("{KEEP}", &[("OTHER", "v")]);
        assert_eq!(out, "{KEEP}");
    }
}
