//! Label text templates.
//!
//! A template mixes literal text with brace-delimited tokens:
//!
//! - [`ID_TOKEN`] expands to the feature id.
//! - `{name}` expands to attribute `name`. When the layer has a field called
//!   `name` the value goes through [`Field::format`], so coded domain values
//!   show their display text. Otherwise the raw property is used.
//!
//! Tokens that resolve to nothing are either dropped (alphabetic contents
//! only) or left verbatim, depending on `strip_leftovers`.

use crate::{feature::Feature, schema::Field, value::as_text};

/// Token replaced with the feature id.
pub const ID_TOKEN: &str = "{$id}";

/// Expands `template` against `feature`.
pub fn format(template: &str, feature: &Feature, fields: &[Field], strip_leftovers: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        let token = &rest[open..open + close + 2];
        // A nested `{` means the first brace was literal text.
        if name.contains('{') {
            out.push('{');
            rest = after;
            continue;
        }

        match expand(name, feature, fields) {
            Some(text) => out.push_str(&text),
            None if strip_leftovers && is_alphabetic(name) => {}
            None => out.push_str(token),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

fn expand(name: &str, feature: &Feature, fields: &[Field]) -> Option<String> {
    if name == &ID_TOKEN[1..ID_TOKEN.len() - 1] {
        return Some(feature.id.to_string());
    }
    let value = feature.get(name)?;
    Some(match fields.iter().find(|f| f.name() == name) {
        Some(field) => field.format(value),
        None => as_text(value),
    })
}

fn is_alphabetic(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::{Domain, DomainRegistry, FieldType};

    #[test]
    fn substitutes_attribute_and_strips_leftovers() {
        let f = Feature::new(1, None).with_property("name", "X");
        assert_eq!(format("{name}", &f, &[], true), "X");

        let empty = Feature::new(2, None);
        assert_eq!(format("{name}", &empty, &[], true), "");
        assert_eq!(format("{name}", &empty, &[], false), "{name}");
    }

    #[test]
    fn substitutes_id_and_mixed_text() {
        let f = Feature::new("road-7", None).with_property("lanes", 2);
        assert_eq!(format("#{$id}: {lanes} lanes {typo}", &f, &[], true), "#road-7: 2 lanes ");
    }

    #[test]
    fn non_alphabetic_leftovers_are_kept() {
        let f = Feature::new(1, None);
        assert_eq!(format("{a_b} {x1} {}", &f, &[], true), "{a_b} {x1} {}");
    }

    #[test]
    fn unbalanced_braces_are_literal() {
        let f = Feature::new(1, None).with_property("name", "N");
        assert_eq!(format("{ {name} {open", &f, &[], true), "{ N {open");
    }

    #[test]
    fn domain_codes_render_display_values() {
        let reg = DomainRegistry::new();
        let status = reg.get_or_register(Domain::coded("status", [(1, "Open"), (2, "Closed")]));
        let fields = vec![Field::new("status", FieldType::Integer).with_domain(status)];
        let f = Feature::new(1, None).with_property("status", json!(2));
        assert_eq!(format("{status}", &f, &fields, true), "Closed");
    }
}
