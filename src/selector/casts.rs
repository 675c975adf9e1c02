//! Closed cast and predicate vocabularies for `as` / `is` rewrites.
//!
//! Every word a selector may name after `as` or `is` lives here; anything
//! else fails compilation with a token-carrying error rather than passing
//! through to evaluation.

/// Family a cast word belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastFamily {
    /// Scalar/collection conversions.
    Primitive,
    /// Fixed results regardless of operand.
    Constant,
    /// Tree- or content-backed conversions.
    Instance,
    /// Structural and text transforms.
    Special,
}

/// Resolve a cast word (case-insensitive) to its family and binding name.
pub fn cast_for(word: &str) -> Option<(CastFamily, &'static str)> {
    let folded = word.to_ascii_lowercase();
    let entry = match folded.as_str() {
        "array" => (CastFamily::Primitive, "array"),
        "boolean" => (CastFamily::Primitive, "boolean"),
        "float" => (CastFamily::Primitive, "float"),
        "int" => (CastFamily::Primitive, "int"),
        "number" => (CastFamily::Primitive, "number"),
        "object" => (CastFamily::Primitive, "object"),
        "string" => (CastFamily::Primitive, "string"),

        "true" => (CastFamily::Constant, "true"),
        "false" => (CastFamily::Constant, "false"),
        "null" => (CastFamily::Constant, "null"),
        "nan" => (CastFamily::Constant, "nan"),

        "date" => (CastFamily::Instance, "date"),
        "document" => (CastFamily::Instance, "document"),
        "fragment" => (CastFamily::Instance, "fragment"),
        "node" => (CastFamily::Instance, "node"),
        "text" => (CastFamily::Instance, "text"),

        "camelcase" => (CastFamily::Special, "camelcase"),
        "eval" => (CastFamily::Special, "eval"),
        "json" => (CastFamily::Special, "json"),
        "keys" => (CastFamily::Special, "keys"),
        "pascalcase" => (CastFamily::Special, "pascalcase"),
        "sorted" => (CastFamily::Special, "sorted"),
        "reversed" => (CastFamily::Special, "reversed"),
        "snakecase" => (CastFamily::Special, "snakecase"),
        "tuple" => (CastFamily::Special, "tuple"),
        "unique" => (CastFamily::Special, "unique"),

        _ => return None,
    };
    Some(entry)
}

/// Resolve an `is` type word (case-insensitive) to its predicate binding.
pub fn predicate_for(word: &str) -> Option<&'static str> {
    let folded = word.to_ascii_lowercase();
    let name = match folded.as_str() {
        "text" => "istext",
        "node" => "isnode",
        "fragment" => "isfragment",
        "number" => "isnumber",
        "string" => "isstring",
        "object" => "isobject",
        "boolean" => "isboolean",
        "array" => "isarray",
        "date" => "isdate",
        "document" => "isdocument",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_resolve_case_insensitively() {
        assert_eq!(cast_for("Int"), Some((CastFamily::Primitive, "int")));
        assert_eq!(cast_for("NaN"), Some((CastFamily::Constant, "nan")));
        assert_eq!(cast_for("JSON"), Some((CastFamily::Special, "json")));
        assert_eq!(cast_for("date"), Some((CastFamily::Instance, "date")));
        assert_eq!(cast_for("widget"), None);
    }

    #[test]
    fn predicates_resolve() {
        assert_eq!(predicate_for("number"), Some("isnumber"));
        assert_eq!(predicate_for("Document"), Some("isdocument"));
        assert_eq!(predicate_for("widget"), None);
    }
}
