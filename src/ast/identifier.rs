//! `Identifier` and `RegexpIdentifier` share an interface in the distilled grammar: both appear as
//! path components and as resource titles. Modelled here as a two-variant sum rather than two
//! structs behind a trait object, so "is this a regexp component?" is a pattern match, not an
//! `isinstance` check (see DESIGN.md).

/// A bareword/string/integer identifier component, or one flagged to be interpreted as a regular
/// expression pattern (via `~"..."` or the bare `*` wildcard).
#[derive(Debug, Clone, PartialEq)]
pub enum Identifier {
    /// A literal name. Integers only occur as array-index components of an `IdentifierPath`.
    Plain(IdentValue),
    /// A name meant to be matched as a regular expression, verbatim (never escaped by the
    /// evaluator).
    Regexp(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdentValue {
    Str(String),
    Int(i64),
}

impl Identifier {
    pub fn str(name: impl Into<String>) -> Self {
        Identifier::Plain(IdentValue::Str(name.into()))
    }

    pub fn int(value: i64) -> Self {
        Identifier::Plain(IdentValue::Int(value))
    }

    pub fn regexp(pattern: impl Into<String>) -> Self {
        Identifier::Regexp(pattern.into())
    }

    /// The wildcard `*` lowers to the regex `.*` (§3.2, §4.2).
    pub fn wildcard() -> Self {
        Identifier::Regexp(".*".to_string())
    }

    pub fn is_regexp(&self) -> bool {
        matches!(self, Identifier::Regexp(_))
    }
}
