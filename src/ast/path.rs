use super::identifier::Identifier;

/// An ordered, non-empty sequence of [`Identifier`] components built by dot separation
/// (`foo.bar.0`). Non-emptiness is a type-level invariant: there is no way to construct one
/// without an initial component.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierPath {
    components: Vec<Identifier>,
}

impl IdentifierPath {
    pub fn new(first: Identifier) -> Self {
        Self {
            components: vec![first],
        }
    }

    pub fn push(&mut self, next: Identifier) {
        self.components.push(next);
    }

    pub fn components(&self) -> &[Identifier] {
        &self.components
    }

    pub fn any_regexp(&self) -> bool {
        self.components.iter().any(Identifier::is_regexp)
    }
}
