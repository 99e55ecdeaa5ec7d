//! The abstract syntax tree produced by [`crate::parser`] and consumed by [`crate::evaluator`].
//!
//! A closed algebraic structure over a handful of small Rust types rather than one monolithic
//! enum: `Identifier`/`IdentifierPath` are reused by both comparisons and resource titles, and
//! `Literal`/`Date` only ever occur as a comparison's right-hand side, so each gets its own type
//! instead of being shoehorned into `Node`.

mod identifier;
mod node;
mod path;

pub use identifier::{IdentValue, Identifier};
pub use node::{Comparison, ComparisonRhs, Literal, Node, Query, Resource, Subquery};
pub use path::IdentifierPath;
