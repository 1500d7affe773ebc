//! Lambda Converter (spec.md §4.4): turns lambda body ASTs into
//! `Expression` trees against a lexical [`Scope`], threading the
//! per-compile [`ConversionState`] (auto-parameter counter/accumulator,
//! join-alias counter) through every call.

mod lambda;
mod scope;

pub use lambda::{convert_predicate, convert_to_expression};
pub use scope::{is_stringish_name, Binding, ConversionState, Scope};
