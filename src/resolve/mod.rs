// Foxscream Resolution Module
// Inheritance flattening, type matching and overload selection.
// Nothing here knows about source positions; callers attach spans.

mod fields;
mod signature;
mod types;

pub use fields::{ancestor_distance, resolve, resolve_parents, AddressTable, FieldAddress, Resolution, Slot};
pub use signature::{
    call_match, select_overload, ArgRef, CallMatch, CallPlan, CallSignature, CallSite,
    MatchFailure, Parameter,
};
pub use types::{type_match, TypeSpec};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("field '{name}' is defined by {owners} ancestors at distance {distance}")]
    AmbiguousField {
        name: String,
        owners: usize,
        distance: u32,
    },

    #[error("{candidates} overloads match these arguments equally well")]
    AmbiguousOverload { candidates: usize },

    #[error("no overload accepts these arguments")]
    NoMatchingOverload { arity_only: bool },
}
