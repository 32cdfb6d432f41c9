//! Error taxonomy for model declaration and network generation.

use std::fmt;

use thiserror::Error;

use crate::network::ReactionNetwork;

/// Declaration-time errors. All of these are fatal and name the offending
/// monomer, site, rule, or parameter; nothing is silently recovered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("monomer type `{0}` is already declared")]
    DuplicateType(String),

    #[error("parameter `{0}` is already declared")]
    DuplicateParameter(String),

    #[error("rule `{0}` is already declared")]
    DuplicateRule(String),

    #[error("observable `{0}` is already declared")]
    DuplicateObservable(String),

    #[error("unknown monomer type `{0}`")]
    UnknownType(String),

    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),

    #[error("invalid state alphabet for site `{site}` of `{monomer}`: {reason}")]
    InvalidSiteState {
        monomer: String,
        site: String,
        reason: String,
    },

    #[error("malformed pattern in `{context}`: {reason}")]
    MalformedPattern { context: String, reason: String },

    #[error("rule `{rule}` does not conserve molecules: {reason}")]
    MassImbalance { rule: String, reason: String },

    #[error("site `{site}` of `{monomer}` has no default state")]
    MissingDefaultState { monomer: String, site: String },

    #[error("monomer `{0}` has no initial quantity; declare `{0}_0` or list it as unseeded")]
    MissingQuantity(String),
}

/// Which configured limit the generator ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Species(usize),
    Iterations(usize),
    ComplexSize(usize),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Species(n) => write!(f, "the species bound ({n})"),
            Bound::Iterations(n) => write!(f, "the iteration bound ({n})"),
            Bound::ComplexSize(n) => write!(f, "the complex size bound ({n} molecules)"),
        }
    }
}

/// Generation-time errors. Hitting a bound is reported, never silently
/// truncated; the partial network built so far is retained for the caller.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("network generation hit {bound} after {species} species and {reactions} reactions")]
    BoundExceeded {
        bound: Bound,
        species: usize,
        reactions: usize,
        partial: Box<ReactionNetwork>,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}
