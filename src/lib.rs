// Error taxonomy
pub mod error;

// Monomer types and the registry
pub mod monomer;

// Reactant/product complex patterns
pub mod pattern;

// Concrete complexes and canonical identity
pub mod species;

// The hard bit: canonical labeling of bond graphs
mod canonize;

// Pattern embedding and rule application
mod matching;

// Rules and their compiled instances
pub mod rule;

// Model assembly
pub mod model;

// Seed species and quantities
pub mod initial;

// Network expansion
pub mod network;

pub use error::{Bound, GenerationError, ModelError};
pub use initial::InitialConditions;
pub use model::Model;
pub use monomer::Monomer;
pub use network::{generate, GeneratorOptions, Reaction, ReactionNetwork};
pub use pattern::{Mol, Pattern};
pub use rule::Rule;
pub use species::Species;
