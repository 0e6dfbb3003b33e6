//! Core data models for toponym disambiguation.

pub mod annotation;
pub mod candidates;
pub mod location;

pub use annotation::{LocationAnnotation, Span};
pub use candidates::{group_spread, is_ambiguous, AncestorIndex, CandidateMap};
pub use location::{AlternativeName, Location, LocationId, LocationType};
