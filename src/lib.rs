//! Toponym - gazetteer-backed location disambiguation
//!
//! Resolves place-name spans found in text to concrete gazetteer entries,
//! and tags coordinate literals. Shared by the library API and the `locate`
//! batch binary.

pub mod anchors;
pub mod assembly;
pub mod config;
pub mod context;
pub mod coordinates;
pub mod disambiguation;
pub mod error;
pub mod extractor;
pub mod geo;
pub mod models;
pub mod normalize;
pub mod source;

pub use config::{DisambiguationConfig, EngineConfig, StrategyKind};
pub use error::{Error, Result};
pub use extractor::{InputDocument, LocationExtractor};
pub use models::{Location, LocationAnnotation, LocationId, LocationType, Span};
