//! `dublist-merge`: multi-source dub dataset merge engine.
//!
//! Pure engine stages: observations are resolved into the canonical id
//! namespace, corroboration is counted per (title, language), manual
//! overrides are applied on top, and the result is bucketed into confidence
//! tiers. The `load` and `writer` modules sit at the edges and are the only
//! places that touch the filesystem.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod language;
pub mod load;
pub mod model;
pub mod overrides;
pub mod resolve;
pub mod source;
pub mod stats;
pub mod tiers;
pub mod writer;

pub use config::MergeConfig;
pub use engine::run;
pub use error::{MergeError, MergeResult};
pub use model::{CanonicalId, MergeInput, MergeOutput, MergedEntry, SourceObservation};
