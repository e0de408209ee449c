//! nlp-bridge shared types and errors.
//!
//! This crate provides the types shared between the engine channel, the
//! transcript parser and the JSON-RPC service:
//! - Parse records (sentences, words, dependencies, coreference chains)
//! - The error taxonomy
//! - Output format specifications

pub mod error;
pub mod model;
pub mod output;

pub use error::{Error, ErrorCategory, ErrorReport, Result, SuggestedAction};
pub use model::{
    CoreferenceChain, DependencyTriple, Mention, MentionPair, ParseResult, Sentence, Word,
    CHARACTER_OFFSET_PREFIX,
};
pub use output::OutputFormat;

/// Version of the JSON shapes emitted by the CLI and service.
pub const SCHEMA_VERSION: &str = "1.0.0";
