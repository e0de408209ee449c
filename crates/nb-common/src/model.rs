//! Structured parse records produced from the engine's console transcript.
//!
//! All indices are zero-based. Attribute values are kept as strings exactly
//! as the engine printed them; callers that need numbers parse on demand
//! (see [`Word::offset_begin`]).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute name prefix shared by the character offset annotations.
pub const CHARACTER_OFFSET_PREFIX: &str = "CharacterOffset";

/// A single token and its annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Word {
    /// Surface form (the engine's `Text=` attribute).
    pub text: String,

    /// Remaining annotations, e.g. `PartOfSpeech`, `Lemma`, `NamedEntityTag`.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Word {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Look up an annotation by name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// `CharacterOffsetBegin`, if present and numeric.
    pub fn offset_begin(&self) -> Option<i64> {
        self.attribute("CharacterOffsetBegin")?.parse().ok()
    }

    /// `CharacterOffsetEnd`, if present and numeric.
    pub fn offset_end(&self) -> Option<i64> {
        self.attribute("CharacterOffsetEnd")?.parse().ok()
    }

    /// Shift every character offset annotation by `delta`.
    ///
    /// Values that are not integers are left untouched.
    pub fn shift_offsets(&mut self, delta: i64) {
        for (name, value) in self.attributes.iter_mut() {
            if !name.starts_with(CHARACTER_OFFSET_PREFIX) {
                continue;
            }
            if let Ok(n) = value.parse::<i64>() {
                *value = (n + delta).to_string();
            }
        }
    }
}

/// A typed dependency with index suffixes removed from both tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DependencyTriple {
    pub relation: String,
    pub governor: String,
    pub dependent: String,
}

impl DependencyTriple {
    pub fn new(
        relation: impl Into<String>,
        governor: impl Into<String>,
        dependent: impl Into<String>,
    ) -> Self {
        Self {
            relation: relation.into(),
            governor: governor.into(),
            dependent: dependent.into(),
        }
    }

    /// True when either side of the dependency is `token`.
    pub fn involves(&self, token: &str) -> bool {
        self.governor == token || self.dependent == token
    }
}

/// One parsed sentence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Sentence {
    pub text: String,
    #[serde(default)]
    pub words: Vec<Word>,
    /// Bracketed constituency tree flattened onto a single line.
    #[serde(default)]
    pub parse_tree: String,
    #[serde(default)]
    pub dependencies: Vec<DependencyTriple>,
}

/// A reference to a token span inside a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Mention {
    /// Literal text of the mention as printed by the engine.
    pub text: String,
    /// Sentence index.
    pub sentence: usize,
    /// Head token position.
    pub head: usize,
    /// Span start (inclusive).
    pub start: usize,
    /// Span end (exclusive).
    pub end: usize,
}

/// A mention linked to the antecedent it was resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MentionPair {
    pub mention: Mention,
    pub antecedent: Mention,
}

/// Mentions believed to refer to the same entity, in engine order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CoreferenceChain(pub Vec<MentionPair>);

impl CoreferenceChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pair: MentionPair) {
        self.0.push(pair);
    }

    pub fn pairs(&self) -> &[MentionPair] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything recovered from one transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParseResult {
    pub sentences: Vec<Sentence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coref: Option<Vec<CoreferenceChain>>,
}

impl ParseResult {
    pub fn sentence_count(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Number of coreference chains (zero when the section was absent).
    pub fn chain_count(&self) -> usize {
        self.coref.as_ref().map_or(0, Vec::len)
    }
}
