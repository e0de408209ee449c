//! Subject injection for imperative input.
//!
//! Verb-initial sentences ("open the door") tend to be tagged and parsed
//! badly. The rewriter prepends a pronoun the text does not already use,
//! parses `"you open the door"`, then removes every trace of the pronoun
//! from the first sentence of the result.

use crate::logging::event_names;
use nb_common::{ParseResult, Result};
use nb_config::ImperativeConfig;
use tracing::{debug, warn};

/// Anything that can turn one line of text into a [`ParseResult`].
pub trait SentenceParser {
    fn parse_sentence(&self, text: &str) -> Result<ParseResult>;
}

impl<F> SentenceParser for F
where
    F: Fn(&str) -> Result<ParseResult>,
{
    fn parse_sentence(&self, text: &str) -> Result<ParseResult> {
        self(text)
    }
}

/// Wraps a parser with pronoun injection.
#[derive(Debug, Clone)]
pub struct ImperativeRewriter<P> {
    parser: P,
    pronouns: Vec<String>,
}

/// What the rewriter decided to do with an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite<'a> {
    /// Parse the text unchanged.
    Plain,
    /// Parse `"<pronoun> <text>"`.
    Inject(&'a str),
}

impl<P: SentenceParser> ImperativeRewriter<P> {
    pub fn new<S: AsRef<str>>(parser: P, pronouns: &[S]) -> Self {
        Self {
            parser,
            pronouns: pronouns.iter().map(|p| p.as_ref().to_string()).collect(),
        }
    }

    pub fn from_config(parser: P, config: &ImperativeConfig) -> Self {
        Self::new(parser, &config.pronouns)
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn pronouns(&self) -> &[String] {
        &self.pronouns
    }

    /// Pick the first candidate pronoun the text does not already contain.
    ///
    /// Text that already opens with a candidate pronoun has a subject and is
    /// parsed as is.
    pub fn plan(&self, text: &str) -> Rewrite<'_> {
        let first = text.split_whitespace().next().map(normalize_token);
        if let Some(first) = first {
            if text.contains(char::is_whitespace)
                && self.pronouns.iter().any(|p| p.eq_ignore_ascii_case(&first))
            {
                return Rewrite::Plain;
            }
        }
        self.pronouns
            .iter()
            .find(|p| !contains_token(text, p))
            .map_or(Rewrite::Plain, |p| Rewrite::Inject(p.as_str()))
    }

    /// Parse `text` as an imperative sentence.
    pub fn parse(&self, text: &str) -> Result<ParseResult> {
        let pronoun = match self.plan(text) {
            Rewrite::Plain => {
                debug!("no pronoun injected, plain parse");
                return self.parser.parse_sentence(text);
            }
            Rewrite::Inject(p) => p,
        };

        let augmented = format!("{} {}", pronoun, text);
        debug!(event = event_names::REQUEST_REWRITTEN, pronoun, "subject injected");
        let mut result = self.parser.parse_sentence(&augmented)?;
        if result.sentences.len() > 1 {
            warn!(
                event = event_names::REQUEST_ANOMALY,
                sentences = result.sentences.len(),
                "imperative input parsed as several sentences; only the first is adjusted"
            );
        }
        strip_injected(&mut result, text, pronoun);
        Ok(result)
    }
}

/// Undo the injection of `pronoun` in the first sentence of `result`.
pub fn strip_injected(result: &mut ParseResult, original: &str, pronoun: &str) {
    let shift = pronoun.chars().count() as i64 + 1;

    if let Some(first) = result.sentences.first_mut() {
        first.text = original.to_string();
        if !first.words.is_empty() {
            first.words.remove(0);
        }
        first.dependencies.retain(|d| !d.involves(pronoun));
        for word in &mut first.words {
            word.shift_offsets(-shift);
        }
    }

    // Mentions in the first sentence lost their leading token.
    if let Some(chains) = result.coref.as_mut() {
        for chain in chains.iter_mut() {
            chain.0.retain(|pair| {
                !(pair.mention.sentence == 0 && pair.mention.start == 0)
                    && !(pair.antecedent.sentence == 0 && pair.antecedent.start == 0)
            });
            for pair in chain.0.iter_mut() {
                for mention in [&mut pair.mention, &mut pair.antecedent] {
                    if mention.sentence == 0 {
                        mention.head = mention.head.saturating_sub(1);
                        mention.start = mention.start.saturating_sub(1);
                        mention.end = mention.end.saturating_sub(1);
                    }
                }
            }
        }
        chains.retain(|c| !c.is_empty());
    }
}

/// Whitespace-delimited token membership, ignoring case and surrounding
/// punctuation.
pub fn contains_token(text: &str, token: &str) -> bool {
    text.split_whitespace()
        .map(normalize_token)
        .any(|t| t.eq_ignore_ascii_case(token))
}

fn normalize_token(raw: &str) -> String {
    raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .to_string()
}
