//! Rendering of parse results for the CLI.
//!
//! JSON is the machine contract and carries a `schema_version` envelope.
//! Markdown and summary output are for people and may change freely.

use nb_common::{OutputFormat, ParseResult, Result, Sentence, SCHEMA_VERSION};
use serde::Serialize;
use std::fmt::Write as _;

/// JSON envelope around a parse result.
#[derive(Debug, Serialize)]
pub struct ParseEnvelope<'a> {
    pub schema_version: &'static str,
    pub command: &'a str,
    pub generated_at: String,
    #[serde(flatten)]
    pub result: &'a ParseResult,
}

impl<'a> ParseEnvelope<'a> {
    pub fn new(command: &'a str, result: &'a ParseResult) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            command,
            generated_at: chrono::Utc::now().to_rfc3339(),
            result,
        }
    }
}

/// Render `result` in the requested format.
pub fn render_parse(command: &str, result: &ParseResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&ParseEnvelope::new(
            command, result,
        ))?),
        OutputFormat::Md => Ok(render_markdown(result)),
        OutputFormat::Summary => Ok(render_summary(result)),
    }
}

/// One line: sentence, token, dependency and chain counts.
pub fn render_summary(result: &ParseResult) -> String {
    let words: usize = result.sentences.iter().map(|s| s.words.len()).sum();
    let deps: usize = result.sentences.iter().map(|s| s.dependencies.len()).sum();
    let mut line = format!(
        "{} sentence{}, {} tokens, {} dependencies",
        result.sentence_count(),
        if result.sentence_count() == 1 { "" } else { "s" },
        words,
        deps
    );
    if result.coref.is_some() {
        let _ = write!(line, ", {} coref chains", result.chain_count());
    }
    line
}

/// Markdown report with one section per sentence.
pub fn render_markdown(result: &ParseResult) -> String {
    let mut out = String::from("# Parse result\n\n");
    let _ = writeln!(out, "{}\n", render_summary(result));

    for (idx, sentence) in result.sentences.iter().enumerate() {
        render_sentence(&mut out, idx, sentence);
    }

    if let Some(chains) = &result.coref {
        out.push_str("## Coreference\n\n");
        if chains.is_empty() {
            out.push_str("_no chains_\n");
        }
        for (idx, chain) in chains.iter().enumerate() {
            let _ = writeln!(out, "{}. chain of {} links", idx + 1, chain.len());
            for pair in chain.pairs() {
                let _ = writeln!(
                    out,
                    "   - \"{}\" (sentence {}, token {}) -> \"{}\" (sentence {}, token {})",
                    pair.mention.text,
                    pair.mention.sentence,
                    pair.mention.head,
                    pair.antecedent.text,
                    pair.antecedent.sentence,
                    pair.antecedent.head
                );
            }
        }
    }
    out
}

fn render_sentence(out: &mut String, idx: usize, sentence: &Sentence) {
    let _ = writeln!(out, "## Sentence {}\n", idx + 1);
    let _ = writeln!(out, "> {}\n", sentence.text);

    if !sentence.words.is_empty() {
        out.push_str("| # | Token | POS | Lemma |\n|---|-------|-----|-------|\n");
        for (pos, word) in sentence.words.iter().enumerate() {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                pos,
                escape_cell(&word.text),
                word.attribute("PartOfSpeech").unwrap_or("-"),
                escape_cell(word.attribute("Lemma").unwrap_or("-"))
            );
        }
        out.push('\n');
    }

    if !sentence.parse_tree.is_empty() {
        let _ = writeln!(out, "```\n{}\n```\n", sentence.parse_tree);
    }

    if !sentence.dependencies.is_empty() {
        for dep in &sentence.dependencies {
            let _ = writeln!(out, "- `{}({}, {})`", dep.relation, dep.governor, dep.dependent);
        }
        out.push('\n');
    }
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}
