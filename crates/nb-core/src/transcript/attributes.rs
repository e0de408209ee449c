//! Word annotation lines: `[Text=dog CharacterOffsetBegin=4 ... PartOfSpeech=NN]`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use nb_common::Word;

/// Prefix every word annotation line starts with.
pub const WORDS_PREFIX: &str = "[Text=";

/// One `[...]` group per token.
static RE_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]").unwrap());

/// Embedded markup such as `<TIMEX3 tid="t1" value="2011">today</TIMEX3>` or `<x/>`.
static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^<>/][^<>]*>[^<]*</[^<>]+>|<[^<>]+/>").unwrap());

/// `name=value` where neither side contains `=` or whitespace.
static RE_PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^=\s]*)=([^=\s]*)").unwrap());

fn placeholder(idx: usize) -> String {
    format!("^^^{}^^^", idx)
}

/// Parse the inside of one bracketed group.
///
/// Returns the `Text` attribute separately from the remaining annotations.
/// Markup values are swapped for placeholders before splitting so their
/// spaces and `=` signs survive.
pub fn parse_bracketed(group: &str) -> (Option<String>, BTreeMap<String, String>) {
    let mut tags: Vec<String> = Vec::new();
    let masked = RE_TAG.replace_all(group, |caps: &regex::Captures<'_>| {
        tags.push(caps[0].to_string());
        placeholder(tags.len() - 1)
    });

    let mut text = None;
    let mut attributes = BTreeMap::new();
    for caps in RE_PAIR.captures_iter(&masked) {
        let name = &caps[1];
        let mut value = caps[2].to_string();
        if value.contains("^^^") {
            for (idx, tag) in tags.iter().enumerate() {
                value = value.replace(&placeholder(idx), tag);
            }
        }
        if name == "Text" {
            text = Some(value);
        } else if !name.is_empty() {
            attributes.insert(name.to_string(), value);
        }
    }
    (text, attributes)
}

/// Extract every token from a word annotation line.
pub fn parse_words_line(line: &str) -> Vec<Word> {
    RE_BRACKET
        .captures_iter(line)
        .map(|caps| {
            let (text, attributes) = parse_bracketed(&caps[1]);
            Word {
                text: text.unwrap_or_default(),
                attributes,
            }
        })
        .collect()
}
