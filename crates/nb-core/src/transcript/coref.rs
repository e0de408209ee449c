//! Coreference lines.
//!
//! ```text
//! Coreference set:
//!     (2,1,[1,2)) -> (1,1,[1,3)), that is: "He" -> "John Smith"
//! ```
//!
//! Each side is `(sentence, head, [start, end))`, one-based in the engine's
//! output and zero-based in the returned [`Mention`]s.

use once_cell::sync::Lazy;
use regex::Regex;

use nb_common::{Mention, MentionPair};

/// Markers that open a new chain.
pub const CHAIN_MARKERS: [&str; 2] = ["Coreference set", "Coreference links"];

static RE_MENTION_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\((\d+),(\d+),\[(\d+),(\d+)\)\) -> \((\d+),(\d+),\[(\d+),(\d+)\)\), that is: "(.*?)" -> "(.*)"\s*$"#,
    )
    .unwrap()
});

/// True when the line announces a new coreference chain.
pub fn is_chain_marker(line: &str) -> bool {
    CHAIN_MARKERS.iter().any(|m| line.contains(m))
}

fn zero_based(caps: &regex::Captures<'_>, idx: usize) -> Option<usize> {
    let n: usize = caps[idx].parse().ok()?;
    Some(n.saturating_sub(1))
}

/// Parse a mention pair line; `None` if the line does not match.
pub fn parse_mention_pair(line: &str) -> Option<MentionPair> {
    let caps = RE_MENTION_PAIR.captures(line)?;
    let mention = Mention {
        text: caps[9].to_string(),
        sentence: zero_based(&caps, 1)?,
        head: zero_based(&caps, 2)?,
        start: zero_based(&caps, 3)?,
        end: zero_based(&caps, 4)?,
    };
    let antecedent = Mention {
        text: caps[10].to_string(),
        sentence: zero_based(&caps, 5)?,
        head: zero_based(&caps, 6)?,
        start: zero_based(&caps, 7)?,
        end: zero_based(&caps, 8)?,
    };
    Some(MentionPair {
        mention,
        antecedent,
    })
}
