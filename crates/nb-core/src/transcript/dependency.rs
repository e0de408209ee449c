//! Typed dependency lines: `nsubj(barks-2, dog-1)`.

use once_cell::sync::Lazy;
use regex::Regex;

use nb_common::DependencyTriple;

/// `relation(governor, dependent)`. The greedy governor group splits on the
/// last `", "` so punctuation tokens such as `,-4` stay intact.
static RE_DEPENDENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\s(]+)\((.+), (.+)\)$").unwrap());

/// Remove the `-N` position suffix (and copy-node primes) from a token.
///
/// `barks-2` becomes `barks`; `well-known-3` becomes `well-known`; a token
/// with no numeric suffix is returned unchanged.
pub fn strip_index_suffix(token: &str) -> &str {
    let Some(dash) = token.rfind('-') else {
        return token;
    };
    let suffix = token[dash + 1..].trim_end_matches('\'');
    if dash > 0 && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
        &token[..dash]
    } else {
        token
    }
}

/// Parse one dependency line. Returns `None` for anything that is not a
/// dependency.
pub fn parse_dependency_line(line: &str) -> Option<DependencyTriple> {
    let caps = RE_DEPENDENCY.captures(line.trim())?;
    Some(DependencyTriple::new(
        &caps[1],
        strip_index_suffix(&caps[2]),
        strip_index_suffix(&caps[3]),
    ))
}
