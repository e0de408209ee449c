//! Fuzz target for transcript parsing.
//!
//! Engine output is untrusted text; parsing must return an error rather
//! than panic, and must be deterministic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nb_core::transcript::parse_transcript;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let first = parse_transcript(&text);
    let second = parse_transcript(&text);
    match (first, second) {
        (Ok(a), Ok(b)) => assert_eq!(a, b),
        (Err(_), Err(_)) => {}
        _ => panic!("transcript parsing is not deterministic"),
    }
});
