//! Fuzz target for word annotation groups, including embedded markup.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nb_core::transcript::{parse_bracketed, parse_words_line};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_bracketed(s);
        let _ = parse_words_line(s);
    }
});
