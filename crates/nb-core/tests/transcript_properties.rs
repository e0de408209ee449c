//! Property-based tests for transcript parsing invariants.

use nb_core::transcript::{parse_transcript, strip_index_suffix};
use proptest::prelude::*;

fn sentence_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,8}", 1..6)
}

/// Render sentences the way the engine prints them.
fn render(sentences: &[Vec<String>]) -> String {
    let mut out = String::new();
    let mut offset = 0;
    for (idx, words) in sentences.iter().enumerate() {
        out.push_str(&format!("Sentence #{} ({} tokens):\n", idx + 1, words.len()));
        out.push_str(&words.join(" "));
        out.push('\n');
        let brackets: Vec<String> = words
            .iter()
            .map(|w| {
                let begin = offset;
                offset += w.len() + 1;
                format!(
                    "[Text={} CharacterOffsetBegin={} CharacterOffsetEnd={} PartOfSpeech=NN]",
                    w,
                    begin,
                    begin + w.len()
                )
            })
            .collect();
        out.push_str(&brackets.join(" "));
        out.push_str("\n(ROOT\n  (NP");
        for w in words {
            out.push_str(&format!(" (NN {})", w));
        }
        out.push_str("))\n\n");
        for (pos, pair) in words.windows(2).enumerate() {
            out.push_str(&format!("dep({}-{}, {}-{})\n", pair[0], pos + 1, pair[1], pos + 2));
        }
        out.push('\n');
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Parsing is a pure function of the input.
    #[test]
    fn parsing_is_deterministic(input in ".{0,400}") {
        let a = parse_transcript(&input);
        let b = parse_transcript(&input);
        match (a, b) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            (a, b) => prop_assert!(false, "diverged: {:?} vs {:?}", a, b),
        }
    }

    /// N well-formed sentences come back as N sentences with their tokens.
    #[test]
    fn sentence_and_token_counts_survive(sentences in prop::collection::vec(sentence_strategy(), 1..5)) {
        let text = render(&sentences);
        let result = parse_transcript(&text).unwrap();
        prop_assert_eq!(result.sentence_count(), sentences.len());
        for (parsed, words) in result.sentences.iter().zip(&sentences) {
            let tokens: Vec<&str> = parsed.words.iter().map(|w| w.text.as_str()).collect();
            prop_assert_eq!(tokens, words.iter().map(String::as_str).collect::<Vec<_>>());
            prop_assert_eq!(parsed.dependencies.len(), words.len() - 1);
            prop_assert_eq!(&parsed.text, &words.join(" "));
        }
        prop_assert!(result.coref.is_none());
    }

    /// Word-line offsets are carried through unchanged.
    #[test]
    fn offsets_are_preserved(words in sentence_strategy()) {
        let text = render(std::slice::from_ref(&words));
        let result = parse_transcript(&text).unwrap();
        let mut expected = 0i64;
        for (word, source) in result.sentences[0].words.iter().zip(&words) {
            prop_assert_eq!(word.offset_begin(), Some(expected));
            prop_assert_eq!(word.offset_end(), Some(expected + source.len() as i64));
            expected += source.len() as i64 + 1;
        }
    }

    #[test]
    fn index_suffix_round_trip(token in "[a-zA-Z][a-zA-Z-]{0,10}[a-zA-Z]", n in 0usize..500) {
        let indexed = format!("{}-{}", token, n);
        prop_assert_eq!(strip_index_suffix(&indexed), token.as_str());
    }
}
