//! Transcript parser.
//!
//! Turns the console output the engine prints for one request into a
//! [`ParseResult`]. The layout per sentence is:
//!
//! ```text
//! Sentence #1 (4 tokens):
//! open the door
//! [Text=open CharacterOffsetBegin=0 ...] [Text=the ...] [Text=door ...]
//! (ROOT
//!   (S (VP (VB open) (NP (DT the) (NN door)))))
//!
//! dobj(open-1, door-3)
//! det(door-3, the-2)
//!
//! Coreference set:
//!     (2,1,[1,2)) -> (1,1,[1,2)), that is: "He" -> "John"
//! ```
//!
//! Parsing is a pure function of the input text.

pub mod attributes;
pub mod coref;
pub mod dependency;

pub use attributes::{parse_bracketed, parse_words_line, WORDS_PREFIX};
pub use coref::{is_chain_marker, parse_mention_pair};
pub use dependency::{parse_dependency_line, strip_index_suffix};

use nb_common::{CoreferenceChain, Error, ParseResult, Result, Sentence};

/// Literal prefix of a sentence header line.
pub const SENTENCE_HEADER: &str = "Sentence #";

/// Parser position within a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Before the first sentence header; lines are ignored.
    Start,
    /// Expecting the sentence text.
    Text,
    /// Expecting the word annotation line.
    Words,
    /// Accumulating the constituency tree.
    Tree,
    /// Reading dependency triples.
    Dependencies,
    /// Reading coreference chains.
    Coreference,
}

impl ParserState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserState::Start => "start",
            ParserState::Text => "text",
            ParserState::Words => "words",
            ParserState::Tree => "tree",
            ParserState::Dependencies => "dependencies",
            ParserState::Coreference => "coreference",
        }
    }
}

impl std::fmt::Display for ParserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_header(line: &str) -> bool {
    line.trim_start().starts_with(SENTENCE_HEADER)
}

fn is_tree_line(line: &str) -> bool {
    !line.trim().is_empty() && (line.starts_with(' ') || line.starts_with('\t') || line.starts_with("(ROOT"))
}

/// Line-at-a-time state machine behind [`parse_transcript`].
#[derive(Debug)]
pub struct TranscriptParser {
    state: ParserState,
    line_no: usize,
    sentences: Vec<Sentence>,
    current: Option<Sentence>,
    tree_parts: Vec<String>,
    chains: Vec<CoreferenceChain>,
    open_chain: Option<CoreferenceChain>,
    saw_coref: bool,
}

impl Default for TranscriptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Start,
            line_no: 0,
            sentences: Vec::new(),
            current: None,
            tree_parts: Vec::new(),
            chains: Vec::new(),
            open_chain: None,
            saw_coref: false,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    fn format_error(&self, line: &str) -> Error {
        Error::Format {
            line_no: self.line_no,
            line: line.to_string(),
            state: self.state.to_string(),
        }
    }

    /// Feed one line (without its terminator).
    pub fn feed_line(&mut self, raw: &str) -> Result<()> {
        self.line_no += 1;
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if is_header(line) {
            return self.begin_sentence(line);
        }

        match self.state {
            ParserState::Start => {}
            ParserState::Text => {
                if let Some(sentence) = self.current.as_mut() {
                    sentence.text = line.trim().to_string();
                }
                self.state = ParserState::Words;
            }
            ParserState::Words => {
                if !line.trim_start().starts_with(WORDS_PREFIX) {
                    let err = self.format_error(line);
                    self.current = None;
                    self.state = ParserState::Start;
                    return Err(err);
                }
                if let Some(sentence) = self.current.as_mut() {
                    sentence.words = parse_words_line(line);
                }
                self.state = ParserState::Tree;
            }
            ParserState::Tree => {
                if is_tree_line(line) {
                    self.tree_parts.push(line.trim().to_string());
                } else {
                    self.finish_tree();
                    self.state = ParserState::Dependencies;
                    self.dependency_line(line);
                }
            }
            ParserState::Dependencies => self.dependency_line(line),
            ParserState::Coreference => self.coreference_line(line),
        }
        Ok(())
    }

    fn begin_sentence(&mut self, line: &str) -> Result<()> {
        match self.state {
            ParserState::Text | ParserState::Words => return Err(self.format_error(line)),
            ParserState::Tree => self.finish_tree(),
            _ => {}
        }
        self.flush_sentence();
        self.current = Some(Sentence::default());
        self.state = ParserState::Text;
        Ok(())
    }

    fn finish_tree(&mut self) {
        if let Some(sentence) = self.current.as_mut() {
            sentence.parse_tree = self.tree_parts.join(" ");
        }
        self.tree_parts.clear();
    }

    fn dependency_line(&mut self, line: &str) {
        if is_chain_marker(line) {
            self.state = ParserState::Coreference;
            self.open_new_chain();
            return;
        }
        if line.trim().is_empty() {
            // Blank lines before the first dependency belong to the tree gap
            let has_deps = self
                .current
                .as_ref()
                .is_some_and(|s| !s.dependencies.is_empty());
            if has_deps {
                self.state = ParserState::Coreference;
            }
            return;
        }
        match parse_dependency_line(line) {
            Some(triple) => {
                if let Some(sentence) = self.current.as_mut() {
                    sentence.dependencies.push(triple);
                }
            }
            None => tracing::trace!(line_no = self.line_no, line, "skipping non-dependency line"),
        }
    }

    fn coreference_line(&mut self, line: &str) {
        if is_chain_marker(line) {
            self.open_new_chain();
            return;
        }
        if let Some(pair) = parse_mention_pair(line) {
            self.open_chain
                .get_or_insert_with(CoreferenceChain::new)
                .push(pair);
        }
    }

    fn open_new_chain(&mut self) {
        self.saw_coref = true;
        self.close_chain();
        self.open_chain = Some(CoreferenceChain::new());
    }

    fn close_chain(&mut self) {
        if let Some(chain) = self.open_chain.take() {
            if !chain.is_empty() {
                self.chains.push(chain);
            }
        }
    }

    fn flush_sentence(&mut self) {
        if let Some(sentence) = self.current.take() {
            self.sentences.push(sentence);
        }
    }

    /// Close any open sentence and chain and return the result.
    pub fn finish(mut self) -> ParseResult {
        match self.state {
            ParserState::Tree => self.finish_tree(),
            // A header with nothing after it carries no data
            ParserState::Text => self.current = None,
            _ => {}
        }
        self.flush_sentence();
        self.close_chain();
        ParseResult {
            sentences: self.sentences,
            coref: self.saw_coref.then_some(self.chains),
        }
    }
}

/// Parse a complete transcript.
pub fn parse_transcript(transcript: &str) -> Result<ParseResult> {
    let mut parser = TranscriptParser::new();
    for line in transcript.split('\n') {
        parser.feed_line(line)?;
    }
    Ok(parser.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nb_common::DependencyTriple;

    const DOG_BARKS: &str = "Sentence #1 (3 tokens):
The dog barks.
[Text=The CharacterOffsetBegin=0 CharacterOffsetEnd=3 PartOfSpeech=DT] [Text=dog CharacterOffsetBegin=4 CharacterOffsetEnd=7 PartOfSpeech=NN] [Text=barks CharacterOffsetBegin=8 CharacterOffsetEnd=13 PartOfSpeech=VBZ]
(ROOT
  (S
    (NP (DT The) (NN dog))
    (VP (VBZ barks))))

det(dog-2, The-1)
nsubj(barks-3, dog-2)
";

    #[test]
    fn parses_single_sentence() {
        let result = parse_transcript(DOG_BARKS).unwrap();
        assert_eq!(result.sentences.len(), 1);
        let s = &result.sentences[0];
        assert_eq!(s.text, "The dog barks.");
        assert_eq!(s.words.len(), 3);
        assert_eq!(s.words[1].text, "dog");
        assert_eq!(
            s.parse_tree,
            "(ROOT (S (NP (DT The) (NN dog)) (VP (VBZ barks))))"
        );
        assert_eq!(
            s.dependencies,
            vec![
                DependencyTriple::new("det", "dog", "The"),
                DependencyTriple::new("nsubj", "barks", "dog"),
            ]
        );
        assert!(result.coref.is_none());
    }

    #[test]
    fn final_sentence_without_trailing_blank_is_kept() {
        let trimmed = DOG_BARKS.trim_end();
        let result = parse_transcript(trimmed).unwrap();
        assert_eq!(result.sentences.len(), 1);
        assert_eq!(result.sentences[0].dependencies.len(), 2);
    }

    #[test]
    fn transcript_ending_inside_tree_keeps_tree() {
        let text = "Sentence #1 (1 tokens):\nHi\n[Text=Hi PartOfSpeech=UH]\n(ROOT\n  (INTJ (UH Hi)))";
        let result = parse_transcript(text).unwrap();
        assert_eq!(result.sentences[0].parse_tree, "(ROOT (INTJ (UH Hi)))");
        assert!(result.sentences[0].dependencies.is_empty());
    }

    #[test]
    fn two_sentences_in_order() {
        let text = format!("{}\n{}", DOG_BARKS, DOG_BARKS.replace("#1", "#2").replace("The dog barks.", "A dog barks."));
        let result = parse_transcript(&text).unwrap();
        assert_eq!(result.sentences.len(), 2);
        assert_eq!(result.sentences[0].text, "The dog barks.");
        assert_eq!(result.sentences[1].text, "A dog barks.");
    }

    #[test]
    fn missing_words_prefix_is_format_error() {
        let text = "Sentence #1 (1 tokens):\nHello\nnot a words line\n";
        let err = parse_transcript(text).unwrap_err();
        match err {
            Error::Format {
                line_no,
                line,
                state,
            } => {
                assert_eq!(line_no, 3);
                assert_eq!(line, "not a words line");
                assert_eq!(state, "words");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn header_while_expecting_words_is_format_error() {
        let text = "Sentence #1 (1 tokens):\nHello\nSentence #2 (1 tokens):\n";
        assert!(matches!(
            parse_transcript(text),
            Err(Error::Format { line_no: 3, .. })
        ));
    }

    #[test]
    fn noise_before_first_header_is_ignored() {
        let text = format!("open the door\nNLP> \n{}", DOG_BARKS);
        let result = parse_transcript(&text).unwrap();
        assert_eq!(result.sentences.len(), 1);
    }

    #[test]
    fn empty_transcript_has_no_sentences() {
        let result = parse_transcript("").unwrap();
        assert!(result.is_empty());
        assert!(result.coref.is_none());
    }

    #[test]
    fn header_only_is_dropped() {
        let result = parse_transcript("Sentence #1 (0 tokens):").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn crlf_line_endings() {
        let text = DOG_BARKS.replace('\n', "\r\n");
        let result = parse_transcript(&text).unwrap();
        assert_eq!(result.sentences[0].text, "The dog barks.");
        assert_eq!(result.sentences[0].dependencies.len(), 2);
    }

    #[test]
    fn coreference_chains_follow_sentences() {
        let text = format!(
            "{}\nCoreference set:\n\t(1,2,[2,3)) -> (1,2,[1,3)), that is: \"dog\" -> \"The dog\"\nCoreference set:\nCoreference set:\n\t(1,3,[3,4)) -> (1,2,[2,3)), that is: \"barks\" -> \"dog\"\n",
            DOG_BARKS
        );
        let result = parse_transcript(&text).unwrap();
        let chains = result.coref.as_ref().unwrap();
        // The empty middle chain is dropped
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].pairs()[0].antecedent.text, "The dog");
        assert_eq!(chains[1].pairs()[0].mention.head, 2);
    }

    #[test]
    fn coreference_marker_directly_after_dependencies() {
        let text = format!(
            "{}Coreference links:\n (1,2,[2,3)) -> (1,1,[1,2)), that is: \"a\" -> \"b\"",
            DOG_BARKS.trim_end_matches('\n').to_string() + "\n"
        );
        let result = parse_transcript(&text).unwrap();
        assert_eq!(result.chain_count(), 1);
    }

    #[test]
    fn coreference_section_without_pairs_is_empty_not_none() {
        let text = format!("{}\nCoreference set:\n", DOG_BARKS);
        let result = parse_transcript(&text).unwrap();
        assert_eq!(result.coref, Some(Vec::new()));
    }

    #[test]
    fn parser_exposes_state() {
        let mut parser = TranscriptParser::new();
        assert_eq!(parser.state(), ParserState::Start);
        parser.feed_line("Sentence #1 (1 tokens):").unwrap();
        assert_eq!(parser.state(), ParserState::Text);
        parser.feed_line("Hi").unwrap();
        assert_eq!(parser.state(), ParserState::Words);
    }
}
