//! Criterion benchmarks for transcript parsing.
//!
//! Benchmarks `parse_transcript` on transcripts of growing sentence counts,
//! and `parse_words_line` on annotation lines with and without markup.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nb_core::transcript::{parse_transcript, parse_words_line};

// ── Helpers ──────────────────────────────────────────────────────────

const SENTENCE: &str = "Sentence #{n} (7 tokens):
Stanford University is located in California.
[Text=Stanford CharacterOffsetBegin=0 CharacterOffsetEnd=8 PartOfSpeech=NNP Lemma=Stanford NamedEntityTag=ORGANIZATION] [Text=University CharacterOffsetBegin=9 CharacterOffsetEnd=19 PartOfSpeech=NNP Lemma=University NamedEntityTag=ORGANIZATION] [Text=is CharacterOffsetBegin=20 CharacterOffsetEnd=22 PartOfSpeech=VBZ Lemma=be NamedEntityTag=O] [Text=located CharacterOffsetBegin=23 CharacterOffsetEnd=30 PartOfSpeech=JJ Lemma=located NamedEntityTag=O] [Text=in CharacterOffsetBegin=31 CharacterOffsetEnd=33 PartOfSpeech=IN Lemma=in NamedEntityTag=O] [Text=California CharacterOffsetBegin=34 CharacterOffsetEnd=44 PartOfSpeech=NNP Lemma=California NamedEntityTag=LOCATION] [Text=. CharacterOffsetBegin=44 CharacterOffsetEnd=45 PartOfSpeech=. Lemma=. NamedEntityTag=O]
(ROOT
  (S
    (NP (NNP Stanford) (NNP University))
    (VP (VBZ is)
      (ADJP (JJ located)
        (PP (IN in)
          (NP (NNP California)))))
    (. .)))

nn(University-2, Stanford-1)
nsubj(located-4, University-2)
cop(located-4, is-3)
prep_in(located-4, California-6)
";

const COREF: &str = "Coreference set:
\t(2,1,[1,2)) -> (1,2,[1,3)), that is: \"It\" -> \"Stanford University\"
";

fn transcript(sentences: usize) -> String {
    let mut out = String::new();
    for n in 1..=sentences {
        out.push_str(&SENTENCE.replace("{n}", &n.to_string()));
        out.push('\n');
    }
    out.push_str(COREF);
    out
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_parse_transcript(c: &mut Criterion) {
    let mut group = c.benchmark_group("transcript/parse_transcript");
    for sentences in [1usize, 8, 64] {
        let text = transcript(sentences);
        group.bench_with_input(BenchmarkId::from_parameter(sentences), &text, |b, text| {
            b.iter(|| {
                let parsed = parse_transcript(black_box(text)).expect("transcript should parse");
                black_box(parsed);
            })
        });
    }
    group.finish();
}

fn bench_parse_words_line(c: &mut Criterion) {
    let plain = SENTENCE.lines().nth(2).unwrap_or_default();
    let markup = "[Text=yesterday CharacterOffsetBegin=8 CharacterOffsetEnd=17 PartOfSpeech=NN NamedEntityTag=DATE Timex=<TIMEX3 tid=\"t1\" type=\"DATE\">yesterday afternoon</TIMEX3>]";

    let mut group = c.benchmark_group("transcript/parse_words_line");
    for (name, line) in [("plain", plain), ("timex_markup", markup)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &line, |b, line| {
            b.iter(|| black_box(parse_words_line(black_box(line))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse_transcript, bench_parse_words_line);
criterion_main!(benches);
