//! Output pumping: one blocking reader thread per engine stream, all feeding
//! a single `mpsc` channel the owner waits on with deadlines.

use std::io::{self, Read};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use tracing::trace;

/// Which engine pipe a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn index(self) -> usize {
        match self {
            StreamKind::Stdout => 0,
            StreamKind::Stderr => 1,
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// Message from a reader thread.
#[derive(Debug)]
pub enum StreamEvent {
    Data { stream: StreamKind, bytes: Vec<u8> },
    /// EOF or read error; no further events from this stream.
    Closed(StreamKind),
}

/// Start a reader thread for `source`.
pub fn spawn_reader<R>(
    mut source: R,
    stream: StreamKind,
    chunk_bytes: usize,
    tx: Sender<StreamEvent>,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("nb-engine-{}", stream))
        .spawn(move || {
            let mut buf = vec![0u8; chunk_bytes.max(1)];
            loop {
                match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let event = StreamEvent::Data {
                            stream,
                            bytes: buf[..n].to_vec(),
                        };
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        trace!(%stream, error = %e, "engine stream read failed");
                        break;
                    }
                }
            }
            let _ = tx.send(StreamEvent::Closed(stream));
        })
}

/// Incremental UTF-8 decoder.
///
/// A multi-byte character split across two reads is held back until the
/// rest arrives. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, appending complete characters to `out`.
    pub fn decode_into(&mut self, bytes: &[u8], out: &mut String) {
        self.pending.extend_from_slice(bytes);
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = consumed + e.valid_up_to();
                    // SAFETY-free: this prefix was just validated
                    if let Ok(valid) = std::str::from_utf8(&self.pending[consumed..valid_end]) {
                        out.push_str(valid);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + bad;
                        }
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }

    /// Flush whatever is still held back (at EOF).
    pub fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            out.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn decoder_passes_ascii_through() {
        let mut d = Utf8Decoder::new();
        let mut out = String::new();
        d.decode_into(b"NLP> ", &mut out);
        assert_eq!(out, "NLP> ");
        assert_eq!(d.pending_len(), 0);
    }

    #[test]
    fn decoder_joins_split_character() {
        let bytes = "café".as_bytes();
        let (a, b) = bytes.split_at(bytes.len() - 1);
        let mut d = Utf8Decoder::new();
        let mut out = String::new();
        d.decode_into(a, &mut out);
        assert_eq!(out, "caf");
        assert_eq!(d.pending_len(), 1);
        d.decode_into(b, &mut out);
        assert_eq!(out, "café");
        assert_eq!(d.pending_len(), 0);
    }

    #[test]
    fn decoder_replaces_invalid_bytes() {
        let mut d = Utf8Decoder::new();
        let mut out = String::new();
        d.decode_into(&[b'a', 0xff, b'b'], &mut out);
        assert_eq!(out, "a\u{fffd}b");
    }

    #[test]
    fn decoder_finish_flushes_truncated_tail() {
        let mut d = Utf8Decoder::new();
        let mut out = String::new();
        d.decode_into(&[0xe2, 0x82], &mut out);
        assert!(out.is_empty());
        d.finish(&mut out);
        assert_eq!(out, "\u{fffd}");
    }

    #[test]
    fn reader_sends_data_then_closed() {
        let (tx, rx) = mpsc::channel();
        let handle = spawn_reader(&b"hello"[..], StreamKind::Stdout, 2, tx).unwrap();
        let mut collected = Vec::new();
        loop {
            match rx.recv().unwrap() {
                StreamEvent::Data { bytes, stream } => {
                    assert_eq!(stream, StreamKind::Stdout);
                    collected.extend(bytes);
                }
                StreamEvent::Closed(kind) => {
                    assert_eq!(kind, StreamKind::Stdout);
                    break;
                }
            }
        }
        handle.join().unwrap();
        assert_eq!(collected, b"hello");
    }
}
