//! Line-delimited stdio transport: one envelope per input line, one reply
//! per output line.

use super::Service;
use std::io::{self, BufRead, Write};

/// Serve envelopes from `input` until EOF, writing replies to `output`.
/// Returns the number of envelopes handled.
pub fn serve_lines<R: BufRead, W: Write>(
    service: &Service,
    input: R,
    mut output: W,
) -> io::Result<usize> {
    let mut handled = 0;
    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let reply = service.handle_json(trimmed);
        writeln!(output, "{}", reply)?;
        output.flush()?;
        handled += 1;
    }
    Ok(handled)
}

/// Serve on the process's own stdin/stdout.
pub fn run_stdio(service: &Service) -> io::Result<usize> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve_lines(service, stdin.lock(), stdout.lock())
}
