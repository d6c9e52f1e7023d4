//! Bounded capture and truncation of player output.
//!
//! Liquidsoap can log for hours before it fails. Only the tail of each pipe
//! is held in memory, and only the first and last lines of that tail end up
//! in a log entry.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt};

/// Maximum characters of player output kept in an error.
pub const DEFAULT_MAX_CHARS: usize = 4_000;

/// Bytes of each output pipe retained while the player runs.
pub const CAPTURE_TAIL_BYTES: usize = 16 * 1024;

/// Drain `reader` to EOF, keeping only its last `cap` bytes.
pub async fn read_tail<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> std::io::Result<Vec<u8>> {
    let mut tail: VecDeque<u8> = VecDeque::with_capacity(cap.min(8 * 1024));
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        tail.extend(&buf[..n]);
        if tail.len() > cap {
            let excess = tail.len() - cap;
            tail.drain(..excess);
        }
    }
    Ok(tail.into())
}

/// Truncate `output` to at most `max_chars` characters, keeping head and tail.
///
/// The split is done on character boundaries, never inside a multi-byte char.
pub fn truncate_output(output: &str, max_chars: usize) -> String {
    if output.len() <= max_chars {
        return output.to_owned();
    }

    let total = output.chars().count();
    if total <= max_chars {
        return output.to_owned();
    }

    let half = max_chars / 2;
    let head: String = output.chars().take(half).collect();
    let tail: String = output.chars().skip(total - half).collect();
    let omitted = total - half * 2;

    format!("{head}\n... [{omitted} chars omitted] ...\n{tail}")
}

/// Strip ANSI escape codes and decode bytes as lossy UTF-8.
pub fn strip_text(raw: &[u8]) -> String {
    let clean = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&clean).into_owned()
}
