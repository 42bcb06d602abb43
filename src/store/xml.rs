//! Copies stored XML record bodies into a response stream

use std::io::{self, Write};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Removes a UTF-8 byte order mark and a leading `<?xml ...?>` declaration,
/// so the body can be embedded in an enclosing document.
pub fn strip_prolog(body: &[u8]) -> &[u8] {
    let body = body.strip_prefix(UTF8_BOM).unwrap_or(body);
    let trimmed = trim_start(body);

    if trimmed.starts_with(b"<?xml") {
        if let Some(end) = trimmed.windows(2).position(|w| w == b"?>") {
            return trim_start(&trimmed[end + 2..]);
        }
    }
    body
}

fn trim_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Writes record fragments to any `io::Write`
pub struct XmlFragmentCopier<W: Write> {
    writer: W,
    fragments: u64,
}

impl<W: Write> XmlFragmentCopier<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            fragments: 0,
        }
    }

    /// Writes one record body without its prolog
    pub fn copy(&mut self, body: &[u8]) -> io::Result<()> {
        self.writer.write_all(strip_prolog(body))?;
        self.fragments += 1;
        Ok(())
    }

    pub fn fragments(&self) -> u64 {
        self.fragments
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
