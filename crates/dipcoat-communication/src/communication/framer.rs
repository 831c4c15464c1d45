//! Line framer
//!
//! Turns the raw byte stream from the serial port into `\n`-terminated text
//! lines. A trailing `\r` is stripped, bytes are decoded as lossy UTF-8 and
//! blank lines are dropped. A line that outgrows the cap is dropped whole,
//! up to and including its terminator.

/// Default cap on a single buffered line; longer garbage is discarded
const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Buffers partial input and emits one string per complete line
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line_length: usize,
    discarding: bool,
}

impl LineFramer {
    /// Create a framer with the default line length cap
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a framer that drops lines longer than `max_line_length` bytes
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(256),
            max_line_length: max_line_length.max(1),
            discarding: false,
        }
    }

    /// Feed received bytes, returning every line they complete
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &b in bytes {
            if b == b'\n' {
                if std::mem::take(&mut self.discarding) {
                    continue;
                }
                if let Some(line) = self.take_line() {
                    lines.push(line);
                }
                continue;
            }

            if self.discarding {
                continue;
            }

            if self.buffer.len() >= self.max_line_length {
                tracing::warn!(
                    "Discarding line longer than {} bytes",
                    self.max_line_length
                );
                self.buffer.clear();
                self.discarding = true;
                continue;
            }
            self.buffer.push(b);
        }

        lines
    }

    /// Bytes buffered for the line in progress
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial line
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    fn take_line(&mut self) -> Option<String> {
        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }
        let line = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        (!line.is_empty()).then_some(line)
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_simple() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"Modo Manual\nY: 100\n");
        assert_eq!(lines, vec!["Modo Manual", "Y: 100"]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_lines_split_across_reads() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"Home Y enc").is_empty());
        assert_eq!(framer.pending(), 10);
        assert_eq!(framer.push(b"ontrado\r\nZ"), vec!["Home Y encontrado"]);
        assert_eq!(framer.push(b": -5\n"), vec!["Z: -5"]);
    }

    #[test]
    fn test_blank_lines_dropped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"\r\n\n  \nok\n"), vec!["ok"]);
    }

    #[test]
    fn test_overlong_line_discarded() {
        let mut framer = LineFramer::with_max_line_length(4);
        assert!(framer.push(b"abcdefg\n").is_empty());
        assert_eq!(framer.pending(), 0);
        assert_eq!(framer.push(b"Z: 2\n"), vec!["Z: 2"]);
    }

    #[test]
    fn test_overlong_tail_never_emitted() {
        let mut framer = LineFramer::new();
        let mut noise = vec![b'x'; 4092];
        noise.extend_from_slice(b"Pos Y: 1500");
        assert!(framer.push(&noise).is_empty());
        assert!(framer.push(b"\n").is_empty());
        assert_eq!(framer.push(b"Y: 7\n"), vec!["Y: 7"]);
    }

    #[test]
    fn test_multibyte_split_across_reads() {
        let mut framer = LineFramer::new();
        let line = "Límite Z Min alcanzado\n".as_bytes();
        // split inside the two-byte 'í'
        assert!(framer.push(&line[..2]).is_empty());
        assert_eq!(framer.push(&line[2..]), vec!["Límite Z Min alcanzado"]);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"L\xedmite Y Max alcanzado\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("mite Y Max alcanzado"));
    }

    #[test]
    fn test_reset_drops_partial_line() {
        let mut framer = LineFramer::new();
        framer.push(b"partial");
        framer.reset();
        assert_eq!(framer.push(b"Z: 1\n"), vec!["Z: 1"]);
    }
}
