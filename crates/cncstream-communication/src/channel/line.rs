//! Line assembly from body bytes

/// Longest line handed to the interpreter
pub const MAX_LINE_LENGTH: usize = 255;

/// Result of pushing one byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// More bytes are needed
    Pending,
    /// A complete, non-empty line
    Line(String),
    /// The line exceeded `MAX_LINE_LENGTH`; carries the bytes accepted
    Overflow(usize),
}

/// Accumulates bytes into `\n`-terminated lines
///
/// Carriage returns are ignored and blank lines skipped. After an overflow
/// the rest of the line is dropped.
#[derive(Debug, Default, Clone)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    discarding: bool,
}

impl LineAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte
    pub fn push(&mut self, byte: u8) -> LineEvent {
        match byte {
            b'\n' => {
                let discarded = std::mem::replace(&mut self.discarding, false);
                let line = std::mem::take(&mut self.buffer);
                if discarded || line.is_empty() {
                    return LineEvent::Pending;
                }
                LineEvent::Line(String::from_utf8_lossy(&line).into_owned())
            }
            b'\r' => LineEvent::Pending,
            _ if self.discarding => LineEvent::Pending,
            _ if self.buffer.len() == MAX_LINE_LENGTH => {
                let length = self.buffer.len();
                self.buffer.clear();
                self.discarding = true;
                LineEvent::Overflow(length)
            }
            _ => {
                self.buffer.push(byte);
                LineEvent::Pending
            }
        }
    }

    /// Bytes of the line in progress
    pub fn partial_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(assembler: &mut LineAssembler, bytes: &[u8]) -> Vec<LineEvent> {
        bytes
            .iter()
            .map(|b| assembler.push(*b))
            .filter(|event| *event != LineEvent::Pending)
            .collect()
    }

    #[test]
    fn test_lines_and_blank_lines() {
        let mut assembler = LineAssembler::new();
        let events = feed(&mut assembler, b"G0 X1\r\n\r\n\nG1 Y2\n");
        assert_eq!(
            events,
            vec![
                LineEvent::Line("G0 X1".to_string()),
                LineEvent::Line("G1 Y2".to_string())
            ]
        );
    }

    #[test]
    fn test_line_spans_pushes() {
        let mut assembler = LineAssembler::new();
        assert!(feed(&mut assembler, b"G0 ").is_empty());
        assert_eq!(assembler.partial_len(), 3);
        assert_eq!(
            feed(&mut assembler, b"X5\n"),
            vec![LineEvent::Line("G0 X5".to_string())]
        );
    }

    #[test]
    fn test_overflow_drops_rest_of_line() {
        let mut assembler = LineAssembler::new();
        let mut bytes = vec![b'X'; MAX_LINE_LENGTH + 10];
        bytes.extend_from_slice(b"\nG0\n");
        assert_eq!(
            feed(&mut assembler, &bytes),
            vec![
                LineEvent::Overflow(MAX_LINE_LENGTH),
                LineEvent::Line("G0".to_string())
            ]
        );
    }
}
