//! HTTP-like request framing
//!
//! A request is a request line, CRLF-terminated header lines and a bare
//! CRLF terminator, followed by `Content-Length` body bytes. Channels scan
//! header blocks byte by byte through a fixed scratch buffer; the same
//! buffer holds body bytes while they are handed out.

use crate::communication::ByteStream;

/// Scratch buffer capacity in bytes
pub const SCRATCH_SIZE: usize = 128;

/// Response to batch requests and preflights
pub const BATCH_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
Access-Control-Allow-Origin: *\r\n\
Access-Control-Allow-Headers: *\r\n\
Content-Type: text/plain; charset=us-ascii\r\n\
Cache-Control: no-cache\r\n\
Connection: keep-alive\r\n\
Content-Length: 0\r\n\
X-Content-Type-Options: nosniff\r\n\
\r\n";

/// Response opening a log or status stream; the body never ends
pub const STREAM_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
Access-Control-Allow-Origin: *\r\n\
Access-Control-Allow-Headers: *\r\n\
Content-Type: text/plain; charset=us-ascii\r\n\
Cache-Control: no-cache\r\n\
Connection: keep-alive\r\n\
X-Content-Type-Options: nosniff\r\n\
\r\n";

/// Response to a completed upload
pub const UPLOAD_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
Cache-Control: no-cache\r\n\
Connection: Keep-Alive\r\n\
Keep-Alive: timeout=1000, max=1000\r\n\
Content-Length: 0\r\n\
X-Content-Type-Options: nosniff\r\n\
\r\n";

const CONTENT_LENGTH: &[u8] = b"content-length:";

/// Fixed-size byte buffer with read and fill cursors
///
/// `data_read <= data_size <= SCRATCH_SIZE` always holds.
#[derive(Debug, Clone)]
pub struct Scratch {
    data: [u8; SCRATCH_SIZE],
    data_read: usize,
    data_size: usize,
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new()
    }
}

impl Scratch {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self {
            data: [0; SCRATCH_SIZE],
            data_read: 0,
            data_size: 0,
        }
    }

    /// Discard all buffered bytes
    pub fn reset(&mut self) {
        self.data_read = 0;
        self.data_size = 0;
    }

    /// Whether every buffered byte has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.data_read == self.data_size
    }

    /// Whether no more bytes fit
    pub fn is_full(&self) -> bool {
        self.data_size == SCRATCH_SIZE
    }

    /// Buffered bytes not yet consumed
    pub fn unread(&self) -> usize {
        self.data_size - self.data_read
    }

    /// Read one byte from `stream` and append it.
    ///
    /// A full buffer is emptied first; the caller learns about it through
    /// the returned `overflowed` flag.
    pub fn append_from<S: ByteStream>(&mut self, stream: &mut S) -> Option<(u8, bool)> {
        let byte = stream.read_byte()?;
        let overflowed = self.is_full();
        if overflowed {
            self.reset();
        }
        self.data[self.data_size] = byte;
        self.data_size += 1;
        Some((byte, overflowed))
    }

    /// The bytes appended since the last reset
    pub fn line(&self) -> &[u8] {
        &self.data[..self.data_size]
    }

    /// Buffered bytes not yet consumed, as a slice
    pub fn pending(&self) -> &[u8] {
        &self.data[self.data_read..self.data_size]
    }

    /// Refill an exhausted buffer with at most `limit` bytes from `stream`
    pub fn refill<S: ByteStream>(&mut self, stream: &mut S, limit: usize) -> usize {
        let want = stream.available().min(SCRATCH_SIZE).min(limit);
        self.reset();
        if want == 0 {
            return 0;
        }
        self.data_size = stream.read_bytes(&mut self.data[..want]);
        self.data_size
    }

    /// The next unconsumed byte
    pub fn peek(&self) -> Option<u8> {
        (!self.is_exhausted()).then(|| self.data[self.data_read])
    }

    /// Consume one byte
    pub fn advance(&mut self) {
        if self.data_read < self.data_size {
            self.data_read += 1;
        }
    }
}

/// The first line of a request block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    /// Request method, e.g. `POST`
    pub method: String,
    /// Request target, e.g. `/job.nc`
    pub target: String,
}

impl RequestLine {
    /// Parse `METHOD TARGET [VERSION]`
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split(' ').filter(|part| !part.is_empty());
        let method = parts.next()?.to_string();
        let target = parts.next().unwrap_or_default().to_string();
        Some(Self { method, target })
    }

    /// Whether this is a CORS preflight
    pub fn is_preflight(&self) -> bool {
        self.method.eq_ignore_ascii_case("OPTIONS")
    }

    /// The target with its leading `/` removed, `None` for other forms
    pub fn upload_path(&self) -> Option<&str> {
        self.target.strip_prefix('/')
    }
}

/// A complete header line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLine {
    /// The bare CRLF that ends a header block
    Terminator,
    /// `Content-Length: <n>`
    ContentLength(u64),
    /// Any other header
    Other,
}

/// State of the header block being scanned
///
/// The first non-blank line is the request line. Lines whose head was lost
/// to a scratch overflow are skipped.
#[derive(Debug, Default, Clone)]
pub struct HeaderBlock {
    request: Option<RequestLine>,
    started: bool,
    truncated: bool,
    content_length: u64,
}

impl HeaderBlock {
    /// Start a new block
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything scanned so far
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// The current line outgrew the scratch buffer
    pub fn truncate_line(&mut self) {
        self.truncated = true;
    }

    /// Feed a complete line; returns true at the block terminator
    pub fn feed_line(&mut self, line: &[u8]) -> bool {
        if std::mem::replace(&mut self.truncated, false) {
            self.started = true;
            return false;
        }
        if !self.started {
            let text = trim_line_ending(line);
            if !text.is_empty() {
                self.started = true;
                self.request = RequestLine::parse(&String::from_utf8_lossy(text));
            }
            return false;
        }
        match classify_header(line) {
            HeaderLine::Terminator => true,
            HeaderLine::ContentLength(length) => {
                self.content_length = length;
                false
            }
            HeaderLine::Other => false,
        }
    }

    /// The request line, if one was scanned intact
    pub fn request(&self) -> Option<&RequestLine> {
        self.request.as_ref()
    }

    /// Whether the block is a CORS preflight
    pub fn is_preflight(&self) -> bool {
        self.request.as_ref().is_some_and(RequestLine::is_preflight)
    }

    /// Declared body length, 0 when absent
    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

/// Strip the line ending from a scanned line
pub fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Classify a header line (line ending included or not)
pub fn classify_header(line: &[u8]) -> HeaderLine {
    let line = trim_line_ending(line);
    if line.is_empty() {
        return HeaderLine::Terminator;
    }
    if line.len() >= CONTENT_LENGTH.len()
        && line[..CONTENT_LENGTH.len()].eq_ignore_ascii_case(CONTENT_LENGTH)
    {
        return HeaderLine::ContentLength(parse_decimal(&line[CONTENT_LENGTH.len()..]));
    }
    HeaderLine::Other
}

/// Parse a decimal the way C `atol` does: leading whitespace and a `+`
/// sign are skipped, parsing stops at the first non-digit, garbage is 0.
pub fn parse_decimal(value: &[u8]) -> u64 {
    let mut digits = value
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .peekable();
    if digits.peek() == Some(&&b'+') {
        digits.next();
    }
    digits
        .take_while(|b| b.is_ascii_digit())
        .fold(0u64, |acc, b| {
            acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
        })
}
