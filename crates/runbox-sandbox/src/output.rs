//! Bounded output capture
//!
//! A sandboxed program may emit gigabytes. Capture must neither exhaust
//! memory nor stall the producer: every write is acknowledged in full, but
//! bytes past the cap are discarded.

/// Appended to a captured stream when bytes were dropped.
pub const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// In-memory capture with a hard byte cap.
#[derive(Debug)]
pub struct CappedBuffer {
    buf: Vec<u8>,
    cap: usize,
    truncated: bool,
}

impl CappedBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: Vec::new(),
            cap,
            truncated: false,
        }
    }

    /// Store as much of `chunk` as the cap allows. Always reports the whole
    /// chunk as consumed so the producing pipe never stalls.
    pub fn write(&mut self, chunk: &[u8]) -> usize {
        let room = self.cap - self.buf.len();
        if chunk.len() > room {
            self.truncated = true;
        }
        let take = room.min(chunk.len());
        self.buf.extend_from_slice(&chunk[..take]);
        chunk.len()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Render the capture for the client, appending the truncation marker
    /// when bytes were dropped.
    pub fn into_string(self) -> String {
        let mut out = String::from_utf8_lossy(&self.buf).into_owned();
        if self.truncated {
            out.push_str(TRUNCATION_MARKER);
        }
        out
    }
}

/// Forwarding budget for a streamed output. Unlike [`CappedBuffer`] it
/// stores nothing; it decides which prefix of each chunk may still be
/// forwarded to the client.
#[derive(Debug)]
pub struct CapGate {
    remaining: usize,
    tripped: bool,
}

impl CapGate {
    pub fn new(cap: usize) -> Self {
        Self {
            remaining: cap,
            tripped: false,
        }
    }

    /// Returns the prefix of `chunk` that fits the remaining budget. Past
    /// the cap this returns an empty slice; the caller keeps draining the
    /// pipe and simply stops forwarding.
    pub fn admit<'a>(&mut self, chunk: &'a [u8]) -> &'a [u8] {
        if chunk.len() <= self.remaining {
            self.remaining -= chunk.len();
            chunk
        } else {
            self.tripped = true;
            let take = self.remaining;
            self.remaining = 0;
            &chunk[..take]
        }
    }

    pub fn tripped(&self) -> bool {
        self.tripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_everything_under_cap() {
        let mut buf = CappedBuffer::new(16);
        assert_eq!(buf.write(b"hello "), 6);
        assert_eq!(buf.write(b"world"), 5);
        assert!(!buf.truncated());
        assert_eq!(buf.into_string(), "hello world");
    }

    #[test]
    fn caps_and_marks_truncation() {
        let mut buf = CappedBuffer::new(4);
        assert_eq!(buf.write(b"abcdef"), 6);
        assert!(buf.truncated());
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.into_string(), format!("abcd{}", TRUNCATION_MARKER));
    }

    #[test]
    fn truncation_is_idempotent() {
        let mut buf = CappedBuffer::new(4);
        buf.write(b"abcd");
        assert!(!buf.truncated());
        assert_eq!(buf.write(b"x"), 1);
        assert!(buf.truncated());
        assert_eq!(buf.write(b"yz"), 2);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.into_string(), format!("abcd{}", TRUNCATION_MARKER));
    }

    #[test]
    fn exact_fit_is_not_truncation() {
        let mut buf = CappedBuffer::new(4);
        buf.write(b"abcd");
        assert!(!buf.truncated());
        assert_eq!(buf.into_string(), "abcd");
    }

    #[test]
    fn gate_admits_until_budget_spent() {
        let mut gate = CapGate::new(5);
        assert_eq!(gate.admit(b"abc"), b"abc");
        assert_eq!(gate.admit(b"def"), b"de");
        assert!(gate.tripped());
        assert_eq!(gate.admit(b"ghi"), b"");
        assert_eq!(gate.admit(b""), b"");
    }
}
