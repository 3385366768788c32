//! The input stack feeding the parser.
//!
//! One source is active at a time; nested sources (the `.` builtin, `eval`
//! of a string, scripts re-run through the interpreter) stack on top of it
//! and pop on end of input. File-backed frames refill from their descriptor,
//! retrying on `EINTR` and eliding NUL bytes; end of input latches until the
//! frame is popped.

use std::io::{IsTerminal, Read, Write};
use std::path::Path;

use crate::error;
use crate::sys;

const INPUT_BUFFER_SIZE: usize = 4096;

enum FrameSource {
    File(std::fs::File),
    String,
}

struct InputFrame {
    source: FrameSource,
    buf: Vec<u8>,
    offset: usize,
    lineno: u32,
    at_eof: bool,
}

impl InputFrame {
    fn is_tty(&self) -> bool {
        match &self.source {
            FrameSource::File(f) => f.is_terminal(),
            FrameSource::String => false,
        }
    }
}

struct PushbackString {
    bytes: Vec<u8>,
    offset: usize,
}

/// A stack of input sources, the top of which feeds the parser.
#[derive(Default)]
pub struct InputStack {
    frames: Vec<InputFrame>,
    pushback: Option<PushbackString>,
    /// Prompt written before the next terminal refill (typically `$PS1`).
    pub prompt_next: Option<String>,
    /// Prompt written before subsequent terminal refills while a command is
    /// still being gathered (typically `$PS2`).
    pub continuation_prompt: Option<String>,
}

impl InputStack {
    /// Returns a new, empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of frames on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes an in-memory string source.
    pub fn push_string(&mut self, s: impl Into<String>) {
        self.frames.push(InputFrame {
            source: FrameSource::String,
            buf: s.into().into_bytes(),
            offset: 0,
            lineno: 1,
            at_eof: false,
        });
    }

    /// Pushes an already-open file source.
    pub fn push_open_file(&mut self, file: std::fs::File) {
        self.frames.push(InputFrame {
            source: FrameSource::File(file),
            buf: vec![],
            offset: 0,
            lineno: 1,
            at_eof: false,
        });
    }

    /// Pushes the process's standard input as a source (via a duplicate
    /// descriptor, so the stack never closes the real fd 0).
    pub fn push_stdin(&mut self) -> Result<(), error::Error> {
        let fd = sys::process::dup_fd(0)?;
        self.push_open_file(std::fs::File::from(fd));
        Ok(())
    }

    /// Opens the named file and pushes it as a source.
    pub fn push_file(&mut self, path: &Path) -> Result<(), error::Error> {
        let file = std::fs::File::open(path).map_err(|e| {
            error::Error::RedirectionFailure(path.display().to_string(), e)
        })?;
        self.push_open_file(file);
        Ok(())
    }

    /// Pops the active source.
    pub fn pop(&mut self) {
        self.frames.pop();
        self.pushback = None;
    }

    /// Pops every source.
    pub fn pop_all(&mut self) {
        self.frames.clear();
        self.pushback = None;
    }

    /// Pops sources until only `depth` remain.
    pub fn pop_to_depth(&mut self, depth: usize) {
        while self.frames.len() > depth {
            self.frames.pop();
        }
        if self.frames.len() <= depth {
            self.pushback = None;
        }
    }

    /// Clears a latched end-of-input on a terminal source, so an
    /// interactive shell can keep reading after the user types an EOF.
    pub fn rewind_eof(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.is_tty() {
                frame.at_eof = false;
            }
        }
    }

    /// Pushes a string to be read before the remainder of the current
    /// source. At most one pushed-back string is outstanding at a time.
    pub fn push_back_str(&mut self, s: &str) {
        self.pushback = Some(PushbackString {
            bytes: s.as_bytes().to_vec(),
            offset: 0,
        });
    }

    /// Undoes the most recent [`Self::getc`]. Only one character of pushback
    /// is supported.
    pub fn ungetc(&mut self) {
        if let Some(pushback) = &mut self.pushback {
            pushback.offset = pushback.offset.saturating_sub(1);
        } else if let Some(frame) = self.frames.last_mut() {
            frame.offset = frame.offset.saturating_sub(1);
        }
    }

    /// Returns the 1-based line number of the active source.
    pub fn lineno(&self) -> u32 {
        self.frames.last().map_or(1, |f| f.lineno)
    }

    /// Reads the next byte from the active source. NUL bytes are silently
    /// skipped. Returns `None` at end of the active source; the caller
    /// decides when to pop.
    pub fn getc(&mut self) -> Result<Option<u8>, std::io::Error> {
        if let Some(pushback) = &mut self.pushback {
            if pushback.offset < pushback.bytes.len() {
                let b = pushback.bytes[pushback.offset];
                pushback.offset += 1;
                return Ok(Some(b));
            }
            self.pushback = None;
        }

        let Self {
            frames,
            prompt_next,
            continuation_prompt,
            ..
        } = self;

        loop {
            let Some(frame) = frames.last_mut() else {
                return Ok(None);
            };

            while frame.offset < frame.buf.len() {
                let b = frame.buf[frame.offset];
                frame.offset += 1;
                if b == 0 {
                    continue;
                }
                if b == b'\n' {
                    frame.lineno += 1;
                }
                return Ok(Some(b));
            }

            if frame.at_eof {
                return Ok(None);
            }

            match &mut frame.source {
                FrameSource::String => {
                    frame.at_eof = true;
                    return Ok(None);
                }
                FrameSource::File(file) => {
                    if file.is_terminal() {
                        let prompt = prompt_next
                            .take()
                            .or_else(|| continuation_prompt.clone());
                        if let Some(prompt) = prompt {
                            let mut err = std::io::stderr();
                            let _ = err.write_all(prompt.as_bytes());
                            let _ = err.flush();
                        }
                    }

                    let mut buf = vec![0u8; INPUT_BUFFER_SIZE];
                    let n = loop {
                        match file.read(&mut buf) {
                            Ok(n) => break n,
                            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                                if sys::signal::interrupt_pending() {
                                    return Err(e);
                                }
                            }
                            Err(e) => return Err(e),
                        }
                    };

                    if n == 0 {
                        frame.at_eof = true;
                        return Ok(None);
                    }

                    buf.truncate(n);
                    frame.buf = buf;
                    frame.offset = 0;
                }
            }
        }
    }
}

impl swish_parser::ByteStream for InputStack {
    fn next_byte(&mut self) -> Result<Option<u8>, std::io::Error> {
        self.getc()
    }

    fn line_number(&self) -> u32 {
        self.lineno()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drain(stack: &mut InputStack) -> String {
        let mut out = vec![];
        while let Some(b) = stack.getc().unwrap() {
            out.push(b);
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn string_source_reads_through() {
        let mut stack = InputStack::new();
        stack.push_string("echo hi\n");
        assert_eq!(drain(&mut stack), "echo hi\n");
        // EOF latches.
        assert_eq!(stack.getc().unwrap(), None);
        assert_eq!(stack.getc().unwrap(), None);
    }

    #[test]
    fn nested_sources_do_not_bleed() {
        let mut stack = InputStack::new();
        stack.push_string("outer\n");
        stack.push_string("inner\n");

        assert_eq!(drain(&mut stack), "inner\n");
        stack.pop();
        assert_eq!(drain(&mut stack), "outer\n");
    }

    #[test]
    fn ungetc_rereads_last_byte() {
        let mut stack = InputStack::new();
        stack.push_string("ab");
        assert_eq!(stack.getc().unwrap(), Some(b'a'));
        stack.ungetc();
        assert_eq!(stack.getc().unwrap(), Some(b'a'));
        assert_eq!(stack.getc().unwrap(), Some(b'b'));
    }

    #[test]
    fn pushback_string_read_first() {
        let mut stack = InputStack::new();
        stack.push_string("rest");
        assert_eq!(stack.getc().unwrap(), Some(b'r'));
        stack.push_back_str("XY");
        assert_eq!(stack.getc().unwrap(), Some(b'X'));
        assert_eq!(stack.getc().unwrap(), Some(b'Y'));
        assert_eq!(stack.getc().unwrap(), Some(b'e'));
    }

    #[test]
    fn nul_bytes_are_elided() {
        let mut stack = InputStack::new();
        stack.frames.push(InputFrame {
            source: FrameSource::String,
            buf: vec![b'a', 0, 0, b'b'],
            offset: 0,
            lineno: 1,
            at_eof: false,
        });
        assert_eq!(drain(&mut stack), "ab");
    }

    #[test]
    fn file_source_reads_and_counts_lines() {
        use std::io::Write as _;

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"one\ntwo\n").unwrap();

        let mut stack = InputStack::new();
        stack.push_file(tmp.path()).unwrap();
        assert_eq!(drain(&mut stack), "one\ntwo\n");
        assert_eq!(stack.lineno(), 3);
    }

    #[test]
    fn pop_to_depth_unwinds_nesting() {
        let mut stack = InputStack::new();
        stack.push_string("a");
        let base = stack.depth();
        stack.push_string("b");
        stack.push_string("c");
        stack.pop_to_depth(base);
        assert_eq!(stack.depth(), base);
        assert_eq!(drain(&mut stack), "a");
    }
}
