//! Output Module
//!
//! The output channel targets write to, with nestable capture scopes.
//!
//! A sink either forwards to a writer (stdout, a file, a socket) or keeps
//! everything in an in-memory buffer. While a [`Capture`] is open, writes go
//! to that capture's buffer only; the innermost open capture wins, so a
//! capture taken inside another one hides its content from the outer scope
//! until somebody explicitly emits it again.

use std::fmt;
use std::io::{self, Write};
use std::ops::{Deref, DerefMut};

enum Ambient {
    Writer(Box<dyn Write + Send>),
    Buffer(String),
}

// == Output Sink ==
/// Ambient output channel passed through every proxied call.
pub struct OutputSink {
    ambient: Ambient,
    /// Open capture buffers, innermost last
    captures: Vec<String>,
}

impl OutputSink {
    // == Constructors ==
    /// Creates a sink forwarding uncaptured output to `writer`.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            ambient: Ambient::Writer(Box::new(writer)),
            captures: Vec::new(),
        }
    }

    /// Creates a sink that accumulates uncaptured output in memory.
    pub fn buffer() -> Self {
        Self {
            ambient: Ambient::Buffer(String::new()),
            captures: Vec::new(),
        }
    }

    // == Emit ==
    /// Writes text to the innermost open capture, or to the ambient channel.
    pub fn emit(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(capture) = self.captures.last_mut() {
            capture.push_str(text);
            return Ok(());
        }
        match &mut self.ambient {
            Ambient::Writer(writer) => writer.write_all(text.as_bytes()),
            Ambient::Buffer(buffer) => {
                buffer.push_str(text);
                Ok(())
            }
        }
    }

    /// Flushes the ambient writer. No-op for buffered sinks.
    pub fn flush(&mut self) -> io::Result<()> {
        match &mut self.ambient {
            Ambient::Writer(writer) => writer.flush(),
            Ambient::Buffer(_) => Ok(()),
        }
    }

    // == Capture ==
    /// Opens a capture scope. Everything emitted until the returned guard is
    /// finished or dropped is held back from enclosing scopes.
    pub fn capture(&mut self) -> Capture<'_> {
        self.captures.push(String::new());
        let depth = self.captures.len();
        Capture {
            sink: self,
            depth,
            done: false,
        }
    }

    /// Number of currently open capture scopes.
    pub fn depth(&self) -> usize {
        self.captures.len()
    }

    // == Buffer Access ==
    /// Returns the buffered ambient output; empty for writer-backed sinks.
    pub fn contents(&self) -> &str {
        match &self.ambient {
            Ambient::Buffer(buffer) => buffer,
            Ambient::Writer(_) => "",
        }
    }

    /// Takes the buffered ambient output, leaving the buffer empty.
    pub fn take_contents(&mut self) -> String {
        match &mut self.ambient {
            Ambient::Buffer(buffer) => std::mem::take(buffer),
            Ambient::Writer(_) => String::new(),
        }
    }
}

impl fmt::Write for OutputSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.emit(s).map_err(|_| fmt::Error)
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ambient = match self.ambient {
            Ambient::Writer(_) => "writer",
            Ambient::Buffer(_) => "buffer",
        };
        f.debug_struct("OutputSink")
            .field("ambient", &ambient)
            .field("depth", &self.captures.len())
            .finish()
    }
}

// == Capture Guard ==
/// An open capture scope on an [`OutputSink`].
///
/// Derefs to the sink so it can be handed straight to a target. Dropping the
/// guard without calling [`Capture::finish`] discards whatever was captured.
pub struct Capture<'a> {
    sink: &'a mut OutputSink,
    depth: usize,
    done: bool,
}

impl Capture<'_> {
    /// Closes the scope and returns the captured text.
    pub fn finish(mut self) -> String {
        self.close().unwrap_or_default()
    }

    fn close(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        self.done = true;
        self.sink.captures.truncate(self.depth);
        self.sink.captures.pop()
    }
}

impl Deref for Capture<'_> {
    type Target = OutputSink;

    fn deref(&self) -> &OutputSink {
        &*self.sink
    }
}

impl DerefMut for Capture<'_> {
    fn deref_mut(&mut self) -> &mut OutputSink {
        &mut *self.sink
    }
}

impl Drop for Capture<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
