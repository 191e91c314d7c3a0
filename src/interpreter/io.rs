//! Streams
//!
//! Standard input for commands and the bounded pipes connecting pipeline
//! stages. A pipe carries text chunks over a bounded channel: the writer
//! blocks while the channel is full, the reader blocks while it is empty
//! and the writer is still alive. Dropping the reader makes every further
//! write fail with `BrokenPipe`.
//!
//! Both ends wait with the channel's blocking calls inside `block_in_place`,
//! the same bridge the filesystem adapter uses, so they also work on a
//! runtime worker thread.

use tokio::sync::mpsc::{channel, Receiver, Sender};

use crate::interpreter::errors::InterpreterError;

/// Writing end of a pipe.
#[derive(Debug, Clone)]
pub struct PipeWriter {
    tx: Sender<String>,
}

impl PipeWriter {
    pub fn write(&self, chunk: String) -> Result<(), InterpreterError> {
        if chunk.is_empty() {
            return Ok(());
        }
        tokio::task::block_in_place(|| self.tx.blocking_send(chunk)).map_err(|_| InterpreterError::BrokenPipe)
    }
}

/// Reading end of a pipe.
#[derive(Debug)]
pub struct PipeReader {
    rx: Receiver<String>,
    buffer: String,
}

impl PipeReader {
    /// Pull one more chunk into the buffer. Returns false at end of stream.
    fn fill(&mut self) -> bool {
        match tokio::task::block_in_place(|| self.rx.blocking_recv()) {
            Some(chunk) => {
                self.buffer.push_str(&chunk);
                true
            }
            None => false,
        }
    }
}

/// Bounded pipe holding at most `capacity` unread chunks.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = channel(capacity.max(1));
    (PipeWriter { tx }, PipeReader { rx, buffer: String::new() })
}

/// Standard input of a command.
#[derive(Debug, Default)]
pub enum InputStream {
    #[default]
    Empty,
    Buffer { data: String, pos: usize },
    Pipe(PipeReader),
}

impl InputStream {
    pub fn from_string(data: impl Into<String>) -> Self {
        InputStream::Buffer { data: data.into(), pos: 0 }
    }

    /// Next line including its trailing newline, or `None` at end of input.
    /// The last line may lack the newline.
    pub fn read_line(&mut self) -> Option<String> {
        match self {
            InputStream::Empty => None,
            InputStream::Buffer { data, pos } => {
                if *pos >= data.len() {
                    return None;
                }
                let rest = &data[*pos..];
                let end = rest.find('\n').map_or(rest.len(), |i| i + 1);
                let line = rest[..end].to_string();
                *pos += end;
                Some(line)
            }
            InputStream::Pipe(reader) => loop {
                if let Some(i) = reader.buffer.find('\n') {
                    let rest = reader.buffer.split_off(i + 1);
                    return Some(std::mem::replace(&mut reader.buffer, rest));
                }
                if !reader.fill() {
                    if reader.buffer.is_empty() {
                        return None;
                    }
                    return Some(std::mem::take(&mut reader.buffer));
                }
            },
        }
    }

    /// Everything up to end of input.
    pub fn read_to_string(&mut self) -> String {
        match self {
            InputStream::Empty => String::new(),
            InputStream::Buffer { data, pos } => {
                let rest = data.get(*pos..).unwrap_or_default().to_string();
                *pos = data.len();
                rest
            }
            InputStream::Pipe(reader) => {
                while reader.fill() {}
                std::mem::take(&mut reader.buffer)
            }
        }
    }
}

/// Streams a command runs with.
#[derive(Debug, Default)]
pub struct IoContext {
    pub stdin: InputStream,
    /// Pipe to the next pipeline stage. Output is flushed into it after each
    /// statement; `None` means output is collected in the result.
    pub sink: Option<PipeWriter>,
}

impl IoContext {
    pub fn new(stdin: InputStream, sink: Option<PipeWriter>) -> Self {
        Self { stdin, sink }
    }

    pub fn with_stdin(stdin: InputStream) -> Self {
        Self { stdin, sink: None }
    }

    /// Deliver `stdout` to the sink if there is one, leaving it empty.
    pub fn flush(&self, stdout: &mut String) -> Result<(), InterpreterError> {
        match &self.sink {
            Some(sink) => sink.write(std::mem::take(stdout)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_lines() {
        let mut input = InputStream::from_string("a\nb\nc");
        assert_eq!(input.read_line().as_deref(), Some("a\n"));
        assert_eq!(input.read_to_string(), "b\nc");
        assert_eq!(input.read_line(), None);
        assert_eq!(InputStream::Empty.read_line(), None);
    }

    #[test]
    fn test_pipe_reassembles_lines_across_chunks() {
        let (writer, reader) = pipe(4);
        writer.write("one\ntw".into()).unwrap();
        writer.write("o\nthree".into()).unwrap();
        drop(writer);
        let mut input = InputStream::Pipe(reader);
        assert_eq!(input.read_line().as_deref(), Some("one\n"));
        assert_eq!(input.read_line().as_deref(), Some("two\n"));
        assert_eq!(input.read_line().as_deref(), Some("three"));
        assert_eq!(input.read_line(), None);
    }

    #[test]
    fn test_closed_reader_breaks_pipe() {
        let (writer, reader) = pipe(1);
        drop(reader);
        assert_eq!(writer.write("x".into()), Err(InterpreterError::BrokenPipe));
        // Empty writes never touch the channel
        assert!(writer.write(String::new()).is_ok());
    }

    #[test]
    fn test_writer_blocks_until_reader_drains() {
        let (writer, reader) = pipe(1);
        let producer = std::thread::spawn(move || {
            for i in 0..100 {
                writer.write(format!("{}\n", i)).unwrap();
            }
        });
        let mut input = InputStream::Pipe(reader);
        let all = input.read_to_string();
        producer.join().unwrap();
        assert_eq!(all.lines().count(), 100);
        assert!(all.ends_with("99\n"));
    }

    #[test]
    fn test_flush_without_sink_keeps_output() {
        let io = IoContext::default();
        let mut out = "kept".to_string();
        io.flush(&mut out).unwrap();
        assert_eq!(out, "kept");
    }
}
