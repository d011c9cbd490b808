//! Mock transport for testing
//!
//! Clones share state, so a test can keep one handle for inspection after
//! handing another to the code under test.

use super::Transport;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// One observed operation on the mock, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Bytes handed to the reader (empty reads are not recorded)
    Read(Vec<u8>),
    /// Bytes written by the host
    Write(Vec<u8>),
}

/// Mock transport for unit and integration tests
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    /// Released one per read call once `read_buffer` drains
    scripted_lines: VecDeque<Vec<u8>>,
    write_buffer: Vec<u8>,
    transcript: Vec<TranscriptEvent>,
    read_error: Option<std::io::ErrorKind>,
    close_count: usize,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Peripheral that emits one scripted line per poll
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mock = Self::new();
        for line in lines {
            mock.queue_line(line.as_ref());
        }
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Inject data to be read immediately
    pub fn inject_read(&self, data: &[u8]) {
        self.lock().read_buffer.extend(data);
    }

    /// Queue a line (newline appended) released on a later read call
    pub fn queue_line(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.lock().scripted_lines.push_back(bytes);
    }

    /// Make subsequent reads fail with the given I/O error kind
    pub fn fail_reads(&self, kind: std::io::ErrorKind) {
        self.lock().read_error = Some(kind);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.lock().write_buffer.clone()
    }

    /// Written data as UTF-8 text
    pub fn written_string(&self) -> String {
        String::from_utf8_lossy(&self.get_written()).into_owned()
    }

    /// Reads and writes in the order they happened
    pub fn transcript(&self) -> Vec<TranscriptEvent> {
        self.lock().transcript.clone()
    }

    /// Number of scripted lines not yet delivered
    pub fn pending_lines(&self) -> usize {
        self.lock().scripted_lines.len()
    }

    /// Number of times `close` was called
    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.lock();
        if inner.close_count > 0 {
            return Err(Error::LinkClosed);
        }
        if let Some(kind) = inner.read_error {
            return Err(std::io::Error::new(kind, "mock read failure").into());
        }

        if inner.read_buffer.is_empty()
            && let Some(line) = inner.scripted_lines.pop_front()
        {
            inner.read_buffer.extend(line);
        }

        let available = inner.read_buffer.len().min(buffer.len());
        let chunk: Vec<u8> = inner.read_buffer.drain(..available).collect();
        buffer[..available].copy_from_slice(&chunk);

        if !chunk.is_empty() {
            inner.transcript.push(TranscriptEvent::Read(chunk));
        }
        Ok(available)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.close_count > 0 {
            return Err(Error::LinkClosed);
        }
        inner.write_buffer.extend_from_slice(data);
        inner.transcript.push(TranscriptEvent::Write(data.to_vec()));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.lock().close_count += 1;
        Ok(())
    }
}
