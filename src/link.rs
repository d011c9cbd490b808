//! Line-oriented peripheral link
//!
//! Wraps a byte [`Transport`] with the framing the motor-controller firmware
//! speaks:
//!
//! ```text
//! host -> peripheral   timing payload    "0.100000\n"
//! host -> peripheral   velocity payload  "vx,vy,wz\n" per tick, then "END\n"
//! peripheral -> host   status lines      "DT\n", "OK1\n", "DATA\n", "OK2\n", ...
//! ```
//!
//! Reads never block for a full line. Bytes are accumulated across calls and
//! [`PeripheralLink::read_line`] returns an empty string until a `\n` arrives.

use crate::error::Result;
use crate::trajectory::VelocityCommand;
use crate::transport::Transport;
use std::fmt::Write as _;

/// Terminator line after a velocity sequence
pub const END_OF_SEQUENCE: &str = "END";

/// Guard against a peripheral that never sends a newline
const MAX_PENDING_BYTES: usize = 4096;

const READ_CHUNK: usize = 256;

/// Duplex line link to the peripheral
pub struct PeripheralLink {
    transport: Box<dyn Transport>,
    pending: Vec<u8>,
    closed: bool,
}

impl PeripheralLink {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            pending: Vec::with_capacity(READ_CHUNK),
            closed: false,
        }
    }

    /// Read at most one line.
    ///
    /// Returns the line without its `\r\n`, or an empty string when no
    /// complete line is available yet.
    pub fn read_line(&mut self) -> Result<String> {
        if let Some(line) = self.take_line() {
            return Ok(line);
        }

        let mut chunk = [0u8; READ_CHUNK];
        let n = self.transport.read(&mut chunk)?;
        self.pending.extend_from_slice(&chunk[..n]);

        if let Some(line) = self.take_line() {
            return Ok(line);
        }

        if self.pending.len() > MAX_PENDING_BYTES {
            log::warn!(
                "Discarding {} unterminated bytes from peripheral",
                self.pending.len()
            );
            self.pending.clear();
        }
        Ok(String::new())
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Send the sampling interval as a single line
    pub fn send_dt(&mut self, dt: f64) -> Result<()> {
        let line = format!("{:.6}\n", dt);
        self.transport.write_all(line.as_bytes())?;
        self.transport.flush()?;
        log::debug!("Sent dt={:.6}s", dt);
        Ok(())
    }

    /// Send the velocity sequence, one command per line, followed by `END`
    pub fn send_velocities(&mut self, velocities: &[VelocityCommand]) -> Result<()> {
        let mut payload = String::with_capacity(velocities.len() * 32 + 4);
        for v in velocities {
            // Writing to a String cannot fail
            let _ = writeln!(payload, "{:.6},{:.6},{:.6}", v.vx, v.vy, v.wz);
        }
        payload.push_str(END_OF_SEQUENCE);
        payload.push('\n');

        self.transport.write_all(payload.as_bytes())?;
        self.transport.flush()?;
        log::debug!("Sent {} velocity commands", velocities.len());
        Ok(())
    }

    /// Release the transport. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.pending.clear();
        self.transport.close()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn link_with(mock: &MockTransport) -> PeripheralLink {
        PeripheralLink::new(Box::new(mock.clone()))
    }

    #[test]
    fn test_read_line_strips_terminators() {
        let mock = MockTransport::new();
        mock.inject_read(b"DT\r\nOK1\n");
        let mut link = link_with(&mock);

        assert_eq!(link.read_line().unwrap(), "DT");
        assert_eq!(link.read_line().unwrap(), "OK1");
        assert_eq!(link.read_line().unwrap(), "");
    }

    #[test]
    fn test_partial_line_buffered_until_newline() {
        let mock = MockTransport::new();
        let mut link = link_with(&mock);

        mock.inject_read(b"DA");
        assert_eq!(link.read_line().unwrap(), "");
        mock.inject_read(b"TA ready\n");
        assert_eq!(link.read_line().unwrap(), "DATA ready");
    }

    #[test]
    fn test_send_encoding() {
        let mock = MockTransport::new();
        let mut link = link_with(&mock);

        link.send_dt(0.1).unwrap();
        link.send_velocities(&[
            VelocityCommand::new(0.5, -0.25, 0.0),
            VelocityCommand::new(0.0, 0.0, 1.0),
        ])
        .unwrap();

        assert_eq!(
            mock.written_string(),
            "0.100000\n\
             0.500000,-0.250000,0.000000\n\
             0.000000,0.000000,1.000000\n\
             END\n"
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let mock = MockTransport::new();
        let mut link = link_with(&mock);

        link.close().unwrap();
        link.close().unwrap();
        assert!(link.is_closed());
        assert_eq!(mock.close_count(), 1);
    }
}
