//! Planning-host listener
//!
//! One client at a time. Accept is non-blocking; receive waits at most the
//! configured read timeout so the session loop keeps control.
//!
//! # Wire Format
//!
//! ```text
//! host   -> bridge   "x:0.5,y:0.0,o:0.0,dt:0.1,t_max:2.0\n"
//! bridge -> host     "ACK\n"   (message received)
//! bridge -> host     "ACK\n"   (peripheral handshake complete)
//! ```

use crate::error::{Error, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Reject a line longer than this (no newline seen)
const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Network side of a session
pub trait HostListener {
    /// Try to accept a client. `Ok(false)` when none is pending.
    fn accept_connection(&mut self) -> Result<bool>;

    /// True while a client is connected
    fn has_client(&self) -> bool;

    /// Next complete line from the client, if any arrived
    fn receive_message(&mut self) -> Result<Option<String>>;

    /// Send the fixed acknowledgement to the client
    fn send_confirmation(&mut self) -> Result<()>;

    /// Drop the client and stop listening. Safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

struct Client {
    stream: TcpStream,
    addr: SocketAddr,
    buffer: Vec<u8>,
}

/// TCP listener serving a single planning host
pub struct TcpHostServer {
    listener: Option<TcpListener>,
    client: Option<Client>,
    ack: Vec<u8>,
    read_timeout: Duration,
}

impl TcpHostServer {
    /// Bind and start listening
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        ack_token: &str,
        read_timeout: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        log::info!("Listening for planning host on {}", listener.local_addr()?);

        let mut ack = ack_token.as_bytes().to_vec();
        ack.push(b'\n');

        Ok(Self {
            listener: Some(listener),
            client: None,
            ack,
            // Zero is rejected by set_read_timeout
            read_timeout: read_timeout.max(Duration::from_millis(1)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        let listener = self.listener.as_ref().ok_or(Error::LinkClosed)?;
        Ok(listener.local_addr()?)
    }

    fn drop_client(&mut self, reason: &str) {
        if let Some(client) = self.client.take() {
            let _ = client.stream.shutdown(Shutdown::Both);
            log::info!("Client {} disconnected ({})", client.addr, reason);
        }
    }
}

fn take_line(buffer: &mut Vec<u8>) -> Option<String> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    let line: Vec<u8> = buffer.drain(..=pos).collect();
    Some(String::from_utf8_lossy(&line).trim().to_string())
}

impl HostListener for TcpHostServer {
    fn accept_connection(&mut self) -> Result<bool> {
        if self.client.is_some() {
            return Ok(true);
        }
        let listener = self.listener.as_ref().ok_or(Error::LinkClosed)?;

        match listener.accept() {
            Ok((stream, addr)) => {
                // Blocking reads with a timeout, like the command receiver
                stream.set_nonblocking(false)?;
                stream.set_read_timeout(Some(self.read_timeout))?;
                log::info!("Planning host connected: {}", addr);
                self.client = Some(Client {
                    stream,
                    addr,
                    buffer: Vec::with_capacity(256),
                });
                Ok(true)
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn has_client(&self) -> bool {
        self.client.is_some()
    }

    fn receive_message(&mut self) -> Result<Option<String>> {
        let Some(client) = self.client.as_mut() else {
            return Ok(None);
        };

        loop {
            if let Some(line) = take_line(&mut client.buffer) {
                if line.is_empty() {
                    continue;
                }
                return Ok(Some(line));
            }

            let mut chunk = [0u8; 1024];
            match client.stream.read(&mut chunk) {
                Ok(0) => {
                    // Peer closed; a final unterminated line still counts
                    let rest = String::from_utf8_lossy(&client.buffer).trim().to_string();
                    self.drop_client("closed by peer");
                    return Ok((!rest.is_empty()).then_some(rest));
                }
                Ok(n) => {
                    client.buffer.extend_from_slice(&chunk[..n]);
                    if client.buffer.len() > MAX_MESSAGE_BYTES {
                        self.drop_client("message too large");
                        return Err(Error::Other(format!(
                            "Message exceeds {} bytes without newline",
                            MAX_MESSAGE_BYTES
                        )));
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                    self.drop_client("connection reset");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn send_confirmation(&mut self) -> Result<()> {
        let Some(client) = self.client.as_mut() else {
            log::warn!("No client connected, acknowledgement dropped");
            return Ok(());
        };
        client.stream.write_all(&self.ack)?;
        client.stream.flush()?;
        log::debug!("Acknowledgement sent to {}", client.addr);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.drop_client("server closing");
        if let Some(listener) = self.listener.take() {
            if let Ok(addr) = listener.local_addr() {
                log::info!("Stopped listening on {}", addr);
            }
        }
        Ok(())
    }
}

impl Drop for TcpHostServer {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_line() {
        let mut buf = b"x:1,y:2\r\nrest".to_vec();
        assert_eq!(take_line(&mut buf).as_deref(), Some("x:1,y:2"));
        assert_eq!(take_line(&mut buf), None);
        assert_eq!(buf, b"rest");
    }

    #[test]
    fn test_accept_without_client_is_not_an_error() {
        let mut server =
            TcpHostServer::bind("127.0.0.1:0", "ACK", Duration::from_millis(50)).unwrap();
        assert!(!server.accept_connection().unwrap());
        assert!(!server.has_client());
        assert_eq!(server.receive_message().unwrap(), None);
    }

    #[test]
    fn test_accept_after_close_fails() {
        let mut server =
            TcpHostServer::bind("127.0.0.1:0", "ACK", Duration::from_millis(50)).unwrap();
        server.close().unwrap();
        server.close().unwrap();
        assert!(matches!(server.accept_connection(), Err(Error::LinkClosed)));
    }
}
