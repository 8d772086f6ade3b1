//! Per-direction relay state: the hop buffer and the session that carries it.

use std::fmt;
use std::io;

use relay_id::PairingId;
use tokio::net::TcpStream;

use super::Token;

/// Default size of each direction's relay buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Direction a session relays in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowSide {
    ClientToServer,
    ServerToClient,
}

impl fmt::Display for FlowSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowSide::ClientToServer => f.write_str("client_to_server"),
            FlowSide::ServerToClient => f.write_str("server_to_client"),
        }
    }
}

/// Side-effect hook run after every completed write.
///
/// Implementations must not fail the relay: anything that goes wrong inside
/// the hook stays inside the hook.
pub trait WriteHook: Send + Sync {
    fn on_write(&self, flow: FlowSide, bytes: &[u8]);
}

/// Outcome of draining the buffer into a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// Every filled byte has been written.
    Complete,
    /// The socket stopped accepting bytes; the rest waits for writability.
    Pending,
}

/// Fixed-capacity hop buffer, filled by one read and drained by one write.
pub struct RelayBuffer {
    data: Box<[u8]>,
    filled: usize,
    written: usize,
}

impl RelayBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)].into_boxed_slice(),
            filled: 0,
            written: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes from the last read.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// Bytes from the last read that have already reached the peer.
    pub fn written(&self) -> &[u8] {
        &self.data[..self.written]
    }

    pub fn is_drained(&self) -> bool {
        self.written == self.filled
    }

    pub fn reset(&mut self) {
        self.filled = 0;
        self.written = 0;
    }

    /// Read whatever is available into the (reset) buffer.
    ///
    /// `Ok(0)` means end of stream. `WouldBlock` means the readiness was
    /// spurious and the buffer is untouched.
    pub fn read_from(&mut self, stream: &TcpStream) -> io::Result<usize> {
        self.reset();
        let n = stream.try_read(&mut self.data)?;
        self.filled = n;
        Ok(n)
    }

    /// Write the unwritten part of the buffer without blocking.
    pub fn write_to(&mut self, stream: &TcpStream) -> io::Result<WriteProgress> {
        while !self.is_drained() {
            match stream.try_write(&self.data[self.written..self.filled]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(WriteProgress::Pending)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(WriteProgress::Complete)
    }
}

impl fmt::Debug for RelayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayBuffer")
            .field("capacity", &self.data.len())
            .field("filled", &self.filled)
            .field("written", &self.written)
            .finish()
    }
}

/// One direction of a pairing.
///
/// The buffer travels inside the session: the reading socket hands it to
/// the peer, which writes it out and hands it back. Only the socket
/// currently holding the session can touch the buffer.
#[derive(Debug)]
pub struct Session {
    pub buffer: RelayBuffer,
    /// Socket the buffer contents are forwarded into.
    pub peer: Token,
    pub pairing: PairingId,
    pub flow: FlowSide,
}

impl Session {
    pub fn new(buffer: RelayBuffer, peer: Token, pairing: PairingId, flow: FlowSide) -> Self {
        Self {
            buffer,
            peer,
            pairing,
            flow,
        }
    }

    /// Move this session across the pairing. `from` is the socket giving
    /// it up, which becomes the next holder's peer.
    pub fn hand_off(self, from: Token) -> Self {
        Self {
            peer: from,
            ..self
        }
    }
}
