//! MQTT Connection Handler
//!
//! One `Connection` per accepted stream runs the protocol state machine:
//!
//! ```text
//! AwaitingConnect --CONNECT--> Established --(error | EOF | 2nd CONNECT)--> Closed
//!        \----------(anything else, decode error, EOF)------------------------/
//! ```
//!
//! The connection holds no locks itself; shared state is reached through the
//! [`TopicTrie`] and [`ClientRegistry`] handles.

mod connect;
mod publish;
mod subscribe;

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::broker::{ClientRegistry, ClientWriter, SendError};
use crate::codec::{encode_pingresp, Decoder};
use crate::protocol::{DecodeError, Packet, ProtocolError};
use crate::topic::{ClientId, TopicTrie};

/// Connection error types
#[derive(Debug)]
pub enum ConnectionError {
    Io(std::io::Error),
    Protocol(ProtocolError),
    Decode(DecodeError),
    /// The outbound writer has stopped
    Write(SendError),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Io(e) => write!(f, "IO error: {}", e),
            ConnectionError::Protocol(e) => write!(f, "Protocol error: {}", e),
            ConnectionError::Decode(e) => write!(f, "Decode error: {}", e),
            ConnectionError::Write(e) => write!(f, "Write error: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e)
    }
}

impl From<DecodeError> for ConnectionError {
    fn from(e: DecodeError) -> Self {
        ConnectionError::Decode(e)
    }
}

impl From<SendError> for ConnectionError {
    fn from(e: SendError) -> Self {
        ConnectionError::Write(e)
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for CONNECT packet
    AwaitingConnect,
    /// CONNACK sent and client registered
    Established,
    /// Terminal
    Closed,
}

/// Connection handler - generic over the read half of the stream
pub struct Connection<R> {
    pub(crate) reader: R,
    pub(crate) client_id: ClientId,
    pub(crate) state: State,
    pub(crate) decoder: Decoder,
    pub(crate) read_buf: BytesMut,
    pub(crate) write_buf: BytesMut,
    /// Outbound handle for this connection's own transport
    pub(crate) writer: Arc<ClientWriter>,
    pub(crate) topics: Arc<TopicTrie>,
    pub(crate) registry: Arc<ClientRegistry>,
}

impl<R> Connection<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(
        reader: R,
        client_id: ClientId,
        writer: Arc<ClientWriter>,
        topics: Arc<TopicTrie>,
        registry: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            reader,
            client_id,
            state: State::AwaitingConnect,
            decoder: Decoder::new(),
            read_buf: BytesMut::with_capacity(4096),
            write_buf: BytesMut::with_capacity(256),
            writer,
            topics,
            registry,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Run the connection until it closes
    ///
    /// Returns `Ok(())` when an established client ends the stream cleanly,
    /// otherwise the reason the connection was dropped. Either way the state
    /// ends up `Closed` and the outbound writer is told to stop.
    pub async fn run(&mut self) -> Result<(), ConnectionError> {
        let result = self.run_until_closed().await;
        self.state = State::Closed;
        self.writer.close();
        result
    }

    async fn run_until_closed(&mut self) -> Result<(), ConnectionError> {
        self.read_connect().await?;

        loop {
            let Some(packet) = self.read_packet().await? else {
                debug!("Connection closed by {}", self.client_id);
                return Ok(());
            };
            self.handle_packet(packet).await?;
        }
    }

    /// Read the next complete packet, or `None` on a clean end of stream
    pub(crate) async fn read_packet(&mut self) -> Result<Option<Packet>, ConnectionError> {
        loop {
            if let Some((packet, consumed)) = self.decoder.decode(&self.read_buf)? {
                self.read_buf.advance(consumed);
                return Ok(Some(packet));
            }

            let n = self.reader.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                if self.read_buf.is_empty() {
                    return Ok(None);
                }
                // Stream ended partway through a packet
                return Err(ConnectionError::Decode(DecodeError::InsufficientData));
            }
        }
    }

    /// Handle an incoming packet once established
    async fn handle_packet(&mut self, packet: Packet) -> Result<(), ConnectionError> {
        match packet {
            Packet::Connect(_) => {
                warn!("Second CONNECT from {}", self.client_id);
                Err(ConnectionError::Protocol(ProtocolError::ProtocolViolation(
                    "duplicate CONNECT",
                )))
            }
            Packet::Publish(publish) => self.handle_publish(publish),
            Packet::Subscribe(subscribe) => self.handle_subscribe(subscribe).await,
            Packet::PingReq => {
                debug!("PINGREQ from {}", self.client_id);
                self.write_buf.clear();
                encode_pingresp(&mut self.write_buf);
                self.send_reply().await
            }
            Packet::Unknown { packet_type, flags } => {
                warn!(
                    "Unsupported packet type {} (flags {:#x}) from {}, ignoring",
                    packet_type, flags, self.client_id
                );
                Ok(())
            }
        }
    }

    /// Queue the contents of `write_buf` on this connection's writer
    pub(crate) async fn send_reply(&mut self) -> Result<(), ConnectionError> {
        let bytes: Bytes = self.write_buf.split().freeze();
        self.writer.send(bytes).await?;
        Ok(())
    }
}

impl<R> Drop for Connection<R> {
    fn drop(&mut self) {
        // Also covers a session task cancelled at shutdown
        self.writer.close();
    }
}
