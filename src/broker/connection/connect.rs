//! CONNECT packet handling

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, trace};

use super::{Connection, ConnectionError, State};
use crate::codec::encode_connack;
use crate::protocol::{FixedHeader, Packet, PacketType, ProtocolError};

impl<R> Connection<R>
where
    R: AsyncRead + Unpin,
{
    /// Read and process the CONNECT packet
    ///
    /// Anything other than a decodable CONNECT ends the connection without a
    /// reply. The packet type is checked on the first byte, before any body
    /// is buffered.
    pub(crate) async fn read_connect(&mut self) -> Result<(), ConnectionError> {
        while self.read_buf.is_empty() {
            if self.reader.read_buf(&mut self.read_buf).await? == 0 {
                debug!("{} closed before CONNECT", self.client_id);
                return Err(ConnectionError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }
        }

        let header = FixedHeader::from_byte(self.read_buf[0]);
        if header.kind() != Some(PacketType::Connect) {
            debug!(
                "First packet from {} was type {}, not CONNECT",
                self.client_id, header.packet_type
            );
            return Err(ConnectionError::Protocol(ProtocolError::ProtocolViolation(
                "first packet must be CONNECT",
            )));
        }

        let packet = match self.read_packet().await? {
            Some(packet) => packet,
            None => {
                debug!("{} closed before CONNECT", self.client_id);
                return Err(ConnectionError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }
        };

        let Packet::Connect(connect) = packet else {
            return Err(ConnectionError::Protocol(ProtocolError::ProtocolViolation(
                "first packet must be CONNECT",
            )));
        };

        let flags = connect.flags();
        debug!(
            "CONNECT from {} (protocol: {} level {}, keep_alive: {}s, clean_session: {}, will: {}, username: {})",
            self.client_id,
            connect.protocol_name,
            connect.protocol_level,
            connect.keep_alive,
            flags.clean_session,
            flags.will,
            flags.username,
        );

        self.write_buf.clear();
        encode_connack(&mut self.write_buf);
        self.send_reply().await?;

        if let Some(previous) = self
            .registry
            .register(self.client_id.clone(), self.writer.clone())
        {
            debug!(
                "Replaced transport for {} (previous alive: {})",
                self.client_id,
                previous.is_alive()
            );
        }
        self.state = State::Established;

        info!("Client {} connected", self.client_id);
        trace!("Registered clients: {:?}", self.registry.list());
        Ok(())
    }
}
