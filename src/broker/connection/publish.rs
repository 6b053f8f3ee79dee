//! PUBLISH packet handling and message routing

use bytes::BytesMut;
use tokio::io::AsyncRead;
use tracing::{debug, trace, warn};

use super::{Connection, ConnectionError};
use crate::broker::SendError;
use crate::codec::encode_publish;
use crate::protocol::{ProtocolError, Publish};

impl<R> Connection<R>
where
    R: AsyncRead + Unpin,
{
    /// Handle PUBLISH packet
    ///
    /// The message is encoded once and queued on every matched subscriber's
    /// writer. Delivery is at-most-once: no acknowledgement is sent, and a
    /// subscriber that is unregistered, closed or backed up is skipped
    /// without affecting the others.
    pub(crate) fn handle_publish(&mut self, publish: Publish) -> Result<(), ConnectionError> {
        trace!(
            "PUBLISH from {} to {} ({} bytes, requested QoS {:?})",
            self.client_id,
            publish.topic,
            publish.payload.len(),
            publish.qos
        );

        let subscribers = self.topics.matches(&publish.topic);
        if subscribers.is_empty() {
            return Ok(());
        }

        let mut buf = BytesMut::new();
        encode_publish(&publish.topic, &publish.payload, &mut buf)
            .map_err(|e| ConnectionError::Protocol(ProtocolError::Encode(e)))?;
        let bytes = buf.freeze();

        let mut delivered = 0usize;
        for client_id in &subscribers {
            let Some(writer) = self.registry.lookup(client_id) else {
                debug!("No transport registered for subscriber {}", client_id);
                continue;
            };

            match writer.try_send(bytes.clone()) {
                Ok(()) => delivered += 1,
                Err(SendError::QueueFull) => {
                    warn!(
                        "Outbound queue full for {}, dropping message on {}",
                        client_id, publish.topic
                    );
                }
                Err(SendError::Closed) => {
                    debug!("Subscriber {} is closed, skipping", client_id);
                }
            }
        }

        debug!(
            "Routed {} from {} to {}/{} subscribers",
            publish.topic,
            self.client_id,
            delivered,
            subscribers.len()
        );
        Ok(())
    }
}
