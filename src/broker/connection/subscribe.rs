//! SUBSCRIBE packet handling

use tokio::io::AsyncRead;
use tracing::{debug, trace, warn};

use super::{Connection, ConnectionError};
use crate::codec::encode_suback;
use crate::protocol::{ProtocolError, SubAck, Subscribe};
use crate::topic::validate_topic_filter;

impl<R> Connection<R>
where
    R: AsyncRead + Unpin,
{
    /// Handle SUBSCRIBE packet
    ///
    /// Registers the first filter for this client and acknowledges it with a
    /// single success code. Further filter entries in the same packet are not
    /// read.
    pub(crate) async fn handle_subscribe(
        &mut self,
        subscribe: Subscribe,
    ) -> Result<(), ConnectionError> {
        if let Err(reason) = validate_topic_filter(&subscribe.filter) {
            warn!(
                "Filter {:?} from {}: {}; levels after '#' are ignored",
                subscribe.filter, self.client_id, reason
            );
        }

        let added = self
            .topics
            .add(&subscribe.filter, self.client_id.clone());
        debug!(
            "SUBSCRIBE from {} to {} (packet_id: {}, requested QoS: {}, new: {})",
            self.client_id, subscribe.filter, subscribe.packet_id, subscribe.requested_qos, added
        );
        trace!(
            "Topic trie: {} nodes, {} subscriptions",
            self.topics.node_count(),
            self.topics.subscription_count()
        );

        self.write_buf.clear();
        encode_suback(&SubAck::success(subscribe.packet_id), &mut self.write_buf)
            .map_err(|e| ConnectionError::Protocol(ProtocolError::Encode(e)))?;
        self.send_reply().await
    }
}
