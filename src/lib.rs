//! tinymq - minimal MQTT broker
//!
//! Accepts TCP clients speaking a subset of MQTT 3.1.1 (CONNECT, SUBSCRIBE,
//! PUBLISH, PINGREQ), keeps a wildcard-aware subscription trie and fans
//! published messages out to every matching client at QoS 0.

pub mod broker;
pub mod codec;
pub mod config;
pub mod protocol;
pub mod topic;

pub use broker::{Broker, BrokerConfig, ClientRegistry, ClientWriter, Connection};
pub use config::Config;
pub use protocol::{Packet, QoS};
pub use topic::{ClientId, TopicTrie};
