//! Peer synchronization for the ledger: wire protocol, connection registry,
//! fork reconciliation and the websocket transport that carries it.

pub mod error;
pub mod node;
pub mod peers;
pub mod protocol;
pub mod sync;
pub mod transport;

pub use error::{P2pError, ProtocolError};
pub use node::Node;
pub use peers::{ConnectionId, PeerRegistry, OUTBOUND_QUEUE_CAPACITY};
pub use protocol::{Message, MessageType};
pub use sync::{SyncOutcome, Synchronizer};
