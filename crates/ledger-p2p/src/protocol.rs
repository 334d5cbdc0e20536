use crate::error::ProtocolError;
use ledger_core::Block;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    QueryLatest = 0,
    QueryAll = 1,
    ResponseBlockchain = 2,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::QueryLatest),
            1 => Ok(MessageType::QueryAll),
            2 => Ok(MessageType::ResponseBlockchain),
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

/// Frame as it travels: `{"type": 0|1|2, "data": null | "<json block list>"}`.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: u8,
    data: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// Send me only your head block.
    QueryLatest,
    /// Send me your entire chain.
    QueryAll,
    /// One block or a whole chain, in index order.
    ResponseBlockchain(Vec<Block>),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::QueryLatest => MessageType::QueryLatest,
            Message::QueryAll => MessageType::QueryAll,
            Message::ResponseBlockchain(_) => MessageType::ResponseBlockchain,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let data = match self {
            Message::QueryLatest | Message::QueryAll => None,
            Message::ResponseBlockchain(blocks) => Some(serde_json::to_string(blocks)?),
        };
        let envelope = Envelope {
            kind: self.message_type() as u8,
            data,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(frame)?;
        match MessageType::try_from(envelope.kind)? {
            MessageType::QueryLatest => Ok(Message::QueryLatest),
            MessageType::QueryAll => Ok(Message::QueryAll),
            MessageType::ResponseBlockchain => {
                let payload = envelope.data.ok_or(ProtocolError::MissingPayload)?;
                let blocks: Vec<Block> = serde_json::from_str(&payload)?;
                if blocks.is_empty() {
                    return Err(ProtocolError::EmptyChain);
                }
                Ok(Message::ResponseBlockchain(blocks))
            }
        }
    }
}
