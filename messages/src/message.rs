use crate::{ConfirmAck, ConfirmReq, Publish};
use std::fmt::Display;

/// Closed set of realtime messages the consensus core exchanges with
/// the network. Wire framing, header extensions and signature checks
/// live in the transport layer; these are already-deserialized values.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum Message {
    Publish(Publish),
    ConfirmReq(ConfirmReq),
    ConfirmAck(ConfirmAck),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    Publish,
    ConfirmReq,
    ConfirmAck,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Publish(_) => MessageType::Publish,
            Message::ConfirmReq(_) => MessageType::ConfirmReq,
            Message::ConfirmAck(_) => MessageType::ConfirmAck,
        }
    }
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Publish => "publish",
            MessageType::ConfirmReq => "confirm_req",
            MessageType::ConfirmAck => "confirm_ack",
        }
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
