mod confirm_ack;
mod confirm_req;
mod message;
mod publish;

pub use confirm_ack::ConfirmAck;
pub use confirm_req::ConfirmReq;
pub use message::{Message, MessageType};
pub use publish::Publish;
