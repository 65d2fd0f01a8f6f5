use crate::bridge::protocol::Request;
use serde_json::Value;
use std::sync::mpsc::{Receiver, SyncSender};

pub enum BridgeMsg {
    Connected,
    Disconnected,
    Request {
        request: Request,
        respond_to: SyncSender<Value>,
    },
}

/// Receiving end held by the loop that owns the game.
pub struct BridgeEndpoint {
    pub rx: Receiver<BridgeMsg>,
}
