// obs-websocket v5: message codec and the live WebSocket session.

pub mod protocol;
pub mod session;

pub use protocol::{EVENT_SUBSCRIPTION_ALL, ObsEvent};
pub use session::{ObsSession, WebSocketConnector};
