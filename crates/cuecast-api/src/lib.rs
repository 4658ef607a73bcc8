// cuecast-api: Async Rust clients for obs-websocket v5 and Streamer.bot

pub mod error;
pub mod obs;
mod rpc;
pub mod streamerbot;
pub mod transport;

pub use error::Error;
pub use obs::{ObsEvent, WebSocketConnector};
pub use streamerbot::{StreamerBotClient, StreamerBotConfig, StreamerBotEvent};
pub use transport::{CloseReason, ConnectTarget, Connector, Session};
