//! Realtime channel: per-user private channel over the Pusher protocol.

pub mod client;
pub mod event;
pub mod fake;
pub mod protocol;
pub mod pusher;
pub mod state;
pub mod transport;
pub mod types;

pub use client::RealtimeChannel;
pub use event::RealtimeEvent;
pub use pusher::PusherTransport;
pub use state::ConnectionState;
pub use transport::{ChannelRequest, RealtimeTransport, TransportFrame, TransportSession};
pub use types::{ChannelName, EventName};
