//! smolboy DNS
//!
//! A minimal authoritative DNS responder. Answers A queries over UDP from a
//! static record file and keeps a live terminal view of recent resolutions.

pub mod config;
pub mod errors;
pub mod event;
pub mod handlers;
pub mod live_view;
pub mod responder;
pub mod store;
pub mod telemetry;
pub mod wire;

// Re-export commonly used items
pub use config::ServerConfig;
pub use errors::DnsError;
pub use event::{event_channel, EventReceiver, EventSender, QueryEvent};
pub use live_view::LiveView;
pub use responder::Responder;
pub use store::RecordStore;
