use axum::Router;

pub mod fetcher;
pub mod twilio;
pub mod twiml;

pub use fetcher::{HttpMediaFetcher, MediaCredentials};
pub use twilio::{TwilioAdapter, TwilioConfig, parse_inbound};
pub use twiml::{ReplySettings, escape_xml, render_reply, reply_text};

/// All channel adapters implement this trait.
pub trait ChannelAdapter: Send + Sync {
    /// Human-readable adapter name for logging.
    fn name(&self) -> &str;

    /// Build the Axum sub-router for the adapter's inbound webhook endpoints.
    fn build_router(&self) -> Router {
        Router::new()
    }
}
