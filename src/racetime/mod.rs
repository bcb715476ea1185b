//! Race-tracking service integration
//!
//! REST access to category and race data, bot token acquisition and the
//! realtime race room chat relay.

pub mod api;
pub mod auth;
pub mod frames;
pub mod relay;

pub use api::{RaceSource, RacetimeClient};
pub use auth::{AccessToken, ClientCredentials, TokenSet};
pub use frames::{FrameKind, InboundFrame, OutboundFrame, RoomChatMessage};
pub use relay::{ChatRelay, RelayConfig, RelayHandle, RelayPolicy};

/// Realtime origin for a service URL: `ws` for plain http, `wss` otherwise
pub fn websocket_base(http_url: &str) -> String {
    let trimmed = http_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else {
        format!("wss://{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_base() {
        assert_eq!(websocket_base("https://racetime.gg"), "wss://racetime.gg");
        assert_eq!(websocket_base("http://localhost:8000/"), "ws://localhost:8000");
        assert_eq!(websocket_base("racetime.gg"), "wss://racetime.gg");
    }
}
