//! Error types for the race bot
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific bot scenarios
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("No broadcaster registered for chat room {room_id} ({channel})")]
    BroadcasterNotFound { room_id: String, channel: String },

    #[error("Race fetch failed for category {category}: {message}")]
    RaceFetchFailed { category: String, message: String },

    #[error("Access token could not be decoded: {reason}")]
    TokenDecode { reason: String },

    #[error("WebSocket error: {message}")]
    WebSocket { message: String },

    #[error("Chat client error: {message}")]
    ChatClient { message: String },

    #[error("Broadcaster store error: {message}")]
    Store { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
