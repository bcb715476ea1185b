//! Client-credentials token acquisition

use super::api::RacetimeClient;
use crate::error::{BotError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Token endpoint, relative to the service base URL
pub const TOKEN_PATH: &str = "o/token";

/// Credentials issued to a registered bot application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Raw token response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSet {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

/// A token that passed validation and can authorize a realtime connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    token: String,
    expires_in: u64,
    scope: String,
}

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl TryFrom<TokenSet> for AccessToken {
    type Error = BotError;

    fn try_from(set: TokenSet) -> std::result::Result<Self, Self::Error> {
        if set.access_token.trim().is_empty() {
            return Err(BotError::TokenDecode {
                reason: "response carried no access_token".to_string(),
            });
        }
        if !set.token_type.eq_ignore_ascii_case("bearer") {
            return Err(BotError::TokenDecode {
                reason: format!("unexpected token_type {:?}", set.token_type),
            });
        }

        Ok(Self {
            token: set.access_token,
            expires_in: set.expires_in,
            scope: set.scope,
        })
    }
}

/// Decode and validate a token endpoint body
pub fn decode_token(body: &str) -> std::result::Result<AccessToken, BotError> {
    let set: TokenSet = serde_json::from_str(body).map_err(|e| BotError::TokenDecode {
        reason: e.to_string(),
    })?;
    AccessToken::try_from(set)
}

impl RacetimeClient {
    /// Exchange bot credentials for an access token
    pub async fn authorize(&self, credentials: &ClientCredentials) -> Result<AccessToken> {
        let url = format!("{}/{}", self.base_url(), TOKEN_PATH);
        let form = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .http()
            .post(&url)
            .form(&form)
            .send()
            .await
            .with_context(|| format!("token request to {} failed", url))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| BotError::TokenDecode {
            reason: format!("failed to read token response: {}", e),
        })?;

        if !status.is_success() {
            return Err(BotError::TokenDecode {
                reason: format!("token endpoint returned HTTP {}", status),
            }
            .into());
        }

        let token = decode_token(&body)?;
        info!(
            expires_in = token.expires_in(),
            scope = %token.scope(),
            "Obtained race service access token"
        );
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_token() {
        let body = r#"{"access_token": "abc123", "expires_in": 36000, "token_type": "Bearer", "scope": "read chat_message race_action"}"#;
        let token = decode_token(body).unwrap();
        assert_eq!(token.as_str(), "abc123");
        assert_eq!(token.expires_in(), 36000);
        assert_eq!(token.scope(), "read chat_message race_action");
    }

    #[test]
    fn test_missing_access_token_is_rejected() {
        let err = decode_token(r#"{"token_type": "Bearer"}"#).unwrap_err();
        assert!(matches!(err, BotError::TokenDecode { .. }));
    }

    #[test]
    fn test_non_bearer_token_is_rejected() {
        let err = decode_token(r#"{"access_token": "abc", "token_type": "mac"}"#).unwrap_err();
        assert!(err.to_string().contains("mac"));
    }

    #[test]
    fn test_error_body_is_rejected() {
        let err = decode_token(r#"{"error": "invalid_client"}"#).unwrap_err();
        assert!(matches!(err, BotError::TokenDecode { .. }));

        assert!(decode_token("not json").is_err());
    }
}
