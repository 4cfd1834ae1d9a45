use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque bearer sessions. A token is issued on successful code
/// verification and resolved by every authenticated route. Credential
/// handling beyond this (passwords, federated identity) lives outside
/// this service.
#[derive(Default)]
pub struct Sessions {
    tokens: RwLock<HashMap<String, String>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issue(&self, username: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens
            .write()
            .await
            .insert(token.clone(), username.to_string());
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<String> {
        self.tokens.read().await.get(token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_tokens_resolve_to_their_user() {
        let sessions = Sessions::new();
        let token = sessions.issue("alice").await;

        assert_eq!(sessions.resolve(&token).await.as_deref(), Some("alice"));
        assert_eq!(sessions.resolve("not-a-token").await, None);
    }
}
