use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::schema::Message;

pub const CODE_TTL_MINUTES: i64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Username is already taken")]
    UsernameTaken,
    #[error("User already exists with this email")]
    EmailTaken,
    #[error("User not found")]
    UserNotFound,
    #[error("User is not accepting messages")]
    NotAcceptingMessages,
    #[error("Incorrect verification code")]
    CodeMismatch,
    #[error("Verification code has expired. Please sign up again to get a new code.")]
    CodeExpired,
    #[error("Account is already verified")]
    AlreadyVerified,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub verify_code: String,
    pub verify_code_expiry: DateTime<Utc>,
    pub is_verified: bool,
    pub is_accepting_messages: bool,
    pub messages: Vec<Message>,
}

/// In-memory user and message store, keyed by username. Persistence is a
/// deployment concern outside this service's scope; everything the rest of
/// the code needs goes through this boundary.
#[derive(Default)]
pub struct MessageStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Six random digits from a v4 uuid, same 100000..=999999 range the
    // verification mails have always used.
    fn issue_code() -> (String, DateTime<Utc>) {
        let code = 100_000 + (Uuid::new_v4().as_u128() % 900_000) as u32;
        (
            code.to_string(),
            Utc::now() + Duration::minutes(CODE_TTL_MINUTES),
        )
    }

    /// Registers (or re-registers an unverified) account and returns the
    /// fresh verification code. Verified accounts keep their username and
    /// email exclusively; unverified ones are overwritten in place.
    pub async fn register(&self, username: &str, email: &str) -> Result<String, StoreError> {
        let mut users = self.users.write().await;

        if users.get(username).is_some_and(|u| u.is_verified) {
            return Err(StoreError::UsernameTaken);
        }
        if users.values().any(|u| u.email == email && u.is_verified) {
            return Err(StoreError::EmailTaken);
        }

        // An unverified claim on this email moves to the new username.
        users.retain(|_, u| u.is_verified || u.email != email);

        let (code, expiry) = Self::issue_code();
        let messages = users
            .remove(username)
            .map(|u| u.messages)
            .unwrap_or_default();

        users.insert(
            username.to_string(),
            UserRecord {
                id: Uuid::new_v4().to_string(),
                username: username.to_string(),
                email: email.to_string(),
                verify_code: code.clone(),
                verify_code_expiry: expiry,
                is_verified: false,
                is_accepting_messages: true,
                messages,
            },
        );

        info!(username, "Registered account pending verification");
        Ok(code)
    }

    /// Re-issues the verification code for an unverified account. Returns
    /// the email on file together with the new code.
    pub async fn refresh_code(&self, username: &str) -> Result<(String, String), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(username).ok_or(StoreError::UserNotFound)?;

        if user.is_verified {
            return Err(StoreError::AlreadyVerified);
        }

        let (code, expiry) = Self::issue_code();
        user.verify_code = code.clone();
        user.verify_code_expiry = expiry;
        Ok((user.email.clone(), code))
    }

    pub async fn verify_code(&self, username: &str, code: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(username).ok_or(StoreError::UserNotFound)?;

        let matches = user.verify_code == code;
        let expired = user.verify_code_expiry <= Utc::now();

        if matches && !expired {
            user.is_verified = true;
            info!(username, "Account verified");
            Ok(())
        } else if expired {
            Err(StoreError::CodeExpired)
        } else {
            Err(StoreError::CodeMismatch)
        }
    }

    pub async fn add_message(&self, username: &str, message: Message) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(username).ok_or(StoreError::UserNotFound)?;

        if !user.is_accepting_messages {
            return Err(StoreError::NotAcceptingMessages);
        }

        user.messages.push(message);
        Ok(())
    }

    /// The retrieval pipeline's adapter contract: the user's messages,
    /// newest first.
    pub async fn load_messages(&self, username: &str) -> Result<Vec<Message>, StoreError> {
        let users = self.users.read().await;
        let user = users.get(username).ok_or(StoreError::UserNotFound)?;

        let mut messages = user.messages.clone();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }

    pub async fn set_accepting(&self, username: &str, accepting: bool) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(username).ok_or(StoreError::UserNotFound)?;
        user.is_accepting_messages = accepting;
        Ok(())
    }

    pub async fn is_accepting(&self, username: &str) -> Result<bool, StoreError> {
        let users = self.users.read().await;
        let user = users.get(username).ok_or(StoreError::UserNotFound)?;
        Ok(user.is_accepting_messages)
    }
}
