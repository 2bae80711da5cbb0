//! Authentication Material and Interactive Login
//!
//! Opaque credential types shared between the session manager and the
//! remote backend, plus the contract for the host-provided login prompt.
//!
//! ## Security
//!
//! - Plaintext passwords never leave [`Credentials::derive`]
//! - `Debug` output of both types redacts the secret parts

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Long-lived authentication material derived from a username/password pair.
///
/// Immutable once created; a re-authentication replaces the whole value.
///
/// # Examples
///
/// ```
/// use bridge_traits::auth::Credentials;
///
/// let credentials = Credentials::derive("User@Example.com", "hunter2");
/// assert_eq!(credentials.email(), "user@example.com");
/// assert_ne!(credentials.password_key(), "hunter2");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    email: String,
    password_key: String,
}

impl Credentials {
    /// Derive credentials from an email and a plaintext password.
    ///
    /// The email is normalised to lowercase and used as the salt of a SHA-256
    /// digest over the password. Only the digest is retained.
    pub fn derive(email: &str, password: &str) -> Self {
        let email = email.trim().to_lowercase();

        let mut hasher = Sha256::new();
        hasher.update(email.as_bytes());
        hasher.update([0u8]);
        hasher.update(password.as_bytes());
        let password_key = STANDARD.encode(hasher.finalize());

        Self {
            email,
            password_key,
        }
    }

    /// Rebuild credentials from previously derived parts.
    pub fn from_parts(email: impl Into<String>, password_key: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_key: password_key.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_key(&self) -> &str {
        &self.password_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password_key", &"[REDACTED]")
            .finish()
    }
}

/// Short-lived proof of an authenticated session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

/// Result of an interactive login prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    /// The user supplied new credentials.
    ///
    /// `token` is `None` when the user chose anonymous access.
    Authenticated {
        credentials: Credentials,
        token: Option<SessionToken>,
    },
    /// The user dismissed the prompt.
    Cancelled,
}

/// Interactive login collaborator
///
/// Implemented by the host UI. Given an email hint, asks the user to log in
/// (or to continue anonymously) and returns the resulting material.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::auth::{LoginPrompt, PromptOutcome};
///
/// async fn ask(prompt: &dyn LoginPrompt, cancel: CancellationToken) -> Result<()> {
///     match prompt.prompt(Some("user@example.com"), cancel).await? {
///         PromptOutcome::Authenticated { credentials, .. } => println!("{}", credentials.email()),
///         PromptOutcome::Cancelled => println!("dismissed"),
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait LoginPrompt: Send + Sync {
    async fn prompt(
        &self,
        email_hint: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<PromptOutcome>;
}
