//! Session Management
//!
//! Owns the bearer-token lifecycle: acquire, persist, attach, invalidate.
//! Every other component is gated on the session holding a token.
//!
//! # Persistence
//!
//! The token survives restarts in a single slot behind the [`TokenStore`]
//! trait. [`FileTokenStore`] keeps it in one file (`ent_token` under the XDG
//! data directory by default); [`MemoryTokenStore`] keeps it in memory for
//! tests and kiosk runs that must not touch disk.
//!
//! # Failure Semantics
//!
//! - A rejected login leaves persisted state alone (nothing to clear yet).
//! - A rejected validation clears the slot and returns to unauthenticated.
//! - A network failure during validation keeps the token: the gateway could
//!   not confirm it, but a later attempt may.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{AuthError, ConsoleError, Result, StorageError};
use crate::gateway::{Gateway, UserProfile};

/// Opaque bearer credential
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a raw token string
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw token text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Authorization header value for a token
pub fn attach(token: &BearerToken) -> String {
    format!("Bearer {}", token.as_str())
}

// =============================================================================
// Token Slot
// =============================================================================

/// Durable single-slot storage for the session token
pub trait TokenStore: Send + Sync {
    /// Read the slot; `Ok(None)` when empty
    fn load(&self) -> std::result::Result<Option<BearerToken>, StorageError>;

    /// Replace the slot contents
    fn save(&self, token: &BearerToken) -> std::result::Result<(), StorageError>;

    /// Empty the slot
    fn clear(&self) -> std::result::Result<(), StorageError>;
}

/// Token slot backed by one file
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store the token at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Slot location
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> std::result::Result<Option<BearerToken>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let raw = contents.trim();
                Ok((!raw.is_empty()).then(|| BearerToken::new(raw)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&self, token: &BearerToken) -> std::result::Result<(), StorageError> {
        use std::io::Write;

        let write_err = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };

        // Directories that already exist keep their mode.
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                let mut builder = std::fs::DirBuilder::new();
                builder.recursive(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
                    builder.mode(0o700);
                    builder.create(parent).map_err(write_err)?;
                    std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700))
                        .map_err(write_err)?;
                }
                #[cfg(not(unix))]
                builder.create(parent).map_err(write_err)?;
            }
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(write_err)?;

        // `mode` only applies on creation; narrow a pre-existing file too.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }
        file.write_all(token.as_str().as_bytes()).map_err(write_err)?;
        Ok(())
    }

    fn clear(&self) -> std::result::Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// In-memory token slot
///
/// Clones share the slot, so a test can keep a handle and inspect what the
/// session persisted.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<BearerToken>>>,
}

impl MemoryTokenStore {
    /// Empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-populated with `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        *store.slot.lock() = Some(BearerToken::new(token));
        store
    }

    /// Current slot contents
    pub fn peek(&self) -> Option<BearerToken> {
        self.slot.lock().clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> std::result::Result<Option<BearerToken>, StorageError> {
        Ok(self.peek())
    }

    fn save(&self, token: &BearerToken) -> std::result::Result<(), StorageError> {
        *self.slot.lock() = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> std::result::Result<(), StorageError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

// =============================================================================
// Session Manager
// =============================================================================

/// Outcome of a token validation
#[derive(Debug)]
pub enum Validation {
    /// Token accepted; profile retrieved
    Valid(UserProfile),
    /// No token to validate
    NoToken,
    /// Token refused; the session has been cleared
    Invalid(AuthError),
    /// Gateway could not be asked; token kept
    Unreachable(ConsoleError),
}

/// Bearer-token lifecycle owner
pub struct SessionManager {
    gateway: Arc<dyn Gateway>,
    store: Box<dyn TokenStore>,
    token: Option<BearerToken>,
}

impl SessionManager {
    /// Create a session, restoring any persisted token
    ///
    /// An unreadable slot is logged and treated as empty.
    pub fn restore(gateway: Arc<dyn Gateway>, store: Box<dyn TokenStore>) -> Self {
        let token = match store.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Token slot unreadable, starting unauthenticated");
                None
            }
        };
        if token.is_some() {
            tracing::debug!("Restored persisted session token");
        }
        Self {
            gateway,
            store,
            token,
        }
    }

    /// Current token, if any
    pub fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    /// Whether a token is held
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Exchange credentials for a token and persist it
    ///
    /// A slot write failure is logged; the token is still held for this run.
    ///
    /// # Errors
    ///
    /// [`AuthError::Rejected`] with the server detail, or a transport error
    /// when the gateway is unreachable. Persisted state is untouched on error.
    pub async fn acquire_token(&mut self, username: &str, password: &str) -> Result<BearerToken> {
        let token = self.gateway.request_token(username, password).await?;

        if let Err(e) = self.store.save(&token) {
            tracing::warn!(error = %e, "Failed to persist session token");
        }
        self.token = Some(token.clone());
        tracing::info!(username, "Session token acquired");
        Ok(token)
    }

    /// Confirm the held token and fetch the profile
    pub async fn validate(&mut self) -> Validation {
        let Some(token) = self.token.clone() else {
            return Validation::NoToken;
        };

        match self.gateway.current_user(&token).await {
            Ok(profile) => {
                tracing::info!(username = %profile.username, role = %profile.role, "Session validated");
                Validation::Valid(profile)
            }
            Err(ConsoleError::Auth(reason)) => {
                tracing::info!(%reason, "Session token rejected");
                self.invalidate();
                Validation::Invalid(reason)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not confirm session token");
                Validation::Unreachable(e)
            }
        }
    }

    /// Drop the token from memory and from the slot
    pub fn invalidate(&mut self) {
        self.token = None;
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear token slot");
        }
    }
}
