//! Session lifecycle: stored credentials, token parsing and the
//! login / refresh / logout / status operations.

pub mod credentials;
pub mod manager;
pub mod tokens;

pub use credentials::{CredentialMode, CredentialStore, Credentials, FileCredentialStore};
pub use manager::{
    Clock, DEFAULT_REFRESH_MARGIN_SECS, LogoutOutcome, RefreshPolicy, RefreshRotation, SessionManager,
    SessionStatus, SystemClock,
};
pub use tokens::IssuedTokens;
