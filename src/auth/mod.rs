//! Token issuance, verification, and rotation.
//!
//! ## Access tokens
//!
//! Short-lived, self-contained, HMAC-SHA256 signed. Any instance holding the signing
//! secret can verify one without a store round-trip, which also means an access token
//! cannot be revoked before it expires. Keep the TTL short.
//!
//! ## Refresh tokens
//!
//! Opaque 256-bit random strings stored as SHA-256 hashes. They are single use: every
//! refresh consumes the presented token and returns a new one. Logins do not revoke
//! earlier refresh tokens, so each device holds its own rotation chain.

pub mod credentials;
pub mod error;
pub mod memory;
pub mod password;
pub mod refresh;
pub mod role;
pub mod session;
pub mod token;
mod utils;

pub use credentials::{CredentialStore, NewUser, PgCredentialStore, User};
pub use error::{AuthError, CredentialError, RefreshError};
pub use password::{Argon2Hasher, PasswordHasher};
pub use refresh::{spawn_refresh_token_sweeper, PgRefreshTokenStore, RefreshToken, RefreshTokenStore};
pub use role::Role;
pub use session::{SessionService, TokenPair};
pub use token::{AccessTokenCodec, Principal, TokenError};
pub use utils::unix_now;
