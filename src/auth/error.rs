//! Error taxonomy for the auth core.
//!
//! Store-level errors keep the precise reason so it can be logged. Before a result leaves
//! [`SessionService`](super::SessionService) the reasons are collapsed into [`AuthError`],
//! which is all a client ever sees.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error("user not found")]
    NotFound,
    #[error("credential store failure")]
    Backend(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("refresh token not found")]
    NotFound,
    #[error("refresh token expired")]
    Expired,
    #[error("refresh token already used")]
    AlreadyUsed,
    #[error("refresh token store failure")]
    Backend(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("username already exists")]
    DuplicateUsername,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("invalid access token")]
    InvalidAccessToken,
    #[error("forbidden")]
    Forbidden,
    #[error("internal failure")]
    Internal(#[source] anyhow::Error),
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::DuplicateUsername => Self::DuplicateUsername,
            // A missing user is indistinguishable from a wrong password.
            CredentialError::NotFound => Self::InvalidCredentials,
            CredentialError::Backend(source) => Self::Internal(source),
        }
    }
}

impl From<RefreshError> for AuthError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::NotFound | RefreshError::Expired | RefreshError::AlreadyUsed => {
                Self::InvalidRefreshToken
            }
            RefreshError::Backend(source) => Self::Internal(source),
        }
    }
}
