use thiserror::Error;

/// Fatal input problems. These are never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("session is missing the `sessionid` cookie")]
    MissingSessionId,
    #[error("session is missing the numeric user id (`ds_user_id`)")]
    MissingUserId,
    #[error("session is missing the app id")]
    MissingAppId,
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("account identity must not be empty")]
    EmptyAccount,
}
