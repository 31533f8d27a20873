//! Command-line command implementations (print to stdout)

pub mod account;
pub mod chats;
mod prompt;
pub mod users;

use crate::error::ServiceError;

/// The message a command exits with when a service call fails. The native
/// code and details only go to the log.
fn user_error(err: ServiceError) -> anyhow::Error {
    tracing::debug!(code = err.code(), "Service call failed: {}", err);
    anyhow::anyhow!(err.user_message())
}
