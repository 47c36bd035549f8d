//! Application identifier token.
//!
//! The API authenticates callers with an `app_identifier` query parameter:
//! the standard base64 encoding of `"<app_name>:<email>"`. It carries no
//! secret and is safe to log.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Builds the identifier token for the given application name and contact
/// email.
#[must_use]
pub fn app_identifier(app_name: &str, email: &str) -> String {
    STANDARD.encode(format!("{app_name}:{email}"))
}
