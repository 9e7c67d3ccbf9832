//! Account validation.

use super::model::{AccountRecord, AuthType, Direction, Protocol, ServerProfile};

/// Validation error for account configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Email address is empty.
    EmptyEmail,
    /// Email address format is invalid.
    InvalidEmail,
    /// Server host is empty.
    EmptyHost(Direction),
    /// Server port is zero.
    InvalidPort(Direction),
    /// Username is empty.
    EmptyUsername(Direction),
    /// Password is empty.
    EmptySecret(Direction),
    /// Server protocol does not serve this direction.
    WrongProtocol(Direction),
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyEmail => "Email address is required",
            Self::InvalidEmail => "Invalid email address format",
            Self::EmptyHost(Direction::Incoming) => "Incoming server is required",
            Self::EmptyHost(Direction::Outgoing) => "Outgoing server is required",
            Self::InvalidPort(Direction::Incoming) => "Incoming port must be 1-65535",
            Self::InvalidPort(Direction::Outgoing) => "Outgoing port must be 1-65535",
            Self::EmptyUsername(Direction::Incoming) => "Incoming username is required",
            Self::EmptyUsername(Direction::Outgoing) => "Outgoing username is required",
            Self::EmptySecret(Direction::Incoming) => "Incoming password is required",
            Self::EmptySecret(Direction::Outgoing) => "Outgoing password is required",
            Self::WrongProtocol(Direction::Incoming) => "Incoming server must use IMAP or POP3",
            Self::WrongProtocol(Direction::Outgoing) => "Outgoing server must use SMTP",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyEmail | Self::InvalidEmail => "email",
            Self::EmptyHost(Direction::Incoming) => "store_host",
            Self::EmptyHost(Direction::Outgoing) => "transport_host",
            Self::InvalidPort(Direction::Incoming) => "store_port",
            Self::InvalidPort(Direction::Outgoing) => "transport_port",
            Self::EmptyUsername(Direction::Incoming) => "store_username",
            Self::EmptyUsername(Direction::Outgoing) => "transport_username",
            Self::EmptySecret(Direction::Incoming) => "store_secret",
            Self::EmptySecret(Direction::Outgoing) => "transport_secret",
            Self::WrongProtocol(Direction::Incoming) => "store_protocol",
            Self::WrongProtocol(Direction::Outgoing) => "transport_protocol",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating an account.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate an account configuration.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all errors.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_account(account: &AccountRecord) -> ValidationResult {
    let mut errors = Vec::new();

    if account.email().trim().is_empty() {
        errors.push(ValidationError::EmptyEmail);
    } else if !is_valid_email(account.email()) {
        errors.push(ValidationError::InvalidEmail);
    }

    validate_server(account.store(), Direction::Incoming, &mut errors);
    validate_server(account.transport(), Direction::Outgoing, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_server(
    profile: &ServerProfile,
    direction: Direction,
    errors: &mut Vec<ValidationError>,
) {
    let protocol_ok = match direction {
        Direction::Incoming => matches!(profile.protocol(), Protocol::Imap | Protocol::Pop3),
        Direction::Outgoing => profile.protocol() == Protocol::Smtp,
    };
    if !protocol_ok {
        errors.push(ValidationError::WrongProtocol(direction));
    }
    if profile.host().trim().is_empty() {
        errors.push(ValidationError::EmptyHost(direction));
    }
    if profile.port() == 0 {
        errors.push(ValidationError::InvalidPort(direction));
    }

    // Certificate identity replaces the username and password.
    if profile.auth_type() == AuthType::External {
        return;
    }
    if profile.username().trim().is_empty() {
        errors.push(ValidationError::EmptyUsername(direction));
    }
    if profile.secret().is_empty() {
        errors.push(ValidationError::EmptySecret(direction));
    }
}

/// Basic email validation.
pub(crate) fn is_valid_email(email: &str) -> bool {
    let email = email.trim();

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    // Domain must have at least two non-empty labels
    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}
