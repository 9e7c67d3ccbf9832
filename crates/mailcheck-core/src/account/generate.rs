//! Account generation from an email address and password.

use tracing::{debug, warn};

use super::model::{AccountRecord, Direction, ServerProfile};
use crate::Result;

/// Splits an email address into local-part and domain.
///
/// Never fails: a missing '@' yields an empty domain, and anything after a
/// second '@' is ignored.
#[must_use]
pub fn split_email(email: &str) -> (&str, &str) {
    let mut parts = email.split('@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    (local, domain)
}

/// Source of the display name given to generated accounts.
pub trait DefaultAccountName {
    /// Name of the current default account, if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn default_account_name(&self) -> Result<Option<String>>;
}

/// No existing accounts; generated accounts get an empty name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDefaultAccount;

impl DefaultAccountName for NoDefaultAccount {
    fn default_account_name(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

impl<F> DefaultAccountName for F
where
    F: Fn() -> Result<Option<String>>,
{
    fn default_account_name(&self) -> Result<Option<String>> {
        self()
    }
}

/// Builds new accounts with derived server defaults.
#[derive(Debug, Clone, Default)]
pub struct AccountGenerator<N = NoDefaultAccount> {
    names: N,
}

impl AccountGenerator {
    /// Creates a generator with no default account name.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            names: NoDefaultAccount,
        }
    }
}

impl<N: DefaultAccountName> AccountGenerator<N> {
    /// Creates a generator that names accounts after the default account.
    pub const fn with_names(names: N) -> Self {
        Self { names }
    }

    /// Generates an account for `email` with derived store and transport.
    ///
    /// The store is IMAP on `mail.<domain>:993` with implicit TLS, the
    /// transport SMTP on `smtp.<domain>:587` with STARTTLS.
    pub fn generate(&self, email: &str, password: &str) -> AccountRecord {
        let store = ServerProfile::derive(Direction::Incoming, email, password);
        let transport = ServerProfile::derive(Direction::Outgoing, email, password);
        debug!(
            "Generated servers {}:{} and {}:{}",
            store.host(),
            store.port(),
            transport.host(),
            transport.port()
        );

        AccountRecord::assemble(self.owner_name(), email.to_string(), store, transport)
    }

    fn owner_name(&self) -> String {
        match self.names.default_account_name() {
            Ok(name) => name.unwrap_or_default(),
            Err(e) => {
                warn!("Could not get default account name: {}", e);
                String::new()
            }
        }
    }
}
