//! Account model types.

use serde::{Deserialize, Serialize};

use super::generate::split_email;
use super::trust::TrustedCertificates;
use super::validation::ValidationError;

/// Which side of the account a server serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Retrieval (IMAP, POP3).
    Incoming,
    /// Sending (SMTP).
    Outgoing,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incoming => write!(f, "incoming"),
            Self::Outgoing => write!(f, "outgoing"),
        }
    }
}

/// Mail protocol spoken by a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// IMAP retrieval.
    Imap,
    /// POP3 retrieval.
    Pop3,
    /// SMTP submission.
    Smtp,
}

impl Protocol {
    /// Direction this protocol serves.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Imap | Self::Pop3 => Direction::Incoming,
            Self::Smtp => Direction::Outgoing,
        }
    }

    /// Returns true for protocols without server-side special folders.
    #[must_use]
    pub const fn is_pop3_like(self) -> bool {
        matches!(self, Self::Pop3)
    }

    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(self, security: Security) -> u16 {
        match (self, security) {
            (Self::Imap, Security::SslTlsRequired) => 993,
            (Self::Imap, Security::None | Security::StartTlsRequired) => 143,
            (Self::Pop3, Security::SslTlsRequired) => 995,
            (Self::Pop3, Security::None | Security::StartTlsRequired) => 110,
            (Self::Smtp, Security::SslTlsRequired) => 465,
            (Self::Smtp, Security::StartTlsRequired) => 587,
            (Self::Smtp, Security::None) => 25,
        }
    }
}

/// Security/encryption mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// STARTTLS upgrade after plaintext connect; failure to upgrade is fatal.
    StartTlsRequired,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    SslTlsRequired,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::StartTlsRequired => "STARTTLS",
            Self::SslTlsRequired => "SSL/TLS",
        }
    }
}

/// Authentication method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthType {
    /// Cleartext username and password (PLAIN / LOGIN command).
    #[default]
    Plain,
    /// SASL LOGIN challenges.
    Login,
    /// Identity from a TLS client certificate.
    External,
}

/// Immutable description of one server endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProfile {
    protocol: Protocol,
    host: String,
    port: u16,
    security: Security,
    auth_type: AuthType,
    username: String,
    #[serde(skip_serializing, default)]
    secret: String,
    client_certificate_alias: Option<String>,
}

impl ServerProfile {
    /// Creates a profile from explicit fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is blank or the port is zero.
    pub fn new(
        protocol: Protocol,
        host: impl Into<String>,
        port: u16,
        security: Security,
        auth_type: AuthType,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let host = host.into();
        let direction = protocol.direction();
        if host.trim().is_empty() {
            return Err(ValidationError::EmptyHost(direction));
        }
        if port == 0 {
            return Err(ValidationError::InvalidPort(direction));
        }

        Ok(Self {
            protocol,
            host,
            port,
            security,
            auth_type,
            username: username.into(),
            secret: secret.into(),
            client_certificate_alias: None,
        })
    }

    /// Derives the default profile for `direction` from an email address.
    ///
    /// Incoming: IMAP on `mail.<domain>:993` with implicit TLS.
    /// Outgoing: SMTP on `smtp.<domain>:587` with STARTTLS.
    #[must_use]
    pub fn derive(direction: Direction, email: &str, password: &str) -> Self {
        let (local_part, domain) = split_email(email);
        let (protocol, prefix, security) = match direction {
            Direction::Incoming => (Protocol::Imap, "mail", Security::SslTlsRequired),
            Direction::Outgoing => (Protocol::Smtp, "smtp", Security::StartTlsRequired),
        };

        Self {
            protocol,
            host: format!("{prefix}.{domain}"),
            port: protocol.default_port(security),
            security,
            auth_type: AuthType::Plain,
            username: local_part.to_string(),
            secret: password.to_string(),
            client_certificate_alias: None,
        }
    }

    /// Returns a copy that authenticates with the given client certificate.
    #[must_use]
    pub fn with_client_certificate(mut self, alias: impl Into<String>) -> Self {
        self.client_certificate_alias = Some(alias.into());
        self
    }

    /// Protocol.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Server hostname.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Security mode.
    #[must_use]
    pub const fn security(&self) -> Security {
        self.security
    }

    /// Authentication method.
    #[must_use]
    pub const fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    /// Login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password or token.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Client certificate alias.
    #[must_use]
    pub fn client_certificate_alias(&self) -> Option<&str> {
        self.client_certificate_alias.as_deref()
    }
}

impl std::fmt::Debug for ServerProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerProfile")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("auth_type", &self.auth_type)
            .field("username", &self.username)
            .field("client_certificate_alias", &self.client_certificate_alias)
            .finish_non_exhaustive()
    }
}

/// Identifiers of the account's well-known local folders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialFolders {
    /// Outbox (always local).
    pub outbox: Option<String>,
    /// Drafts.
    pub drafts: Option<String>,
    /// Sent mail.
    pub sent: Option<String>,
    /// Trash.
    pub trash: Option<String>,
}

/// Email account under verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    uuid: String,
    name: String,
    email: String,
    description: Option<String>,
    enabled: bool,
    store: ServerProfile,
    transport: ServerProfile,
    trusted: TrustedCertificates,
    folders: SpecialFolders,
}

impl AccountRecord {
    /// Creates an account from its two server profiles.
    ///
    /// # Errors
    ///
    /// Returns an error if `store` is not an incoming protocol or
    /// `transport` is not an outgoing one.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        store: ServerProfile,
        transport: ServerProfile,
    ) -> Result<Self, ValidationError> {
        check_direction(&store, Direction::Incoming)?;
        check_direction(&transport, Direction::Outgoing)?;
        Ok(Self::assemble(name.into(), email.into(), store, transport))
    }

    /// Builds a record from profiles already known to be well-directed.
    pub(super) fn assemble(
        name: String,
        email: String,
        store: ServerProfile,
        transport: ServerProfile,
    ) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            description: None,
            enabled: false,
            store,
            transport,
            trusted: TrustedCertificates::default(),
            folders: SpecialFolders::default(),
        }
    }

    /// Stable identifier keying the account's local data.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Sets the email address.
    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    /// Description, set once verification fully succeeds.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Sets the description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Whether background services run for this account.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables background services.
    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Retrieval server.
    #[must_use]
    pub const fn store(&self) -> &ServerProfile {
        &self.store
    }

    /// Replaces the retrieval server.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is not an incoming protocol.
    pub fn set_store(&mut self, store: ServerProfile) -> Result<(), ValidationError> {
        check_direction(&store, Direction::Incoming)?;
        self.store = store;
        Ok(())
    }

    /// Sending server.
    #[must_use]
    pub const fn transport(&self) -> &ServerProfile {
        &self.transport
    }

    /// Replaces the sending server.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is not SMTP.
    pub fn set_transport(&mut self, transport: ServerProfile) -> Result<(), ValidationError> {
        check_direction(&transport, Direction::Outgoing)?;
        self.transport = transport;
        Ok(())
    }

    /// Server profile for a direction.
    #[must_use]
    pub const fn server(&self, direction: Direction) -> &ServerProfile {
        match direction {
            Direction::Incoming => &self.store,
            Direction::Outgoing => &self.transport,
        }
    }

    /// Explicitly accepted server certificates.
    #[must_use]
    pub const fn trusted_certificates(&self) -> &TrustedCertificates {
        &self.trusted
    }

    /// Mutable access to the accepted certificates.
    pub const fn trusted_certificates_mut(&mut self) -> &mut TrustedCertificates {
        &mut self.trusted
    }

    /// Special folder identifiers.
    #[must_use]
    pub const fn special_folders(&self) -> &SpecialFolders {
        &self.folders
    }

    /// Mutable access to the special folder identifiers.
    pub const fn special_folders_mut(&mut self) -> &mut SpecialFolders {
        &mut self.folders
    }
}

fn check_direction(profile: &ServerProfile, expected: Direction) -> Result<(), ValidationError> {
    if profile.protocol().direction() == expected {
        Ok(())
    } else {
        Err(ValidationError::WrongProtocol(expected))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn imap() -> ServerProfile {
        ServerProfile::new(
            Protocol::Imap,
            "imap.example.com",
            993,
            Security::SslTlsRequired,
            AuthType::Plain,
            "user",
            "secret",
        )
        .unwrap()
    }

    fn smtp() -> ServerProfile {
        ServerProfile::new(
            Protocol::Smtp,
            "smtp.example.com",
            587,
            Security::StartTlsRequired,
            AuthType::Plain,
            "user",
            "secret",
        )
        .unwrap()
    }

    mod protocol_tests {
        use super::*;

        #[test]
        fn directions() {
            assert_eq!(Protocol::Imap.direction(), Direction::Incoming);
            assert_eq!(Protocol::Pop3.direction(), Direction::Incoming);
            assert_eq!(Protocol::Smtp.direction(), Direction::Outgoing);
        }

        #[test]
        fn default_ports() {
            assert_eq!(Protocol::Imap.default_port(Security::SslTlsRequired), 993);
            assert_eq!(Protocol::Imap.default_port(Security::StartTlsRequired), 143);
            assert_eq!(Protocol::Pop3.default_port(Security::SslTlsRequired), 995);
            assert_eq!(Protocol::Pop3.default_port(Security::None), 110);
            assert_eq!(Protocol::Smtp.default_port(Security::StartTlsRequired), 587);
            assert_eq!(Protocol::Smtp.default_port(Security::SslTlsRequired), 465);
            assert_eq!(Protocol::Smtp.default_port(Security::None), 25);
        }

        #[test]
        fn only_pop3_is_pop3_like() {
            assert!(Protocol::Pop3.is_pop3_like());
            assert!(!Protocol::Imap.is_pop3_like());
            assert!(!Protocol::Smtp.is_pop3_like());
        }
    }

    mod security_tests {
        use super::*;

        #[test]
        fn default_is_ssl_tls() {
            assert_eq!(Security::default(), Security::SslTlsRequired);
        }

        #[test]
        fn display_names() {
            assert_eq!(Security::None.display_name(), "None (insecure)");
            assert_eq!(Security::SslTlsRequired.display_name(), "SSL/TLS");
            assert_eq!(Security::StartTlsRequired.display_name(), "STARTTLS");
        }
    }

    mod server_profile_tests {
        use super::*;

        #[test]
        fn rejects_blank_host() {
            let err = ServerProfile::new(
                Protocol::Imap,
                "  ",
                993,
                Security::SslTlsRequired,
                AuthType::Plain,
                "u",
                "p",
            )
            .unwrap_err();
            assert_eq!(err, ValidationError::EmptyHost(Direction::Incoming));
        }

        #[test]
        fn rejects_port_zero() {
            let err = ServerProfile::new(
                Protocol::Smtp,
                "smtp.example.com",
                0,
                Security::None,
                AuthType::Plain,
                "u",
                "p",
            )
            .unwrap_err();
            assert_eq!(err, ValidationError::InvalidPort(Direction::Outgoing));
        }

        #[test]
        fn client_certificate_returns_new_value() {
            let original = imap();
            let with_cert = original.clone().with_client_certificate("work");
            assert_eq!(original.client_certificate_alias(), None);
            assert_eq!(with_cert.client_certificate_alias(), Some("work"));
        }

        #[test]
        fn debug_hides_secret() {
            assert!(!format!("{:?}", imap()).contains("secret\""));
        }

        #[test]
        fn secret_is_not_serialized() {
            let json = serde_json::to_string(&imap()).unwrap();
            assert!(!json.contains("\"secret\""));
            let back: ServerProfile = serde_json::from_str(&json).unwrap();
            assert_eq!(back.secret(), "");
            assert_eq!(back.host(), "imap.example.com");
        }
    }

    mod account_tests {
        use super::*;

        #[test]
        fn new_checks_directions() {
            assert!(AccountRecord::new("n", "e@x.com", imap(), smtp()).is_ok());
            assert_eq!(
                AccountRecord::new("n", "e@x.com", smtp(), smtp()).unwrap_err(),
                ValidationError::WrongProtocol(Direction::Incoming)
            );
            assert_eq!(
                AccountRecord::new("n", "e@x.com", imap(), imap()).unwrap_err(),
                ValidationError::WrongProtocol(Direction::Outgoing)
            );
        }

        #[test]
        fn fresh_account_state() {
            let account = AccountRecord::new("n", "e@x.com", imap(), smtp()).unwrap();
            assert!(account.description().is_none());
            assert!(!account.is_enabled());
            assert!(account.trusted_certificates().is_empty());
            assert_eq!(account.special_folders(), &SpecialFolders::default());
            assert!(!account.uuid().is_empty());
        }

        #[test]
        fn uuids_are_unique() {
            let a = AccountRecord::new("n", "e@x.com", imap(), smtp()).unwrap();
            let b = AccountRecord::new("n", "e@x.com", imap(), smtp()).unwrap();
            assert_ne!(a.uuid(), b.uuid());
        }

        #[test]
        fn set_store_rejects_smtp() {
            let mut account = AccountRecord::new("n", "e@x.com", imap(), smtp()).unwrap();
            assert!(account.set_store(smtp()).is_err());
            assert_eq!(account.store().protocol(), Protocol::Imap);
        }

        #[test]
        fn server_by_direction() {
            let account = AccountRecord::new("n", "e@x.com", imap(), smtp()).unwrap();
            assert_eq!(account.server(Direction::Incoming).protocol(), Protocol::Imap);
            assert_eq!(account.server(Direction::Outgoing).protocol(), Protocol::Smtp);
        }
    }
}
