//! Two-phase verification with certificate-trust restarts.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::collaborators::{
    CertificateChain, CertificateNotifier, CheckError, EnglishCatalog, IncomingServer,
    MessageCatalog, OutgoingServer, Transport,
};
use super::outcome::{ResultCode, VerifyError};
use crate::account::{AccountRecord, CertificateFingerprint, Direction};
use crate::config::VerifierConfig;
use crate::service::TracingNotifier;
use crate::storage::{LocalStore, StorageError, provision_special_folders};

/// Verification phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Retrieval server check and folder provisioning.
    Incoming,
    /// Sending server check.
    Outgoing,
}

impl Phase {
    /// Server side checked in this phase.
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Incoming => Direction::Incoming,
            Self::Outgoing => Direction::Outgoing,
        }
    }
}

/// How a phase ended, short of success.
enum Failure {
    /// Untrusted certificate with a chain that can be accepted.
    Certificate {
        chain: CertificateChain,
        problem: String,
    },
    /// Terminal for the run.
    Fatal(VerifyError),
}

impl From<CheckError> for Failure {
    fn from(error: CheckError) -> Self {
        match error {
            CheckError::CertificateInvalid {
                chain: Some(chain),
                problem,
            } if !chain.is_empty() => Self::Certificate { chain, problem },
            CheckError::CertificateInvalid { problem, .. } => {
                Self::Fatal(VerifyError::ServerUntrusted(problem))
            }
            CheckError::AuthenticationFailed(detail) => {
                Self::Fatal(VerifyError::Authentication(detail))
            }
            CheckError::Other(detail) => Self::Fatal(VerifyError::Transport(detail)),
        }
    }
}

impl From<StorageError> for Failure {
    fn from(error: StorageError) -> Self {
        Self::Fatal(VerifyError::Storage(error))
    }
}

/// Per-run bookkeeping for the trust loop.
#[derive(Default)]
struct TrustLoop {
    restarts: u32,
    accepted: HashSet<(Direction, CertificateFingerprint)>,
}

/// Verifies an account's incoming and outgoing servers.
///
/// Runs INCOMING then OUTGOING. An untrusted certificate that comes with
/// a chain gets its leaf added to the account's trust set, and the run
/// starts over at INCOMING.
pub struct Verifier<I, O, L, N = TracingNotifier, C = EnglishCatalog> {
    incoming: I,
    outgoing: O,
    store: L,
    notifier: N,
    catalog: C,
    max_certificate_restarts: u32,
}

impl<I, O, L> Verifier<I, O, L>
where
    I: IncomingServer,
    O: OutgoingServer,
    L: LocalStore,
{
    /// Creates a verifier with the default notifier and English messages.
    pub fn new(incoming: I, outgoing: O, store: L) -> Self {
        Self {
            incoming,
            outgoing,
            store,
            notifier: TracingNotifier,
            catalog: EnglishCatalog,
            max_certificate_restarts: VerifierConfig::default().max_certificate_restarts,
        }
    }
}

impl<I, O, L, N, C> Verifier<I, O, L, N, C>
where
    I: IncomingServer,
    O: OutgoingServer,
    L: LocalStore,
    N: CertificateNotifier,
    C: MessageCatalog,
{
    /// Replaces the certificate notifier.
    pub fn with_notifier<N2: CertificateNotifier>(self, notifier: N2) -> Verifier<I, O, L, N2, C> {
        Verifier {
            incoming: self.incoming,
            outgoing: self.outgoing,
            store: self.store,
            notifier,
            catalog: self.catalog,
            max_certificate_restarts: self.max_certificate_restarts,
        }
    }

    /// Replaces the message catalog.
    pub fn with_catalog<C2: MessageCatalog>(self, catalog: C2) -> Verifier<I, O, L, N, C2> {
        Verifier {
            incoming: self.incoming,
            outgoing: self.outgoing,
            store: self.store,
            notifier: self.notifier,
            catalog,
            max_certificate_restarts: self.max_certificate_restarts,
        }
    }

    /// Applies the run limits from a configuration.
    #[must_use]
    pub fn with_config(mut self, config: &VerifierConfig) -> Self {
        self.max_certificate_restarts = config.max_certificate_restarts;
        self
    }

    /// Local store used for provisioning.
    pub const fn store(&self) -> &L {
        &self.store
    }

    /// Runs one verification to completion.
    ///
    /// On success the account's description is set to its email address
    /// and the account is enabled.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the run.
    pub async fn verify(
        &self,
        account: &mut AccountRecord,
        cancel: &CancellationToken,
    ) -> Result<(), VerifyError> {
        let mut trust = TrustLoop::default();
        let mut phase = Phase::Incoming;

        loop {
            if cancel.is_cancelled() {
                info!("Verification of {} cancelled before {:?}", account.email(), phase);
                return Err(VerifyError::Cancelled);
            }

            self.notifier
                .clear_certificate_errors(account, phase.direction());
            info!("Checking {} server for {}", phase.direction(), account.email());

            let result = match phase {
                Phase::Incoming => self.check_incoming(account).await,
                Phase::Outgoing => self.check_outgoing(account).await,
            };

            match (result, phase) {
                (Ok(()), Phase::Incoming) => phase = Phase::Outgoing,
                (Ok(()), Phase::Outgoing) => {
                    let email = account.email().to_string();
                    account.set_description(email);
                    account.set_enabled(true);
                    info!("Verified {}", account.email());
                    return Ok(());
                }
                (Err(Failure::Certificate { chain, problem }), _) => {
                    warn!(
                        "Untrusted {} certificate for {}: {}",
                        phase.direction(),
                        account.email(),
                        problem
                    );
                    self.accept_leaf(account, phase.direction(), &chain, &mut trust)?;
                    phase = Phase::Incoming;
                }
                (Err(Failure::Fatal(e)), _) => return Err(e),
            }
        }
    }

    /// Result code and message for a failed run.
    pub(super) fn describe_failure(&self, error: &VerifyError) -> (ResultCode, String) {
        (error.code(), self.catalog.failure(error))
    }

    /// Runs one verification and turns the outcome into a code and message.
    pub async fn run(
        &self,
        account: &mut AccountRecord,
        cancel: &CancellationToken,
    ) -> (ResultCode, String) {
        match self.verify(account, cancel).await {
            Ok(()) => (ResultCode::Success, self.catalog.success()),
            Err(e) => {
                error!("Verification of {} failed: {}", account.email(), e);
                self.describe_failure(&e)
            }
        }
    }

    async fn check_incoming(&self, account: &mut AccountRecord) -> Result<(), Failure> {
        let trusted = account
            .trusted_certificates()
            .fingerprints(Direction::Incoming);
        let profile = account.store();

        self.incoming.check_settings(profile, &trusted).await?;
        let folders = self.incoming.list_folders(profile, &trusted).await?;
        debug!("Server lists {} folders", folders.len());
        self.incoming.synchronize_inbox(profile, &trusted).await?;

        provision_special_folders(&self.store, account, &self.catalog).await?;
        Ok(())
    }

    async fn check_outgoing(&self, account: &AccountRecord) -> Result<(), Failure> {
        let trusted = account
            .trusted_certificates()
            .fingerprints(Direction::Outgoing);
        let mut transport = self.outgoing.transport(account.transport(), &trusted);

        transport.close().await;
        let opened = transport.open().await;
        transport.close().await;

        opened.map_err(Failure::from)
    }

    /// Trusts the leaf of a rejected chain for the rest of this run.
    fn accept_leaf(
        &self,
        account: &mut AccountRecord,
        direction: Direction,
        chain: &CertificateChain,
        trust: &mut TrustLoop,
    ) -> Result<(), VerifyError> {
        let Some(leaf) = chain.first() else {
            return Err(VerifyError::ServerUntrusted("empty certificate chain".into()));
        };
        let fingerprint = CertificateFingerprint::of(leaf);

        if trust.accepted.contains(&(direction, fingerprint.clone())) {
            return Err(VerifyError::TrustRetriesExhausted(format!(
                "certificate {fingerprint} was rejected again after being trusted"
            )));
        }
        if trust.restarts >= self.max_certificate_restarts {
            return Err(VerifyError::TrustRetriesExhausted(format!(
                "gave up after {} restarts",
                trust.restarts
            )));
        }

        account.trusted_certificates_mut().add(direction, leaf)?;
        trust.accepted.insert((direction, fingerprint.clone()));
        trust.restarts += 1;
        info!(
            "Trusted {} certificate {}, restarting ({}/{})",
            direction, fingerprint, trust.restarts, self.max_certificate_restarts
        );
        Ok(())
    }
}
