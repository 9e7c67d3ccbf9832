//! Verifier and gate scenarios against scripted servers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mailcheck_core::account::{
    AccountGenerator, AccountRecord, AuthType, CertificateFingerprint, Direction, Protocol,
    Security, ServerProfile,
};
use mailcheck_core::storage::{
    FolderType, LocalFolder, LocalStore, OUTBOX_FOLDER_ID, SqliteLocalStore, StorageError,
    SyncClass,
};
use mailcheck_core::verify::{
    CertificateNotifier, CheckError, GateError, IncomingServer, OutgoingServer, ResultCode,
    Transport, VerificationGate, Verifier, VerifyError,
};
use mailcheck_core::{NetworkIncoming, VerifierConfig};
use tokio_util::sync::CancellationToken;

/// Minimal DER SEQUENCE standing in for a certificate.
fn cert(marker: u8) -> Vec<u8> {
    vec![0x30, 0x03, 0x02, 0x01, marker]
}

fn untrusted(chain: Option<Vec<Vec<u8>>>) -> CheckError {
    CheckError::CertificateInvalid {
        chain,
        problem: "unknown issuer".into(),
    }
}

/// Shared log of collaborator calls.
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

/// Scripted results, `Ok` once the script runs out.
#[derive(Clone, Default)]
struct Script(Arc<Mutex<VecDeque<Result<(), CheckError>>>>);

impl Script {
    fn new(results: impl IntoIterator<Item = Result<(), CheckError>>) -> Self {
        Self(Arc::new(Mutex::new(results.into_iter().collect())))
    }

    fn always(error: CheckError) -> Self {
        Self::new(std::iter::repeat_n(Err(error), 64))
    }

    fn next(&self) -> Result<(), CheckError> {
        self.0.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Tracks how many runs are inside a server check at once.
#[derive(Clone, Default)]
struct Occupancy {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Occupancy {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
struct FakeIncoming {
    journal: Journal,
    script: Script,
    delay: Duration,
    occupancy: Occupancy,
}

impl IncomingServer for FakeIncoming {
    async fn check_settings(
        &self,
        _profile: &ServerProfile,
        trusted: &[CertificateFingerprint],
    ) -> Result<(), CheckError> {
        self.occupancy.enter();
        self.journal.push("check_settings");
        self.journal.push(format!("incoming_trusted:{}", trusted.len()));
        tokio::time::sleep(self.delay).await;
        let result = self.script.next();
        self.occupancy.leave();
        result
    }

    async fn list_folders(
        &self,
        _profile: &ServerProfile,
        _trusted: &[CertificateFingerprint],
    ) -> Result<Vec<String>, CheckError> {
        self.journal.push("list_folders");
        Ok(vec!["INBOX".into()])
    }

    async fn synchronize_inbox(
        &self,
        _profile: &ServerProfile,
        _trusted: &[CertificateFingerprint],
    ) -> Result<(), CheckError> {
        self.journal.push("synchronize_inbox");
        Ok(())
    }
}

#[derive(Clone, Default)]
struct FakeOutgoing {
    journal: Journal,
    script: Script,
}

struct FakeTransport {
    journal: Journal,
    script: Script,
}

impl OutgoingServer for FakeOutgoing {
    type Transport = FakeTransport;

    fn transport(
        &self,
        _profile: &ServerProfile,
        trusted: &[CertificateFingerprint],
    ) -> FakeTransport {
        self.journal
            .push(format!("outgoing_trusted:{}", trusted.len()));
        FakeTransport {
            journal: self.journal.clone(),
            script: self.script.clone(),
        }
    }
}

impl Transport for FakeTransport {
    async fn open(&mut self) -> Result<(), CheckError> {
        self.journal.push("open");
        self.script.next()
    }

    async fn close(&mut self) {
        self.journal.push("close");
    }
}

#[derive(Clone, Default)]
struct FakeNotifier {
    journal: Journal,
}

impl CertificateNotifier for FakeNotifier {
    fn clear_certificate_errors(&self, _account: &AccountRecord, direction: Direction) {
        self.journal.push(format!("clear:{direction}"));
    }
}

/// In-memory folder store that can be told to fail.
#[derive(Clone, Default)]
struct MemoryStore {
    folders: Arc<Mutex<HashMap<(String, String), LocalFolder>>>,
    fail_creates: bool,
}

impl MemoryStore {
    fn failing() -> Self {
        Self {
            fail_creates: true,
            ..Self::default()
        }
    }

    fn len(&self) -> usize {
        self.folders.lock().unwrap().len()
    }

    fn update(
        &self,
        account_uuid: &str,
        internal_id: &str,
        apply: impl FnOnce(&mut LocalFolder),
    ) -> Result<(), StorageError> {
        let mut folders = self.folders.lock().unwrap();
        let folder = folders
            .get_mut(&(account_uuid.to_string(), internal_id.to_string()))
            .ok_or_else(|| StorageError::FolderNotFound(internal_id.to_string()))?;
        apply(folder);
        Ok(())
    }
}

impl LocalStore for MemoryStore {
    async fn folder_exists(
        &self,
        account_uuid: &str,
        internal_id: &str,
    ) -> Result<bool, StorageError> {
        Ok(self
            .folders
            .lock()
            .unwrap()
            .contains_key(&(account_uuid.to_string(), internal_id.to_string())))
    }

    async fn create_folder(
        &self,
        account_uuid: &str,
        internal_id: &str,
        folder_type: FolderType,
    ) -> Result<(), StorageError> {
        if self.fail_creates {
            return Err(StorageError::Database(sqlx::Error::PoolClosed));
        }
        let key = (account_uuid.to_string(), internal_id.to_string());
        let mut folders = self.folders.lock().unwrap();
        if folders.contains_key(&key) {
            return Err(StorageError::FolderExists(internal_id.to_string()));
        }
        folders.insert(
            key,
            LocalFolder {
                internal_id: internal_id.to_string(),
                name: internal_id.to_string(),
                folder_type,
                in_top_group: false,
                sync_class: SyncClass::Inherited,
            },
        );
        Ok(())
    }

    async fn set_folder_name(
        &self,
        account_uuid: &str,
        internal_id: &str,
        name: &str,
    ) -> Result<(), StorageError> {
        self.update(account_uuid, internal_id, |f| f.name = name.to_string())
    }

    async fn set_in_top_group(
        &self,
        account_uuid: &str,
        internal_id: &str,
        in_top_group: bool,
    ) -> Result<(), StorageError> {
        self.update(account_uuid, internal_id, |f| f.in_top_group = in_top_group)
    }

    async fn set_sync_class(
        &self,
        account_uuid: &str,
        internal_id: &str,
        sync_class: SyncClass,
    ) -> Result<(), StorageError> {
        self.update(account_uuid, internal_id, |f| f.sync_class = sync_class)
    }

    async fn folder(
        &self,
        account_uuid: &str,
        internal_id: &str,
    ) -> Result<Option<LocalFolder>, StorageError> {
        Ok(self
            .folders
            .lock()
            .unwrap()
            .get(&(account_uuid.to_string(), internal_id.to_string()))
            .cloned())
    }
}

/// A verifier wired to fakes that share one journal.
struct Harness {
    journal: Journal,
    incoming: FakeIncoming,
    outgoing: FakeOutgoing,
    store: MemoryStore,
}

impl Harness {
    fn new() -> Self {
        let journal = Journal::default();
        Self {
            incoming: FakeIncoming {
                journal: journal.clone(),
                ..FakeIncoming::default()
            },
            outgoing: FakeOutgoing {
                journal: journal.clone(),
                ..FakeOutgoing::default()
            },
            store: MemoryStore::default(),
            journal,
        }
    }

    fn incoming_script(mut self, script: Script) -> Self {
        self.incoming.script = script;
        self
    }

    fn outgoing_script(mut self, script: Script) -> Self {
        self.outgoing.script = script;
        self
    }

    fn store(mut self, store: MemoryStore) -> Self {
        self.store = store;
        self
    }

    fn delay(mut self, delay: Duration) -> Self {
        self.incoming.delay = delay;
        self
    }

    fn verifier(
        &self,
    ) -> Verifier<FakeIncoming, FakeOutgoing, MemoryStore, FakeNotifier> {
        Verifier::new(
            self.incoming.clone(),
            self.outgoing.clone(),
            self.store.clone(),
        )
        .with_notifier(FakeNotifier {
            journal: self.journal.clone(),
        })
    }

    async fn run(&self, account: &mut AccountRecord) -> ResultCode {
        self.verifier()
            .run(account, &CancellationToken::new())
            .await
            .0
    }
}

fn account() -> AccountRecord {
    AccountGenerator::new().generate("user@example.com", "pw")
}

fn pop3_account() -> AccountRecord {
    let mut account = account();
    let store = ServerProfile::new(
        Protocol::Pop3,
        "pop.example.com",
        995,
        Security::SslTlsRequired,
        AuthType::Plain,
        "user",
        "pw",
    )
    .unwrap();
    account.set_store(store).unwrap();
    account
}

mod controller {
    use super::*;

    #[tokio::test]
    async fn success_runs_both_phases_in_order() {
        let harness = Harness::new();
        let mut account = account();

        assert_eq!(harness.run(&mut account).await, ResultCode::Success);
        assert_eq!(
            harness.journal.events(),
            vec![
                "clear:incoming",
                "check_settings",
                "incoming_trusted:0",
                "list_folders",
                "synchronize_inbox",
                "clear:outgoing",
                "outgoing_trusted:0",
                "close",
                "open",
                "close",
            ]
        );
        assert_eq!(account.description(), Some("user@example.com"));
        assert!(account.is_enabled());
    }

    #[tokio::test]
    async fn success_provisions_outbox_only_for_imap() {
        let harness = Harness::new();
        let mut account = account();

        assert_eq!(harness.run(&mut account).await, ResultCode::Success);
        assert_eq!(harness.store.len(), 1);
        let outbox = harness
            .store
            .folder(account.uuid(), OUTBOX_FOLDER_ID)
            .await
            .unwrap()
            .unwrap();
        assert!(outbox.in_top_group);
        assert_eq!(outbox.sync_class, SyncClass::None);
        assert_eq!(account.special_folders().outbox.as_deref(), Some(OUTBOX_FOLDER_ID));
        assert!(account.special_folders().drafts.is_none());
    }

    #[tokio::test]
    async fn second_success_creates_no_duplicates() {
        let harness = Harness::new();
        let mut account = account();

        assert_eq!(harness.run(&mut account).await, ResultCode::Success);
        assert_eq!(harness.run(&mut account).await, ResultCode::Success);
        assert_eq!(harness.store.len(), 1);
    }

    #[tokio::test]
    async fn pop3_provisions_local_special_folders() {
        let harness = Harness::new();
        let mut account = pop3_account();

        assert_eq!(harness.run(&mut account).await, ResultCode::Success);
        assert_eq!(harness.store.len(), 4);
        let folders = account.special_folders();
        assert_eq!(folders.drafts.as_deref(), Some("Drafts"));
        assert_eq!(folders.sent.as_deref(), Some("Sent"));
        assert_eq!(folders.trash.as_deref(), Some("Trash"));
    }

    #[tokio::test]
    async fn incoming_failure_skips_outgoing_and_provisioning() {
        let harness = Harness::new().incoming_script(Script::new([Err(
            CheckError::AuthenticationFailed("NO LOGIN failed".into()),
        )]));
        let mut account = account();

        assert_eq!(
            harness.run(&mut account).await,
            ResultCode::AuthenticationFailed
        );
        let events = harness.journal.events();
        assert!(!events.iter().any(|e| e == "open" || e == "clear:outgoing"));
        assert!(!events.iter().any(|e| e == "list_folders"));
        assert_eq!(harness.store.len(), 0);
        assert!(account.description().is_none());
        assert!(!account.is_enabled());
    }

    #[tokio::test]
    async fn generic_incoming_failure_is_unclassified() {
        let harness = Harness::new()
            .incoming_script(Script::new([Err(CheckError::Other("connection reset".into()))]));
        let mut account = account();

        assert_eq!(harness.run(&mut account).await, ResultCode::Unclassified);
        assert_eq!(harness.store.len(), 0);
    }

    #[tokio::test]
    async fn outgoing_failure_still_closes_transport() {
        let harness = Harness::new()
            .outgoing_script(Script::new([Err(CheckError::Other("timed out".into()))]));
        let mut account = account();

        assert_eq!(harness.run(&mut account).await, ResultCode::Unclassified);
        let events = harness.journal.events();
        assert_eq!(&events[events.len() - 3..], ["close", "open", "close"]);
        assert!(account.description().is_none());
        assert!(!account.is_enabled());
    }

    #[tokio::test]
    async fn incoming_certificate_with_chain_restarts_at_incoming() {
        let harness = Harness::new().incoming_script(Script::new([Err(untrusted(Some(vec![
            cert(1),
            cert(2),
        ])))]));
        let mut account = account();

        assert_eq!(harness.run(&mut account).await, ResultCode::Success);

        assert_eq!(harness.journal.count("clear:incoming"), 2);
        assert_eq!(harness.journal.count("clear:outgoing"), 1);
        assert_eq!(harness.journal.count("incoming_trusted:0"), 1);
        assert_eq!(harness.journal.count("incoming_trusted:1"), 1);

        let trusted = account.trusted_certificates();
        assert_eq!(trusted.len(), 1);
        assert!(trusted.contains(Direction::Incoming, &CertificateFingerprint::of(&cert(1))));
    }

    #[tokio::test]
    async fn outgoing_certificate_restarts_from_incoming() {
        let harness = Harness::new()
            .outgoing_script(Script::new([Err(untrusted(Some(vec![cert(7)])))]));
        let mut account = account();

        assert_eq!(harness.run(&mut account).await, ResultCode::Success);

        let events = harness.journal.events();
        let second_clear = events
            .iter()
            .enumerate()
            .filter(|(_, e)| *e == "clear:incoming")
            .nth(1)
            .map(|(i, _)| i)
            .expect("run restarted");
        let first_open = events.iter().position(|e| e == "open").unwrap();
        assert!(first_open < second_clear);
        assert_eq!(events[second_clear + 1], "check_settings");

        assert!(account
            .trusted_certificates()
            .contains(Direction::Outgoing, &CertificateFingerprint::of(&cert(7))));
        assert_eq!(harness.journal.count("outgoing_trusted:1"), 1);
    }

    #[tokio::test]
    async fn certificate_without_chain_is_terminal() {
        for chain in [None, Some(Vec::new())] {
            let harness = Harness::new().incoming_script(Script::new([Err(untrusted(chain))]));
            let mut account = account();

            assert_eq!(harness.run(&mut account).await, ResultCode::ServerUntrusted);
            assert_eq!(harness.journal.count("clear:incoming"), 1);
            assert!(account.trusted_certificates().is_empty());
        }
    }

    #[tokio::test]
    async fn external_auth_without_client_certificate_is_untrusted() {
        let harness = Harness::new();
        let verifier = Verifier::new(
            NetworkIncoming::new(VerifierConfig::default().probe_config()),
            harness.outgoing.clone(),
            harness.store.clone(),
        );
        let store = ServerProfile::new(
            Protocol::Imap,
            "mail.example.com",
            993,
            Security::SslTlsRequired,
            AuthType::External,
            "",
            "",
        )
        .unwrap();
        let mut account = account();
        account.set_store(store).unwrap();

        let (code, message) = verifier.run(&mut account, &CancellationToken::new()).await;
        assert_eq!(code, ResultCode::ServerUntrusted);
        assert!(message.contains("EXTERNAL"));
        assert!(account.trusted_certificates().is_empty());
        assert_eq!(harness.journal.count("open"), 0);
    }

    #[tokio::test]
    async fn unstorable_certificate_reports_code_3() {
        let harness = Harness::new()
            .incoming_script(Script::new([Err(untrusted(Some(vec![vec![0x04, 0x00]])))]));
        let mut account = account();

        assert_eq!(
            harness.run(&mut account).await,
            ResultCode::CertificateStoreFailed
        );
        assert_eq!(harness.journal.count("clear:incoming"), 1);
        assert!(account.trusted_certificates().is_empty());
    }

    #[tokio::test]
    async fn same_certificate_rejected_again_gives_up() {
        let harness =
            Harness::new().incoming_script(Script::always(untrusted(Some(vec![cert(1)]))));
        let mut account = account();

        let err = harness
            .verifier()
            .verify(&mut account, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::TrustRetriesExhausted(_)));
        assert_eq!(err.code(), ResultCode::ServerUntrusted);
        assert_eq!(harness.journal.count("clear:incoming"), 2);
        assert_eq!(account.trusted_certificates().len(), 1);
    }

    #[tokio::test]
    async fn restarts_are_capped() {
        let harness = Harness::new().incoming_script(Script::new(
            (1..=5).map(|n| Err(untrusted(Some(vec![cert(n)])))),
        ));
        let config = VerifierConfig {
            max_certificate_restarts: 3,
            ..VerifierConfig::default()
        };
        let mut account = account();

        let (code, _) = harness
            .verifier()
            .with_config(&config)
            .run(&mut account, &CancellationToken::new())
            .await;
        assert_eq!(code, ResultCode::ServerUntrusted);
        assert_eq!(account.trusted_certificates().len(), 3);
        assert_eq!(harness.journal.count("clear:incoming"), 4);
    }

    #[tokio::test]
    async fn storage_failure_aborts_run() {
        let harness = Harness::new().store(MemoryStore::failing());
        let mut account = account();

        let err = harness
            .verifier()
            .verify(&mut account, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Storage(_)));
        assert_eq!(err.code(), ResultCode::Unclassified);
        assert_eq!(harness.journal.count("open"), 0);
    }

    #[tokio::test]
    async fn cancelled_run_does_no_io() {
        let harness = Harness::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut account = account();

        let (code, message) = harness.verifier().run(&mut account, &cancel).await;
        assert_eq!(code, ResultCode::Unclassified);
        assert_eq!(message, "Verification was cancelled");
        assert!(harness.journal.events().is_empty());
    }

    #[tokio::test]
    async fn sqlite_store_end_to_end() {
        let store = SqliteLocalStore::in_memory().await.unwrap();
        let journal = Journal::default();
        let verifier = Verifier::new(
            FakeIncoming {
                journal: journal.clone(),
                ..FakeIncoming::default()
            },
            FakeOutgoing {
                journal: journal.clone(),
                ..FakeOutgoing::default()
            },
            store,
        );
        let mut account = pop3_account();

        let (code, _) = verifier.run(&mut account, &CancellationToken::new()).await;
        assert_eq!(code, ResultCode::Success);
        assert_eq!(verifier.store().folder_count(account.uuid()).await.unwrap(), 4);
        let (code, _) = verifier.run(&mut account, &CancellationToken::new()).await;
        assert_eq!(code, ResultCode::Success);
        assert_eq!(verifier.store().folder_count(account.uuid()).await.unwrap(), 4);
    }
}

mod gate {
    use super::*;

    /// Counts sink calls per submission.
    fn counting_sink(
        calls: &Arc<Mutex<Vec<ResultCode>>>,
    ) -> impl FnOnce(ResultCode, &str) + Send + 'static {
        let calls = calls.clone();
        move |code: ResultCode, _: &str| calls.lock().unwrap().push(code)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_submissions_do_not_overlap() {
        let harness = Harness::new().delay(Duration::from_millis(20));
        let occupancy = harness.incoming.occupancy.clone();
        let gate = VerificationGate::spawn(harness.verifier());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let first = gate.submit(account(), counting_sink(&calls)).unwrap();
        let second = gate.submit(pop3_account(), counting_sink(&calls)).unwrap();

        let (first, second) = tokio::join!(first.wait(), second.wait());
        let first = first.unwrap();
        let second = second.unwrap();

        assert!(first.is_success());
        assert!(second.is_success());
        assert_eq!(second.account.store().protocol(), Protocol::Pop3);
        assert_eq!(occupancy.peak(), 1);
        assert_eq!(*calls.lock().unwrap(), vec![ResultCode::Success; 2]);

        // The first run finished before the second one started.
        let events = harness.journal.events();
        let outgoing_done = events.iter().position(|e| e == "clear:outgoing").unwrap();
        let second_start = events
            .iter()
            .enumerate()
            .filter(|(_, e)| *e == "clear:incoming")
            .nth(1)
            .map(|(i, _)| i)
            .unwrap();
        assert!(outgoing_done < second_start);
    }

    #[tokio::test]
    async fn sink_fires_before_report() {
        let harness = Harness::new().incoming_script(Script::new([Err(
            CheckError::AuthenticationFailed("535".into()),
        )]));
        let gate = VerificationGate::spawn(harness.verifier());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let report = gate
            .submit(account(), counting_sink(&calls))
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(report.code, ResultCode::AuthenticationFailed);
        assert!(report.message.contains("535"));
        assert_eq!(*calls.lock().unwrap(), vec![ResultCode::AuthenticationFailed]);
        assert_eq!(report.account.email(), "user@example.com");
    }

    #[tokio::test]
    async fn shutdown_rejects_new_and_cancels_queued() {
        let harness = Harness::new().delay(Duration::from_millis(50));
        let gate = VerificationGate::spawn(harness.verifier());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let first = gate.submit(account(), counting_sink(&calls)).unwrap();
        let second = gate.submit(account(), counting_sink(&calls)).unwrap();
        gate.shutdown();

        assert!(gate.is_closed());
        assert_eq!(
            gate.submit(account(), counting_sink(&calls)).unwrap_err(),
            GateError::Closed
        );

        let first = first.wait().await.unwrap();
        let second = second.wait().await.unwrap();
        assert_eq!(first.code, ResultCode::Unclassified);
        assert_eq!(second.code, ResultCode::Unclassified);
        assert!(!first.account.is_enabled());
        assert_eq!(harness.journal.count("open"), 0);
        assert_eq!(calls.lock().unwrap().len(), 2);

        gate.join().await;
    }

    /// Panics for one host, defers to a scripted fake otherwise.
    #[derive(Clone)]
    struct PanicsFor {
        host: &'static str,
        inner: FakeIncoming,
    }

    impl IncomingServer for PanicsFor {
        async fn check_settings(
            &self,
            profile: &ServerProfile,
            trusted: &[CertificateFingerprint],
        ) -> Result<(), CheckError> {
            assert_ne!(profile.host(), self.host, "server check blew up");
            self.inner.check_settings(profile, trusted).await
        }

        async fn list_folders(
            &self,
            profile: &ServerProfile,
            trusted: &[CertificateFingerprint],
        ) -> Result<Vec<String>, CheckError> {
            self.inner.list_folders(profile, trusted).await
        }

        async fn synchronize_inbox(
            &self,
            profile: &ServerProfile,
            trusted: &[CertificateFingerprint],
        ) -> Result<(), CheckError> {
            self.inner.synchronize_inbox(profile, trusted).await
        }
    }

    #[tokio::test]
    async fn panicking_run_reports_and_worker_continues() {
        let harness = Harness::new();
        let verifier = Verifier::new(
            PanicsFor {
                host: "mail.broken.example",
                inner: harness.incoming.clone(),
            },
            harness.outgoing.clone(),
            harness.store.clone(),
        );
        let gate = VerificationGate::spawn(verifier);
        let calls = Arc::new(Mutex::new(Vec::new()));

        let broken = AccountGenerator::new().generate("user@broken.example", "pw");
        let broken_uuid = broken.uuid().to_string();
        let first = gate.submit(broken, counting_sink(&calls)).unwrap();
        let second = gate.submit(account(), counting_sink(&calls)).unwrap();

        let first = first.wait().await.unwrap();
        assert_eq!(first.code, ResultCode::Unclassified);
        assert!(first.message.contains("stopped unexpectedly"));
        assert_eq!(first.account.uuid(), broken_uuid);
        assert!(!first.account.is_enabled());

        assert!(second.wait().await.unwrap().is_success());
        assert_eq!(
            *calls.lock().unwrap(),
            vec![ResultCode::Unclassified, ResultCode::Success]
        );
        gate.join().await;
    }

    #[tokio::test]
    async fn join_drains_queue() {
        let harness = Harness::new();
        let gate = VerificationGate::spawn(harness.verifier());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let pending = gate.submit(account(), counting_sink(&calls)).unwrap();
        gate.join().await;

        assert!(pending.wait().await.unwrap().is_success());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }
}
