//! Serialized execution of verification runs.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::collaborators::{
    CertificateNotifier, IncomingServer, MessageCatalog, OutgoingServer, ResultSink,
};
use super::controller::Verifier;
use super::outcome::{VerificationReport, VerifyError};
use crate::account::AccountRecord;
use crate::storage::LocalStore;

/// Errors from the gate itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    /// The gate was shut down; nothing more is accepted.
    #[error("Verification gate is closed")]
    Closed,

    /// The worker stopped before reporting.
    #[error("Verification worker stopped")]
    WorkerStopped,
}

struct Submission {
    account: AccountRecord,
    sink: Box<dyn ResultSink>,
    reply: oneshot::Sender<VerificationReport>,
}

/// Handle to a queued verification.
#[derive(Debug)]
pub struct PendingVerification {
    reply: oneshot::Receiver<VerificationReport>,
}

impl PendingVerification {
    /// Waits for the run to finish and returns the account.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::WorkerStopped`] if the worker went away first.
    pub async fn wait(self) -> Result<VerificationReport, GateError> {
        self.reply.await.map_err(|_| GateError::WorkerStopped)
    }
}

/// Runs verifications one at a time on a single worker task.
///
/// Submissions are queued in order and never block. Each run owns its
/// account until it reports. A run that panics reports
/// [`ResultCode::Unclassified`](super::ResultCode::Unclassified) and the
/// worker moves on to the next submission.
pub struct VerificationGate {
    queue: mpsc::UnboundedSender<Submission>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl VerificationGate {
    /// Starts the worker for `verifier`.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn<I, O, L, N, C>(verifier: Verifier<I, O, L, N, C>) -> Self
    where
        I: IncomingServer + 'static,
        O: OutgoingServer + 'static,
        L: LocalStore + 'static,
        N: CertificateNotifier + 'static,
        C: MessageCatalog + 'static,
    {
        let (queue, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(Arc::new(verifier), rx, cancel.clone()));
        Self {
            queue,
            cancel,
            worker,
        }
    }

    /// Queues a verification of `account`.
    ///
    /// The sink is called once when the run ends, before the returned
    /// handle resolves.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Closed`] after [`shutdown`](Self::shutdown).
    pub fn submit(
        &self,
        account: AccountRecord,
        sink: impl ResultSink,
    ) -> Result<PendingVerification, GateError> {
        if self.cancel.is_cancelled() {
            return Err(GateError::Closed);
        }

        let (reply, rx) = oneshot::channel();
        debug!("Queueing verification of {}", account.email());
        self.queue
            .send(Submission {
                account,
                sink: Box::new(sink),
                reply,
            })
            .map_err(|_| GateError::Closed)?;
        Ok(PendingVerification { reply: rx })
    }

    /// Stops accepting submissions.
    ///
    /// The active run and queued runs end at their next phase boundary
    /// with [`ResultCode::Unclassified`](super::ResultCode::Unclassified).
    /// Network calls already in progress finish first.
    pub fn shutdown(&self) {
        info!("Shutting down verification gate");
        self.cancel.cancel();
    }

    /// Returns true once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drains the queue and waits for the worker to exit.
    pub async fn join(self) {
        drop(self.queue);
        if let Err(e) = self.worker.await {
            warn!("Verification worker ended abnormally: {}", e);
        }
    }
}

async fn run_worker<I, O, L, N, C>(
    verifier: Arc<Verifier<I, O, L, N, C>>,
    mut rx: mpsc::UnboundedReceiver<Submission>,
    cancel: CancellationToken,
) where
    I: IncomingServer + 'static,
    O: OutgoingServer + 'static,
    L: LocalStore + 'static,
    N: CertificateNotifier + 'static,
    C: MessageCatalog + 'static,
{
    while let Some(Submission {
        account,
        sink,
        reply,
    }) = rx.recv().await
    {
        let submitted = account.clone();
        let run = tokio::spawn({
            let verifier = Arc::clone(&verifier);
            let cancel = cancel.clone();
            let mut account = account;
            async move {
                let (code, message) = verifier.run(&mut account, &cancel).await;
                (code, message, account)
            }
        });

        // A panicking run still reports, with the account as submitted.
        let (code, message, account) = match run.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Verification of {} aborted: {}", submitted.email(), e);
                let (code, message) =
                    verifier.describe_failure(&VerifyError::Interrupted(e.to_string()));
                (code, message, submitted)
            }
        };
        sink.on_result(code, &message);

        if reply
            .send(VerificationReport {
                code,
                message,
                account,
            })
            .is_err()
        {
            debug!("Verification result dropped by caller");
        }
    }
    debug!("Verification worker exiting");
}
