use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::MailConfig;

use super::{MailError, MailMessage, MailTransport, Mailer};

const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Bounded queue in front of a [`MailTransport`], drained by one worker task.
#[derive(Debug, Clone)]
pub struct Outbox {
    queue: mpsc::Sender<MailMessage>,
}

impl Outbox {
    /// Start the worker on the current tokio runtime. It stops once every
    /// `Outbox` clone is dropped and the queue is drained.
    pub fn spawn(
        transport: Arc<dyn MailTransport>,
        config: &MailConfig,
    ) -> (Self, JoinHandle<()>) {
        let (queue, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let attempts = config.max_attempts.max(1);
        let worker = tokio::spawn(drain(receiver, transport, attempts));
        (Self { queue }, worker)
    }

    pub fn try_enqueue(&self, message: MailMessage) -> Result<(), MailError> {
        self.queue.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => MailError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => MailError::Closed,
        })
    }
}

impl Mailer for Outbox {
    fn dispatch(&self, message: MailMessage) {
        let subject = message.subject.clone();
        if let Err(err) = self.try_enqueue(message) {
            warn!(%subject, error = %err, "mail dropped before delivery");
        }
    }
}

async fn drain(
    mut receiver: mpsc::Receiver<MailMessage>,
    transport: Arc<dyn MailTransport>,
    attempts: u8,
) {
    while let Some(message) = receiver.recv().await {
        deliver(&transport, Arc::new(message), attempts).await;
    }
    debug!("mail outbox closed");
}

/// Transports may block on network I/O, so each send runs on the blocking pool.
async fn send_blocking(
    transport: &Arc<dyn MailTransport>,
    message: &Arc<MailMessage>,
) -> Result<(), MailError> {
    let transport = Arc::clone(transport);
    let message = Arc::clone(message);
    tokio::task::spawn_blocking(move || transport.send(&message))
        .await
        .map_err(|err| MailError::Transport(format!("mail transport task failed: {err}")))?
}

async fn deliver(transport: &Arc<dyn MailTransport>, message: Arc<MailMessage>, attempts: u8) {
    for attempt in 1..=attempts {
        match send_blocking(transport, &message).await {
            Ok(()) => return,
            Err(err) if attempt < attempts => {
                debug!(attempt, error = %err, "mail delivery failed, retrying");
                tokio::time::sleep(RETRY_BACKOFF * u32::from(attempt)).await;
            }
            Err(err) => {
                warn!(
                    subject = %message.subject,
                    recipients = ?message.recipients,
                    attempts,
                    error = %err,
                    "mail delivery abandoned"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MemoryMailer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread::ThreadId;

    fn message(subject: &str) -> MailMessage {
        MailMessage {
            subject: subject.to_string(),
            sender: "olimpiada@localhost".to_string(),
            recipients: vec!["ana@escola.br".to_string()],
            text_body: "corpo".to_string(),
            html_body: "<p>corpo</p>".to_string(),
        }
    }

    struct Flaky {
        failures_left: AtomicUsize,
        inner: MemoryMailer,
    }

    impl MailTransport for Flaky {
        fn send(&self, message: &MailMessage) -> Result<(), MailError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(MailError::Transport("relay refused".to_string()));
            }
            self.inner.send(message)
        }
    }

    #[tokio::test]
    async fn delivers_queued_messages_in_order() {
        let mailbox = MemoryMailer::new();
        let (outbox, worker) = Outbox::spawn(Arc::new(mailbox.clone()), &MailConfig::default());
        outbox.dispatch(message("primeira"));
        outbox.dispatch(message("segunda"));
        drop(outbox);
        worker.await.expect("worker finishes");

        let subjects: Vec<_> = mailbox.messages().into_iter().map(|m| m.subject).collect();
        assert_eq!(subjects, vec!["primeira", "segunda"]);
    }

    #[tokio::test]
    async fn retries_until_the_attempt_budget_is_spent() {
        let recovering = Arc::new(Flaky {
            failures_left: AtomicUsize::new(2),
            inner: MemoryMailer::new(),
        });
        let (outbox, worker) = Outbox::spawn(recovering.clone(), &MailConfig::default());
        outbox.dispatch(message("recupera"));
        drop(outbox);
        worker.await.expect("worker finishes");
        assert_eq!(recovering.inner.messages().len(), 1);

        let hopeless = Arc::new(Flaky {
            failures_left: AtomicUsize::new(10),
            inner: MemoryMailer::new(),
        });
        let (outbox, worker) = Outbox::spawn(hopeless.clone(), &MailConfig::default());
        outbox.dispatch(message("perdida"));
        drop(outbox);
        worker.await.expect("worker finishes");
        assert!(hopeless.inner.messages().is_empty());
        assert_eq!(hopeless.failures_left.load(Ordering::SeqCst), 7);
    }

    struct ThreadRecorder {
        threads: Mutex<Vec<ThreadId>>,
    }

    impl MailTransport for ThreadRecorder {
        fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
            self.threads
                .lock()
                .map_err(|_| MailError::Transport("recorder poisoned".to_string()))?
                .push(std::thread::current().id());
            Ok(())
        }
    }

    #[tokio::test]
    async fn transport_runs_off_the_runtime_thread() {
        let recorder = Arc::new(ThreadRecorder {
            threads: Mutex::new(Vec::new()),
        });
        let (outbox, worker) = Outbox::spawn(recorder.clone(), &MailConfig::default());
        outbox.dispatch(message("bloqueante"));
        drop(outbox);
        worker.await.expect("worker finishes");

        let threads = recorder.threads.lock().expect("recorder").clone();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let config = MailConfig {
            queue_capacity: 1,
            ..MailConfig::default()
        };
        let (queue, _receiver) = mpsc::channel(config.queue_capacity);
        let outbox = Outbox { queue };
        assert_eq!(outbox.try_enqueue(message("cabe")), Ok(()));
        assert_eq!(outbox.try_enqueue(message("transborda")), Err(MailError::QueueFull));
        outbox.dispatch(message("descartada"));
    }
}
