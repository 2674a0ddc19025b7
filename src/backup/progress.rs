//! Progress events and the stream that carries them
//!
//! Every long-running operation runs on tokio's blocking pool and reports
//! through a bounded channel. The consumer pulls events from a
//! [`ProgressStream`]; the last event is always exactly one terminal
//! `Completed` or `Error`. Dropping the stream cancels the run at its next
//! emission.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tracing::error;

use crate::error::{BackupError, BackupResult, ErrorKind};
use crate::models::BackupId;

/// Events buffered between producer and consumer
const CHANNEL_CAPACITY: usize = 64;

/// A progress event that can terminate a stream with a failure
pub trait ProgressEvent: Send + 'static {
    /// Build the terminal error event for a failed run
    fn failed(error: &BackupError) -> Self;

    /// Whether this event ends the stream
    fn is_terminal(&self) -> bool;
}

/// Details of a failed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Full message, including the stage that failed
    pub message: String,
    /// Innermost cause, if the error wrapped one
    pub cause: Option<String>,
    pub kind: ErrorKind,
}

impl Failure {
    fn from_error(error: &BackupError) -> Self {
        let cause = match error {
            BackupError::Stage { .. } => Some(error.root_message()),
            _ => None,
        };
        Self {
            message: error.to_string(),
            cause,
            kind: error.kind(),
        }
    }

    /// Turn the failure back into an error for callers that propagate it
    pub fn into_error(self) -> BackupError {
        BackupError::Run {
            message: self.message,
            kind: self.kind,
        }
    }
}

/// Stages of a backup run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BackupStage {
    Initializing,
    ValidatingDatabase,
    ExportingDatabase,
    ExportingPreferences,
    ArchivingPhotos,
    ComputingChecksum,
    Persisting,
}

impl BackupStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initializing => "Initialization",
            Self::ValidatingDatabase => "Database validation",
            Self::ExportingDatabase => "Database export",
            Self::ExportingPreferences => "Preference export",
            Self::ArchivingPhotos => "Photo archiving",
            Self::ComputingChecksum => "Checksum computation",
            Self::Persisting => "Persisting backup",
        }
    }
}

/// Events emitted by a backup run
#[derive(Debug, Clone, PartialEq)]
pub enum BackupProgress {
    Progress {
        stage: BackupStage,
        percent: u8,
        message: String,
    },
    Completed {
        backup_id: BackupId,
        path: PathBuf,
        total_size: u64,
        duration: Duration,
        table_count: usize,
    },
    Error(Failure),
}

impl ProgressEvent for BackupProgress {
    fn failed(error: &BackupError) -> Self {
        Self::Error(Failure::from_error(error))
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Stages of a restore run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RestoreStage {
    LoadingBundle,
    ValidatingBundle,
    VerifyingChecksum,
    ImportingDatabase,
    ExtractingPhotos,
    ImportingPreferences,
}

impl RestoreStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LoadingBundle => "Loading bundle",
            Self::ValidatingBundle => "Bundle validation",
            Self::VerifyingChecksum => "Checksum verification",
            Self::ImportingDatabase => "Database import",
            Self::ExtractingPhotos => "Photo extraction",
            Self::ImportingPreferences => "Preference import",
        }
    }
}

/// Events emitted by a restore run
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreProgress {
    Progress {
        stage: RestoreStage,
        percent: u8,
        message: String,
    },
    Completed {
        backup_id: BackupId,
        records_restored: usize,
        /// Extracted photo files, thumbnails included
        photos_restored: usize,
        /// False when the preference import failed and was skipped
        preferences_restored: bool,
        duration: Duration,
    },
    Error(Failure),
}

impl ProgressEvent for RestoreProgress {
    fn failed(error: &BackupError) -> Self {
        Self::Error(Failure::from_error(error))
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Events emitted while writing a photo archive
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveProgress {
    Progress {
        processed: usize,
        total: usize,
        current_file: String,
        /// 0.0 to 1.0
        fraction: f32,
    },
    Completed {
        path: PathBuf,
        file_count: usize,
        total_size_bytes: u64,
    },
    Error(Failure),
}

impl ProgressEvent for ArchiveProgress {
    fn failed(error: &BackupError) -> Self {
        Self::Error(Failure::from_error(error))
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Events emitted while extracting a photo archive
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractProgress {
    Progress {
        processed: usize,
        total: usize,
        current_file: String,
        fraction: f32,
    },
    Completed {
        output_dir: PathBuf,
        file_count: usize,
        total_size_bytes: u64,
    },
    Error(Failure),
}

impl ProgressEvent for ExtractProgress {
    fn failed(error: &BackupError) -> Self {
        Self::Error(Failure::from_error(error))
    }

    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Producer side of a progress stream
pub struct ProgressSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T: ProgressEvent> ProgressSender<T> {
    /// Hand an event to the consumer, blocking while its buffer is full
    ///
    /// Fails with [`BackupError::Cancelled`] once the consumer is gone.
    pub fn emit(&self, event: T) -> BackupResult<()> {
        self.tx.blocking_send(event).map_err(|_| BackupError::Cancelled)
    }
}

/// Consumer side of a progress stream
pub struct ProgressStream<T> {
    rx: mpsc::Receiver<T>,
}

impl<T: ProgressEvent> ProgressStream<T> {
    /// Run `work` on the blocking pool and stream its events
    ///
    /// `work` returns the terminal success event; an `Err` becomes the
    /// terminal error event. Must be called from within a tokio runtime.
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce(&ProgressSender<T>) -> BackupResult<T> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::task::spawn_blocking(move || {
            let sender = ProgressSender { tx };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&sender)))
                .unwrap_or_else(|payload| Err(BackupError::Io(panic_message(payload))));
            let terminal = match outcome {
                Ok(event) => event,
                // Nobody is listening any more
                Err(BackupError::Cancelled) => return,
                Err(e) => {
                    error!(error = %e, "Operation failed");
                    T::failed(&e)
                }
            };
            let _ = sender.tx.blocking_send(terminal);
        });

        Self { rx }
    }

    /// Wait for the next event; `None` once the stream is exhausted
    pub async fn next_event(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Drain the stream up to and including its terminal event
    pub async fn collect_all(mut self) -> Vec<T> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }
}

impl<T> Stream for ProgressStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Describe a worker panic so it can travel as an error event
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("Worker panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn progress(percent: u8) -> BackupProgress {
        BackupProgress::Progress {
            stage: BackupStage::Initializing,
            percent,
            message: String::new(),
        }
    }

    #[tokio::test]
    async fn test_stream_ends_with_terminal_success() {
        let stream = ProgressStream::spawn(|sender: &ProgressSender<ArchiveProgress>| {
            sender.emit(ArchiveProgress::Progress {
                processed: 1,
                total: 1,
                current_file: "a.jpg".into(),
                fraction: 1.0,
            })?;
            Ok(ArchiveProgress::Completed {
                path: PathBuf::from("x.zip"),
                file_count: 1,
                total_size_bytes: 3,
            })
        });

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], ArchiveProgress::Completed { file_count: 1, .. }));
    }

    #[tokio::test]
    async fn test_error_becomes_single_terminal_event() {
        let stream = ProgressStream::spawn(|sender: &ProgressSender<BackupProgress>| {
            sender.emit(progress(0))?;
            Err(BackupError::Io("disk full".into()).during("Persisting backup"))
        });

        let events = stream.collect_all().await;
        assert_eq!(events.len(), 2);
        match &events[1] {
            BackupProgress::Error(failure) => {
                assert_eq!(failure.kind, ErrorKind::Io);
                assert!(failure.message.starts_with("Persisting backup failed"));
                assert_eq!(failure.cause.as_deref(), Some("I/O error: disk full"));
            }
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_worker_panic_ends_with_error_event() {
        let stream = ProgressStream::spawn(|sender: &ProgressSender<BackupProgress>| {
            sender.emit(progress(10))?;
            panic!("index out of range");
        });

        let events = stream.collect_all().await;
        assert_eq!(events.len(), 2);
        match &events[1] {
            BackupProgress::Error(failure) => {
                assert_eq!(failure.kind, ErrorKind::Io);
                assert_eq!(failure.message, "I/O error: Worker panicked: index out of range");
            }
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_producer() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();

        let stream = ProgressStream::spawn(move |sender: &ProgressSender<BackupProgress>| {
            let mut result = Ok(());
            for i in 0..10_000u32 {
                result = sender.emit(progress((i % 100) as u8));
                if result.is_err() {
                    break;
                }
            }
            let _ = done_tx.send(result.is_err());
            Err(BackupError::Cancelled)
        });
        drop(stream);

        assert!(done_rx.await.unwrap());
    }
}
