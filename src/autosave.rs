//! Debounced persistence for free-text editors (notes, journal).
//!
//! Every edit bumps a generation counter and schedules a commit after the
//! debounce interval. A timer only commits if its generation is still the
//! newest, so a burst of edits results in one write of the final content.

use crate::errors::{AppError, AppResult};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

type CommitFuture = Pin<Box<dyn Future<Output = AppResult<()>> + Send>>;
pub type Committer = Arc<dyn Fn(String) -> CommitFuture + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    Clean,
    Dirty,
    Saving,
    Error(String),
}

struct Draft {
    content: String,
    baseline: String,
    generation: u64,
    state: SaveState,
}

#[derive(Clone)]
pub struct AutoSaver {
    draft: Arc<Mutex<Draft>>,
    // Serialises commits so an older save can never land after a newer one.
    commit_lock: Arc<Mutex<()>>,
    committer: Committer,
    debounce: Duration,
}

impl AutoSaver {
    pub fn new(initial: impl Into<String>, debounce: Duration, committer: Committer) -> Self {
        let initial = initial.into();
        Self {
            draft: Arc::new(Mutex::new(Draft {
                content: initial.clone(),
                baseline: initial,
                generation: 0,
                state: SaveState::Clean,
            })),
            commit_lock: Arc::new(Mutex::new(())),
            committer,
            debounce,
        }
    }

    pub async fn state(&self) -> SaveState {
        self.draft.lock().await.state.clone()
    }

    pub async fn content(&self) -> String {
        self.draft.lock().await.content.clone()
    }

    pub async fn is_dirty(&self) -> bool {
        matches!(self.state().await, SaveState::Dirty)
    }

    /// Records new editor content and (re)schedules the commit.
    pub async fn edit(&self, content: impl Into<String>) {
        let generation = {
            let mut draft = self.draft.lock().await;
            draft.content = content.into();
            draft.generation += 1;
            if draft.content == draft.baseline && draft.state != SaveState::Saving {
                draft.state = SaveState::Clean;
                return;
            }
            draft.state = SaveState::Dirty;
            draft.generation
        };

        let saver = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(saver.debounce).await;
            if let Err(error) = saver.commit_generation(generation).await {
                tracing::warn!(error = %error, "autosave commit failed");
            }
        });
    }

    /// Commits pending content immediately, superseding any scheduled timer.
    pub async fn flush_now(&self) -> AppResult<()> {
        let generation = {
            let mut draft = self.draft.lock().await;
            draft.generation += 1;
            draft.generation
        };
        self.commit_generation(generation).await
    }

    async fn commit_generation(&self, generation: u64) -> AppResult<()> {
        let _commit = self.commit_lock.lock().await;
        let content = {
            let mut draft = self.draft.lock().await;
            if draft.generation != generation {
                return Ok(());
            }
            // Holding the commit lock means no save is in flight, so any
            // difference from the baseline is unsaved whatever the state says.
            if draft.content == draft.baseline {
                draft.state = SaveState::Clean;
                return Ok(());
            }
            draft.state = SaveState::Saving;
            draft.content.clone()
        };

        let result = (self.committer)(content.clone()).await;

        let mut draft = self.draft.lock().await;
        match result {
            Ok(()) => {
                draft.baseline = content;
                if draft.generation == generation {
                    draft.state = SaveState::Clean;
                } else if draft.content == draft.baseline {
                    draft.state = SaveState::Clean;
                } else {
                    draft.state = SaveState::Dirty;
                }
                tracing::debug!(generation, "autosave committed");
                Ok(())
            }
            Err(error) => {
                let message = error.to_string();
                if draft.generation == generation || draft.state == SaveState::Saving {
                    draft.state = SaveState::Error(message.clone());
                }
                Err(AppError::Internal(format!("autosave failed: {}", message)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AutoSaver, Committer, SaveState};
    use crate::errors::AppError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::{sleep, Duration};

    fn recording(log: Arc<Mutex<Vec<String>>>, fail: Arc<AtomicBool>) -> Committer {
        Arc::new(move |content: String| {
            let log = log.clone();
            let fail = fail.clone();
            Box::pin(async move {
                if fail.load(Ordering::SeqCst) {
                    return Err(AppError::Internal("disk full".to_string()));
                }
                log.lock().expect("log lock").push(content);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn rapid_edits_commit_once_with_last_content() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let saver = AutoSaver::new("", Duration::from_millis(40), recording(log.clone(), Arc::default()));

        saver.edit("h").await;
        saver.edit("he").await;
        saver.edit("hello").await;
        assert_eq!(saver.state().await, SaveState::Dirty);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(*log.lock().expect("log lock"), vec!["hello".to_string()]);
        assert_eq!(saver.state().await, SaveState::Clean);
    }

    #[tokio::test]
    async fn reverting_to_saved_content_is_clean_without_commit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let saver = AutoSaver::new("draft", Duration::from_millis(30), recording(log.clone(), Arc::default()));

        saver.edit("draft!").await;
        saver.edit("draft").await;
        assert_eq!(saver.state().await, SaveState::Clean);

        sleep(Duration::from_millis(120)).await;
        assert!(log.lock().expect("log lock").is_empty());
    }

    #[tokio::test]
    async fn flush_now_commits_and_cancels_the_timer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let saver = AutoSaver::new("", Duration::from_millis(60), recording(log.clone(), Arc::default()));

        saver.edit("closing the editor").await;
        saver.flush_now().await.expect("flush");
        assert_eq!(saver.state().await, SaveState::Clean);

        sleep(Duration::from_millis(150)).await;
        assert_eq!(log.lock().expect("log lock").len(), 1);
    }

    #[tokio::test]
    async fn failed_commit_surfaces_error_then_recovers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fail = Arc::new(AtomicBool::new(true));
        let saver = AutoSaver::new("", Duration::from_millis(20), recording(log.clone(), fail.clone()));

        saver.edit("first").await;
        sleep(Duration::from_millis(100)).await;
        assert!(matches!(saver.state().await, SaveState::Error(message) if message.contains("disk full")));

        fail.store(false, Ordering::SeqCst);
        saver.flush_now().await.expect("retry");
        assert_eq!(saver.state().await, SaveState::Clean);
        assert_eq!(*log.lock().expect("log lock"), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn flush_after_an_in_flight_failure_retries_the_save() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let attempts = Arc::new(AtomicUsize::new(0));
        let committer: Committer = {
            let log = log.clone();
            let attempts = attempts.clone();
            Arc::new(move |content: String| {
                let log = log.clone();
                let attempts = attempts.clone();
                Box::pin(async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_millis(100)).await;
                    if attempt == 0 {
                        return Err(AppError::Internal("database locked".to_string()));
                    }
                    log.lock().expect("log lock").push(content);
                    Ok(())
                })
            })
        };
        let saver = AutoSaver::new("", Duration::from_millis(10), committer);

        saver.edit("important").await;
        assert!(saver.is_dirty().await);
        sleep(Duration::from_millis(40)).await;
        assert_eq!(saver.state().await, SaveState::Saving);

        saver.flush_now().await.expect("flush");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(*log.lock().expect("log lock"), vec!["important".to_string()]);
        assert_eq!(saver.state().await, SaveState::Clean);
        assert!(!saver.is_dirty().await);
    }

    #[tokio::test]
    async fn failure_of_a_superseded_commit_is_still_reported() {
        let fail = Arc::new(AtomicBool::new(true));
        let committer: Committer = {
            let fail = fail.clone();
            Arc::new(move |_content: String| {
                let fail = fail.clone();
                Box::pin(async move {
                    sleep(Duration::from_millis(60)).await;
                    if fail.load(Ordering::SeqCst) {
                        return Err(AppError::Internal("disk full".to_string()));
                    }
                    Ok(())
                })
            })
        };
        let saver = AutoSaver::new("", Duration::from_millis(10), committer);

        saver.edit("draft").await;
        sleep(Duration::from_millis(30)).await;
        assert!(saver.flush_now().await.is_err());
        assert!(matches!(saver.state().await, SaveState::Error(message) if message.contains("disk full")));
    }
}
