//! Debounced autosave
//!
//! One actor task per session owns the quiet-period timer and the single
//! in-flight save. Edits restart the timer. A timer that expires while a save
//! is running queues one follow-up, which is built from the form state at the
//! moment it starts. Explicit saves cancel the timer and run as soon as the
//! in-flight save has finished.
//!
//! Teardown stops the timer but leaves an in-flight save running; its outcome
//! is discarded.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use draftkit_core::models::{DraftId, SaveReceipt, WizardDraft};
use draftkit_core::{AutosaveConfig, ErrorMetadata, LogLevel, WizardError, WizardResult};
use draftkit_storage::{DraftStore, StoreResult};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

use crate::events::WizardEvent;
use crate::form::FormState;
use crate::payload::{build_patch, PreparedSave};

/// What the autosave indicator shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AutosaveStatus {
    #[default]
    Idle,
    Saving,
    Success,
    Error,
}

/// Result of an explicit save
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub draft_id: DraftId,
    pub sequence: u64,
    pub completed_step: Option<u32>,
    /// Form revision the saved patch was built from
    pub revision: u64,
    pub saved_at: DateTime<Utc>,
}

type SaveReply = oneshot::Sender<WizardResult<SaveOutcome>>;

enum Command {
    SaveNow { current_step: u32, reply: SaveReply },
    SetEnabled(bool),
    Shutdown,
}

struct Shared {
    session_id: Uuid,
    /// Set by the first successful save, never changed afterwards
    draft_id: OnceLock<DraftId>,
    /// Local copy of the draft, updated on every applied save
    draft: Mutex<Option<WizardDraft>>,
    status: watch::Sender<AutosaveStatus>,
    events: broadcast::Sender<WizardEvent>,
}

impl Shared {
    fn draft(&self) -> MutexGuard<'_, Option<WizardDraft>> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: WizardEvent) {
        let _ = self.events.send(event);
    }
}

/// Handle to the autosave actor of one session
#[derive(Clone)]
pub struct AutosaveHandle {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl AutosaveHandle {
    /// Spawn the actor. `draft` is the stored draft when resuming.
    pub fn spawn(
        config: &AutosaveConfig,
        form: FormState,
        store: Arc<dyn DraftStore>,
        session_id: Uuid,
        draft: Option<WizardDraft>,
        events: broadcast::Sender<WizardEvent>,
    ) -> Self {
        let draft_id = OnceLock::new();
        if let Some(draft) = &draft {
            let _ = draft_id.set(draft.id.clone());
        }

        let (status, _) = watch::channel(AutosaveStatus::Idle);
        let shared = Arc::new(Shared {
            session_id,
            draft_id,
            draft: Mutex::new(draft),
            status,
            events,
        });

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let actor = Actor {
            form,
            store,
            shared: shared.clone(),
            quiet_period: config.quiet_period(),
            enabled: config.enabled,
            deadline: None,
            in_flight: None,
            follow_up: false,
            explicit: None,
            next_sequence: 0,
            last_applied: 0,
        };
        tokio::spawn(actor.run(commands_rx));

        Self { commands, shared }
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }

    pub fn draft_id(&self) -> Option<DraftId> {
        self.shared.draft_id.get().cloned()
    }

    /// The draft as of the last applied save
    pub fn draft(&self) -> Option<WizardDraft> {
        self.shared.draft().clone()
    }

    pub fn max_completed_step(&self) -> u32 {
        self.shared
            .draft()
            .as_ref()
            .map_or(0, WizardDraft::max_completed_step)
    }

    pub fn status(&self) -> AutosaveStatus {
        *self.shared.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<AutosaveStatus> {
        self.shared.status.subscribe()
    }

    /// Save immediately, positioning the draft at `current_step`.
    ///
    /// Cancels a pending quiet-period timer. Waits for an in-flight save to
    /// finish first.
    pub async fn save_now(&self, current_step: u32) -> WizardResult<SaveOutcome> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::SaveNow {
                current_step,
                reply,
            })
            .map_err(|_| WizardError::SessionClosed)?;
        outcome.await.map_err(|_| WizardError::SessionClosed)?
    }

    pub fn set_enabled(&self, enabled: bool) {
        let _ = self.commands.send(Command::SetEnabled(enabled));
    }

    /// Stop the timer. An in-flight save is left to finish on its own.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

struct InFlight {
    handle: JoinHandle<StoreResult<SaveReceipt>>,
    prepared: PreparedSave,
    replies: Vec<SaveReply>,
    explicit: bool,
}

struct PendingExplicit {
    current_step: u32,
    replies: Vec<SaveReply>,
}

struct Actor {
    form: FormState,
    store: Arc<dyn DraftStore>,
    shared: Arc<Shared>,
    quiet_period: Duration,
    enabled: bool,
    deadline: Option<Instant>,
    in_flight: Option<InFlight>,
    /// Timer expired while a save was running
    follow_up: bool,
    explicit: Option<PendingExplicit>,
    next_sequence: u64,
    last_applied: u64,
}

async fn join_in_flight(
    in_flight: &mut Option<InFlight>,
) -> Result<StoreResult<SaveReceipt>, JoinError> {
    match in_flight {
        Some(in_flight) => (&mut in_flight.handle).await,
        None => std::future::pending().await,
    }
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut changes = self.form.subscribe();
        tracing::debug!(
            session_id = %self.shared.session_id,
            quiet_period_ms = self.quiet_period.as_millis() as u64,
            enabled = self.enabled,
            "Autosave started"
        );

        loop {
            let deadline = self.deadline;
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::SaveNow { current_step, reply }) => {
                        // The explicit save covers every edit seen so far
                        changes.borrow_and_update();
                        self.request_explicit(current_step, reply);
                    }
                    Some(Command::SetEnabled(enabled)) => self.set_enabled(enabled),
                    Some(Command::Shutdown) | None => break,
                },
                result = join_in_flight(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.finish(result);
                    self.start_next();
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if self.enabled && self.form.is_dirty() {
                        self.deadline = Some(Instant::now() + self.quiet_period);
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    self.quiet_period_elapsed();
                }
            }
        }

        self.close();
    }

    fn set_enabled(&mut self, enabled: bool) {
        tracing::debug!(enabled, "Autosave toggled");
        self.enabled = enabled;
        if !enabled {
            self.deadline = None;
        } else if self.form.is_dirty() && self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.quiet_period);
        }
    }

    fn quiet_period_elapsed(&mut self) {
        if self.in_flight.is_some() {
            tracing::debug!("Save in flight, queueing follow-up");
            self.follow_up = true;
        } else if self.form.is_dirty() {
            self.start_save(self.form.step(), Vec::new(), false);
        }
    }

    fn request_explicit(&mut self, current_step: u32, reply: SaveReply) {
        self.deadline = None;
        if self.in_flight.is_none() {
            self.start_save(current_step, vec![reply], true);
            return;
        }

        let pending = self.explicit.get_or_insert_with(|| PendingExplicit {
            current_step,
            replies: Vec::new(),
        });
        pending.current_step = current_step;
        pending.replies.push(reply);
    }

    fn start_next(&mut self) {
        if let Some(pending) = self.explicit.take() {
            self.follow_up = false;
            self.start_save(pending.current_step, pending.replies, true);
        } else if std::mem::take(&mut self.follow_up) && self.form.is_dirty() {
            self.start_save(self.form.step(), Vec::new(), false);
        }
    }

    fn start_save(&mut self, current_step: u32, replies: Vec<SaveReply>, explicit: bool) {
        self.next_sequence += 1;
        let prepared = build_patch(
            &self.form.snapshot(),
            current_step,
            self.shared.session_id,
            self.next_sequence,
        );

        let draft_id = self.shared.draft_id.get().cloned();
        tracing::debug!(
            draft_id = draft_id.as_ref().map_or("new", DraftId::as_str),
            step = prepared.patch.step,
            current_step,
            sequence = prepared.patch.sequence,
            explicit,
            "Saving draft"
        );

        let store = self.store.clone();
        let patch = prepared.patch.clone();
        let handle = tokio::spawn(async move { store.save(draft_id.as_ref(), &patch).await });

        self.set_status(AutosaveStatus::Saving);
        self.in_flight = Some(InFlight {
            handle,
            prepared,
            replies,
            explicit,
        });
    }

    fn finish(&mut self, result: Result<StoreResult<SaveReceipt>, JoinError>) {
        let Some(InFlight {
            prepared,
            replies,
            explicit,
            ..
        }) = self.in_flight.take()
        else {
            return;
        };

        let outcome = match result {
            Ok(Ok(receipt)) if receipt.success => Ok(self.record_success(receipt.id, &prepared)),
            Ok(Ok(receipt)) => Err(WizardError::save_failure(format!(
                "Draft store did not accept the update to {}",
                receipt.id
            ))),
            Ok(Err(e)) => Err(WizardError::from(e)),
            Err(e) => Err(WizardError::save_failure(format!("Save task failed: {}", e))),
        };

        match &outcome {
            Ok(saved) => {
                self.set_status(AutosaveStatus::Success);
                self.shared.emit(WizardEvent::DraftSaved {
                    draft_id: saved.draft_id.clone(),
                    step: prepared.patch.step,
                    sequence: saved.sequence,
                });
            }
            Err(e) => {
                log_save_failure(e, &prepared, explicit);
                self.set_status(AutosaveStatus::Error);
                self.shared.emit(WizardEvent::SaveFailed {
                    step: prepared.patch.step,
                    error_code: e.error_code(),
                    message: e.client_message(),
                    blocking: explicit,
                });
            }
        }

        for reply in replies {
            let _ = reply.send(outcome.clone());
        }
    }

    fn record_success(&mut self, id: DraftId, prepared: &PreparedSave) -> SaveOutcome {
        let saved_at = Utc::now();
        let sequence = prepared.patch.sequence;

        let draft_id = self
            .shared
            .draft_id
            .get_or_init(|| {
                tracing::info!(draft_id = %id, session_id = %self.shared.session_id, "Draft created");
                id.clone()
            })
            .clone();
        if draft_id != id {
            tracing::warn!(
                draft_id = %draft_id,
                returned_id = %id,
                "Draft store returned a different id, keeping the original"
            );
        }

        if sequence > self.last_applied {
            self.last_applied = sequence;
            self.shared
                .draft()
                .get_or_insert_with(|| WizardDraft::new(draft_id.clone()))
                .apply_patch(&prepared.patch, saved_at);
            let clean = self.form.mark_saved(prepared.revision, &prepared.asset_ids);
            tracing::debug!(draft_id = %draft_id, sequence, clean, "Draft saved");
        } else {
            tracing::debug!(
                draft_id = %draft_id,
                sequence,
                last_applied = self.last_applied,
                "Ignoring completion of an older save"
            );
        }

        SaveOutcome {
            draft_id,
            sequence,
            completed_step: prepared.patch.completed_step,
            revision: prepared.revision,
            saved_at,
        }
    }

    fn set_status(&self, status: AutosaveStatus) {
        let changed = self.shared.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            self.shared
                .emit(WizardEvent::AutosaveStatusChanged { status });
        }
    }

    fn close(&mut self) {
        self.deadline = None;
        self.follow_up = false;

        if let Some(pending) = self.explicit.take() {
            for reply in pending.replies {
                let _ = reply.send(Err(WizardError::SessionClosed));
            }
        }
        if let Some(in_flight) = self.in_flight.take() {
            tracing::debug!(
                sequence = in_flight.prepared.patch.sequence,
                "Leaving in-flight save to complete"
            );
            for reply in in_flight.replies {
                let _ = reply.send(Err(WizardError::SessionClosed));
            }
        }

        tracing::debug!(session_id = %self.shared.session_id, "Autosave stopped");
    }
}

fn log_save_failure(error: &WizardError, prepared: &PreparedSave, explicit: bool) {
    let step = prepared.patch.step;
    let sequence = prepared.patch.sequence;
    match error.log_level() {
        LogLevel::Error => {
            tracing::error!(step, sequence, explicit, error = %error, "Draft save failed")
        }
        LogLevel::Warn => {
            tracing::warn!(step, sequence, explicit, error = %error, "Draft save failed")
        }
        LogLevel::Debug => {
            tracing::debug!(step, sequence, explicit, error = %error, "Draft save failed")
        }
    }
}
