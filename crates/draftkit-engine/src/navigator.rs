//! Step navigation
//!
//! The navigator is the only component that changes the displayed step. A
//! transition validates the current step (forward moves only), saves it
//! immediately and then loads the target step into the form. The step is only
//! swapped once the save covers everything the form holds; an edit or upload
//! landing mid-save triggers another round. Requests are serialized: one
//! arriving while another is running fails with `Busy`.

use std::sync::Arc;

use draftkit_core::models::StepDefinition;
use draftkit_core::{WizardError, WizardResult};
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};

use crate::events::WizardEvent;
use crate::form::FormState;
use crate::scheduler::AutosaveHandle;

/// Saves attempted per transition before giving up on a step that keeps changing
const MAX_SAVE_ROUNDS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigatorState {
    #[default]
    Idle,
    Validating,
    Saving,
    Navigating,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Forward,
    Back,
    /// Direct jump through a step indicator
    Jump(u32),
}

pub struct StepNavigator {
    steps: Arc<[StepDefinition]>,
    form: FormState,
    autosave: AutosaveHandle,
    state: watch::Sender<NavigatorState>,
    gate: Mutex<()>,
    events: broadcast::Sender<WizardEvent>,
}

impl StepNavigator {
    pub fn new(
        steps: Arc<[StepDefinition]>,
        form: FormState,
        autosave: AutosaveHandle,
        events: broadcast::Sender<WizardEvent>,
    ) -> Self {
        let (state, _) = watch::channel(NavigatorState::Idle);
        Self {
            steps,
            form,
            autosave,
            state,
            gate: Mutex::new(()),
            events,
        }
    }

    pub fn state(&self) -> NavigatorState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<NavigatorState> {
        self.state.subscribe()
    }

    pub fn current_step(&self) -> u32 {
        self.form.step()
    }

    pub fn total_steps(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn current_definition(&self) -> Option<&StepDefinition> {
        let step = self.current_step();
        self.steps.iter().find(|definition| definition.number == step)
    }

    pub fn is_first_step(&self) -> bool {
        self.current_step() <= 1
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step() >= self.total_steps()
    }

    pub fn progress_percent(&self) -> u8 {
        let total = self.total_steps().max(1);
        ((self.current_step().min(total) * 100) / total) as u8
    }

    /// Furthest step a jump may target
    pub fn max_reachable_step(&self) -> u32 {
        (self.autosave.max_completed_step() + 1).min(self.total_steps())
    }

    pub async fn forward(&self) -> WizardResult<u32> {
        self.navigate(Transition::Forward).await
    }

    pub async fn back(&self) -> WizardResult<u32> {
        self.navigate(Transition::Back).await
    }

    pub async fn jump(&self, target: u32) -> WizardResult<u32> {
        self.navigate(Transition::Jump(target)).await
    }

    /// Run one transition and return the step now displayed
    pub async fn navigate(&self, transition: Transition) -> WizardResult<u32> {
        let _guard = self.gate.try_lock().map_err(|_| {
            tracing::debug!(?transition, "Navigation already in progress");
            WizardError::Busy
        })?;

        let from = self.form.step();
        if transition == Transition::Jump(from) {
            return Ok(from);
        }
        let (to, validate) = self.plan(from, transition)?;

        match self.transition(from, to, validate).await {
            Ok(step) => Ok(step),
            Err(e) => {
                tracing::debug!(from, to, error = %e, "Navigation failed");
                self.set_state(NavigatorState::Error);
                Err(e)
            }
        }
    }

    /// Target step and whether the current step must validate first
    fn plan(&self, from: u32, transition: Transition) -> WizardResult<(u32, bool)> {
        let total = self.total_steps();
        match transition {
            Transition::Forward if from >= total => Err(WizardError::InvalidTransition {
                from,
                to: from + 1,
            }),
            Transition::Forward => Ok((from + 1, true)),
            Transition::Back if from <= 1 => Err(WizardError::InvalidTransition {
                from,
                to: from.saturating_sub(1),
            }),
            Transition::Back => Ok((from - 1, false)),
            Transition::Jump(target) if target == 0 || target > total => {
                Err(WizardError::InvalidTransition { from, to: target })
            }
            Transition::Jump(target) if target < from => Ok((target, false)),
            Transition::Jump(target) => {
                let max_allowed = self.max_reachable_step();
                if target > max_allowed {
                    return Err(WizardError::JumpNotAllowed {
                        target,
                        max_allowed,
                    });
                }
                Ok((target, true))
            }
        }
    }

    async fn transition(&self, from: u32, to: u32, validate: bool) -> WizardResult<u32> {
        if validate {
            self.validate_current()?;
        }

        for round in 1..=MAX_SAVE_ROUNDS {
            self.set_state(NavigatorState::Saving);
            let outcome = self.autosave.save_now(to).await.map_err(|e| {
                if let Some(errors) = e.field_errors() {
                    self.form.set_errors(errors.clone());
                }
                e
            })?;

            // An edit between validation and the save leaves the step incomplete
            if validate && outcome.completed_step != Some(from) {
                tracing::debug!(from, round, "Step changed after validation, validating again");
                if let Err(e) = self.validate_current() {
                    self.restore_position(from).await;
                    return Err(e);
                }
                continue;
            }

            self.set_state(NavigatorState::Navigating);
            let fields = self
                .autosave
                .draft()
                .map(|draft| draft.step_fields(to))
                .unwrap_or_default();
            if !self.form.switch_step(outcome.revision, to, fields) {
                tracing::debug!(
                    from,
                    round,
                    saved_revision = outcome.revision,
                    "Step changed while saving, saving again"
                );
                if validate {
                    if let Err(e) = self.validate_current() {
                        self.restore_position(from).await;
                        return Err(e);
                    }
                }
                continue;
            }
            self.set_state(NavigatorState::Idle);

            tracing::info!(draft_id = %outcome.draft_id, from, to, "Step changed");
            let _ = self.events.send(WizardEvent::StepChanged { from, to });
            return Ok(to);
        }

        self.restore_position(from).await;
        Err(WizardError::save_failure(
            "The step kept changing while it was being saved",
        ))
    }

    fn validate_current(&self) -> WizardResult<()> {
        self.set_state(NavigatorState::Validating);
        self.form.validate().into_result()
    }

    /// Point the stored draft back at `step` after a save already moved it on
    async fn restore_position(&self, step: u32) {
        if let Err(e) = self.autosave.save_now(step).await {
            tracing::warn!(step, error = %e, "Failed to restore the draft position");
        }
    }

    fn set_state(&self, state: NavigatorState) {
        self.state.send_replace(state);
        let _ = self
            .events
            .send(WizardEvent::NavigatorStateChanged { state });
    }
}
