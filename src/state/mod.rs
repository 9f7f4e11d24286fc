// State management module
//
// This module provides the StateManager which wraps AppState with thread-safe access
// using Arc<RwLock<T>> and emits change events for the view layer.

mod lifecycle;

pub use lifecycle::{CHAT_FALLBACK_ERROR_MESSAGE, FALLBACK_ERROR_MESSAGE, error_message};

use crate::metrics::Metrics;
use crate::models::{AppState, AspectRatio, ChatRole, Image};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// These events notify the view about state changes without requiring it to poll.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// A wrapped operation has started
    OperationStarted { label: String },

    /// The busy flag has been cleared
    OperationFinished,

    /// The global error banner has been set
    ErrorRaised { message: String },

    /// The global error banner has been cleared
    ErrorCleared,

    /// A new upload replaced the edit history
    ImageUploaded,

    /// The working image changed (edit or reset)
    CurrentImageChanged { matches_original: bool },

    /// The analysis text has been overwritten
    AnalysisUpdated,

    /// The pending analysis question changed
    AnalysisPromptChanged,

    /// A new image has been generated
    ImageGenerated,

    /// Generation prompt or aspect ratio changed
    GenerationSettingsChanged { aspect_ratio: AspectRatio },

    /// A transcript entry was appended
    ChatMessageAppended { role: ChatRole, index: usize },

    /// The chat panel entered or left AwaitingResponse
    ChatStatusChanged { awaiting: bool },
}

/// Thread-safe state manager with event emission
///
/// This is the central state management component that:
/// - Provides thread-safe access to [`AppState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Runs remote operations through the lifecycle wrapper ([`with_loading`](Self::with_loading))
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// The lock is never held across an `.await`: every mutation is a synchronous
/// closure passed to [`update()`](Self::update).
///
/// # Related Types
///
/// - [`crate::models::AppState`]: The underlying state structure
/// - [`StateChange`]: Event types emitted on state mutations
/// - [`crate::ui::StudioController`]: Owner of the manager and the panel controllers
pub struct StateManager {
    /// The application state protected by RwLock for thread-safe access
    state: Arc<RwLock<AppState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,

    metrics: Arc<Metrics>,
}

impl StateManager {
    /// Create a new StateManager with default state and its own metrics
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(Metrics::new()))
    }

    /// Create a StateManager that records into shared metrics
    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Get a read-only snapshot of the current state
    ///
    /// Images are reference counted, so the clone is shallow for image data.
    pub fn snapshot(&self) -> AppState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let busy = state_manager.read(|state| state.is_busy());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// This is the primary way to modify state. It:
    /// 1. Captures the old state
    /// 2. Applies the update function
    /// 3. Detects what changed
    /// 4. Emits appropriate events
    ///
    /// # Arguments
    /// * `update_fn` - A function that mutates the state
    ///
    /// # Returns
    /// A vector of StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);
        self.metrics.record_state_update();

        let changes = detect_changes(&old_state, &state);

        for change in &changes {
            // Having no subscribers is fine
            match self.state_tx.send(change.clone()) {
                Ok(_) => self.metrics.record_state_broadcast(),
                Err(_) => self.metrics.record_state_broadcast_error(),
            }
        }

        changes
    }

    /// Subscribe to state change events
    ///
    /// Returns a receiver that will get notified of all future state changes.
    /// Multiple subscribers can listen simultaneously.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    // Convenience methods for common state updates

    /// Set the global error banner
    pub fn set_error(&self, message: impl Into<String>) -> Vec<StateChange> {
        let message = message.into();
        self.update(|state| state.status.error = Some(message))
    }

    /// Clear the global error banner
    pub fn dismiss_error(&self) -> Vec<StateChange> {
        self.update(|state| state.status.error = None)
    }

    /// Start a new edit history from an uploaded image
    pub fn load_image(&self, image: Image) -> Vec<StateChange> {
        self.update(|state| state.editor.load(image))
    }

    /// Replace the working image with an edit result
    pub fn apply_edit(&self, image: Image) -> Vec<StateChange> {
        self.update(|state| {
            state.editor.apply_edit(image);
        })
    }

    /// Restore the working image to the original
    pub fn reset_image(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.editor.reset();
        })
    }

    /// Overwrite the analysis result, optionally clearing the pending question
    pub fn set_analysis(&self, text: String, clear_prompt: bool) -> Vec<StateChange> {
        self.update(|state| {
            state.editor.analysis_result = text;
            if clear_prompt {
                state.editor.analysis_prompt.clear();
            }
        })
    }

    pub fn set_analysis_prompt(&self, text: impl Into<String>) -> Vec<StateChange> {
        let text = text.into();
        self.update(|state| state.editor.analysis_prompt = text)
    }

    pub fn set_generated_image(&self, image: Image) -> Vec<StateChange> {
        self.update(|state| state.generation.generated_image = Some(image))
    }

    pub fn set_generation_prompt(&self, prompt: impl Into<String>) -> Vec<StateChange> {
        let prompt = prompt.into();
        self.update(|state| state.generation.prompt = prompt)
    }

    pub fn select_aspect_ratio(&self, aspect_ratio: AspectRatio) -> Vec<StateChange> {
        self.update(|state| state.generation.aspect_ratio = aspect_ratio)
    }

    /// Append the user's turn and enter AwaitingResponse.
    ///
    /// Returns `None` (and changes nothing) when a reply is already pending.
    pub fn begin_chat_turn(&self, message: &str) -> Option<Vec<StateChange>> {
        let mut accepted = false;
        let changes = self.update(|state| {
            if state.chat.is_chatting {
                return;
            }
            accepted = true;
            state.chat.append_user_turn(message);
            state.chat.is_chatting = true;
            state.status.error = None;
        });
        accepted.then_some(changes)
    }

    /// Append the model's reply and return to Idle
    pub fn finish_chat_turn(&self, reply: String) -> Vec<StateChange> {
        self.update(|state| {
            state.chat.append_model_turn(reply);
            state.chat.is_chatting = false;
        })
    }

    /// Append a synthetic error reply, raise the banner and return to Idle
    pub fn fail_chat_turn(&self, message: &str) -> Vec<StateChange> {
        self.update(|state| {
            state.chat.append_error_turn(message);
            state.chat.is_chatting = false;
            state.status.error = Some(message.to_string());
        })
    }
}

/// Whether two image slots hold the same image value (not just equal bytes)
fn same_slot(old: Option<&Image>, new: Option<&Image>) -> bool {
    match (old, new) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        (None, None) => true,
        _ => false,
    }
}

/// Detect what changed between two states and generate events
///
/// Status events bracket the data events: `OperationStarted` comes first and
/// `OperationFinished` last.
fn detect_changes(old: &AppState, new: &AppState) -> Vec<StateChange> {
    let mut changes = Vec::new();

    if !old.status.busy && new.status.busy {
        changes.push(StateChange::OperationStarted {
            label: new.status.label.clone(),
        });
    }

    if old.status.error != new.status.error {
        match &new.status.error {
            Some(message) => changes.push(StateChange::ErrorRaised {
                message: message.clone(),
            }),
            None => changes.push(StateChange::ErrorCleared),
        }
    }

    // Editor
    let uploaded = !same_slot(old.editor.original_image(), new.editor.original_image());
    if uploaded {
        changes.push(StateChange::ImageUploaded);
    } else if !same_slot(old.editor.current_image(), new.editor.current_image()) {
        changes.push(StateChange::CurrentImageChanged {
            matches_original: !new.editor.can_reset(),
        });
    }

    if old.editor.analysis_result != new.editor.analysis_result {
        changes.push(StateChange::AnalysisUpdated);
    }

    if old.editor.analysis_prompt != new.editor.analysis_prompt {
        changes.push(StateChange::AnalysisPromptChanged);
    }

    // Generation
    if !same_slot(
        old.generation.generated_image.as_ref(),
        new.generation.generated_image.as_ref(),
    ) {
        changes.push(StateChange::ImageGenerated);
    }

    if old.generation.prompt != new.generation.prompt
        || old.generation.aspect_ratio != new.generation.aspect_ratio
    {
        changes.push(StateChange::GenerationSettingsChanged {
            aspect_ratio: new.generation.aspect_ratio,
        });
    }

    // Chat
    for (index, message) in new.chat.messages().iter().enumerate().skip(old.chat.len()) {
        changes.push(StateChange::ChatMessageAppended {
            role: message.role,
            index,
        });
    }

    if old.chat.is_chatting != new.chat.is_chatting {
        changes.push(StateChange::ChatStatusChanged {
            awaiting: new.chat.is_chatting,
        });
    }

    if old.status.busy && !new.status.busy {
        changes.push(StateChange::OperationFinished);
    }

    changes
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageFormat;
    use std::sync::atomic::Ordering;

    fn image(byte: u8) -> Image {
        Image::new(vec![byte; 8], ImageFormat::Png)
    }

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(!state.is_busy());
        assert!(state.error().is_none());
        assert!(!state.editor.has_image());
    }

    #[test]
    fn test_update_with_change_detection() {
        let manager = StateManager::new();

        let changes = manager.update(|state| {
            state.status.busy = true;
            state.status.label = "Generating image...".to_string();
        });

        assert_eq!(
            changes,
            vec![StateChange::OperationStarted {
                label: "Generating image...".to_string()
            }]
        );
    }

    #[test]
    fn test_operation_finished_comes_last() {
        let manager = StateManager::new();
        manager.update(|state| state.status.busy = true);

        let changes = manager.update(|state| {
            state.status.busy = false;
            state.status.error = Some("boom".to_string());
        });

        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], StateChange::ErrorRaised { .. }));
        assert_eq!(changes[1], StateChange::OperationFinished);
    }

    #[test]
    fn test_load_image_events() {
        let manager = StateManager::new();

        let changes = manager.load_image(image(1));

        assert_eq!(changes, vec![StateChange::ImageUploaded]);
        assert!(manager.read(|s| s.editor.has_image()));
    }

    #[test]
    fn test_reupload_of_identical_bytes_is_still_an_upload() {
        let manager = StateManager::new();
        manager.load_image(image(1));

        let changes = manager.load_image(image(1));

        assert_eq!(changes, vec![StateChange::ImageUploaded]);
    }

    #[test]
    fn test_edit_and_reset_events() {
        let manager = StateManager::new();
        manager.load_image(image(1));

        let changes = manager.apply_edit(image(2));
        assert_eq!(
            changes,
            vec![StateChange::CurrentImageChanged {
                matches_original: false
            }]
        );

        let changes = manager.reset_image();
        assert_eq!(
            changes,
            vec![StateChange::CurrentImageChanged {
                matches_original: true
            }]
        );

        // Nothing left to reset
        assert!(manager.reset_image().is_empty());
    }

    #[test]
    fn test_apply_edit_without_image_emits_nothing() {
        let manager = StateManager::new();
        assert!(manager.apply_edit(image(2)).is_empty());
    }

    #[test]
    fn test_set_analysis_clears_prompt() {
        let manager = StateManager::new();
        manager.set_analysis_prompt("What breed?");

        let changes = manager.set_analysis("A tabby".to_string(), true);

        assert_eq!(
            changes,
            vec![StateChange::AnalysisUpdated, StateChange::AnalysisPromptChanged]
        );
        let state = manager.snapshot();
        assert_eq!(state.editor.analysis_result, "A tabby");
        assert!(state.editor.analysis_prompt.is_empty());
    }

    #[test]
    fn test_generation_settings() {
        let manager = StateManager::new();

        let changes = manager.select_aspect_ratio(AspectRatio::Wide);
        assert_eq!(
            changes,
            vec![StateChange::GenerationSettingsChanged {
                aspect_ratio: AspectRatio::Wide
            }]
        );

        // Same value again is not a change
        assert!(manager.select_aspect_ratio(AspectRatio::Wide).is_empty());

        let changes = manager.set_generated_image(image(5));
        assert_eq!(changes, vec![StateChange::ImageGenerated]);
    }

    #[test]
    fn test_chat_turn_success() {
        let manager = StateManager::new();
        manager.set_error("stale");

        let changes = manager.begin_chat_turn("Hello").unwrap();
        assert_eq!(
            changes,
            vec![
                StateChange::ErrorCleared,
                StateChange::ChatMessageAppended {
                    role: ChatRole::User,
                    index: 0
                },
                StateChange::ChatStatusChanged { awaiting: true },
            ]
        );

        let changes = manager.finish_chat_turn("Hi!".to_string());
        assert_eq!(
            changes,
            vec![
                StateChange::ChatMessageAppended {
                    role: ChatRole::Model,
                    index: 1
                },
                StateChange::ChatStatusChanged { awaiting: false },
            ]
        );
    }

    #[test]
    fn test_begin_chat_turn_while_awaiting_is_rejected() {
        let manager = StateManager::new();
        manager.begin_chat_turn("first").unwrap();

        assert!(manager.begin_chat_turn("second").is_none());
        assert_eq!(manager.read(|s| s.chat.len()), 1);
    }

    #[test]
    fn test_fail_chat_turn() {
        let manager = StateManager::new();
        manager.begin_chat_turn("Hello").unwrap();

        let changes = manager.fail_chat_turn("network down");

        assert!(changes.contains(&StateChange::ErrorRaised {
            message: "network down".to_string()
        }));
        let state = manager.snapshot();
        assert_eq!(state.chat.messages()[1].text, "Sorry, an error occurred: network down");
        assert!(!state.chat.is_chatting);
    }

    #[test]
    fn test_dismiss_error() {
        let manager = StateManager::new();
        manager.set_error("oops");

        assert_eq!(manager.dismiss_error(), vec![StateChange::ErrorCleared]);
        assert!(manager.dismiss_error().is_empty());
    }

    #[test]
    fn test_subscribe_to_changes() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.set_error("boom");

        let event = rx.try_recv();
        assert!(event.is_ok());
        assert!(matches!(event.unwrap(), StateChange::ErrorRaised { .. }));
    }

    #[test]
    fn test_multiple_subscribers() {
        let manager = StateManager::new();
        let mut rx1 = manager.subscribe();
        let mut rx2 = manager.subscribe();

        manager.load_image(image(1));

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_clone_state_manager() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.set_generation_prompt("a lighthouse");

        assert_eq!(manager2.read(|s| s.generation.prompt.clone()), "a lighthouse");
    }

    #[test]
    fn test_metrics_count_updates_and_broadcasts() {
        let manager = StateManager::new();
        let _rx = manager.subscribe();

        manager.set_error("x");
        manager.update(|_| {});

        let metrics = manager.metrics();
        assert_eq!(metrics.state_updates.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.state_broadcasts.load(Ordering::Relaxed), 1);
    }
}
