use crate::models::{AspectRatio, ChatMessage, Image};

/// Status label shown while an upload is being read
pub const UPLOAD_LABEL: &str = "Reading image...";

/// Status label shown while the quick description runs
pub const QUICK_ANALYSIS_LABEL: &str = "Analyzing image...";

/// Status label shown while a prompted analysis runs
pub const PROMPTED_ANALYSIS_LABEL: &str = "Analyzing with prompt...";

/// Status label shown while an image is generated
pub const GENERATION_LABEL: &str = "Generating image...";

/// Status label for an edit, e.g. `Applying: Enhance...`
pub fn edit_label(tool_name: &str) -> String {
    format!("Applying: {}...", tool_name)
}

/// Process-wide single-flight status shared by the editor and generation panels.
///
/// Only the lifecycle wrapper ([`crate::state::StateManager::with_loading`]) sets
/// `busy`/`label`; the error banner is additionally set by chat failures and
/// cleared when the user dismisses it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperationStatus {
    pub busy: bool,
    pub label: String,
    pub error: Option<String>,
}

/// Editor panel state: the two edit-history slots plus analysis.
///
/// Invariant: `current_image.is_some() == original_image.is_some()`. The fields
/// are public for reading; mutations go through the methods below so the
/// invariant cannot be broken.
#[derive(Clone, Debug, Default)]
pub struct EditorState {
    original_image: Option<Image>,
    current_image: Option<Image>,
    pub analysis_result: String,
    pub analysis_prompt: String,
    pub edits_applied: usize,
}

impl EditorState {
    pub fn original_image(&self) -> Option<&Image> {
        self.original_image.as_ref()
    }

    pub fn current_image(&self) -> Option<&Image> {
        self.current_image.as_ref()
    }

    pub fn has_image(&self) -> bool {
        self.current_image.is_some()
    }

    /// Whether Reset would change anything
    pub fn can_reset(&self) -> bool {
        match (&self.original_image, &self.current_image) {
            (Some(original), Some(current)) => original != current,
            _ => false,
        }
    }

    /// Start a fresh edit history from an uploaded image
    pub fn load(&mut self, image: Image) {
        self.original_image = Some(image.clone());
        self.current_image = Some(image);
        self.analysis_result.clear();
        self.analysis_prompt.clear();
        self.edits_applied = 0;
    }

    /// Replace the working image with an edit result. Ignored when nothing is loaded.
    pub fn apply_edit(&mut self, image: Image) -> bool {
        if self.original_image.is_none() {
            return false;
        }
        self.current_image = Some(image);
        self.edits_applied += 1;
        true
    }

    /// Restore the working image to the uploaded original
    pub fn reset(&mut self) -> bool {
        match &self.original_image {
            Some(original) => {
                self.current_image = Some(original.clone());
                self.edits_applied = 0;
                true
            }
            None => false,
        }
    }
}

/// Generation panel state
#[derive(Clone, Debug, Default)]
pub struct GenerationState {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub generated_image: Option<Image>,
}

/// Chat panel state: append-only transcript and the panel's own busy flag.
#[derive(Clone, Debug, Default)]
pub struct ChatState {
    messages: Vec<ChatMessage>,
    pub is_chatting: bool,
}

impl ChatState {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn append_user_turn(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    pub fn append_model_turn(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::model(text));
    }

    pub fn append_error_turn(&mut self, message: &str) {
        self.messages.push(ChatMessage::error(message));
    }
}

/// Single source of truth for all application state.
///
/// Each panel owns its own section; the shared [`OperationStatus`] is the only
/// cross-cutting part.
///
/// # Thread Safety
///
/// `AppState` is wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`].
/// Never access `AppState` directly - always use [`StateManager`](crate::state::StateManager)
/// methods:
/// - [`read()`](crate::state::StateManager::read) for read-only access
/// - [`update()`](crate::state::StateManager::update) for mutations with automatic change events
#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub status: OperationStatus,
    pub editor: EditorState,
    pub generation: GenerationState,
    pub chat: ChatState,
}

impl AppState {
    pub fn is_busy(&self) -> bool {
        self.status.busy
    }

    pub fn error(&self) -> Option<&str> {
        self.status.error.as_deref()
    }
}
