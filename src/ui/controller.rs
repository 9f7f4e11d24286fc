// Studio Controller - owns application state and the panel controllers
//
// This module contains the StudioController which coordinates between:
// - StateManager (application state + change events)
// - EditorController / GenerationController / ChatController (panel actions)
// - InferenceClient (remote model, shared by the panels)
//
// The chat session is created here exactly once and lives as long as the controller.

use crate::metrics::Metrics;
use crate::models::StudioSettings;
use crate::services::InferenceClient;
use crate::state::StateManager;
use crate::ui::{ChatController, EditorController, GenerationController};
use camino::Utf8PathBuf;
use std::sync::Arc;

/// Top-level controller wiring the panels to shared state.
///
/// Panels never call each other; they only share the [`StateManager`].
///
/// # Example
/// ```ignore
/// let settings = config_manager.load_settings()?;
/// let client = Arc::new(GeminiClient::new(&settings, api_key_from_env())?);
/// let studio = StudioController::from_settings(client, &settings);
///
/// studio.editor().upload(Utf8Path::new("photo.jpg")).await;
/// studio.editor().apply_tool("enhance").await;
/// ```
pub struct StudioController {
    state: StateManager,
    editor: EditorController,
    generation: GenerationController,
    chat: ChatController,
}

impl StudioController {
    /// Create the controller and open the chat session
    ///
    /// # Arguments
    /// * `client` - Remote model shared by all panels
    /// * `download_dir` - Where downloads and saved generations are written
    pub fn new(client: Arc<dyn InferenceClient>, download_dir: impl Into<Utf8PathBuf>) -> Self {
        let download_dir = download_dir.into();
        let state = StateManager::with_metrics(Arc::new(Metrics::new()));
        let session = client.create_session();

        tracing::info!("Studio controller initialized (downloads: {})", download_dir);

        Self {
            editor: EditorController::new(state.clone(), Arc::clone(&client), download_dir.clone()),
            generation: GenerationController::new(state.clone(), client, download_dir),
            chat: ChatController::new(state.clone(), session),
            state,
        }
    }

    pub fn from_settings(client: Arc<dyn InferenceClient>, settings: &StudioSettings) -> Self {
        Self::new(client, settings.download_dir.clone())
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.state.metrics()
    }

    pub fn editor(&self) -> &EditorController {
        &self.editor
    }

    pub fn generation(&self) -> &GenerationController {
        &self.generation
    }

    pub fn chat(&self) -> &ChatController {
        &self.chat
    }

    /// Clear the global error banner
    pub fn dismiss_error(&self) {
        self.state.dismiss_error();
    }
}
