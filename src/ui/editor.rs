//! Editor panel controller: upload, edits, reset, download and analysis.

use crate::models::app_state::{
    PROMPTED_ANALYSIS_LABEL, QUICK_ANALYSIS_LABEL, UPLOAD_LABEL, edit_label,
};
use crate::models::{Image, ToolCatalog};
use crate::services::image_io::{self, EDITED_IMAGE_PREFIX};
use crate::services::{InferenceClient, LocalIoError};
use crate::state::StateManager;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;

/// Display name for a free-form instruction typed by the user
pub const CUSTOM_EDIT_NAME: &str = "Custom Edit";

/// Controller for the editor panel.
///
/// Every remote call goes through [`StateManager::with_loading`]. Actions whose
/// preconditions are unmet (no image loaded, empty question) return `false`
/// without touching state.
pub struct EditorController {
    state: StateManager,
    client: Arc<dyn InferenceClient>,
    tools: ToolCatalog,
    download_dir: Utf8PathBuf,
}

impl EditorController {
    pub fn new(
        state: StateManager,
        client: Arc<dyn InferenceClient>,
        download_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            state,
            client,
            tools: ToolCatalog::new(),
            download_dir: download_dir.into(),
        }
    }

    pub fn tools(&self) -> &ToolCatalog {
        &self.tools
    }

    pub fn download_dir(&self) -> &Utf8Path {
        &self.download_dir
    }

    fn current_image(&self) -> Option<Image> {
        self.state.read(|state| state.editor.current_image().cloned())
    }

    /// Read and validate an image file, then start a new edit history from it.
    ///
    /// # Returns
    /// `true` if the image was loaded
    pub async fn upload(&self, path: &Utf8Path) -> bool {
        let Some(image) = self
            .state
            .with_loading(UPLOAD_LABEL, || image_io::load_image(path))
            .await
        else {
            return false;
        };

        self.state.load_image(image);
        true
    }

    /// Apply a natural-language edit to the working image.
    ///
    /// # Arguments
    /// * `prompt` - Instruction sent to the model
    /// * `name` - Display name for the status label (`Applying: {name}...`)
    ///
    /// # Returns
    /// `true` if the working image was replaced
    pub async fn apply_edit(&self, prompt: &str, name: &str) -> bool {
        let Some(current) = self.current_image() else {
            tracing::debug!("Edit '{}' ignored: no image loaded", name);
            return false;
        };

        let Some(edited) = self
            .state
            .with_loading(edit_label(name), || self.client.edit(&current, prompt))
            .await
        else {
            return false;
        };

        self.state.apply_edit(edited);
        self.state.metrics().record_edit_applied();
        true
    }

    /// Apply a preset tool by id
    pub async fn apply_tool(&self, id: &str) -> bool {
        let Some(tool) = self.tools.get(id).copied() else {
            tracing::warn!("Unknown tool id: {}", id);
            return false;
        };
        self.apply_edit(tool.prompt, tool.name).await
    }

    /// Restore the working image to the uploaded original. No remote call.
    pub fn reset(&self) -> bool {
        if !self.state.read(|state| state.editor.has_image()) {
            return false;
        }
        self.state.reset_image();
        tracing::info!("Reset image to original");
        true
    }

    /// Save the working image into the download directory.
    ///
    /// Does not go through the lifecycle wrapper: no busy transition and no banner.
    ///
    /// # Returns
    /// The written path, or `None` when no image is loaded
    pub fn download(&self) -> Result<Option<Utf8PathBuf>, LocalIoError> {
        let Some(current) = self.current_image() else {
            return Ok(None);
        };
        image_io::save_image(&current, &self.download_dir, EDITED_IMAGE_PREFIX).map(Some)
    }

    /// Describe the working image with the lightweight model
    pub async fn quick_analysis(&self) -> bool {
        let Some(current) = self.current_image() else {
            return false;
        };

        let Some(text) = self
            .state
            .with_loading(QUICK_ANALYSIS_LABEL, || self.client.analyze(&current, None))
            .await
        else {
            return false;
        };

        self.state.set_analysis(text, false);
        self.state.metrics().record_analysis();
        true
    }

    /// Answer a question about the working image, then clear the pending question
    pub async fn prompted_analysis(&self, question: &str) -> bool {
        let question = question.trim();
        if question.is_empty() {
            return false;
        }
        let Some(current) = self.current_image() else {
            return false;
        };

        let Some(text) = self
            .state
            .with_loading(PROMPTED_ANALYSIS_LABEL, || {
                self.client.analyze(&current, Some(question.to_string()))
            })
            .await
        else {
            return false;
        };

        self.state.set_analysis(text, true);
        self.state.metrics().record_analysis();
        true
    }

    /// Run a prompted analysis with the pending question
    pub async fn analyze_pending_prompt(&self) -> bool {
        let question = self.state.read(|state| state.editor.analysis_prompt.clone());
        self.prompted_analysis(&question).await
    }

    pub fn set_analysis_prompt(&self, text: impl Into<String>) {
        self.state.set_analysis_prompt(text);
    }
}
