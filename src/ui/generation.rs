//! Generation panel controller.

use crate::models::AspectRatio;
use crate::models::app_state::GENERATION_LABEL;
use crate::services::image_io::{self, GENERATED_IMAGE_PREFIX};
use crate::services::{InferenceClient, LocalIoError};
use crate::state::StateManager;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;

pub struct GenerationController {
    state: StateManager,
    client: Arc<dyn InferenceClient>,
    download_dir: Utf8PathBuf,
}

impl GenerationController {
    pub fn new(
        state: StateManager,
        client: Arc<dyn InferenceClient>,
        download_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            state,
            client,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Utf8Path {
        &self.download_dir
    }

    /// Generate an image and replace the generated-image slot.
    ///
    /// An empty prompt is ignored. On failure the previous image stays.
    ///
    /// # Returns
    /// `true` if a new image was stored
    pub async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> bool {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return false;
        }

        let Some(image) = self
            .state
            .with_loading(GENERATION_LABEL, || self.client.generate(prompt, aspect_ratio))
            .await
        else {
            return false;
        };

        tracing::info!("Generated {} image at {}", image.format(), aspect_ratio);
        self.state.set_generated_image(image);
        self.state.metrics().record_image_generated();
        true
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.state.set_generation_prompt(prompt);
    }

    pub fn select_aspect_ratio(&self, aspect_ratio: AspectRatio) {
        self.state.select_aspect_ratio(aspect_ratio);
    }

    /// Generate from the pending prompt and the selected aspect ratio
    pub async fn generate_from_selection(&self) -> bool {
        let (prompt, aspect_ratio) = self.state.read(|state| {
            (
                state.generation.prompt.clone(),
                state.generation.aspect_ratio,
            )
        });
        self.generate(&prompt, aspect_ratio).await
    }

    /// Save the last generated image into the download directory.
    ///
    /// # Returns
    /// The written path, or `None` when nothing has been generated yet
    pub fn save_generated(&self) -> Result<Option<Utf8PathBuf>, LocalIoError> {
        let Some(image) = self
            .state
            .read(|state| state.generation.generated_image.clone())
        else {
            return Ok(None);
        };
        image_io::save_image(&image, &self.download_dir, GENERATED_IMAGE_PREFIX).map(Some)
    }
}
