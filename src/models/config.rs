use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Default Gemini REST endpoint
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// User settings from `PhotoMuse Config.yaml`, overridable through
/// `PHOTOMUSE_*` environment variables.
///
/// Missing keys fall back to the defaults below, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioSettings {
    pub api_base: String,

    /// Image-to-image model used by the editor tools
    pub edit_model: String,

    /// Model answering free-form questions about the image
    pub analysis_model: String,

    /// Lightweight model used for the one-click description
    pub quick_analysis_model: String,

    /// Text-to-image model
    pub generation_model: String,

    pub chat_model: String,

    /// Optional system instruction for the chat session
    pub chat_system_instruction: Option<String>,

    pub request_timeout_secs: u64,

    /// Where downloads are written
    pub download_dir: Utf8PathBuf,

    pub log_dir: Utf8PathBuf,

    pub debug_mode: bool,
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            edit_model: "gemini-2.5-flash-image".to_string(),
            analysis_model: "gemini-2.5-pro".to_string(),
            quick_analysis_model: "gemini-2.5-flash-lite".to_string(),
            generation_model: "imagen-4.0-generate-001".to_string(),
            chat_model: "gemini-2.5-flash".to_string(),
            chat_system_instruction: None,
            request_timeout_secs: 120,
            download_dir: Utf8PathBuf::from("downloads"),
            log_dir: Utf8PathBuf::from("logs"),
            debug_mode: false,
        }
    }
}

impl StudioSettings {
    /// API base without trailing slash
    pub fn normalized_api_base(&self) -> &str {
        let trimmed = self.api_base.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            DEFAULT_API_BASE
        } else {
            trimmed
        }
    }
}
