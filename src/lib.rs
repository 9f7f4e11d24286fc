// PhotoMuse - AI-assisted photo editing, image generation and chat
//
// This is the library crate containing the state controllers, the remote inference
// client and the data structures. The binary crate (main.rs) provides the shell.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use self::config::ConfigManager;
pub use metrics::Metrics;
pub use models::{AppState, AspectRatio, Image, ImageFormat, StudioSettings};
pub use services::{ChatSession, GeminiClient, InferenceClient, LocalIoError, ServiceError};
pub use state::{StateChange, StateManager};
pub use ui::StudioController;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
