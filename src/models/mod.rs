//! Data models for the PhotoMuse application.
//!
//! This module contains the core data structures used throughout the application:
//! - [`AppState`]: The central state container holding the operation status and each panel's state
//! - [`Image`]: An immutable encoded image value
//! - [`AspectRatio`]: The closed set of generation aspect ratios
//! - [`ChatMessage`]: One transcript entry
//! - [`ToolCatalog`]: The preset editing tools
//! - [`StudioSettings`]: User preferences loaded from `PhotoMuse Config.yaml`
//!
//! # Architecture Note
//!
//! [`AppState`] is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager)
//! for thread-safe access. State updates go through StateManager's `update()` method so
//! every mutation produces change events.

pub mod app_state;
pub mod aspect_ratio;
pub mod chat;
pub mod config;
pub mod image;
pub mod tools;

pub use app_state::{AppState, ChatState, EditorState, GenerationState, OperationStatus};
pub use aspect_ratio::{AspectRatio, ParseAspectRatioError};
pub use chat::{ChatMessage, ChatRole};
pub use self::config::StudioSettings;
pub use self::image::{Image, ImageFormat};
pub use tools::{TOOL_CATEGORIES, Tool, ToolCatalog, ToolCategory};
