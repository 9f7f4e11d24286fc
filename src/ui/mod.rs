// UI module - panel controllers and the terminal front-end
//
// This module contains:
// - EditorController / GenerationController / ChatController: one per panel
// - StudioController: owns the shared StateManager and the panel controllers
// - Shell: line-oriented view that forwards commands and prints state changes

pub mod chat;
pub mod controller;
pub mod editor;
pub mod generation;
pub mod shell;

pub use chat::ChatController;
pub use controller::StudioController;
pub use editor::EditorController;
pub use generation::GenerationController;
pub use shell::{Command, Flow, Shell, spawn_status_printer};
