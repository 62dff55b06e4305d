// Presentation layer - HTTP handlers and display formatting
pub mod app_state;
pub mod format;
pub mod handlers;
pub mod panel;
