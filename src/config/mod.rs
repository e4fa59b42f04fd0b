//! Configuration management for the waiting-room service
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and default values.

pub mod app;
pub mod queue;

// Re-export commonly used types
pub use app::{validate_config, AdmissionSettings, AppConfig, HttpSettings, ServiceSettings};
pub use queue::{QueueDefaults, ScheduleBinding};
