use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy shared by every NxUI crate.
#[derive(Error, Debug)]
pub enum WidgetError {
    #[error("Widget source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Compile error in {}: {message}", .path.display())]
    Compile { path: PathBuf, message: String },

    #[error("Execution error in {}: {message}", .path.display())]
    Execution { path: PathBuf, message: String },

    #[error("Widget \"{}\" has invalid field \"{field}\": {reason}", .path.display())]
    Validation {
        path: PathBuf,
        field: String,
        reason: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Installation failed: {0}")]
    Install(String),

    #[error("Unknown widget: {0}")]
    UnknownWidget(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WidgetError {
    pub fn missing_field(path: impl Into<PathBuf>, field: &str) -> Self {
        WidgetError::Validation {
            path: path.into(),
            field: field.to_string(),
            reason: "missing required field".to_string(),
        }
    }

    pub fn invalid_field(path: impl Into<PathBuf>, field: &str, reason: impl Into<String>) -> Self {
        WidgetError::Validation {
            path: path.into(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable name used in control-plane responses.
    pub fn kind(&self) -> &'static str {
        match self {
            WidgetError::NotFound(_) => "not_found",
            WidgetError::Compile { .. } => "compile_error",
            WidgetError::Execution { .. } => "execution_error",
            WidgetError::Validation { .. } => "validation_error",
            WidgetError::Persistence(_) => "persistence_error",
            WidgetError::Install(_) => "install_error",
            WidgetError::UnknownWidget(_) => "unknown_widget",
            WidgetError::InvalidSetting(_) => "invalid_setting",
            WidgetError::ProfileNotFound(_) => "profile_not_found",
            WidgetError::Surface(_) => "surface_error",
            WidgetError::Watch(_) => "watch_error",
            WidgetError::Io(_) => "io_error",
        }
    }
}

pub type WidgetResult<T> = Result<T, WidgetError>;
