use serde::Serialize;
use thiserror::Error;

/// Structured error type for the application. The CLI prints these directly;
/// the serialized form (`code` + `detail`) is what `--json` output carries.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "code", content = "detail")]
pub enum AppError {
    #[error("Light not found: {name}")]
    DeviceNotFound { name: String },
    #[error("Completion service error: {message}")]
    Completion { message: String },
    #[error("Bridge error: {message}")]
    Bridge { message: String },
    #[error("Link button not pressed. Press the button on the bridge and try again.")]
    LinkButtonNotPressed,
    #[error("{message}")]
    InvalidState { message: String },
    #[error("No API key configured. Set it with the credentials file or the provider's environment variable.")]
    NoApiKey,
    #[error("No bridge configured. Pass --bridge or run `hue-chat pair` first.")]
    NoBridge,
    #[error("I/O error: {message}")]
    Io { message: String },
    #[error("Settings error: {message}")]
    Settings { message: String },
}

impl AppError {
    pub(crate) fn completion(message: impl Into<String>) -> Self {
        AppError::Completion {
            message: message.into(),
        }
    }

    pub(crate) fn bridge(message: impl Into<String>) -> Self {
        AppError::Bridge {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io {
            message: e.to_string(),
        }
    }
}

impl From<crate::persist::PersistError> for AppError {
    fn from(e: crate::persist::PersistError) -> Self {
        match e {
            crate::persist::PersistError::Io(io_err) => AppError::Io {
                message: io_err.to_string(),
            },
            crate::persist::PersistError::Json(json_err) => AppError::Settings {
                message: json_err.to_string(),
            },
        }
    }
}
