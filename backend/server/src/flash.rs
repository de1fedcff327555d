use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Success,
    Warning,
    Info,
}

impl Level {
    pub fn css_class(self) -> &'static str {
        match self {
            Level::Error => "flash-error",
            Level::Success => "flash-success",
            Level::Warning => "flash-warning",
            Level::Info => "flash-info",
        }
    }
}

/// One-shot notification. `message` is a message id, translated when rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}
