use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

/// Lifecycle of one half (request or response) of a captured call.
///
/// A slot only ever moves forward: `Loading` to `Success`, or `Loading`
/// to `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Resource<T> {
    /// Still in flight
    Loading,

    /// Completed with a value
    Success { data: T },

    /// Failed, keeping the last known value (if any) and the cause
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<T>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cause: Option<ErrorInfo>,
    },
}

impl<T> Resource<T> {
    /// Create a Success resource
    pub fn success(data: T) -> Self {
        Self::Success { data }
    }

    /// Create a Failed resource
    pub fn failed(data: Option<T>, cause: Option<ErrorInfo>) -> Self {
        Self::Failed { data, cause }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Payload of a `Success` or `Failed` resource; `None` while loading.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Loading => None,
            Self::Success { data } => Some(data),
            Self::Failed { data, .. } => data.as_ref(),
        }
    }

    /// Payload of a `Success` resource only.
    pub fn success_data(&self) -> Option<&T> {
        match self {
            Self::Success { data } => Some(data),
            _ => None,
        }
    }

    /// Failure cause, if this resource failed with one
    pub fn cause(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Failed { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }

    pub fn map<U, F>(self, f: F) -> Resource<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Loading => Resource::Loading,
            Self::Success { data } => Resource::Success { data: f(data) },
            Self::Failed { data, cause } => Resource::Failed {
                data: data.map(f),
                cause,
            },
        }
    }
}

/// Display-ready capture of an error and its source chain.
///
/// Stored in `Resource::Failed` so that log entries stay `Clone` and
/// serializable while the original error goes back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// `Display` text of the error itself
    pub message: String,

    /// `Display` text of each `source()`, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Capture an error's message and walk its `source()` chain
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            message: error.to_string(),
            causes,
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for cause in &self.causes {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}
