use thiserror::Error;

/// Errors produced by the hydration runtime.
///
/// This is `Clone` as a rejected [`Resource`](crate::resource::Resource)
/// hands the very same error to every reader.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// The pricing request did not settle before its deadline.
    #[error("request timed out")]
    Timeout,
    /// The pricing request failed, or its body could not be understood.
    #[error("request failed: {reason}")]
    RequestFailed { reason: String },
    /// A bus subscriber failed while an event was being delivered.
    #[error("handler for `{event}` failed: {message}")]
    HandlerFault { event: &'static str, message: String },
    /// A promotion attribute in the server markup could not be parsed.
    #[error("invalid promotion attribute `{field}`: {value:?}")]
    Handoff { field: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn request_failed(reason: impl Into<String>) -> Self {
        Error::RequestFailed {
            reason: reason.into(),
        }
    }

    /// The message shown to the user in place of a personalized value.
    ///
    /// Only the pricing failures have one; the baseline price stays on
    /// screen in both cases.
    pub fn fallback_message(&self) -> Option<&'static str> {
        match self {
            Error::Timeout => Some("Request timed out, showing the standard price instead."),
            Error::RequestFailed { .. } => {
                Some("Request failed, showing the standard price instead.")
            }
            _ => None,
        }
    }
}

/// The failure returned by a bus handler.
///
/// The bus wraps it into [`Error::HandlerFault`] together with the name
/// of the event being delivered.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{0}")]
pub struct HandlerFault(pub String);

impl HandlerFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
