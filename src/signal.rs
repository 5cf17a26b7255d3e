//! The three-channel signal protocol.

use crate::error::Error;

/// One signal delivered along a subscription.
///
/// A subscription sees zero or more [`Signal::Value`]s followed by at most
/// one terminal signal ([`Signal::Error`] or [`Signal::Complete`]). Nothing
/// follows a terminal signal.
#[derive(Debug, Clone)]
pub enum Signal<T> {
    Value(T),
    Error(Error),
    Complete,
}

impl<T> Signal<T> {
    /// Whether this signal ends the subscription
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Signal::Value(_))
    }

    /// Short name used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Value(_) => "next",
            Signal::Error(_) => "error",
            Signal::Complete => "complete",
        }
    }

    /// The carried value, if any
    pub fn value(&self) -> Option<&T> {
        match self {
            Signal::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Signal::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: PartialEq> PartialEq for Signal<T> {
    /// Errors compare by their rendered message.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Signal::Value(a), Signal::Value(b)) => a == b,
            (Signal::Error(a), Signal::Error(b)) => a.to_string() == b.to_string(),
            (Signal::Complete, Signal::Complete) => true,
            _ => false,
        }
    }
}
