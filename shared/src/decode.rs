//! Document decoding with explicit recovery reporting
//!
//! Callers get a [`DecodeOutcome`] rather than a plain `Result` so they can
//! tell a clean decode apart from one that was healed with defaults.

use crate::errors::DecodeError;
use crate::models::{DailyGoal, UserStats};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Result of decoding a stored document
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome<T> {
    /// The document decoded cleanly
    Ok(T),
    /// The document was missing or damaged and `value` was substituted
    Recovered { value: T, cause: DecodeError },
    /// The document could not be decoded and there is no safe substitute
    Fatal(DecodeError),
}

impl<T> DecodeOutcome<T> {
    pub fn is_recovered(&self) -> bool {
        matches!(self, DecodeOutcome::Recovered { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, DecodeOutcome::Fatal(_))
    }

    /// The decoded or substituted value
    pub fn value(&self) -> Option<&T> {
        match self {
            DecodeOutcome::Ok(value) | DecodeOutcome::Recovered { value, .. } => Some(value),
            DecodeOutcome::Fatal(_) => None,
        }
    }

    pub fn cause(&self) -> Option<&DecodeError> {
        match self {
            DecodeOutcome::Ok(_) => None,
            DecodeOutcome::Recovered { cause, .. } | DecodeOutcome::Fatal(cause) => Some(cause),
        }
    }

    /// Treat recovered values as success
    pub fn into_result(self) -> Result<T, DecodeError> {
        match self {
            DecodeOutcome::Ok(value) | DecodeOutcome::Recovered { value, .. } => Ok(value),
            DecodeOutcome::Fatal(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DecodeOutcome<U> {
        match self {
            DecodeOutcome::Ok(value) => DecodeOutcome::Ok(f(value)),
            DecodeOutcome::Recovered { value, cause } => DecodeOutcome::Recovered {
                value: f(value),
                cause,
            },
            DecodeOutcome::Fatal(err) => DecodeOutcome::Fatal(err),
        }
    }
}

/// Decode a document with no fallback
pub fn decode<T: DeserializeOwned>(doc: Option<&Value>) -> DecodeOutcome<T> {
    match doc {
        None => DecodeOutcome::Fatal(DecodeError::Missing),
        Some(value) if !value.is_object() => DecodeOutcome::Fatal(DecodeError::NotAnObject),
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(decoded) => DecodeOutcome::Ok(decoded),
            Err(err) => DecodeOutcome::Fatal(err.into()),
        },
    }
}

/// Decode a document, substituting `fallback()` when it is missing or damaged
pub fn decode_or_else<T: DeserializeOwned>(
    doc: Option<&Value>,
    fallback: impl FnOnce() -> T,
) -> DecodeOutcome<T> {
    match decode(doc) {
        DecodeOutcome::Fatal(cause) => DecodeOutcome::Recovered {
            value: fallback(),
            cause,
        },
        other => other,
    }
}

/// Decode a `users/{user_id}` document
///
/// Stats are always recoverable: a missing or undecodable document yields
/// fresh default stats for `user_id`, and an undecodable `dailyGoal` yields
/// the default goal while keeping the decoded counters.
pub fn decode_user_stats(user_id: &str, doc: Option<&Value>) -> DecodeOutcome<UserStats> {
    let Some(value) = doc else {
        return DecodeOutcome::Recovered {
            value: UserStats::new(user_id),
            cause: DecodeError::Missing,
        };
    };

    let Some(object) = value.as_object() else {
        return DecodeOutcome::Recovered {
            value: UserStats::new(user_id),
            cause: DecodeError::NotAnObject,
        };
    };

    let mut object = object.clone();
    let mut healed: Option<DecodeError> = None;

    if !object.get("userId").map(Value::is_string).unwrap_or(false) {
        object.insert("userId".to_string(), Value::String(user_id.to_string()));
        healed = Some(DecodeError::Malformed("userId missing".to_string()));
    }

    if let Some(goal) = object.get("dailyGoal").filter(|g| !g.is_null()) {
        if let Err(err) = serde_json::from_value::<DailyGoal>(goal.clone()) {
            healed = Some(DecodeError::Malformed(format!("dailyGoal: {}", err)));
        }
    }

    match serde_json::from_value::<UserStats>(Value::Object(object)) {
        Ok(stats) => match healed {
            Some(cause) => DecodeOutcome::Recovered { value: stats, cause },
            None => DecodeOutcome::Ok(stats),
        },
        Err(err) => DecodeOutcome::Recovered {
            value: UserStats::new(user_id),
            cause: err.into(),
        },
    }
}
