use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DurationError {
    #[error("unsupported session duration: {0} minutes (expected 5, 10 or 15)")]
    Unsupported(u32),
}

/// Bounded study length of a session.
///
/// Only the three lengths offered to learners exist; on the wire the value is
/// the plain number of minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SessionDuration {
    Five,
    #[default]
    Ten,
    Fifteen,
}

impl SessionDuration {
    pub const ALL: [SessionDuration; 3] = [Self::Five, Self::Ten, Self::Fifteen];

    #[must_use]
    pub fn minutes(self) -> u32 {
        match self {
            Self::Five => 5,
            Self::Ten => 10,
            Self::Fifteen => 15,
        }
    }

    #[must_use]
    pub fn total_seconds(self) -> u32 {
        self.minutes() * 60
    }

    /// # Errors
    ///
    /// Returns `DurationError::Unsupported` for anything other than 5, 10 or 15.
    pub fn from_minutes(minutes: u32) -> Result<Self, DurationError> {
        match minutes {
            5 => Ok(Self::Five),
            10 => Ok(Self::Ten),
            15 => Ok(Self::Fifteen),
            other => Err(DurationError::Unsupported(other)),
        }
    }
}

impl TryFrom<u32> for SessionDuration {
    type Error = DurationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_minutes(value)
    }
}

impl From<SessionDuration> for u32 {
    fn from(value: SessionDuration) -> Self {
        value.minutes()
    }
}

impl fmt::Display for SessionDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.minutes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_three_lengths_exist() {
        assert_eq!(SessionDuration::from_minutes(5), Ok(SessionDuration::Five));
        assert_eq!(SessionDuration::from_minutes(15), Ok(SessionDuration::Fifteen));
        assert_eq!(
            SessionDuration::from_minutes(20),
            Err(DurationError::Unsupported(20))
        );
        assert_eq!(SessionDuration::default().minutes(), 10);
    }

    #[test]
    fn serializes_as_minutes() {
        assert_eq!(serde_json::to_string(&SessionDuration::Five).unwrap(), "5");
        let parsed: SessionDuration = serde_json::from_str("15").unwrap();
        assert_eq!(parsed.total_seconds(), 900);
        assert!(serde_json::from_str::<SessionDuration>("7").is_err());
    }
}
