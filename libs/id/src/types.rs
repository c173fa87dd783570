//! Typed ID definitions for jobs and reservations.

use std::borrow::Borrow;

use crate::IdError;

// =============================================================================
// Jobs
// =============================================================================

/// Internal (process-local) job identifier.
///
/// This is not the user-facing job name; it is the stable integer the job
/// subsystem assigns when a job is loaded. [`JobId::UNSET`] marks a value that
/// has not been bound to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(i64);

impl JobId {
    /// Sentinel for "not bound to a job".
    pub const UNSET: Self = Self(-1);

    /// Creates a new JobId from an i64.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying i64 value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Returns true unless this is [`JobId::UNSET`].
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.0 != Self::UNSET.0
    }

    /// Parses a job id from its decimal representation.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        s.parse::<i64>()
            .map(Self)
            .map_err(|_| IdError::InvalidJobId(s.to_string()))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::UNSET
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl serde::Serialize for JobId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for JobId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = i64::deserialize(deserializer)?;
        Ok(Self(id))
    }
}

// =============================================================================
// Reservations
// =============================================================================

/// Reservation identifier assigned by the external allocator.
///
/// The allocator owns the format, so the only rule enforced here is that the
/// id is non-empty: an empty id means "the job holds no reservation".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReservationId(String);

impl ReservationId {
    /// Parses a reservation id, rejecting the empty string.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ReservationId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ReservationId {
    type Error = IdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(s))
    }
}

impl AsRef<str> for ReservationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets maps keyed by ReservationId be queried with a plain &str.
impl Borrow<str> for ReservationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for ReservationId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ReservationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================
