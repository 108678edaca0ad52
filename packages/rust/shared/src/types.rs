//! Core domain types for geofill enrichment runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// AddressKey
// ---------------------------------------------------------------------------

/// Deterministic lookup key built from a record's address components.
///
/// The format (`"{address} {city}, {state}, {zip}"`) doubles as the provider
/// query string and as the key downstream consumers of the output map parse;
/// the field order and separators must not change.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressKey(String);

impl AddressKey {
    /// Build a key from address components. Pure: identical components always
    /// produce an identical key. Empty components are kept as-is.
    pub fn from_parts(address: &str, city: &str, state: &str, zip: &str) -> Self {
        Self(format!("{address} {city}, {state}, {zip}"))
    }

    /// Wrap an already-formatted key (e.g., read back from a state file).
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AddressKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Coordinate
// ---------------------------------------------------------------------------

/// A latitude/longitude pair. Serializes as a 2-element array `[lat, lng]`,
/// the pair format the output consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate(pub f64, pub f64);

impl Coordinate {
    /// Placeholder meaning "no usable location obtained".
    pub const SENTINEL: Coordinate = Coordinate(0.0, 0.0);

    pub fn lat(self) -> f64 {
        self.0
    }

    pub fn lng(self) -> f64 {
        self.1
    }

    /// Whether this is the placeholder value. A genuine (0,0) is
    /// indistinguishable here; [`Resolution`] is the authoritative record
    /// of what a lookup actually produced.
    pub fn is_sentinel(self) -> bool {
        self.0 == 0.0 && self.1 == 0.0
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Tagged outcome of one geocoding lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The provider returned a usable coordinate.
    Found(Coordinate),
    /// The provider answered but had no match for the address.
    NoMatch,
    /// The provider refused the lookup, or its success response was malformed.
    Failed { detail: String },
}

impl Resolution {
    /// The coordinate for resolved lookups, `None` otherwise.
    pub fn found(&self) -> Option<Coordinate> {
        match self {
            Self::Found(coord) => Some(*coord),
            _ => None,
        }
    }

    /// Pair-format projection: the sentinel stands in for anything unresolved.
    pub fn coordinate(&self) -> Coordinate {
        self.found().unwrap_or(Coordinate::SENTINEL)
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one enrichment run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
