//! Record classification: which rows need enrichment, and under what key.
//!
//! Both functions are pure. The location marker rule and the key format are
//! contracts shared with the dataset's other consumers, not choices made here.

use geofill_shared::AddressKey;

use crate::LicenseRecord;

/// Byte at index 1 of the raw location string when no real coordinates have
/// been recorded: set locations read `"(42.35, -71.06)"`, unset ones
/// `"(0.0, 0.0)"`.
const UNSET_MARKER: u8 = b'0';

/// Whether this record still needs a geocoding lookup.
///
/// A location string shorter than two bytes also counts as unset; it cannot
/// hold a coordinate pair.
pub fn needs_enrichment(record: &LicenseRecord) -> bool {
    matches!(record.location.as_bytes().get(1), None | Some(&UNSET_MARKER))
}

/// The lookup/dedup key for this record.
pub fn address_key(record: &LicenseRecord) -> AddressKey {
    AddressKey::from_parts(&record.address, &record.city, &record.state, &record.zip)
}
