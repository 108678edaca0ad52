//! Input record source for geofill.
//!
//! Reads license records from CSV (header-driven) and exposes them as a lazy,
//! single-pass stream. A row that fails to decode becomes a per-record error
//! so the engine can count and skip it without ending the run.

mod filter;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use geofill_shared::{GeofillError, Result};

pub use filter::{address_key, needs_enrichment};

// ---------------------------------------------------------------------------
// LicenseRecord
// ---------------------------------------------------------------------------

/// One row of the input dataset, as the enrichment engine sees it.
///
/// Field names map to the CSV headers of the source export. The `Location`
/// column may be missing entirely; an empty string means no location has
/// been recorded, which counts as unset.
#[derive(Debug, Clone, Deserialize)]
pub struct LicenseRecord {
    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "City")]
    pub city: String,

    #[serde(rename = "State")]
    pub state: String,

    #[serde(rename = "Zip")]
    pub zip: String,

    /// Raw location text, e.g. `"(42.35, -71.06)"` or `"(0.0, 0.0)"` when unset.
    #[serde(rename = "Location", default)]
    pub location: String,
}

// ---------------------------------------------------------------------------
// CsvRecordSource
// ---------------------------------------------------------------------------

/// CSV-backed record source.
///
/// The stream it yields is single-pass and non-restartable; open the file
/// again for another pass.
#[derive(Debug)]
pub struct CsvRecordSource<R: Read> {
    reader: csv::Reader<R>,
}

impl CsvRecordSource<File> {
    /// Open a CSV file with a header row.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(?path, "opening record source");
        let file = File::open(path).map_err(|e| GeofillError::io(path, e))?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> CsvRecordSource<R> {
    /// Wrap any reader producing CSV with a header row.
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: csv::Reader::from_reader(reader),
        }
    }

    /// Consume the source, yielding one result per data row.
    pub fn into_records(self) -> impl Iterator<Item = Result<LicenseRecord>> {
        self.reader
            .into_deserialize()
            .map(|row| row.map_err(|e| GeofillError::source(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_from(data: &str) -> CsvRecordSource<&[u8]> {
        CsvRecordSource::from_reader(data.as_bytes())
    }

    #[test]
    fn parses_rows_with_all_columns() {
        let data = "\
Address,City,State,Zip,Location
100 Main St,Boston,MA,02110,\"(0.0, 0.0)\"
9 Elm St,Salem,MA,01970,\"(42.52, -70.89)\"
";
        let records: Vec<_> = source_from(data)
            .into_records()
            .collect::<Result<_>>()
            .expect("all rows decode");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].address, "100 Main St");
        assert_eq!(records[0].location, "(0.0, 0.0)");
        assert_eq!(records[1].city, "Salem");
        assert_eq!(records[1].location, "(42.52, -70.89)");
    }

    #[test]
    fn missing_location_column_defaults_to_empty() {
        let data = "\
Address,City,State,Zip
100 Main St,Boston,MA,02110
";
        let records: Vec<_> = source_from(data)
            .into_records()
            .collect::<Result<_>>()
            .expect("rows decode");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, "");
        assert!(needs_enrichment(&records[0]));
    }

    #[test]
    fn short_row_yields_error_and_stream_continues() {
        let data = "\
Address,City,State,Zip,Location
100 Main St,Boston
9 Elm St,Salem,MA,01970,\"(0.0, 0.0)\"
";
        let results: Vec<_> = source_from(data).into_records().collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        let record = results[1].as_ref().expect("second row decodes");
        assert_eq!(record.address, "9 Elm St");
    }

    #[test]
    fn header_only_input_yields_nothing() {
        let data = "Address,City,State,Zip,Location\n";
        assert_eq!(source_from(data).into_records().count(), 0);
    }

    #[test]
    fn reads_fixture_file() {
        let source = CsvRecordSource::open("../../../fixtures/csv/licenses.fixture.csv")
            .expect("open fixture");
        let records: Vec<_> = source
            .into_records()
            .collect::<Result<_>>()
            .expect("fixture rows decode");

        assert_eq!(records.len(), 4);
        assert!(needs_enrichment(&records[0]));
        assert!(!needs_enrichment(&records[1]));
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let err = CsvRecordSource::open("/nonexistent/licenses.csv").unwrap_err();
        assert!(matches!(err, GeofillError::Io { .. }));
    }
}
