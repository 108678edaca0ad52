//! Geocoding provider client.
//!
//! Wraps a single provider lookup: HTTPS GET with `key` and `address` query
//! parameters, answered by a JSON envelope with a `status` field. Status-level
//! oddities are folded into the tagged [`Resolution`] so one bad address never
//! aborts a batch; transport-level failures surface as
//! [`GeofillError::Network`] for the engine's policy to handle.

mod limiter;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use geofill_shared::{AddressKey, Coordinate, GeofillError, Resolution, Result};

pub use limiter::{RateLimit, RateLimiter};

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("geofill/", env!("CARGO_PKG_VERSION"));

/// Provider status signalling a usable result list.
const STATUS_OK: &str = "OK";

/// Provider status signalling a well-formed "no match" answer.
const STATUS_ZERO_RESULTS: &str = "ZERO_RESULTS";

// ---------------------------------------------------------------------------
// Geocoder capability
// ---------------------------------------------------------------------------

/// A geocoding capability the enrichment engine can call.
///
/// The engine is generic over this trait so tests can substitute scripted
/// fakes for the HTTP client.
pub trait Geocoder {
    /// Resolve one address key to a tagged outcome. `Err` is reserved for
    /// transport-level failures.
    fn lookup(&self, key: &AddressKey) -> impl Future<Output = Result<Resolution>> + Send;
}

// ---------------------------------------------------------------------------
// Provider envelope
// ---------------------------------------------------------------------------

/// Provider response envelope. Fields beyond these are ignored.
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,

    #[serde(default)]
    results: Vec<GeocodeResult>,

    /// Optional human-readable detail accompanying refusal statuses.
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    location: Option<ProviderLocation>,
}

#[derive(Debug, Deserialize)]
struct ProviderLocation {
    lat: f64,
    lng: f64,
}

/// Map a decoded envelope to a tagged outcome. Pure; transport failures never
/// reach here.
fn interpret(envelope: GeocodeResponse) -> Resolution {
    match envelope.status.as_str() {
        STATUS_OK => {
            let location = envelope
                .results
                .into_iter()
                .next()
                .and_then(|result| result.geometry)
                .and_then(|geometry| geometry.location);

            match location {
                Some(loc) => Resolution::Found(Coordinate(loc.lat, loc.lng)),
                None => Resolution::Failed {
                    detail: "OK status without a result coordinate".into(),
                },
            }
        }
        STATUS_ZERO_RESULTS => Resolution::NoMatch,
        other => Resolution::Failed {
            detail: match envelope.error_message {
                Some(message) => format!("{other}: {message}"),
                None => other.to_string(),
            },
        },
    }
}

// ---------------------------------------------------------------------------
// GeocodeClient
// ---------------------------------------------------------------------------

/// HTTP client for the geocoding provider.
pub struct GeocodeClient {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl GeocodeClient {
    /// Build a client for the given endpoint. Validates the endpoint URL and
    /// installs the request timeout that bounds every lookup.
    pub fn new(endpoint: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            GeofillError::validation(format!("invalid provider endpoint '{endpoint}': {e}"))
        })?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GeofillError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint,
            api_key: api_key.into(),
        })
    }

    /// Perform one provider lookup for the given address key.
    async fn lookup_address(&self, key: &AddressKey) -> Result<Resolution> {
        debug!(address = %key, "geocoding address");

        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str()), ("address", key.as_str())])
            .send()
            .await
            .map_err(|e| GeofillError::Network(format!("{key}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeofillError::Network(format!("{key}: HTTP {status}")));
        }

        let envelope: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| GeofillError::Network(format!("{key}: malformed response body: {e}")))?;

        let resolution = interpret(envelope);
        if let Resolution::Failed { detail } = &resolution {
            warn!(address = %key, %detail, "lookup produced no usable data");
        }

        Ok(resolution)
    }
}

impl Geocoder for GeocodeClient {
    fn lookup(&self, key: &AddressKey) -> impl Future<Output = Result<Resolution>> + Send {
        self.lookup_address(key)
    }
}
