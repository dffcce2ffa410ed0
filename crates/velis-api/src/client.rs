// Remote API HTTP client
//
// Wraps `reqwest::Client` with endpoint construction, the `ar.authToken`
// session header, and status classification. Login lives in `auth.rs` as
// inherent methods so this module stays focused on transport mechanics.

use std::sync::RwLock;

use reqwest::StatusCode;
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::fields::{NormalizedFields, first_present};
use crate::rate_limit::parse_retry_after;
use crate::transport::TransportConfig;
use crate::variant::Variant;

/// Header carrying the session token on every device call.
pub(crate) const AUTH_HEADER: &str = "ar.authToken";

/// Device-listing endpoints, tried in order.
const PLANT_LIST_PATHS: [&str; 2] = ["velis/medPlants", "velis/plants"];

/// Keys that may hold the identifier in a device-listing record.
const PLANT_ID_ALIASES: [&str; 4] = ["gw", "gateway", "id", "plantId"];

/// A usable response from one variant endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantData {
    pub variant: Variant,
    pub raw: Map<String, Value>,
    pub fields: NormalizedFields,
}

/// Result of probing a single variant endpoint.
///
/// Rate limiting and transport failures come back as `Err` so callers can
/// tell them apart from a clean "this is not my variant" answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// HTTP 200 with a non-empty JSON object.
    Usable(PlantData),
    /// Any other answer: empty body, non-object JSON, 404, 5xx, ...
    Unusable { status: u16 },
}

#[derive(Serialize)]
struct TemperatureBody {
    eco: bool,
    old: Value,
    new: Value,
}

/// Raw HTTP client for the remote water-heater API.
///
/// Holds the session token after [`login`](Self::login) and attaches it to
/// every device call. All device endpoints are relative to `base_url`.
pub struct VelisClient {
    http: reqwest::Client,
    base_url: Url,
    /// Session token. Replaced wholesale on every successful login.
    token: RwLock<Option<SecretString>>,
}

impl VelisClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g.
    /// `https://www.ariston-net.remotethermo.com/api/v2/`. A missing trailing
    /// slash is added so relative joins keep the last path segment.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, normalize_base_url(base_url)?))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            token: RwLock::new(None),
        }
    }

    /// The API root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client (for auth flows that need direct access).
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Whether a session token is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.token.read().expect("token lock poisoned").is_some()
    }

    // ── Session token management ──────────────────────────────────────

    pub(crate) fn set_token(&self, token: SecretString) {
        debug!("storing session token");
        *self.token.write().expect("token lock poisoned") = Some(token);
    }

    fn auth_header(&self) -> Result<HeaderValue, Error> {
        let guard = self.token.read().expect("token lock poisoned");
        let token = guard.as_ref().ok_or(Error::NotAuthenticated)?;
        let mut value =
            HeaderValue::from_str(token.expose_secret()).map_err(|e| Error::Authentication {
                message: format!("token is not a valid header value: {e}"),
            })?;
        value.set_sensitive(true);
        Ok(value)
    }

    // ── URL builders ──────────────────────────────────────────────────

    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    /// `velis/<variant>/<plant>[/<action>]`, with the plant id percent-encoded.
    fn plant_url(&self, variant: Variant, plant_id: &str, action: Option<&str>) -> Result<Url, Error> {
        let mut url = self.url("velis/")?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            segments.pop_if_empty();
            segments.push(variant.path_segment());
            segments.push(plant_id);
            if let Some(action) = action {
                segments.push(action);
            }
        }
        Ok(url)
    }

    // ── Device listing ────────────────────────────────────────────────

    /// List the account's water heaters.
    ///
    /// Tries each listing endpoint in turn and returns the first non-empty
    /// JSON array. An account with no devices yields an empty `Vec`.
    pub async fn list_plants(&self) -> Result<Vec<Value>, Error> {
        for path in PLANT_LIST_PATHS {
            let url = self.url(path)?;
            let resp = self
                .http
                .get(url)
                .header(AUTH_HEADER, self.auth_header()?)
                .send()
                .await?;
            let status = resp.status();
            debug!(%status, path, "GET plant list");

            match status {
                StatusCode::OK => {
                    if let Ok(Value::Array(plants)) = resp.json::<Value>().await {
                        if !plants.is_empty() {
                            return Ok(plants);
                        }
                    }
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    return Err(Error::RateLimited {
                        retry_after: parse_retry_after(resp.headers()),
                    });
                }
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(Error::SessionExpired);
                }
                _ => {}
            }
        }
        Ok(Vec::new())
    }

    // ── Variant probe ─────────────────────────────────────────────────

    /// Issue one read against a single variant endpoint.
    pub async fn probe(&self, variant: Variant, plant_id: &str) -> Result<ProbeOutcome, Error> {
        let url = self.plant_url(variant, plant_id, None)?;
        let resp = self
            .http
            .get(url.clone())
            .header(AUTH_HEADER, self.auth_header()?)
            .send()
            .await?;
        let status = resp.status();
        debug!(%status, %variant, plant = plant_id, "GET plant data");

        match status {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(Error::RateLimited {
                    retry_after: parse_retry_after(resp.headers()),
                });
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(Error::SessionExpired),
            other => return Ok(ProbeOutcome::Unusable { status: other.as_u16() }),
        }

        let body = resp.text().await?;
        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(raw)) if !raw.is_empty() => {
                let fields = NormalizedFields::extract(&raw);
                trace!(?fields, %url, "extracted fields");
                Ok(ProbeOutcome::Usable(PlantData {
                    variant,
                    raw,
                    fields,
                }))
            }
            _ => {
                trace!(%url, "empty or non-object body");
                Ok(ProbeOutcome::Unusable { status: status.as_u16() })
            }
        }
    }

    // ── Writes ────────────────────────────────────────────────────────

    /// Change the target temperature through the given variant.
    pub async fn set_temperature(
        &self,
        variant: Variant,
        plant_id: &str,
        old_temp: f64,
        new_temp: f64,
    ) -> Result<(), Error> {
        let url = self.plant_url(variant, plant_id, Some("temperature"))?;
        let body = TemperatureBody {
            eco: false,
            old: json_number(old_temp),
            new: json_number(new_temp),
        };
        self.post_checked(url, &body, "Set temperature").await
    }

    /// Switch the heater on or off through the given variant.
    pub async fn set_power(&self, variant: Variant, plant_id: &str, on: bool) -> Result<(), Error> {
        let url = self.plant_url(variant, plant_id, Some("switch"))?;
        self.post_checked(url, &on, "Set power").await
    }

    async fn post_checked<B: Serialize + Sync + ?Sized>(
        &self,
        url: Url,
        body: &B,
        operation: &str,
    ) -> Result<(), Error> {
        let resp = self
            .http
            .post(url.clone())
            .header(AUTH_HEADER, self.auth_header()?)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        debug!(%status, %url, "POST");

        match status {
            StatusCode::OK => Ok(()),
            StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited {
                retry_after: parse_retry_after(resp.headers()),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::SessionExpired),
            other => Err(Error::Status {
                operation: operation.to_owned(),
                status: other.as_u16(),
            }),
        }
    }
}

/// Pull the device identifier out of a device-listing record.
///
/// Accepts string or numeric identifiers under any of the known aliases.
pub fn plant_identifier(record: &Value) -> Option<String> {
    let map = record.as_object()?;
    match first_present(map, &PLANT_ID_ALIASES)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Whole-degree values go out as JSON integers, anything else as floats.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions, clippy::float_cmp)]
fn json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
