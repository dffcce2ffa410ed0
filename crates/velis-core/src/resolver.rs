// ── Variant resolver ──
//
// Finds which response shape a device uses. A remembered variant is tried
// first and trusted outright when it answers; otherwise every variant is
// probed in priority order, each usable answer is scored by how plausible
// its readings look, and the best one wins and is remembered.
//
// Individual probe failures never escape: they are tallied and only the
// aggregate outcome is reported when no variant produced usable data.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use velis_api::{NormalizedFields, PlantData, ProbeOutcome, Variant, VelisClient};

use crate::cache::VariantCache;
use crate::error::CoreError;

/// Score reported for a cached variant that answered with usable data.
pub const TRUSTED_SCORE: u8 = 99;

/// The outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub variant: Variant,
    pub raw: Map<String, Value>,
    pub fields: NormalizedFields,
    pub score: u8,
}

impl Resolution {
    fn from_data(data: PlantData, score: u8) -> Self {
        Self {
            variant: data.variant,
            raw: data.raw,
            fields: data.fields,
            score,
        }
    }
}

/// Plausibility score for one usable response.
///
/// +3 for a current temperature in (0, 100), +2 for a target temperature in
/// (0, 100), +1 for a boolean power state. A response with no non-zero
/// temperature and power explicitly off is a stale endpoint and scores 0.
#[allow(clippy::float_cmp)]
pub fn score(fields: &NormalizedFields) -> u8 {
    let in_range = |t: Option<f64>| t.is_some_and(|t| t > 0.0 && t < 100.0);
    let zero_or_absent = |t: Option<f64>| t.is_none_or(|t| t == 0.0);

    if zero_or_absent(fields.current_temp)
        && zero_or_absent(fields.target_temp)
        && fields.power_state == Some(false)
    {
        return 0;
    }

    let mut score = 0;
    if in_range(fields.current_temp) {
        score += 3;
    }
    if in_range(fields.target_temp) {
        score += 2;
    }
    if fields.power_state.is_some() {
        score += 1;
    }
    score
}

/// Pick the highest-scoring candidate; ties go to the higher-priority variant.
pub fn select_best(candidates: Vec<(PlantData, u8)>) -> Option<(PlantData, u8)> {
    candidates
        .into_iter()
        .min_by_key(|(data, score)| (std::cmp::Reverse(*score), data.variant.priority()))
}

/// Tally of probes that did not yield usable data.
#[derive(Debug, Default)]
struct ProbeFailures {
    rate_limited: bool,
    max_retry_after: Option<Duration>,
    session_expired: bool,
    transport: Option<String>,
    /// Probes that got any HTTP answer back.
    answered: usize,
}

impl ProbeFailures {
    fn record(&mut self, variant: Variant, err: velis_api::Error) {
        match err {
            velis_api::Error::RateLimited { retry_after } => {
                debug!(%variant, ?retry_after, "probe rate limited");
                self.rate_limited = true;
                self.answered += 1;
                self.max_retry_after = self.max_retry_after.max(retry_after);
            }
            velis_api::Error::SessionExpired | velis_api::Error::NotAuthenticated => {
                debug!(%variant, "probe rejected: session expired");
                self.session_expired = true;
                self.answered += 1;
            }
            velis_api::Error::Transport(e) => {
                debug!(%variant, error = %e, "probe transport failure");
                self.transport = Some(e.to_string());
            }
            other => {
                debug!(%variant, error = %other, "probe failed");
                self.answered += 1;
            }
        }
    }

    fn record_unusable(&mut self, variant: Variant, status: u16) {
        debug!(%variant, status, "probe returned no usable data");
        self.answered += 1;
    }

    /// Rate limiting outranks session expiry, which outranks transport
    /// failure. Transport failure is reported only when no probe got an
    /// answer at all.
    fn into_error(self, plant_id: &str) -> CoreError {
        if self.rate_limited {
            return CoreError::RateLimited {
                retry_after: self.max_retry_after,
            };
        }
        if self.session_expired {
            return CoreError::SessionExpired;
        }
        if self.answered == 0 {
            if let Some(message) = self.transport {
                return CoreError::Transport { message };
            }
        }
        CoreError::NoData {
            plant_id: plant_id.to_owned(),
        }
    }
}

/// Resolves and remembers the active variant for devices.
pub struct VariantResolver {
    client: Arc<VelisClient>,
    cache: Arc<VariantCache>,
}

impl VariantResolver {
    pub fn new(client: Arc<VelisClient>, cache: Arc<VariantCache>) -> Self {
        Self { client, cache }
    }

    /// Resolve the variant for `plant_id`, trying the cached one first.
    pub async fn resolve(&self, plant_id: &str) -> Result<Resolution, CoreError> {
        let mut failures = ProbeFailures::default();

        if let Some(cached) = self.cache.get(plant_id) {
            match self.client.probe(cached.variant, plant_id).await {
                Ok(ProbeOutcome::Usable(data)) => {
                    debug!(variant = %cached.variant, plant = plant_id, "cached variant answered");
                    return Ok(Resolution::from_data(data, TRUSTED_SCORE));
                }
                Ok(ProbeOutcome::Unusable { status }) => {
                    failures.record_unusable(cached.variant, status);
                }
                Err(e) => failures.record(cached.variant, e),
            }
            info!(variant = %cached.variant, plant = plant_id, "cached variant failed, rescanning");
        }

        self.scan(plant_id, failures).await
    }

    /// Resolve by probing every variant, ignoring the cache shortcut.
    /// The winner is still written back to the cache.
    pub async fn resolve_uncached(&self, plant_id: &str) -> Result<Resolution, CoreError> {
        self.scan(plant_id, ProbeFailures::default()).await
    }

    async fn scan(&self, plant_id: &str, mut failures: ProbeFailures) -> Result<Resolution, CoreError> {
        let mut candidates = Vec::new();

        for variant in Variant::in_priority_order() {
            match self.client.probe(variant, plant_id).await {
                Ok(ProbeOutcome::Usable(data)) => {
                    let score = score(&data.fields);
                    debug!(%variant, score, "candidate");
                    candidates.push((data, score));
                }
                Ok(ProbeOutcome::Unusable { status }) => failures.record_unusable(variant, status),
                Err(e) => failures.record(variant, e),
            }
        }

        let Some((best, score)) = select_best(candidates) else {
            let err = failures.into_error(plant_id);
            warn!(plant = plant_id, error = %err, "no variant produced usable data");
            return Err(err);
        };

        info!(variant = %best.variant, score, plant = plant_id, "variant resolved");
        self.cache.put(plant_id, best.variant);
        Ok(Resolution::from_data(best, score))
    }
}
