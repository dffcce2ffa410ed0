// ── Heater ──
//
// Device state reconciler for one water heater. Owns the session, the
// variant resolver, and the cached readings; runs the startup supervisor
// and poll scheduler as background tasks; serves reads from the cache and
// routes writes through the currently known variant.
//
// Lifecycle: Uninitialized -> Initializing -> Ready, with Ready passing
// through Refreshing while a refresh runs. A failed initialization drops
// back to Uninitialized; there is no terminal failure state.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::Serialize;
use serde_json::Value;
use strum::Display;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use velis_api::{TransportConfig, Variant, VelisClient, plant_identifier};

use crate::cache::VariantCache;
use crate::config::HeaterConfig;
use crate::error::CoreError;
use crate::mode::{mode_label, mode_range};
use crate::resolver::{Resolution, VariantResolver};
use crate::session::SessionManager;
use crate::state::{DeviceState, MergeReport};
use crate::view::ThermostatView;

/// Backoff after a rate limit that carried no usable Retry-After.
const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);
const MIN_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(1);
/// Backoff after any other refresh failure.
const FAILURE_BACKOFF: Duration = Duration::from_millis(500);

// ── Public types ─────────────────────────────────────────────────────

/// Lifecycle of one heater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum HeaterState {
    Uninitialized,
    Initializing,
    Ready,
    Refreshing,
}

impl HeaterState {
    /// Commands and reads are served in both `Ready` and `Refreshing`.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::Refreshing)
    }
}

/// Why a refresh did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No device identifier yet, or initialization not finished.
    NotReady,
    /// Inside the backoff window of a previous failure.
    BackingOff,
}

/// Result of one (possibly shared) refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Fresh data merged; carries the resulting snapshot.
    Updated(DeviceState),
    Skipped(SkipReason),
    /// Failure absorbed; the next attempt waits at least `backoff`.
    Failed { message: String, backoff: Duration },
}

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Debug, Default)]
struct RefreshTiming {
    /// Monotonic time of the last successful refresh.
    last_refresh_at: Option<Instant>,
    backoff_until: Option<Instant>,
}

impl RefreshTiming {
    fn backing_off(&self, now: Instant) -> bool {
        self.backoff_until.is_some_and(|until| now < until)
    }

    fn cooled_down(&self, now: Instant, cooldown: Duration) -> bool {
        self.last_refresh_at
            .is_none_or(|at| now.saturating_duration_since(at) >= cooldown)
    }
}

#[derive(Debug, Clone, Copy)]
enum Write {
    Temperature { old: f64, new: f64 },
    Power(bool),
}

// ── Heater ───────────────────────────────────────────────────────────

/// Handle to one water heater. Cheaply cloneable.
#[derive(Clone)]
pub struct Heater {
    inner: Arc<HeaterInner>,
}

struct HeaterInner {
    config: HeaterConfig,
    client: Arc<VelisClient>,
    session: SessionManager,
    resolver: VariantResolver,
    lifecycle: watch::Sender<HeaterState>,
    device: watch::Sender<DeviceState>,
    plant_id: Mutex<Option<String>>,
    variant: Mutex<Option<Variant>>,
    /// Handle shared by every caller while a refresh is running.
    in_flight: StdMutex<Option<SharedRefresh>>,
    timing: StdMutex<RefreshTiming>,
    cancel: CancellationToken,
    /// Child token for the current start; replaced on restart.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Heater {
    /// Create a heater from configuration. Does NOT contact the API --
    /// call [`initialize()`](Self::initialize) or [`start()`](Self::start).
    pub fn new(config: HeaterConfig) -> Result<Self, CoreError> {
        let config = config.normalized();
        let transport = TransportConfig {
            timeout: config.timeout,
            user_agent: config.user_agent.clone(),
        };
        let client = Arc::new(VelisClient::new(&config.base_url, &transport)?);
        let cache = Arc::new(VariantCache::load(config.cache_path()));
        let session = SessionManager::new(
            Arc::clone(&client),
            config.credentials.clone(),
            config.login_retry,
        );
        let resolver = VariantResolver::new(Arc::clone(&client), cache);
        let (lifecycle, _) = watch::channel(HeaterState::Uninitialized);
        let (device, _) = watch::channel(DeviceState::default());
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Ok(Self {
            inner: Arc::new(HeaterInner {
                config,
                client,
                session,
                resolver,
                lifecycle,
                device,
                plant_id: Mutex::new(None),
                variant: Mutex::new(None),
                in_flight: StdMutex::new(None),
                timing: StdMutex::new(RefreshTiming::default()),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The normalized configuration in effect.
    pub fn config(&self) -> &HeaterConfig {
        &self.inner.config
    }

    pub fn state(&self) -> HeaterState {
        *self.inner.lifecycle.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<HeaterState> {
        self.inner.lifecycle.subscribe()
    }

    /// Subscribe to cached-state changes.
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.inner.device.subscribe()
    }

    /// The cached readings, without triggering a refresh.
    pub fn snapshot(&self) -> DeviceState {
        self.inner.device.borrow().clone()
    }

    pub async fn plant_id(&self) -> Option<String> {
        self.inner.plant_id.lock().await.clone()
    }

    pub async fn variant(&self) -> Option<Variant> {
        *self.inner.variant.lock().await
    }

    /// Host-facing view of the cached readings.
    ///
    /// Never waits on the network. When `refresh_on_get` is set and the
    /// cooldown has passed, a background refresh is kicked off.
    pub fn view(&self) -> ThermostatView {
        self.trigger_on_demand_refresh();
        ThermostatView::new(&self.inner.device.borrow(), &self.inner.config)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// One initialization attempt: login (with retry), device discovery
    /// when no identifier is configured, variant resolution, first state.
    ///
    /// Leaves the heater `Ready` on success and `Uninitialized` on failure.
    /// Does not start the poll scheduler; see [`start()`](Self::start).
    pub async fn initialize(&self) -> Result<(), CoreError> {
        self.inner.lifecycle.send_replace(HeaterState::Initializing);
        info!(name = %self.inner.config.name, "initializing");

        match self.try_initialize().await {
            Ok(plant_id) => {
                self.inner.lifecycle.send_replace(HeaterState::Ready);
                info!(plant = %plant_id, "heater ready");
                Ok(())
            }
            Err(e) => {
                self.inner.lifecycle.send_replace(HeaterState::Uninitialized);
                error!(error = %e, "initialization failed");
                Err(e)
            }
        }
    }

    async fn try_initialize(&self) -> Result<String, CoreError> {
        self.inner.session.login_with_retry().await?;

        let plant_id = self.configured_or_discovered_plant().await?;
        *self.inner.plant_id.lock().await = Some(plant_id.clone());

        let resolution = self.inner.resolver.resolve(&plant_id).await?;
        self.apply_resolution(&resolution).await;
        Ok(plant_id)
    }

    async fn configured_or_discovered_plant(&self) -> Result<String, CoreError> {
        match &self.inner.config.plant_id {
            Some(id) => Ok(id.clone()),
            None => self.discover_plant().await,
        }
    }

    async fn discover_plant(&self) -> Result<String, CoreError> {
        let plants = self.inner.client.list_plants().await?;
        let first = plants.first().ok_or(CoreError::NoDevices)?;
        let plant_id = plant_identifier(first).ok_or_else(|| CoreError::Api {
            message: "device record carries no identifier".into(),
            status: None,
        })?;
        info!(plant = %plant_id, found = plants.len(), "discovered device");
        Ok(plant_id)
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    /// Log in if needed and list the account's device records.
    pub async fn list_plants(&self) -> Result<Vec<Value>, CoreError> {
        self.ensure_session().await?;
        Ok(self.inner.client.list_plants().await?)
    }

    /// Log in if needed, find the device, and probe every variant.
    ///
    /// Runs outside the lifecycle: the cached state is left alone, but the
    /// winning variant is still remembered in the variant cache.
    pub async fn probe(&self) -> Result<(String, Resolution), CoreError> {
        self.ensure_session().await?;
        let plant_id = self.configured_or_discovered_plant().await?;
        let resolution = self.inner.resolver.resolve_uncached(&plant_id).await?;
        Ok((plant_id, resolution))
    }

    async fn ensure_session(&self) -> Result<(), CoreError> {
        if self.inner.session.is_authenticated() {
            return Ok(());
        }
        self.inner.session.login_with_retry().await?;
        Ok(())
    }

    /// Spawn the background supervisor: initialize until it succeeds,
    /// then run the poll scheduler until [`shutdown()`](Self::shutdown).
    ///
    /// Calling it again cancels the tasks of the previous start first.
    pub async fn start(&self) {
        let child = self.inner.cancel.child_token();
        {
            let mut current = self.inner.cancel_child.lock().await;
            current.cancel();
            *current = child.clone();
        }

        let handle = tokio::spawn(supervisor_task(self.clone(), child));
        self.inner.task_handles.lock().await.push(handle);
    }

    /// Stop background tasks. Cached state is kept.
    pub async fn shutdown(&self) {
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("heater stopped");
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Refresh the cached state from the API.
    ///
    /// Concurrent callers share one in-flight refresh and receive the same
    /// outcome. Failures are absorbed into [`RefreshOutcome::Failed`] and
    /// open a backoff window that later refreshes respect.
    pub async fn refresh(&self) -> RefreshOutcome {
        let pending = {
            let mut slot = self.inner.in_flight.lock().expect("refresh slot poisoned");
            if let Some(pending) = slot.as_ref() {
                debug!("joining in-flight refresh");
                pending.clone()
            } else {
                let heater = self.clone();
                let pending = async move { heater.run_refresh().await }.boxed().shared();
                *slot = Some(pending.clone());
                pending
            }
        };
        pending.await
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let outcome = self.refresh_once().await;
        self.inner
            .in_flight
            .lock()
            .expect("refresh slot poisoned")
            .take();
        outcome
    }

    async fn refresh_once(&self) -> RefreshOutcome {
        let Some(plant_id) = self.plant_id().await else {
            return RefreshOutcome::Skipped(SkipReason::NotReady);
        };
        if !self.is_ready() {
            return RefreshOutcome::Skipped(SkipReason::NotReady);
        }
        if self.timing().backing_off(Instant::now()) {
            debug!("refresh skipped: backing off");
            return RefreshOutcome::Skipped(SkipReason::BackingOff);
        }

        self.inner.lifecycle.send_if_modified(|state| {
            let ready = *state == HeaterState::Ready;
            if ready {
                *state = HeaterState::Refreshing;
            }
            ready
        });

        let outcome = match self.inner.resolver.resolve(&plant_id).await {
            Ok(resolution) => {
                self.apply_resolution(&resolution).await;
                RefreshOutcome::Updated(self.snapshot())
            }
            Err(e) => self.record_failure(e).await,
        };

        self.inner.lifecycle.send_if_modified(|state| {
            let refreshing = *state == HeaterState::Refreshing;
            if refreshing {
                *state = HeaterState::Ready;
            }
            refreshing
        });
        outcome
    }

    async fn apply_resolution(&self, resolution: &Resolution) {
        let previous = self.inner.variant.lock().await.replace(resolution.variant);
        if let Some(previous) = previous.filter(|v| *v != resolution.variant) {
            info!(from = %previous, to = %resolution.variant, "active variant changed");
        }

        let range = self.inner.config.temp_range();
        let mut report = MergeReport::default();
        self.inner.device.send_modify(|state| {
            report = state.merge(&resolution.fields, range);
            state.last_refresh = Some(Utc::now());
        });
        {
            let mut timing = self.timing();
            timing.last_refresh_at = Some(Instant::now());
            timing.backoff_until = None;
        }

        if let Some(value) = report.discarded_current {
            debug!(value, "discarded placeholder current temperature");
        }
        if let Some(value) = report.discarded_target {
            debug!(value, "discarded placeholder target temperature");
        }
        if let Some((old, new)) = report.mode_change {
            info!(
                from = %mode_label(old),
                from_range = %mode_range(old, range),
                to = %mode_label(Some(new)),
                to_range = %mode_range(Some(new), range),
                "operating mode changed"
            );
        }
    }

    async fn record_failure(&self, err: CoreError) -> RefreshOutcome {
        let backoff = backoff_for(&err);
        self.timing().backoff_until = Some(Instant::now() + backoff);

        if let CoreError::RateLimited { retry_after } = &err {
            warn!(
                retry_after_secs = retry_after.map(|d| d.as_secs()),
                backoff_secs = backoff.as_secs(),
                "refresh rate limited"
            );
        } else {
            warn!(error = %err, "refresh failed");
        }

        if err.is_auth_expired() {
            if let Err(e) = self.inner.session.relogin().await {
                warn!(error = %e, "re-login after session expiry failed");
            }
        }

        RefreshOutcome::Failed {
            message: err.to_string(),
            backoff,
        }
    }

    fn trigger_on_demand_refresh(&self) {
        if !self.inner.config.refresh_on_get || !self.is_ready() || !self.refresh_due() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let heater = self.clone();
        runtime.spawn(async move {
            // Re-check: an earlier trigger may have refreshed meanwhile.
            if heater.refresh_due() {
                debug!("on-demand refresh");
                heater.refresh().await;
            }
        });
    }

    /// Cooldown elapsed and no backoff window open.
    fn refresh_due(&self) -> bool {
        let now = Instant::now();
        let timing = self.timing();
        timing.cooled_down(now, self.inner.config.refresh_cooldown) && !timing.backing_off(now)
    }

    fn spawn_refresh(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let heater = self.clone();
        runtime.spawn(async move {
            heater.refresh().await;
        });
    }

    fn timing(&self) -> MutexGuard<'_, RefreshTiming> {
        self.inner.timing.lock().expect("refresh timing lock poisoned")
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Set the target temperature.
    ///
    /// The value is rounded to a whole degree and clamped into the
    /// configured range; the applied value is returned. Completes as soon
    /// as the write succeeds; the reconciling refresh runs in the
    /// background.
    pub async fn set_temperature(&self, requested: f64) -> Result<f64, CoreError> {
        if !requested.is_finite() {
            return Err(CoreError::ValidationFailed {
                message: format!("temperature must be a finite number, got {requested}"),
            });
        }
        let plant_id = self.require_ready().await?;
        let target = self.inner.config.temp_range().clamp(requested.round());
        let old = self.inner.device.borrow().target_temp.unwrap_or(target);

        self.write_with_retry(&plant_id, Write::Temperature { old, new: target })
            .await?;

        self.inner
            .device
            .send_modify(|state| state.target_temp = Some(target));
        info!(temperature = target, "target temperature set");
        self.spawn_refresh();
        Ok(target)
    }

    /// Switch the heater on or off.
    pub async fn set_power(&self, on: bool) -> Result<(), CoreError> {
        let plant_id = self.require_ready().await?;

        self.write_with_retry(&plant_id, Write::Power(on)).await?;

        self.inner.device.send_modify(|state| state.power = Some(on));
        info!(on, "power set");
        self.spawn_refresh();
        Ok(())
    }

    async fn require_ready(&self) -> Result<String, CoreError> {
        if !self.is_ready() {
            return Err(CoreError::NotReady);
        }
        self.plant_id().await.ok_or(CoreError::NotReady)
    }

    /// Write through the known variant. On failure, re-probe every
    /// variant once (skipping the cache shortcut) and retry the write
    /// through the winner.
    async fn write_with_retry(&self, plant_id: &str, write: Write) -> Result<(), CoreError> {
        let variant = self.variant().await.ok_or(CoreError::NotReady)?;

        let first = match self.send_write(variant, plant_id, write).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!(error = %first, %variant, ?write, "write failed, re-resolving variant");

        if first.is_auth_expired() {
            self.inner.session.relogin().await?;
        }
        let resolution = self.inner.resolver.resolve_uncached(plant_id).await?;
        self.apply_resolution(&resolution).await;

        self.send_write(resolution.variant, plant_id, write)
            .await
            .map_err(|e| {
                warn!(error = %e, variant = %resolution.variant, ?write, "write retry failed");
                CoreError::from(e)
            })
    }

    async fn send_write(
        &self,
        variant: Variant,
        plant_id: &str,
        write: Write,
    ) -> Result<(), velis_api::Error> {
        match write {
            Write::Temperature { old, new } => {
                self.inner
                    .client
                    .set_temperature(variant, plant_id, old, new)
                    .await
            }
            Write::Power(on) => self.inner.client.set_power(variant, plant_id, on).await,
        }
    }
}

fn backoff_for(err: &CoreError) -> Duration {
    match err {
        CoreError::RateLimited { retry_after } => retry_after
            .map_or(DEFAULT_RATE_LIMIT_BACKOFF, |d| d.max(MIN_RATE_LIMIT_BACKOFF)),
        _ => FAILURE_BACKOFF,
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Initialize until it succeeds, then hand over to the poll scheduler.
async fn supervisor_task(heater: Heater, cancel: CancellationToken) {
    let retry_delay = heater.inner.config.init_retry_delay;

    while heater.initialize().await.is_err() {
        info!("retrying initialization in {retry_delay:?}");
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(retry_delay) => {}
        }
    }

    if heater.inner.config.poll_interval.is_zero() {
        debug!("polling disabled");
        return;
    }
    poll_task(heater, cancel).await;
}

/// One refresh after the initial delay, then one per poll interval.
async fn poll_task(heater: Heater, cancel: CancellationToken) {
    let config = heater.config();

    tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(config.initial_refresh_delay) => {
            scheduled_refresh(&heater).await;
        }
    }

    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => scheduled_refresh(&heater).await,
        }
    }
}

async fn scheduled_refresh(heater: &Heater) {
    match heater.refresh().await {
        RefreshOutcome::Updated(_) => debug!("scheduled refresh complete"),
        RefreshOutcome::Skipped(reason) => debug!(?reason, "scheduled refresh skipped"),
        // Already logged where it happened.
        RefreshOutcome::Failed { .. } => {}
    }
}
