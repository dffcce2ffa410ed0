//! Variant resolution and device-state reconciliation for Velis water heaters.
//!
//! Sits between `velis-api` and hosts (the CLI, or any automation bridge):
//!
//! - **[`Heater`]** -- Reconciler for one device. [`initialize()`](Heater::initialize)
//!   logs in, resolves the device and its API variant, and populates the cached
//!   state; [`start()`](Heater::start) does the same under a retrying supervisor
//!   and then runs the poll scheduler. Reads are served from the cache; commands
//!   go through the known variant with one re-resolution retry.
//!
//! - **[`VariantResolver`]** -- Probes the variant endpoints, scores usable
//!   answers, and remembers the winner in the [`VariantCache`].
//!
//! - **[`SessionManager`]** -- Login with bounded exponential backoff.
//!
//! - **[`DeviceState`]** / **[`ThermostatView`]** -- Cached readings with
//!   placeholder filtering, and the host-facing projection of them.

pub mod cache;
pub mod config;
pub mod error;
pub mod heater;
pub mod mode;
pub mod resolver;
pub mod session;
pub mod state;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{CachedVariant, VariantCache};
pub use config::{HeaterConfig, TempRange};
pub use error::CoreError;
pub use heater::{Heater, HeaterState, RefreshOutcome, SkipReason};
pub use resolver::{Resolution, TRUSTED_SCORE, VariantResolver};
pub use session::{LoginRetryPolicy, SessionManager};
pub use state::DeviceState;
pub use view::{AuxSensors, HeatingState, ThermostatView};

// Transport types hosts need without a direct velis-api dependency.
pub use velis_api::{Credentials, NormalizedFields, Variant, plant_identifier};
