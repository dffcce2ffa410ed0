// velis-api: Async Rust client for the Ariston NET remote-thermo API

pub mod auth;
pub mod client;
pub mod error;
pub mod fields;
pub mod rate_limit;
pub mod transport;
pub mod variant;

pub use auth::Credentials;
pub use client::{PlantData, ProbeOutcome, VelisClient, plant_identifier};
pub use error::Error;
pub use fields::{Field, NormalizedFields, first_present};
pub use transport::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT, TransportConfig};
pub use variant::Variant;
