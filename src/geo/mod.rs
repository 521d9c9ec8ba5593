pub mod client;
pub mod distance;
pub mod throttle;

pub use client::{office_address_variants, ticket_address_variants, GeocodeClient, LookupOutcome};
pub use distance::{distance_km, nearest_office};
pub use throttle::RateGate;
