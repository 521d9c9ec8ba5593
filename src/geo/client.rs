use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::GeocoderConfig;
use crate::geo::throttle::RateGate;
use crate::types::{Coordinates, Office, Ticket};

/// Result of a single provider lookup. The retry policy differs per case,
/// so the distinction is carried as data instead of error control flow:
/// transient failures are retried with backoff, a definitive empty result
/// and permanent failures both move on to the next address variant.
#[derive(Debug)]
pub enum LookupOutcome {
    Resolved(Coordinates),
    NotFound,
    Transient(String),
    Permanent(String),
}

/// Nominatim-style search response row; coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

pub struct GeocodeClient {
    http: Client,
    base_url: String,
    gate: Arc<RateGate>,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl GeocodeClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .context("failed to build geocoder HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            gate: Arc::new(RateGate::new(config.min_interval())),
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
        })
    }

    /// Swap in a different throttle gate (tests use a zero-interval one).
    pub fn with_gate(mut self, gate: Arc<RateGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// One throttled provider request for a single address string.
    pub async fn lookup(&self, address: &str) -> LookupOutcome {
        self.gate.acquire().await;

        let url = format!("{}/search", self.base_url);
        debug!(address, "geocoder lookup");
        let response = match self
            .http
            .get(&url)
            .query(&[("q", address), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .await
        {
            Ok(response) => response,
            Err(error) if error.is_timeout() || error.is_connect() => {
                return LookupOutcome::Transient(error.to_string());
            }
            Err(error) => return LookupOutcome::Permanent(error.to_string()),
        };

        if let Some(outcome) = outcome_for_status(response.status()) {
            return outcome;
        }

        let places = match response.json::<Vec<Place>>().await {
            Ok(places) => places,
            Err(error) => {
                return LookupOutcome::Permanent(format!("invalid provider response: {error}"));
            }
        };
        let Some(place) = places.into_iter().next() else {
            return LookupOutcome::NotFound;
        };
        match (place.lat.parse::<f64>(), place.lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => LookupOutcome::Resolved(Coordinates { lat, lon }),
            _ => LookupOutcome::Permanent(format!(
                "unparsable coordinates: lat={} lon={}",
                place.lat, place.lon
            )),
        }
    }

    /// Try each address variant in order, most to least specific, retrying
    /// transient failures with exponential backoff. First hit wins.
    pub async fn resolve(&self, variants: &[String]) -> Option<Coordinates> {
        self.resolve_with(variants, |address| self.lookup(address))
            .await
    }

    // The retry loop over an injected lookup, so the policy is testable
    // without a provider.
    async fn resolve_with<'a, F, Fut>(
        &self,
        variants: &'a [String],
        mut lookup: F,
    ) -> Option<Coordinates>
    where
        F: FnMut(&'a str) -> Fut,
        Fut: Future<Output = LookupOutcome>,
    {
        for address in variants {
            let mut attempt = 0u32;
            loop {
                match lookup(address.as_str()).await {
                    LookupOutcome::Resolved(coordinates) => return Some(coordinates),
                    LookupOutcome::NotFound => break,
                    LookupOutcome::Permanent(reason) => {
                        warn!(address, reason, "geocoding failed, skipping variant");
                        break;
                    }
                    LookupOutcome::Transient(reason) => {
                        if attempt >= self.max_retries {
                            warn!(address, reason, "geocoding retries exhausted");
                            break;
                        }
                        let delay = self.retry_base_delay * 2u32.pow(attempt);
                        debug!(
                            address,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            reason,
                            "transient geocoding failure, retrying"
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        }
        None
    }

    /// Geocode every office still lacking coordinates. Entities that cannot
    /// be resolved keep their coordinates absent; nothing here is a hard
    /// error for the caller. Returns the number of offices geocoded.
    pub async fn geocode_offices(&self, offices: &mut [Office], home_country: &str) -> usize {
        let pending: Vec<&mut Office> = offices
            .iter_mut()
            .filter(|office| office.coordinates.is_none())
            .collect();
        if pending.is_empty() {
            return 0;
        }
        info!("geocoding {} offices", pending.len());

        let tasks = pending.into_iter().map(|office| async move {
            let variants = office_address_variants(office, home_country);
            match self.resolve(&variants).await {
                Some(coordinates) => {
                    office.coordinates = Some(coordinates);
                    info!(office = %office.name, lat = coordinates.lat, lon = coordinates.lon, "geocoded office");
                    true
                }
                None => {
                    warn!(office = %office.name, "could not geocode office");
                    false
                }
            }
        });
        join_all(tasks).await.into_iter().filter(|done| *done).count()
    }

    /// Geocode tickets that have an address but no coordinates yet. Same
    /// skip-and-continue semantics as `geocode_offices`.
    pub async fn geocode_tickets(&self, tickets: &mut [Ticket]) -> usize {
        let pending: Vec<&mut Ticket> = tickets
            .iter_mut()
            .filter(|ticket| ticket.coordinates.is_none() && ticket.city.is_some())
            .collect();
        if pending.is_empty() {
            return 0;
        }
        let total = pending.len();
        info!("geocoding {total} ticket addresses");

        let tasks = pending.into_iter().map(|ticket| async move {
            let variants = ticket_address_variants(ticket);
            if variants.is_empty() {
                return false;
            }
            match self.resolve(&variants).await {
                Some(coordinates) => {
                    ticket.coordinates = Some(coordinates);
                    true
                }
                None => false,
            }
        });
        let geocoded = join_all(tasks).await.into_iter().filter(|done| *done).count();
        info!("geocoded {geocoded} / {total} ticket addresses");
        geocoded
    }
}

fn outcome_for_status(status: StatusCode) -> Option<LookupOutcome> {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Some(LookupOutcome::Transient(format!(
            "provider returned {status}"
        )));
    }
    if !status.is_success() {
        return Some(LookupOutcome::Permanent(format!(
            "provider returned {status}"
        )));
    }
    None
}

/// Office address variants, most to least specific.
pub fn office_address_variants(office: &Office, home_country: &str) -> Vec<String> {
    vec![
        format!("{}, {}, {}", office.address, office.name, home_country),
        format!("{}, {}", office.name, home_country),
    ]
}

/// Ticket address variants: the full street-level address first, then the
/// city-level form when it differs.
pub fn ticket_address_variants(ticket: &Ticket) -> Vec<String> {
    let parts: Vec<&str> = [
        ticket.street.as_deref(),
        ticket.house.as_deref(),
        ticket.city.as_deref(),
        ticket.region.as_deref(),
        ticket.country.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();

    let city_parts: Vec<&str> = [
        ticket.city.as_deref(),
        ticket.region.as_deref(),
        ticket.country.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut variants = Vec::new();
    if !parts.is_empty() {
        variants.push(parts.join(", "));
    }
    if !city_parts.is_empty() && city_parts != parts {
        variants.push(city_parts.join(", "));
    }
    variants
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use tokio::time::Instant;

    use super::*;
    use crate::types::Segment;

    fn client_with_retries(max_retries: u32) -> GeocodeClient {
        let config = GeocoderConfig {
            max_retries,
            retry_base_delay_ms: 2000,
            ..GeocoderConfig::default()
        };
        GeocodeClient::new(&config).unwrap()
    }

    fn variants(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn ticket(city: Option<&str>, street: Option<&str>) -> Ticket {
        Ticket {
            id: 1,
            segment: Segment::Standard,
            country: Some("Kazakhstan".to_string()),
            region: None,
            city: city.map(str::to_string),
            street: street.map(str::to_string),
            house: None,
            coordinates: None,
        }
    }

    #[test]
    fn office_variants_go_from_specific_to_broad() {
        let office = Office {
            id: 1,
            name: "Astana".to_string(),
            address: "Mangilik El 55".to_string(),
            coordinates: None,
        };
        let variants = office_address_variants(&office, "Kazakhstan");
        assert_eq!(
            variants,
            vec![
                "Mangilik El 55, Astana, Kazakhstan".to_string(),
                "Astana, Kazakhstan".to_string(),
            ]
        );
    }

    #[test]
    fn ticket_variants_add_city_level_fallback() {
        let variants = ticket_address_variants(&ticket(Some("Karaganda"), Some("Gogol St")));
        assert_eq!(
            variants,
            vec![
                "Gogol St, Karaganda, Kazakhstan".to_string(),
                "Karaganda, Kazakhstan".to_string(),
            ]
        );
    }

    #[test]
    fn ticket_variants_collapse_when_street_is_missing() {
        let variants = ticket_address_variants(&ticket(Some("Karaganda"), None));
        assert_eq!(variants, vec!["Karaganda, Kazakhstan".to_string()]);
    }

    #[test]
    fn ticket_without_address_fields_yields_no_variants() {
        let mut t = ticket(None, None);
        t.country = None;
        assert!(ticket_address_variants(&t).is_empty());
    }

    #[test]
    fn rate_limit_and_server_errors_classify_transient() {
        assert!(matches!(
            outcome_for_status(StatusCode::TOO_MANY_REQUESTS),
            Some(LookupOutcome::Transient(_))
        ));
        assert!(matches!(
            outcome_for_status(StatusCode::BAD_GATEWAY),
            Some(LookupOutcome::Transient(_))
        ));
        assert!(matches!(
            outcome_for_status(StatusCode::FORBIDDEN),
            Some(LookupOutcome::Permanent(_))
        ));
        assert!(outcome_for_status(StatusCode::OK).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_back_off_then_resolve() {
        let client = client_with_retries(3);
        let point = Coordinates {
            lat: 51.1694,
            lon: 71.4491,
        };
        let mut outcomes = VecDeque::from([
            LookupOutcome::Transient("503".to_string()),
            LookupOutcome::Transient("503".to_string()),
            LookupOutcome::Resolved(point),
        ]);
        let mut stamps = Vec::new();
        let addresses = variants(&["Astana, Kazakhstan"]);

        let resolved = client
            .resolve_with(&addresses, |address| {
                assert_eq!(address, "Astana, Kazakhstan");
                stamps.push(Instant::now());
                let outcome = outcomes.pop_front().unwrap();
                async move { outcome }
            })
            .await;

        assert_eq!(resolved, Some(point));
        assert_eq!(stamps.len(), 3);
        // Backoff doubles from the base delay: 2 s, then 4 s.
        assert_eq!(stamps[1] - stamps[0], Duration::from_millis(2000));
        assert_eq!(stamps[2] - stamps[1], Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_advances_to_the_next_variant_without_backoff() {
        let client = client_with_retries(3);
        let point = Coordinates { lat: 1.0, lon: 2.0 };
        let mut outcomes = VecDeque::from([
            LookupOutcome::NotFound,
            LookupOutcome::Resolved(point),
        ]);
        let mut calls = Vec::new();
        let addresses = variants(&["Gogol St, Karaganda", "Karaganda"]);
        let start = Instant::now();

        let resolved = client
            .resolve_with(&addresses, |address| {
                calls.push(address);
                let outcome = outcomes.pop_front().unwrap();
                async move { outcome }
            })
            .await;

        assert_eq!(resolved, Some(point));
        assert_eq!(calls, vec!["Gogol St, Karaganda", "Karaganda"]);
        // No retry, no sleep.
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_skips_the_variant_without_retrying() {
        let client = client_with_retries(3);
        let point = Coordinates { lat: 1.0, lon: 2.0 };
        let mut outcomes = VecDeque::from([
            LookupOutcome::Permanent("403".to_string()),
            LookupOutcome::Resolved(point),
        ]);
        let mut calls = Vec::new();
        let addresses = variants(&["first", "second"]);
        let start = Instant::now();

        let resolved = client
            .resolve_with(&addresses, |address| {
                calls.push(address);
                let outcome = outcomes.pop_front().unwrap();
                async move { outcome }
            })
            .await;

        assert_eq!(resolved, Some(point));
        assert_eq!(calls, vec!["first", "second"]);
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_retries_stop_at_the_cap() {
        let client = client_with_retries(2);
        let mut calls = 0u32;
        let addresses = variants(&["unreachable"]);

        let resolved = client
            .resolve_with(&addresses, |_| {
                calls += 1;
                async { LookupOutcome::Transient("timeout".to_string()) }
            })
            .await;

        assert_eq!(resolved, None);
        // The first attempt plus two retries.
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn unreachable_provider_leaves_entities_ungeocoded() {
        let config = GeocoderConfig {
            max_retries: 0,
            retry_base_delay_ms: 0,
            timeout_secs: 1,
            ..GeocoderConfig::default()
        };
        let client = GeocodeClient::new(&config)
            .unwrap()
            .with_base_url("http://127.0.0.1:9")
            .with_gate(Arc::new(RateGate::new(Duration::ZERO)));
        let mut offices = vec![Office {
            id: 1,
            name: "Astana".to_string(),
            address: "Mangilik El 55".to_string(),
            coordinates: None,
        }];
        let geocoded = client.geocode_offices(&mut offices, "Kazakhstan").await;
        assert_eq!(geocoded, 0);
        assert!(offices[0].coordinates.is_none());
    }
}
