use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{info, warn};

use crate::config::RoutingConfig;
use crate::dispatch::fairness::RoundRobinLedger;
use crate::dispatch::filters::{eligible_managers, fired_filter_notes};
use crate::dispatch::DispatchReport;
use crate::geo::distance::nearest_office;
use crate::types::{Assignment, Dataset, Language, Ticket};

/// The assignment engine. Processes tickets strictly sequentially: each
/// ticket's load increment is committed before the next ticket is ranked,
/// so load balancing is consistent within a single run.
pub struct Dispatcher {
    home_country_lower: String,
    home_language: Language,
    hub_names: Vec<String>,
    fairness: RoundRobinLedger,
}

impl Dispatcher {
    pub fn new(routing: &RoutingConfig) -> Self {
        let home_language = routing
            .default_language
            .parse()
            .unwrap_or(Language::Ru);
        Self {
            home_country_lower: routing.home_country.trim().to_lowercase(),
            home_language,
            hub_names: routing.hub_offices.clone(),
            fairness: RoundRobinLedger::new(),
        }
    }

    /// Dispatch every unassigned ticket that has an analysis, highest
    /// priority first. Created assignments are appended to the dataset and
    /// returned; per-ticket routing failures are collected, never fatal.
    /// Re-running on the same dataset is a no-op.
    pub fn assign(&mut self, data: &mut Dataset) -> DispatchReport {
        let mut report = DispatchReport::default();

        if data.offices.is_empty() || data.managers.is_empty() {
            let message = format!(
                "nothing to dispatch: {} offices, {} managers loaded",
                data.offices.len(),
                data.managers.len()
            );
            warn!("{message}");
            report.failures.push(message);
            return report;
        }

        let mut next_id = data.next_assignment_id();
        let Dataset {
            offices,
            managers,
            tickets,
            analyses,
            assignments,
        } = data;

        // Explicit lookup maps, built once per run.
        let analysis_by_ticket: HashMap<i64, usize> = analyses
            .iter()
            .enumerate()
            .map(|(index, analysis)| (analysis.ticket_id, index))
            .collect();
        let already_assigned: HashSet<i64> =
            assignments.iter().map(|a| a.ticket_id).collect();
        let mut managers_by_office: HashMap<i64, Vec<usize>> = HashMap::new();
        for (index, manager) in managers.iter().enumerate() {
            managers_by_office
                .entry(manager.office_id)
                .or_default()
                .push(index);
        }
        let hubs: Vec<usize> = self
            .hub_names
            .iter()
            .filter_map(|name| offices.iter().position(|office| &office.name == name))
            .collect();

        // Highest priority first; the stable sort preserves input order on ties.
        let mut queue: Vec<(usize, usize)> = tickets
            .iter()
            .enumerate()
            .filter_map(|(ticket_index, ticket)| {
                analysis_by_ticket
                    .get(&ticket.id)
                    .map(|&analysis_index| (ticket_index, analysis_index))
            })
            .collect();
        queue.sort_by(|a, b| analyses[b.1].priority.cmp(&analyses[a.1].priority));

        // Strict 50/50 split across this run for foreign/unknown tickets.
        let mut hub_toggle = 0usize;

        for (ticket_index, analysis_index) in queue {
            let ticket = &tickets[ticket_index];
            if already_assigned.contains(&ticket.id) {
                continue;
            }
            let analysis = &analyses[analysis_index];
            let mut reason_parts: Vec<String> = Vec::new();

            let mut target_index: Option<usize> = None;
            if self.is_foreign_or_unknown(ticket) {
                if !hubs.is_empty() {
                    let pick = hubs[hub_toggle % hubs.len()];
                    reason_parts.push(format!(
                        "Unknown or foreign address: routed to hub {} (50/50 split)",
                        offices[pick].name
                    ));
                    target_index = Some(pick);
                }
                hub_toggle = (hub_toggle + 1) % 2;
            } else if let Some(point) = ticket.coordinates {
                if let Some(office) = nearest_office(point, offices) {
                    reason_parts.push(format!("Nearest office: {}", office.name));
                    target_index = offices.iter().position(|o| o.id == office.id);
                }
            }

            let Some(mut target_index) = target_index else {
                warn!(ticket = ticket.id, "no target office");
                report
                    .failures
                    .push(format!("ticket {}: no target office found", ticket.id));
                continue;
            };

            let empty = Vec::new();
            let pool = managers_by_office
                .get(&offices[target_index].id)
                .unwrap_or(&empty);
            let mut eligible =
                eligible_managers(pool, managers, ticket, analysis, self.home_language);

            if eligible.is_empty() {
                // Fallback ranking deliberately uses squared Euclidean
                // distance on raw lat/lon, not the geodesic metric of the
                // primary pick. Unifying the two would reorder near-ties.
                let (ticket_lat, ticket_lon) = ticket
                    .coordinates
                    .map(|c| (c.lat, c.lon))
                    .unwrap_or((0.0, 0.0));
                let squared_distance = |index: usize| -> f64 {
                    let c = offices[index].coordinates.unwrap_or_default();
                    (ticket_lat - c.lat).powi(2) + (ticket_lon - c.lon).powi(2)
                };
                let mut candidates: Vec<usize> = (0..offices.len())
                    .filter(|&index| index != target_index && offices[index].is_geocoded())
                    .collect();
                candidates.sort_by(|&a, &b| squared_distance(a).total_cmp(&squared_distance(b)));

                for candidate in candidates {
                    let pool = managers_by_office
                        .get(&offices[candidate].id)
                        .unwrap_or(&empty);
                    let filtered =
                        eligible_managers(pool, managers, ticket, analysis, self.home_language);
                    if !filtered.is_empty() {
                        reason_parts.push(format!(
                            "Fell back to office {} (no eligible managers at primary)",
                            offices[candidate].name
                        ));
                        target_index = candidate;
                        eligible = filtered;
                        break;
                    }
                }
            }

            if eligible.is_empty() {
                warn!(ticket = ticket.id, "no eligible managers");
                report
                    .failures
                    .push(format!("ticket {}: no eligible managers", ticket.id));
                continue;
            }

            // Two lowest-load managers compete; the stable sort keeps input
            // order among equal loads.
            eligible.sort_by_key(|&index| managers[index].current_load);
            let top_two: Vec<usize> = eligible.into_iter().take(2).collect();
            let pool_ids: Vec<i64> = top_two.iter().map(|&index| managers[index].id).collect();
            let office_id = offices[target_index].id;
            let winner_id = self.fairness.next(office_id, &pool_ids);
            let winner_index = top_two
                .iter()
                .copied()
                .find(|&index| managers[index].id == winner_id)
                .unwrap_or(top_two[0]);

            let fired = fired_filter_notes(ticket, analysis, self.home_language);
            if !fired.is_empty() {
                reason_parts.push(format!("Skill filters: {}", fired.join(", ")));
            }
            let winner = &managers[winner_index];
            reason_parts.push(format!(
                "Round robin winner: {} (load {})",
                winner.name, winner.current_load
            ));

            let assignment = Assignment {
                id: next_id,
                ticket_id: ticket.id,
                analysis_id: analysis.id,
                manager_id: winner.id,
                office_id,
                reason: reason_parts.join(" | "),
                assigned_at: Utc::now(),
            };
            next_id += 1;

            // Commit before the next ticket so its ranking sees this load.
            managers[winner_index].current_load += 1;
            assignments.push(assignment.clone());
            report.assignments.push(assignment);
        }

        info!(
            "assigned {} tickets, {} failures",
            report.assigned_count(),
            report.failures.len()
        );
        report
    }

    fn is_foreign_or_unknown(&self, ticket: &Ticket) -> bool {
        if ticket.coordinates.is_none() {
            return true;
        }
        match &ticket.country {
            Some(country) => country.trim().to_lowercase() != self.home_country_lower,
            None => false,
        }
    }
}
