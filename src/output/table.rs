use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::dispatch::DispatchReport;
use crate::types::{Dataset, Office, Ticket};

pub fn render_report_table(report: &DispatchReport, data: &Dataset) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Ticket", "Manager", "Office", "Reason"]);

    for assignment in &report.assignments {
        let manager = data
            .managers
            .iter()
            .find(|m| m.id == assignment.manager_id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| assignment.manager_id.to_string());
        let office = data
            .offices
            .iter()
            .find(|o| o.id == assignment.office_id)
            .map(|o| o.name.clone())
            .unwrap_or_else(|| assignment.office_id.to_string());
        table.add_row(Row::from(vec![
            Cell::new(assignment.ticket_id),
            Cell::new(manager),
            Cell::new(office),
            Cell::new(&assignment.reason),
        ]));
    }
    for failure in &report.failures {
        table.add_row(Row::from(vec![
            Cell::new("-").fg(Color::Red),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new(failure).fg(Color::Red),
        ]));
    }
    table.to_string()
}

pub fn render_offices_table(offices: &[Office]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Office", "Address", "Lat", "Lon"]);
    for office in offices {
        table.add_row(vec![
            office.name.clone(),
            office.address.clone(),
            office
                .coordinates
                .map(|c| format!("{:.4}", c.lat))
                .unwrap_or_else(|| "-".to_string()),
            office
                .coordinates
                .map(|c| format!("{:.4}", c.lon))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

pub fn render_tickets_table(tickets: &[Ticket]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Ticket", "City", "Country", "Geocoded"]);
    for ticket in tickets {
        let geocoded = if ticket.is_geocoded() { "YES" } else { "NO" };
        let geocoded_cell = if ticket.is_geocoded() {
            Cell::new(geocoded).fg(Color::Green)
        } else {
            Cell::new(geocoded).fg(Color::Red)
        };
        table.add_row(Row::from(vec![
            Cell::new(ticket.id),
            Cell::new(ticket.city.clone().unwrap_or_else(|| "-".to_string())),
            Cell::new(ticket.country.clone().unwrap_or_else(|| "-".to_string())),
            geocoded_cell,
        ]));
    }
    table.to_string()
}
