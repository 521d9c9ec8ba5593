use anyhow::Result;

use crate::dispatch::DispatchReport;
use crate::types::{Office, Ticket};

pub fn report_to_csv(report: &DispatchReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "ticket_id",
        "manager_id",
        "office_id",
        "assigned_at",
        "reason",
    ])?;
    for assignment in &report.assignments {
        writer.write_record([
            assignment.ticket_id.to_string(),
            assignment.manager_id.to_string(),
            assignment.office_id.to_string(),
            assignment.assigned_at.to_rfc3339(),
            assignment.reason.clone(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

/// Offices as CSV; entities still awaiting geocoding get blank cells.
pub fn offices_to_csv(offices: &[Office]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["id", "name", "address", "lat", "lon"])?;
    for office in offices {
        writer.write_record([
            office.id.to_string(),
            office.name.clone(),
            office.address.clone(),
            office
                .coordinates
                .map(|c| c.lat.to_string())
                .unwrap_or_default(),
            office
                .coordinates
                .map(|c| c.lon.to_string())
                .unwrap_or_default(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn tickets_to_csv(tickets: &[Ticket]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["id", "city", "country", "lat", "lon"])?;
    for ticket in tickets {
        writer.write_record([
            ticket.id.to_string(),
            ticket.city.clone().unwrap_or_default(),
            ticket.country.clone().unwrap_or_default(),
            ticket
                .coordinates
                .map(|c| c.lat.to_string())
                .unwrap_or_default(),
            ticket
                .coordinates
                .map(|c| c.lon.to_string())
                .unwrap_or_default(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
