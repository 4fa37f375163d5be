//! Text rendering of light control reports for the host.

use acloud_core::ControlReport;

/// Render a report as the `control_light` tool output.
pub fn render_control_report(report: &ControlReport) -> String {
    if report.is_empty() {
        return format!("No lights found matching \"{}\"", report.query);
    }

    let lines: Vec<String> = report
        .lights
        .iter()
        .map(|light| match light.brightness {
            Some(b) => format!("{}: {} at {b}%", light.label(), light.action),
            None => format!("{}: {}", light.label(), light.action),
        })
        .collect();

    format!("Controlled {} light(s):\n{}", lines.len(), lines.join("\n"))
}
