//! Human-readable rendering of a ScoreResult

use dtrust_core::score::ScoreResult;
use dtrust_core::TrustReport;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Tabled)]
struct PenaltyRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Penalty")]
    value: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

#[derive(Tabled)]
struct SignalRow {
    #[tabled(rename = "Signal")]
    name: String,
    #[tabled(rename = "Count")]
    count: u64,
}

pub fn render(report: &TrustReport, result: &ScoreResult) -> String {
    let mut out = format!(
        "Trust score: {}/100 (floor {}, tier {}, rootfs {})\n",
        result.score,
        result.floor,
        report.tier,
        report.target_rootfs.display()
    );
    if report.is_partial() {
        out.push_str("Note: manual area inventory was truncated\n");
    }
    if !report.diagnostics.is_empty() {
        out.push_str(&format!("Diagnostics: {}\n", report.diagnostics.len()));
    }
    out.push('\n');

    if result.penalties.is_empty() {
        out.push_str("No penalties\n");
    } else {
        let rows: Vec<PenaltyRow> = result
            .penalties
            .iter()
            .map(|p| PenaltyRow {
                category: p.category.to_string(),
                value: format_value(p.value),
                reason: p.reason.clone(),
            })
            .collect();
        out.push_str(&styled(Table::new(&rows)));
        out.push('\n');
    }

    let signals: Vec<SignalRow> = result
        .signals
        .iter()
        .map(|(name, count)| SignalRow {
            name: name.clone(),
            count: *count,
        })
        .collect();
    out.push('\n');
    out.push_str(&styled(Table::new(&signals)));
    out
}

fn styled(mut table: Table) -> String {
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string()
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
