use crate::budget::AlertState;
use crate::error::Result;
use crate::normalize::CleanEntry;
use crate::schema::BillingConfig;
use crate::utils::{round2, BillingPeriod};
use crate::BillingRun;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// The two durable outputs of a run, plus their rendered filenames. Both
/// artifacts are derived and regenerable, never hand-edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    pub accounting_csv: String,
    pub summary_markdown: String,
    pub csv_filename: String,
    pub report_filename: String,
}

/// Renders both artifacts from a completed run. Pure: identical runs yield
/// byte-identical artifacts.
pub fn assemble(run: &BillingRun, config: &BillingConfig) -> Result<RunArtifacts> {
    Ok(RunArtifacts {
        accounting_csv: render_accounting_csv(&run.entries)?,
        summary_markdown: render_summary(run),
        csv_filename: config.output.accounting_csv_filename(run.period),
        report_filename: config.output.summary_report_filename(run.period),
    })
}

/// The accounting extract: one row per normalized entry, amounts omitted.
/// Unmapped entries keep their row with an empty client field.
pub fn render_accounting_csv(entries: &[CleanEntry]) -> Result<String> {
    let mut ordered: Vec<&CleanEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| {
        (a.date, a.client.as_deref(), a.person.as_str())
            .cmp(&(b.date, b.client.as_deref(), b.person.as_str()))
    });

    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer.write_record([
            "date",
            "period_label",
            "client",
            "person",
            "billable_hours",
            "task",
            "task_id",
        ])?;

        for entry in ordered {
            writer.write_record([
                entry.date.format("%Y-%m-%d").to_string(),
                BillingPeriod::from_date(entry.date).label(),
                entry.client.clone().unwrap_or_default(),
                entry.person.clone(),
                format!("{:.2}", round2(entry.hours)),
                entry.task.clone(),
                entry.task_id.clone(),
            ])?;
        }
        writer.flush()?;
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn money(value: f64) -> String {
    format!("${:.2}", round2(value))
}

/// The human-facing Markdown summary. Clients and people appear in
/// alphabetical order and the detail log is sorted by date, client, person,
/// so reruns over the same data diff clean.
pub fn render_summary(run: &BillingRun) -> String {
    let mut out = String::new();

    let (start, end) = report_date_range(run);
    out.push_str("# Billing Summary Report\n\n");
    out.push_str(&format!(
        "**Report Period:** {} to {}\n\n---\n\n",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    ));

    out.push_str("## Summary by Client\n\n");
    out.push_str("| Client | Billable Hours | Rate | Amount | Remaining Budget | Months Left |\n");
    out.push_str("|--------|----------------|------|--------|------------------|-------------|\n");

    for summary in &run.client_summaries {
        let rate = match summary.rate {
            Some(rate) => money(rate),
            None => "rate missing".to_string(),
        };
        let amount = match summary.billed {
            Some(amount) => money(amount),
            None => "—".to_string(),
        };
        let months = match (summary.rate, summary.months_remaining) {
            (None, _) => "N/A".to_string(),
            (_, None) => "no burn".to_string(),
            (_, Some(months)) if summary.alert == AlertState::Alert => {
                format!("{:.1} ⚠️", months)
            }
            (_, Some(months)) => format!("{:.1}", months),
        };

        out.push_str(&format!(
            "| {} | {:.2} | {} | {} | {} | {} |\n",
            summary.client,
            round2(summary.hours),
            rate,
            amount,
            money(summary.ending_remaining),
            months
        ));
    }

    let total_hours: f64 = run.entries.iter().map(|e| e.hours).sum();
    let total_amount: f64 = run
        .client_summaries
        .iter()
        .filter_map(|s| s.billed)
        .sum();
    out.push_str(&format!(
        "\n**Grand Total:** {:.2} hours = {}\n\n",
        round2(total_hours),
        money(total_amount)
    ));

    let alerted: Vec<_> = run
        .client_summaries
        .iter()
        .filter(|s| s.alert == AlertState::Alert)
        .collect();
    if !alerted.is_empty() {
        out.push_str("### ⚠️ Budget Alerts\n\n");
        for summary in alerted {
            if summary.ending_remaining < 0.0 {
                out.push_str(&format!(
                    "- **{}**: Budget overrun ({})\n",
                    summary.client,
                    money(summary.ending_remaining)
                ));
            } else if let Some(months) = summary.months_remaining {
                out.push_str(&format!(
                    "- **{}**: Only {:.1} months of budget remaining ({})\n",
                    summary.client,
                    months,
                    money(summary.ending_remaining)
                ));
            }
        }
        out.push('\n');
    }

    out.push_str("---\n\n## Summary by Team Member\n\n");
    out.push_str("| Name | Billable Hours |\n|------|----------------|\n");
    for person in &run.person_summaries {
        out.push_str(&format!(
            "| {} | {:.2} |\n",
            person.person,
            round2(person.hours)
        ));
    }

    out.push_str("\n---\n\n## Summary by Client and Month\n\n");
    out.push_str("| Client | Month | Billable Hours | Amount |\n");
    out.push_str("|--------|-------|----------------|--------|\n");
    for row in &run.monthly_breakdown {
        let amount = match row.amount {
            Some(amount) => money(amount),
            None => "—".to_string(),
        };
        out.push_str(&format!(
            "| {} | {} | {:.2} | {} |\n",
            row.client,
            row.period,
            round2(row.hours),
            amount
        ));
    }

    out.push_str("\n---\n\n## Detailed Billing Log\n\n");
    out.push_str("| Date | Client | Name | Hours | Rate | Amount | Task |\n");
    out.push_str("|------|--------|------|-------|------|--------|------|\n");

    let mut ordered: Vec<&CleanEntry> = run.entries.iter().collect();
    ordered.sort_by(|a, b| {
        (a.date, a.client.as_deref(), a.person.as_str())
            .cmp(&(b.date, b.client.as_deref(), b.person.as_str()))
    });
    for entry in ordered {
        let rate = entry
            .client
            .as_deref()
            .and_then(|client| {
                run.client_summaries
                    .iter()
                    .find(|s| s.client == client)
                    .and_then(|s| s.rate)
            });
        let (rate_cell, amount_cell) = match rate {
            Some(rate) => (money(rate), money(entry.hours * rate)),
            None => ("—".to_string(), "—".to_string()),
        };

        out.push_str(&format!(
            "| {} | {} | {} | {:.2} | {} | {} | {} |\n",
            entry.date.format("%Y-%m-%d"),
            entry.client.as_deref().unwrap_or("(unmapped)"),
            entry.person,
            round2(entry.hours),
            rate_cell,
            amount_cell,
            entry.task
        ));
    }

    // Always present, even when empty: one place to check data quality.
    out.push_str("\n---\n\n## Warnings\n\n");
    if run.warnings.is_empty() {
        out.push_str("(none)\n");
    } else {
        for warning in &run.warnings {
            out.push_str(&format!("- {}\n", warning));
        }
    }

    out
}

fn report_date_range(run: &BillingRun) -> (chrono::NaiveDate, chrono::NaiveDate) {
    let min = run.entries.iter().map(|e| e.date).min();
    let max = run.entries.iter().map(|e| e.date).max();
    match (min, max) {
        (Some(min), Some(max)) => (
            BillingPeriod::from_date(min).first_day(),
            BillingPeriod::from_date(max).last_day(),
        ),
        _ => (run.period.first_day(), run.period.last_day()),
    }
}

/// Writes both artifacts, each through a temporary sibling followed by an
/// atomic rename. A crash mid-run leaves no partial artifact behind.
pub fn write_artifacts(
    artifacts: &RunArtifacts,
    csv_dir: &Path,
    report_dir: &Path,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(csv_dir)?;
    fs::create_dir_all(report_dir)?;

    let csv_path = csv_dir.join(&artifacts.csv_filename);
    let report_path = report_dir.join(&artifacts.report_filename);

    write_atomic(&csv_path, &artifacts.accounting_csv)?;
    write_atomic(&report_path, &artifacts.summary_markdown)?;

    info!(
        "Artifacts written: {} and {}",
        csv_path.display(),
        report_path.display()
    );

    Ok((csv_path, report_path))
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{}.tmp", file_name));

    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
