use crate::error::{BillingError, Result};
use crate::utils::BillingPeriod;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Where a completed period's files live and where they are archived to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    /// Raw export CSVs awaiting archive.
    pub raw_dir: PathBuf,
    /// Generated accounting CSVs.
    pub cleaned_dir: PathBuf,
    /// Generated summary reports.
    pub reports_dir: PathBuf,
    /// Dated subdirectories for raw files are created under here.
    pub raw_archive_root: PathBuf,
    /// Dated subdirectories for outputs are created under here.
    pub output_archive_root: PathBuf,
}

impl ArchiveLayout {
    /// The standard project layout: raw exports under `raw/time_tracking`,
    /// outputs under `output/monthly_billing`, archives nested beside each.
    pub fn rooted_at<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        let raw = root.join("raw").join("time_tracking");
        let output = root.join("output").join("monthly_billing");
        Self {
            raw_dir: raw.clone(),
            cleaned_dir: output.join("cleaned"),
            reports_dir: output.join("reports"),
            raw_archive_root: raw.join("archive"),
            output_archive_root: output.join("archive"),
        }
    }
}

/// What an archive run did: every file moved, plus a warning for each
/// source location that had nothing to move.
#[derive(Debug, Clone, Default)]
pub struct ArchiveReport {
    pub moved: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl ArchiveReport {
    pub fn is_noop(&self) -> bool {
        self.moved.is_empty()
    }
}

/// Moves a completed period's raw input and generated outputs into dated
/// archive directories.
///
/// All-or-nothing: if either archive target already holds files for the
/// period, nothing moves and the call fails with a collision error. When
/// the sources are already empty the call is a successful no-op, so
/// retrying after a completed archive is safe.
pub fn archive_period(layout: &ArchiveLayout, period: BillingPeriod) -> Result<ArchiveReport> {
    let label = period.label();
    let raw_target = layout.raw_archive_root.join(&label);
    let output_target = layout.output_archive_root.join(&label);

    let raw_files = files_with_extension(&layout.raw_dir, "csv")?;
    let cleaned_files = files_for_period(&layout.cleaned_dir, &label)?;
    let report_files = files_for_period(&layout.reports_dir, &label)?;

    let mut report = ArchiveReport::default();
    if raw_files.is_empty() {
        report
            .warnings
            .push(format!("No raw export files found in {}", layout.raw_dir.display()));
    }
    if cleaned_files.is_empty() {
        report.warnings.push(format!(
            "No accounting CSV for {} found in {}",
            label,
            layout.cleaned_dir.display()
        ));
    }
    if report_files.is_empty() {
        report.warnings.push(format!(
            "No summary report for {} found in {}",
            label,
            layout.reports_dir.display()
        ));
    }

    if raw_files.is_empty() && cleaned_files.is_empty() && report_files.is_empty() {
        info!("Nothing to archive for {}", label);
        return Ok(report);
    }

    // Collision check before anything moves.
    for target in [&raw_target, &output_target] {
        if dir_has_entries(target)? {
            return Err(BillingError::ArchiveCollision {
                period: label.clone(),
                path: target.clone(),
            });
        }
    }

    fs::create_dir_all(&raw_target)?;
    fs::create_dir_all(&output_target)?;

    for file in raw_files {
        move_into(&file, &raw_target, &mut report)?;
    }
    for file in cleaned_files.into_iter().chain(report_files) {
        move_into(&file, &output_target, &mut report)?;
    }

    info!("Archived {} files for {}", report.moved.len(), label);
    Ok(report)
}

fn move_into(file: &Path, target_dir: &Path, report: &mut ArchiveReport) -> Result<()> {
    let file_name = file.file_name().ok_or_else(|| {
        BillingError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "file without a name",
        ))
    })?;
    let destination = target_dir.join(file_name);
    fs::rename(file, &destination)?;
    report.moved.push(destination);
    Ok(())
}

fn dir_has_entries(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    Ok(fs::read_dir(dir)?.next().is_some())
}

fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    list_files(dir, |path| {
        path.extension().map(|e| e == extension).unwrap_or(false)
    })
}

/// Generated outputs carry the period label in their filename; match on
/// that so reports, CSVs, and any rendered PDFs all travel together.
fn files_for_period(dir: &Path, label: &str) -> Result<Vec<PathBuf>> {
    list_files(dir, |path| {
        path.file_name()
            .map(|name| name.to_string_lossy().contains(label))
            .unwrap_or(false)
    })
}

fn list_files<F: Fn(&Path) -> bool>(dir: &Path, keep: F) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && keep(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
