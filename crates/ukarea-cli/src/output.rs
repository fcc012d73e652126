use std::path::{Path, PathBuf};

use anyhow::Context;
use ukarea_core::export::file_name;
use ukarea_core::ExportFormat;

/// Writes an export to `output`, or to stdout when no path is given.
///
/// A directory target gets the dated download name, e.g.
/// `uk_postcodes_2024-05-01.csv`.
pub(crate) fn write_export(
    output: Option<&Path>,
    subject: &str,
    format: ExportFormat,
    body: &str,
) -> anyhow::Result<()> {
    let Some(target) = output else {
        println!("{body}");
        return Ok(());
    };

    let path = resolve_target(target, subject, format, export_date());
    std::fs::write(&path, body)
        .with_context(|| format!("failed to write export to {}", path.display()))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

/// Download names carry the UTC calendar date.
fn export_date() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}

fn resolve_target(
    target: &Path,
    subject: &str,
    format: ExportFormat,
    today: chrono::NaiveDate,
) -> PathBuf {
    if target.is_dir() {
        target.join(file_name(subject, format, today))
    } else {
        target.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_target_gets_dated_file_name() {
        let dir = std::env::temp_dir();
        let today = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let path = resolve_target(&dir, "postcodes", ExportFormat::Xls, today);
        assert_eq!(path, dir.join("uk_postcodes_2024-05-01.xls"));
    }

    #[test]
    fn export_date_is_the_utc_date() {
        let before = chrono::Utc::now().date_naive();
        let date = export_date();
        let after = chrono::Utc::now().date_naive();
        assert!(date == before || date == after);
    }

    #[test]
    fn file_target_is_used_as_is() {
        let target = std::env::temp_dir().join("ukarea-test-does-not-exist.csv");
        let today = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(
            resolve_target(&target, "cities", ExportFormat::Csv, today),
            target
        );
    }
}
