//! Artifact persistence: summary text, structured JSON, and the append-only
//! meetings CSV.
//!
//! Non-append writes go through a temp file and rename so a crash never
//! leaves a half-written artifact. CSV appends are serialized by a
//! process-wide lock so concurrent sessions cannot interleave rows or race
//! the header write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::error::{EngineError, Result};
use crate::summarizer::schema::MeetingData;

/// Fixed CSV header; column order is part of the wire contract.
pub const CSV_HEADER: &str = "meeting_date,meeting_time,timestamp_file,contact_name,contact_role,\
contact_location,contact_is_decision_maker,contact_tenure,company_name,company_aum,company_icp,\
company_location,company_is_client,company_competitor_products,company_strategies_of_interest,\
deal_ticket_size,deal_products_of_interest,total_contacts,total_companies,total_deals";

/// Paths produced for one stopped session.
#[derive(Debug, Clone, Default)]
pub struct ArtifactPaths {
    pub summary_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub output_dir: String,
    pub csv_export_path: String,
    pub append_csv: bool,
    /// Per-meeting `YYYY-MM-DD Company - Contact/` folders instead of flat
    /// timestamped files; falls back to flat naming when extraction is empty.
    pub companion_folders: bool,
}

#[derive(Clone)]
pub struct OutputWriter {
    config: OutputConfig,
    /// Process-wide CSV append lock, shared by every session.
    csv_lock: Arc<Mutex<()>>,
}

impl OutputWriter {
    pub fn new(config: OutputConfig, csv_lock: Arc<Mutex<()>>) -> Self {
        Self { config, csv_lock }
    }

    /// Write all artifacts for a stopped session. Already-written paths are
    /// reported even when a later write fails.
    pub fn persist(
        &self,
        summary: &str,
        data: &MeetingData,
        stopped_at: DateTime<Local>,
    ) -> (ArtifactPaths, Result<()>) {
        let mut paths = ArtifactPaths::default();

        let dir = match self.target_dir(data, stopped_at) {
            Ok(dir) => dir,
            Err(e) => return (paths, Err(e)),
        };

        let timestamp = stopped_at.format("%Y%m%d_%H%M%S").to_string();
        let (summary_name, data_name) = if self.uses_companion_folder(data) {
            ("summary.txt".to_string(), "data.json".to_string())
        } else {
            (
                format!("summary_{timestamp}.txt"),
                format!("data_{timestamp}.json"),
            )
        };

        let summary_path = dir.join(summary_name);
        let mut summary_text = summary.to_string();
        if !summary_text.ends_with('\n') {
            summary_text.push('\n');
        }
        if let Err(e) = write_atomic(&summary_path, summary_text.as_bytes()) {
            return (paths, Err(e));
        }
        paths.summary_path = Some(summary_path);

        let data_path = dir.join(data_name);
        let json = match serde_json::to_string_pretty(data) {
            Ok(json) => json,
            Err(e) => {
                return (
                    paths,
                    Err(EngineError::OutputWriteFailure(format!(
                        "failed to serialize meeting data: {e}"
                    ))),
                )
            }
        };
        if let Err(e) = write_atomic(&data_path, format!("{json}\n").as_bytes()) {
            return (paths, Err(e));
        }
        paths.data_path = Some(data_path);

        if self.config.append_csv {
            match self.append_csv_row(data, stopped_at, &timestamp) {
                Ok(csv_path) => paths.csv_path = Some(csv_path),
                Err(e) => return (paths, Err(e)),
            }
        }

        (paths, Ok(()))
    }

    fn uses_companion_folder(&self, data: &MeetingData) -> bool {
        self.config.companion_folders && companion_label(data).is_some()
    }

    fn target_dir(&self, data: &MeetingData, stopped_at: DateTime<Local>) -> Result<PathBuf> {
        let base = expand_tilde(&self.config.output_dir);
        let dir = if self.uses_companion_folder(data) {
            let label = companion_label(data).unwrap_or_default();
            base.join(format!("{} {}", stopped_at.format("%Y-%m-%d"), label))
        } else {
            base
        };
        fs::create_dir_all(&dir).map_err(|e| {
            EngineError::OutputWriteFailure(format!(
                "failed to create output directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(dir)
    }

    fn append_csv_row(
        &self,
        data: &MeetingData,
        stopped_at: DateTime<Local>,
        timestamp: &str,
    ) -> Result<PathBuf> {
        let csv_path = expand_tilde(&self.config.csv_export_path);
        if let Some(parent) = csv_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::OutputWriteFailure(format!(
                    "failed to create CSV directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let row = csv_row(data, stopped_at, timestamp);

        // Header-once check and append happen under one critical section.
        let _guard = self.csv_lock.lock();
        let needs_header = match fs::metadata(&csv_path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&csv_path)
            .map_err(|e| {
                EngineError::OutputWriteFailure(format!(
                    "failed to open {}: {e}",
                    csv_path.display()
                ))
            })?;

        let mut payload = String::new();
        if needs_header {
            payload.push_str(CSV_HEADER);
            payload.push('\n');
        }
        payload.push_str(&row);
        payload.push('\n');

        file.write_all(payload.as_bytes()).map_err(|e| {
            EngineError::OutputWriteFailure(format!("failed to append {}: {e}", csv_path.display()))
        })?;

        Ok(csv_path)
    }
}

/// `YYYY-MM-DD Company - Contact` folder label, when extraction produced
/// something to name the meeting after.
fn companion_label(data: &MeetingData) -> Option<String> {
    let company = data
        .companies
        .first()
        .and_then(|c| c.name.as_deref())
        .map(sanitize_component);
    let contact = data
        .contacts
        .first()
        .and_then(|c| c.name.as_deref())
        .map(sanitize_component);

    match (company, contact) {
        (Some(company), Some(contact)) => Some(format!("{company} - {contact}")),
        (Some(company), None) => Some(company),
        (None, Some(contact)) => Some(contact),
        (None, None) => None,
    }
}

fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    } else if path == "~" {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home);
        }
    }
    PathBuf::from(path)
}

/// Write via temp file + rename so readers never observe a partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| {
        EngineError::OutputWriteFailure(format!("failed to write {}: {e}", tmp.display()))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        EngineError::OutputWriteFailure(format!("failed to finalize {}: {e}", path.display()))
    })
}

fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn opt_str(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn opt_bool(value: Option<bool>) -> String {
    value.map(|b| b.to_string()).unwrap_or_default()
}

fn csv_row(data: &MeetingData, stopped_at: DateTime<Local>, timestamp: &str) -> String {
    let contact = data.contacts.first().cloned().unwrap_or_default();
    let company = data.companies.first().cloned().unwrap_or_default();
    let deal = data.deals.first().cloned().unwrap_or_default();

    let fields = [
        stopped_at.format("%Y-%m-%d").to_string(),
        stopped_at.format("%H:%M:%S").to_string(),
        timestamp.to_string(),
        opt_str(&contact.name),
        opt_str(&contact.role),
        opt_str(&contact.location),
        opt_bool(contact.is_decision_maker),
        opt_str(&contact.tenure_duration),
        opt_str(&company.name),
        opt_str(&company.aum),
        company
            .icp_classification
            .map(|v| v.to_string())
            .unwrap_or_default(),
        opt_str(&company.location),
        opt_bool(company.is_client),
        company.competitor_products.join(","),
        company.strategies_of_interest.join(","),
        opt_str(&deal.ticket_size),
        deal.products_of_interest.join(","),
        data.contacts.len().to_string(),
        data.companies.len().to_string(),
        data.deals.len().to_string(),
    ];

    fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::schema::{Company, Contact};

    #[test]
    fn escapes_commas_and_quotes() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn header_has_twenty_columns() {
        assert_eq!(CSV_HEADER.split(',').count(), 20);
    }

    #[test]
    fn row_matches_header_width() {
        let mut data = MeetingData::default();
        data.companies.push(Company {
            name: Some("Northgate, LLC".to_string()),
            competitor_products: vec!["A".into(), "B".into()],
            ..Company::default()
        });
        let row = csv_row(&data, Local::now(), "20260101_090000");
        // Quoted cells keep embedded commas out of the column count.
        let mut cols = 0;
        let mut in_quotes = false;
        for c in row.chars() {
            match c {
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => cols += 1,
                _ => {}
            }
        }
        assert_eq!(cols + 1, 20);
    }

    #[test]
    fn companion_label_prefers_company_and_contact() {
        let mut data = MeetingData::default();
        assert!(companion_label(&data).is_none());

        data.contacts.push(Contact {
            name: Some("Dana Reyes".to_string()),
            ..Contact::default()
        });
        data.companies.push(Company {
            name: Some("Northgate/Capital".to_string()),
            ..Company::default()
        });
        assert_eq!(
            companion_label(&data).unwrap(),
            "Northgate_Capital - Dana Reyes"
        );
    }

    #[test]
    fn tilde_expansion_uses_home() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(
            expand_tilde("~/Documents/out"),
            PathBuf::from("/home/tester/Documents/out")
        );
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
