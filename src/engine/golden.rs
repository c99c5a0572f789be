//! Golden-file collection
//!
//! READY has no structured job-result API. The only way to find the reports a
//! job produced is to scrape its log output for an identifier:
//!
//! 1. `LogFile: <path>_<id>.log`, printed by jobs run through the job runner
//! 2. `PVTSYSOUT/<NAME>-<digits>`, printed by jobs that spool straight to disk
//!
//! The identifier is then substituted into the report filenames declared for
//! the activity, and each report is fetched and stored as
//! `<activity>-<canonical name>` next to the run log.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use super::template::{self, TemplateError};
use crate::bridge::{BridgeError, RemoteFileStore};
use crate::runs::activity_name::{ActivityName, System};

static LOG_FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"LogFile:\s*(\S+)_(\S+)\.log").unwrap());

static SPOOL_FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PVTSYSOUT/([A-Z0-9-]+)-(\d{6,})").unwrap());

pub const MANIFEST_FILE: &str = "golden-manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum GoldenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] BridgeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogIdSource {
    LogFile,
    Spool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogId {
    pub id: String,
    pub source: LogIdSource,
}

/// Find the legacy job identifier in captured output
pub fn extract_log_id(stdout: &str) -> Option<LogId> {
    if let Some(caps) = LOG_FILE_REGEX.captures(stdout) {
        return Some(LogId {
            id: caps[2].to_string(),
            source: LogIdSource::LogFile,
        });
    }
    SPOOL_FILE_REGEX.captures(stdout).map(|caps| LogId {
        id: caps[2].to_string(),
        source: LogIdSource::Spool,
    })
}

/// Which reports each activity is expected to produce
#[derive(Debug, Clone, Default)]
pub struct GoldenFileMapping {
    // activity code -> [(legacy filename template, canonical name)]
    entries: HashMap<String, Vec<(String, String)>>,
}

impl GoldenFileMapping {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        use ActivityName::*;

        let table: &[(ActivityName, &[(&str, &str)])] = &[
            (R03ProfTermination, &[("QPAY066-{{id}}", "QPAY066")]),
            (R04ProfShareLoanBalance, &[("QPAY129-{{id}}", "QPAY129")]),
            (R08ProfitShareReport, &[("PAY426-{{id}}", "PAY426")]),
            (R17ProfitShareReportEditRun, &[("PAY426N-{{id}}", "PAY426N")]),
            (R18ProfitShareReportFinalRun, &[("PAY426-{{id}}", "PAY426-FINAL")]),
            (R20ProfitForfeit, &[("PAY443-{{id}}", "PAY443")]),
            (R21ProfitShareUpdate, &[("PAY444-{{id}}", "PAY444")]),
            (R22ProfitShareEdit, &[("PAY447-{{id}}", "PAY447")]),
            (
                R25ProfShareReportByAge,
                &[
                    ("PROF130-{{id}}", "PROF130"),
                    ("PROF130B-{{id}}", "PROF130B"),
                    ("PROF130V-{{id}}", "PROF130V"),
                    ("PROF130Y-{{id}}", "PROF130Y"),
                ],
            ),
            (R26ProfShareGrossReport, &[("QPAY501-{{id}}", "QPAY501")]),
            (
                R27ProfShareByStore,
                &[
                    ("QPAY066-UNDR21-{{id}}", "QPAY066-UNDR21"),
                    ("QPAY066TA-{{id}}", "QPAY066TA"),
                ],
            ),
            (R28PrintProfitCerts, &[("PAYCERT-{{id}}", "PAYCERT")]),
        ];

        let mut mapping = Self::empty();
        for (activity, files) in table {
            // A paired step produces the same reports as its READY half
            let codes = std::iter::once(*activity).chain(activity.on(System::Both));
            for code in codes {
                for (legacy, canonical) in files.iter() {
                    mapping.insert(code.code(), legacy, canonical);
                }
            }
        }
        mapping
    }

    pub fn insert(&mut self, activity: &str, legacy_template: &str, canonical: &str) {
        self.entries
            .entry(activity.to_string())
            .or_default()
            .push((legacy_template.to_string(), canonical.to_string()));
    }

    pub fn templates_for(&self, activity: &str) -> &[(String, String)] {
        self.entries.get(activity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(legacy filename, canonical name)` pairs for one job execution
    pub fn report_filenames_for(
        &self,
        activity: &str,
        log_id: &str,
    ) -> Result<Vec<(String, String)>, TemplateError> {
        let data = serde_json::json!({ "id": log_id, "activity": activity });
        self.templates_for(activity)
            .iter()
            .map(|(legacy, canonical)| Ok((template::render(legacy, &data)?, canonical.clone())))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub sha256: String,
    pub bytes: u64,
    pub source: String,
}

/// Digest of every artifact fetched during a run, keyed by local file name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoldenManifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl GoldenManifest {
    pub fn record(&mut self, name: &str, source: &str, content: &[u8]) {
        let digest = Sha256::digest(content);
        self.entries.insert(
            name.to_string(),
            ManifestEntry {
                sha256: hex::encode(digest),
                bytes: content.len() as u64,
                source: source.to_string(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names whose digests differ or that exist on only one side
    pub fn diff(&self, other: &GoldenManifest) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|(name, entry)| other.get(name).map(|o| o.sha256 != entry.sha256).unwrap_or(true))
            .map(|(name, _)| name.clone())
            .collect();
        names.extend(
            other
                .entries
                .keys()
                .filter(|name| !self.entries.contains_key(*name))
                .cloned(),
        );
        names.sort();
        names
    }
}

/// What happened when collecting for one activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collection {
    pub log_id: Option<String>,
    pub fetched: Vec<PathBuf>,
    pub failed: Vec<String>,
}

pub struct GoldenCollector {
    store: Arc<dyn RemoteFileStore>,
    mapping: GoldenFileMapping,
    report_dir: String,
    dest_dir: PathBuf,
    manifest: GoldenManifest,
}

impl GoldenCollector {
    pub fn new(
        store: Arc<dyn RemoteFileStore>,
        mapping: GoldenFileMapping,
        report_dir: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            mapping,
            report_dir: report_dir.into(),
            dest_dir: dest_dir.into(),
            manifest: GoldenManifest::default(),
        }
    }

    pub fn manifest(&self) -> &GoldenManifest {
        &self.manifest
    }

    fn remote_path(&self, legacy: &str) -> String {
        if legacy.starts_with('/') {
            legacy.to_string()
        } else {
            format!("{}/{}", self.report_dir.trim_end_matches('/'), legacy)
        }
    }

    /// Locate and fetch the reports of one finished job.
    ///
    /// Never fails: a missing identifier or a failed fetch is logged and
    /// reported in the returned `Collection`.
    pub async fn collect(&mut self, activity: &str, stdout: &str) -> Collection {
        let mut collection = Collection::default();

        let Some(log_id) = extract_log_id(stdout) else {
            warn!("Unable to find READY LogFile in output for {}", activity);
            return collection;
        };
        debug!("{} log id {} ({:?})", activity, log_id.id, log_id.source);
        collection.log_id = Some(log_id.id.clone());

        let files = match self.mapping.report_filenames_for(activity, &log_id.id) {
            Ok(files) => files,
            Err(e) => {
                warn!("{}", e);
                return collection;
            }
        };

        for (legacy, canonical) in files {
            let source = self.remote_path(&legacy);
            let local_name = format!("{}-{}", activity, canonical);
            match self.fetch_one(&source, &local_name).await {
                Ok(path) => {
                    info!("Fetched {} -> {}", source, path.display());
                    collection.fetched.push(path);
                }
                Err(e) => {
                    warn!("Could not fetch {}: {}", source, e);
                    collection.failed.push(source);
                }
            }
        }

        collection
    }

    async fn fetch_one(&mut self, source: &str, local_name: &str) -> Result<PathBuf, GoldenError> {
        let content = self.store.fetch(source).await?;
        let path = self.dest_dir.join(local_name);
        tokio::fs::write(&path, &content).await?;
        self.manifest.record(local_name, source, &content);
        Ok(path)
    }

    pub async fn write_manifest(&self) -> Result<PathBuf, GoldenError> {
        let path = self.dest_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&self.manifest)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}

/// Remove everything inside the golden directory, keeping the directory
pub fn purge(golden_dir: &Path) -> Result<usize, GoldenError> {
    if !golden_dir.exists() {
        std::fs::create_dir_all(golden_dir)?;
        return Ok(0);
    }
    let mut removed = 0;
    for entry in std::fs::read_dir(golden_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        removed += 1;
    }
    Ok(removed)
}

/// Copy every file of a finished run into the golden directory
pub fn snapshot(data_dir: &Path, golden_dir: &Path) -> Result<usize, GoldenError> {
    std::fs::create_dir_all(golden_dir)?;
    let mut copied = 0;
    for entry in std::fs::read_dir(data_dir)? {
        let path = entry?.path();
        if let (true, Some(name)) = (path.is_file(), path.file_name()) {
            std::fs::copy(&path, golden_dir.join(name))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn test_extract_primary() {
        let id = extract_log_id("starting\nLogFile: /foo/bar_12345.log\nEJR COMPLETED").unwrap();
        assert_eq!(id.id, "12345");
        assert_eq!(id.source, LogIdSource::LogFile);
    }

    #[test]
    fn test_extract_primary_with_underscored_path() {
        let id = extract_log_id("LogFile:/logs/prof_term_20240101_778899.log").unwrap();
        assert_eq!(id.id, "778899");
    }

    #[test]
    fn test_extract_spool_fallback() {
        let id = extract_log_id("wrote PVTSYSOUT/REPORT-ABC-654321.CSV").unwrap();
        assert_eq!(id.id, "654321");
        assert_eq!(id.source, LogIdSource::Spool);
    }

    #[test]
    fn test_primary_wins_over_spool() {
        let out = "PVTSYSOUT/QPAY066-999999\nLogFile: /x/y_42.log\n";
        assert_eq!(extract_log_id(out).unwrap().id, "42");
    }

    #[test]
    fn test_extract_none() {
        assert!(extract_log_id("EJR COMPLETED").is_none());
        // Too few digits for a spool id
        assert!(extract_log_id("PVTSYSOUT/QPAY066-12345").is_none());
        assert!(extract_log_id("").is_none());
    }

    #[test]
    fn test_report_filenames() {
        let mapping = GoldenFileMapping::builtin();
        assert_eq!(
            mapping.report_filenames_for("R03", "12345").unwrap(),
            vec![("QPAY066-12345".to_string(), "QPAY066".to_string())]
        );
        assert_eq!(mapping.report_filenames_for("R25", "1").unwrap().len(), 4);
        assert!(mapping.report_filenames_for("R01", "1").unwrap().is_empty());
        assert!(mapping.report_filenames_for("S03", "1").unwrap().is_empty());
    }

    #[test]
    fn test_builtin_maps_ready_and_paired_activities() {
        let mapping = GoldenFileMapping::builtin();
        for activity in ActivityName::smart() {
            assert!(mapping.templates_for(activity.code()).is_empty());
        }
        for activity in ActivityName::paired() {
            let ready = activity.on(System::Ready).unwrap();
            assert_eq!(
                mapping.templates_for(activity.code()),
                mapping.templates_for(ready.code())
            );
        }
        assert_eq!(
            mapping.report_filenames_for("P27", "9").unwrap()[1],
            ("QPAY066TA-9".to_string(), "QPAY066TA".to_string())
        );
    }

    #[test]
    fn test_manifest_diff() {
        let mut a = GoldenManifest::default();
        a.record("R03-QPAY066", "/PVTSYSOUT/QPAY066-1", b"same");
        a.record("R20-PAY443", "/PVTSYSOUT/PAY443-1", b"old");
        let mut b = GoldenManifest::default();
        b.record("R03-QPAY066", "/PVTSYSOUT/QPAY066-2", b"same");
        b.record("R20-PAY443", "/PVTSYSOUT/PAY443-2", b"new");
        b.record("R21-PAY444", "/PVTSYSOUT/PAY444-2", b"x");

        assert_eq!(a.diff(&b), vec!["R20-PAY443".to_string(), "R21-PAY444".to_string()]);

        let entry = a.get("R03-QPAY066").unwrap();
        assert_eq!(entry.sha256.len(), 64);
        assert_eq!(entry.sha256, hex::encode(Sha256::digest(b"same")));
        assert_eq!(entry.bytes, 4);
    }

    struct MemoryStore {
        files: HashMap<String, Vec<u8>>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteFileStore for MemoryStore {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>, BridgeError> {
            self.requested.lock().unwrap().push(path.to_string());
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| BridgeError::NotFound(path.to_string()))
        }
    }

    #[tokio::test]
    async fn test_collect_fetches_and_renames() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = HashMap::new();
        files.insert("/PVTSYSOUT/QPAY066-777".to_string(), b"report".to_vec());
        let store = Arc::new(MemoryStore {
            files,
            requested: Mutex::new(Vec::new()),
        });
        let mut collector = GoldenCollector::new(
            store.clone(),
            GoldenFileMapping::builtin(),
            "/PVTSYSOUT/",
            dir.path(),
        );

        let collection = collector
            .collect("R03", "LogFile: /logs/PROF-TERM_777.log\nEJR COMPLETED\n")
            .await;

        assert_eq!(collection.log_id.as_deref(), Some("777"));
        assert_eq!(collection.fetched, vec![dir.path().join("R03-QPAY066")]);
        assert!(collection.failed.is_empty());
        assert_eq!(std::fs::read(dir.path().join("R03-QPAY066")).unwrap(), b"report");
        assert_eq!(collector.manifest().get("R03-QPAY066").unwrap().bytes, 6);

        let manifest = collector.write_manifest().await.unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(manifest).unwrap()).unwrap();
        assert_eq!(json["R03-QPAY066"]["source"], "/PVTSYSOUT/QPAY066-777");
    }

    #[tokio::test]
    async fn test_collect_soft_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore {
            files: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        });
        let mut collector = GoldenCollector::new(
            store.clone(),
            GoldenFileMapping::builtin(),
            "/PVTSYSOUT",
            dir.path(),
        );

        let missing_id = collector.collect("R03", "EJR COMPLETED").await;
        assert_eq!(missing_id, Collection::default());
        assert!(store.requested.lock().unwrap().is_empty());

        let missing_file = collector.collect("R03", "PVTSYSOUT/PROF-TERM-123456").await;
        assert_eq!(missing_file.log_id.as_deref(), Some("123456"));
        assert_eq!(missing_file.failed, vec!["/PVTSYSOUT/QPAY066-123456".to_string()]);
        assert!(collector.manifest().is_empty());
    }

    #[test]
    fn test_purge_and_snapshot() {
        let data = tempfile::tempdir().unwrap();
        let golden = tempfile::tempdir().unwrap();
        std::fs::write(golden.path().join("stale"), "x").unwrap();
        std::fs::create_dir(golden.path().join("old")).unwrap();

        assert_eq!(purge(golden.path()).unwrap(), 2);
        assert_eq!(std::fs::read_dir(golden.path()).unwrap().count(), 0);

        std::fs::write(data.path().join("run.txt"), "Completed in 0h 1m 2s\n").unwrap();
        std::fs::write(data.path().join("outcome.json"), "[]").unwrap();
        assert_eq!(snapshot(data.path(), golden.path()).unwrap(), 2);
        assert!(golden.path().join("run.txt").is_file());
    }
}
