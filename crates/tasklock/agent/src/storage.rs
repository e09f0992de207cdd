//! Durable restriction record.
//!
//! The record is a flat key/value JSON object. Each list value is itself a
//! JSON-encoded string, so a record written by the main application's
//! key/value store reads back unchanged.

use color_eyre::eyre::WrapErr as _;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tasklock_core::{RestrictionState, TaskSummary};

/// Durable storage for the restriction snapshot.
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot. `Ok(None)` if nothing was ever saved.
    fn load(&self) -> color_eyre::eyre::Result<Option<RestrictionState>>;

    /// Save a snapshot, replacing the previous one.
    fn save(&self, state: &RestrictionState) -> color_eyre::eyre::Result<()>;
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct Record {
    #[serde(default)]
    restricted_apps: Option<String>,
    #[serde(default)]
    restricted_websites: Option<String>,
    #[serde(default)]
    restrictions_active: bool,
    #[serde(default)]
    pending_tasks: Option<String>,
    #[serde(default)]
    permanently_blocked_apps: Option<String>,
    #[serde(default)]
    permanently_blocked_websites: Option<String>,
}

impl Record {
    fn encode(state: &RestrictionState) -> color_eyre::eyre::Result<Self> {
        Ok(Self {
            restricted_apps: Some(serde_json::to_string(&state.restricted_apps)?),
            restricted_websites: Some(serde_json::to_string(&state.restricted_website_domains)?),
            restrictions_active: state.active,
            pending_tasks: Some(serde_json::to_string(&state.pending_tasks)?),
            permanently_blocked_apps: Some(serde_json::to_string(&state.permanently_blocked_apps)?),
            permanently_blocked_websites: Some(serde_json::to_string(
                &state.permanently_blocked_website_domains,
            )?),
        })
    }

    fn decode(self) -> color_eyre::eyre::Result<RestrictionState> {
        let apps: Vec<String> = decode_list(self.restricted_apps.as_deref(), "restricted_apps")?;
        let websites: Vec<String> =
            decode_list(self.restricted_websites.as_deref(), "restricted_websites")?;
        let tasks: Vec<TaskSummary> = decode_list(self.pending_tasks.as_deref(), "pending_tasks")?;
        let permanent_apps: Vec<String> = decode_list(
            self.permanently_blocked_apps.as_deref(),
            "permanently_blocked_apps",
        )?;
        let permanent_websites: Vec<String> = decode_list(
            self.permanently_blocked_websites.as_deref(),
            "permanently_blocked_websites",
        )?;

        Ok(RestrictionState::new(
            apps,
            websites,
            self.restrictions_active,
            tasks,
            permanent_apps,
            permanent_websites,
        ))
    }
}

fn decode_list<T: DeserializeOwned>(
    raw: Option<&str>,
    key: &str,
) -> color_eyre::eyre::Result<Vec<T>> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw).wrap_err_with(|| format!("malformed {key}")),
    }
}

fn parse_record(content: &str) -> color_eyre::eyre::Result<RestrictionState> {
    let record: Record =
        serde_json::from_str(content).wrap_err("failed to parse restriction record")?;
    record.decode()
}

fn render_record(state: &RestrictionState) -> color_eyre::eyre::Result<String> {
    let record = Record::encode(state)?;
    serde_json::to_string_pretty(&record).wrap_err("failed to encode restriction record")
}

/// Record kept in a JSON file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> color_eyre::eyre::Result<Option<RestrictionState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("failed to read {}", self.path.display()))?;

        parse_record(&content).map(Some)
    }

    fn save(&self, state: &RestrictionState) -> color_eyre::eyre::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
        }

        let content = render_record(state)?;
        let tmp = self.path.with_extension("json.tmp");

        std::fs::write(&tmp, content)
            .wrap_err_with(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .wrap_err_with(|| format!("failed to replace {}", self.path.display()))?;

        Ok(())
    }
}

/// Record kept in memory, for tests and hosts without a writable disk.
#[derive(Default)]
pub struct MemoryStore {
    raw: Mutex<Option<String>>,
}

impl MemoryStore {
    /// Create a store holding a raw record, as if read from disk.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    /// The raw record last saved.
    pub fn raw(&self) -> Option<String> {
        self.raw
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> color_eyre::eyre::Result<Option<RestrictionState>> {
        match self.raw() {
            Some(content) => parse_record(&content).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, state: &RestrictionState) -> color_eyre::eyre::Result<()> {
        let content = render_record(state)?;
        *self
            .raw
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(content);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RestrictionState {
        RestrictionState::new(
            ["com.a.b".to_string()],
            ["youtube.com".to_string()],
            true,
            vec![TaskSummary::new("1", "Read", "Chapter 3", true)],
            ["com.x.y".to_string()],
            ["reddit.com".to_string()],
        )
    }

    #[test]
    fn test_file_store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("restrictions.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
    }

    #[test]
    fn test_missing_keys_default() {
        let store = MemoryStore::with_raw(r#"{"restricted_apps": "[\"com.a.b\"]"}"#);
        let state = store.load().unwrap().unwrap();

        assert!(state.restricted_apps.contains("com.a.b"));
        assert!(!state.active);
        assert!(state.pending_tasks.is_empty());
        assert!(state.permanently_blocked_website_domains.is_empty());
    }

    #[test]
    fn test_values_are_json_strings() {
        let store = MemoryStore::default();
        store.save(&sample()).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&store.raw().unwrap()).unwrap();
        assert_eq!(raw["restricted_apps"], "[\"com.a.b\"]");
        assert_eq!(raw["restrictions_active"], true);
    }

    #[test]
    fn test_task_with_null_fields_keeps_restrictions() {
        let store = MemoryStore::with_raw(
            r#"{
                "restricted_apps": "[\"com.a.b\"]",
                "restrictions_active": true,
                "pending_tasks": "[{\"id\":\"1\",\"title\":\"Read\",\"description\":null}]"
            }"#,
        );
        let state = store.load().unwrap().unwrap();

        assert!(state.active);
        assert!(state.restricted_apps.contains("com.a.b"));
        assert_eq!(state.pending_tasks, [TaskSummary::new("1", "Read", "", false)]);
    }

    #[test]
    fn test_malformed_value_is_an_error() {
        let store = MemoryStore::with_raw(r#"{"pending_tasks": "not json"}"#);
        assert!(store.load().is_err());

        let store = MemoryStore::with_raw("garbage");
        assert!(store.load().is_err());
    }
}
