//! Rules service: the create/update/delete lifecycle and reconciliation merge.
//!
//! # Data Flow
//! ```text
//! create/update/delete (API)          sync_from_disk (API resync, watcher, startup)
//!     │                                   │
//!     └──────────► write lock ◄───────────┘
//!                     │
//!                     → load index
//!                     → mutate (files on disk, backups)
//!                     → save index
//! ```
//!
//! # Design Decisions
//! - One async mutex serializes every index read-modify-write, so a watcher pass
//!   and an API write never interleave and lose an update
//! - The primary rule file write aborts the operation on failure and leaves the
//!   index untouched; backup, prune and stale-file cleanup only log on failure
//! - On reconciliation the filesystem wins for content, the index for ids

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::ManagerConfig;
use crate::discovery::{discover, ParseFailure};
use crate::observability::metrics;
use crate::rules::codec::{parse_rules, to_yaml};
use crate::rules::model::normalize;
use crate::rules::validation::{name_error, sanitize_name, validate_rule};
use crate::rules::{FieldError, Rule, RuleError, RulePayload, RuleSpec};
use crate::storage::fs::{atomic_write, ensure_dir, read_if_exists, remove_if_exists, scoped_path};
use crate::storage::{BackupStore, IndexStore};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Rules in the index after the pass.
    pub count: usize,
    /// Entries kept from the previous index because their file failed to parse.
    pub retained: usize,
    /// Files that could not be read or parsed.
    pub failures: usize,
}

/// Result of a dry-run validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// Owns the dynamic directory, the metadata index and the backups.
#[derive(Debug)]
pub struct RulesService {
    dynamic_dir: PathBuf,
    index: IndexStore,
    backups: BackupStore,
    write_lock: Mutex<()>,
}

impl RulesService {
    pub fn new(
        dynamic_dir: impl Into<PathBuf>,
        metadata_dir: impl AsRef<Path>,
        backups_dir: impl Into<PathBuf>,
        max_backups: usize,
    ) -> Self {
        Self {
            dynamic_dir: dynamic_dir.into(),
            index: IndexStore::new(metadata_dir.as_ref()),
            backups: BackupStore::new(backups_dir, max_backups),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &ManagerConfig) -> Self {
        Self::new(
            &config.paths.dynamic_dir,
            &config.paths.metadata_dir,
            &config.paths.backups_dir,
            config.backups.max_backups,
        )
    }

    /// Create the dynamic, metadata and backup directories.
    pub async fn init(&self) -> io::Result<()> {
        ensure_dir(&self.dynamic_dir).await?;
        if let Some(metadata_dir) = self.index.path().parent() {
            ensure_dir(metadata_dir).await?;
        }
        ensure_dir(self.backups.dir()).await
    }

    pub fn dynamic_dir(&self) -> &Path {
        &self.dynamic_dir
    }

    /// Whether the dynamic directory exists and can be listed.
    pub async fn dynamic_dir_accessible(&self) -> bool {
        match fs::metadata(&self.dynamic_dir).await {
            Ok(meta) if meta.is_dir() => fs::read_dir(&self.dynamic_dir).await.is_ok(),
            _ => false,
        }
    }

    /// All indexed rules, sorted by name.
    pub async fn list(&self) -> Result<Vec<Rule>, RuleError> {
        let mut rules = self.index.load().await?;
        rules.sort_by(|a, b| a.spec.name.cmp(&b.spec.name));
        Ok(rules)
    }

    pub async fn get(&self, id: &str) -> Result<Rule, RuleError> {
        self.index
            .load()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| RuleError::NotFound(id.to_string()))
    }

    /// Raw YAML of a rule's file, falling back to the cached copy if the file is gone.
    pub async fn get_yaml(&self, id: &str) -> Result<String, RuleError> {
        let rule = self.get(id).await?;
        let path = self.rule_path(&rule.file_name)?;
        match read_if_exists(&path).await? {
            Some(content) => Ok(content),
            None => rule
                .yaml_content
                .ok_or_else(|| RuleError::NotFound(id.to_string())),
        }
    }

    /// Middleware names referenced by any rule, deduplicated and sorted.
    pub async fn middlewares(&self) -> Result<Vec<String>, RuleError> {
        let names: BTreeSet<String> = self
            .index
            .load()
            .await?
            .into_iter()
            .flat_map(|r| r.spec.middlewares)
            .collect();
        Ok(names.into_iter().collect())
    }

    pub async fn create(&self, payload: RulePayload) -> Result<Rule, RuleError> {
        let result = self.create_rule(payload).await;
        metrics::record_mutation("create", result.is_ok());
        result
    }

    pub async fn update(&self, id: &str, payload: RulePayload) -> Result<Rule, RuleError> {
        let result = self.update_rule(id, payload).await;
        metrics::record_mutation("update", result.is_ok());
        result
    }

    pub async fn delete(&self, id: &str) -> Result<(), RuleError> {
        let result = self.delete_rule(id).await;
        metrics::record_mutation("delete", result.is_ok());
        result
    }

    async fn create_rule(&self, payload: RulePayload) -> Result<Rule, RuleError> {
        let spec = prepare(payload)?;

        let _guard = self.write_lock.lock().await;
        let mut rules = self.index.load().await?;

        if rules.iter().any(|r| r.spec.name == spec.name) || self.live_file_exists(&spec.name).await? {
            return Err(RuleError::DuplicateName(spec.name));
        }

        let yaml = to_yaml(&spec)?;
        let file_name = format!("{}.yaml", spec.name);
        let path = self.rule_path(&file_name)?;
        self.write_primary(&path, &yaml).await?;

        let now = Utc::now();
        let rule = Rule {
            id: Uuid::new_v4().to_string(),
            spec,
            file_name,
            yaml_content: Some(yaml),
            created_at: Some(now),
            last_modified: Some(modified_time(&path).await.unwrap_or(now)),
            is_valid: true,
            validation_errors: Vec::new(),
        };

        rules.push(rule.clone());
        self.index.save(&rules).await?;

        tracing::info!(id = %rule.id, name = %rule.spec.name, "Rule created");
        Ok(rule)
    }

    async fn update_rule(&self, id: &str, payload: RulePayload) -> Result<Rule, RuleError> {
        let previous_name = payload.previous_name.clone();
        let spec = prepare(payload)?;

        let _guard = self.write_lock.lock().await;
        let mut rules = self.index.load().await?;

        let position = resolve_target(&rules, id, previous_name.as_deref(), &spec.name)
            .ok_or_else(|| RuleError::NotFound(id.to_string()))?;
        let existing = rules[position].clone();
        let live = self.live_content(&existing).await?;
        ensure_owns_file(&rules, &existing, live.as_deref())?;

        let taken = rules
            .iter()
            .enumerate()
            .any(|(i, r)| i != position && r.spec.name == spec.name);
        let renamed = existing.spec.name != spec.name;
        if taken || (renamed && self.live_file_exists(&spec.name).await?) {
            return Err(RuleError::DuplicateName(spec.name));
        }

        let file_name = if renamed {
            format!("{}.yaml", spec.name)
        } else {
            existing.file_name.clone()
        };
        let old_path = self.rule_path(&existing.file_name)?;
        let new_path = self.rule_path(&file_name)?;

        let yaml = to_yaml(&spec)?;
        self.snapshot_best_effort(&existing.spec.name, &old_path).await;
        self.write_primary(&new_path, &yaml).await?;
        self.prune_best_effort(&existing.spec.name).await;

        if old_path != new_path {
            if let Err(e) = remove_if_exists(&old_path).await {
                tracing::warn!(
                    file = %old_path.display(),
                    error = %e,
                    "Failed to remove file of renamed rule, leaving it orphaned"
                );
            }
        }

        let now = Utc::now();
        let rule = Rule {
            id: existing.id.clone(),
            spec,
            file_name,
            yaml_content: Some(yaml),
            created_at: existing.created_at,
            last_modified: Some(modified_time(&new_path).await.unwrap_or(now)),
            is_valid: true,
            validation_errors: Vec::new(),
        };
        rules[position] = rule.clone();
        self.index.save(&rules).await?;

        if id != rule.id {
            tracing::debug!(requested = %id, resolved = %rule.id, "Update matched rule by name");
        }
        tracing::info!(id = %rule.id, name = %rule.spec.name, renamed, "Rule updated");
        Ok(rule)
    }

    async fn delete_rule(&self, id: &str) -> Result<(), RuleError> {
        let _guard = self.write_lock.lock().await;
        let mut rules = self.index.load().await?;

        let position = rules
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| RuleError::NotFound(id.to_string()))?;
        let existing = rules[position].clone();
        let live = self.live_content(&existing).await?;
        ensure_owns_file(&rules, &existing, live.as_deref())?;

        let path = self.rule_path(&existing.file_name)?;
        self.snapshot_best_effort(&existing.spec.name, &path).await;
        self.prune_best_effort(&existing.spec.name).await;
        remove_if_exists(&path).await?;

        rules.remove(position);
        self.index.save(&rules).await?;

        tracing::info!(id = %existing.id, name = %existing.spec.name, "Rule deleted");
        Ok(())
    }

    /// Rescan the dynamic directory and replace the index with what is on disk.
    ///
    /// Ids carry over by identity key. An entry whose file still exists but failed
    /// to parse this pass is kept and flagged invalid; entries whose file is gone
    /// are dropped.
    pub async fn sync_from_disk(&self) -> Result<SyncReport, RuleError> {
        let started = Instant::now();
        let _guard = self.write_lock.lock().await;

        let previous = self.index.load().await?;
        let ids: HashMap<String, String> = previous
            .iter()
            .map(|r| (r.identity_key(), r.id.clone()))
            .collect();

        let discovery = match discover(&self.dynamic_dir, |key| {
            ids.get(key)
                .cloned()
                .unwrap_or_else(|| Uuid::new_v4().to_string())
        })
        .await
        {
            Ok(discovery) => discovery,
            Err(e) => {
                metrics::record_sync(false, 0, 0, started.elapsed());
                return Err(e.into());
            }
        };

        let created: HashMap<&str, DateTime<Utc>> = previous
            .iter()
            .filter_map(|r| r.created_at.map(|at| (r.id.as_str(), at)))
            .collect();
        let mut rules = discovery.rules;
        for rule in rules.iter_mut() {
            rule.created_at = created.get(rule.id.as_str()).copied().or(rule.last_modified);
        }

        let retained = retain_unparsable(&previous, &mut rules, &discovery.failures);
        self.index.save(&rules).await?;

        let report = SyncReport {
            count: rules.len(),
            retained,
            failures: discovery.failures.len(),
        };
        metrics::record_sync(true, report.count, report.failures, started.elapsed());
        tracing::info!(
            rules = report.count,
            retained = report.retained,
            failures = report.failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reconciled rules from disk"
        );
        Ok(report)
    }

    /// Check a payload or a raw YAML document without touching disk.
    pub fn validate(&self, payload: RulePayload) -> ValidationReport {
        let errors = match payload.yaml_content.as_deref() {
            Some(yaml) => validate_document(yaml),
            None => {
                let (spec, mut errors) = normalize(payload);
                errors.extend(validate_rule(&spec));
                errors
            }
        };
        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn rule_path(&self, file_name: &str) -> Result<PathBuf, RuleError> {
        Ok(scoped_path(&self.dynamic_dir, file_name)?)
    }

    /// Current content of a rule's file. Unreadable files are logged and treated as
    /// absent; the write that follows reports the real failure.
    async fn live_content(&self, rule: &Rule) -> Result<Option<String>, RuleError> {
        let path = self.rule_path(&rule.file_name)?;
        match read_if_exists(&path).await {
            Ok(content) => Ok(content),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Failed to read rule file");
                Ok(None)
            }
        }
    }

    async fn live_file_exists(&self, name: &str) -> Result<bool, RuleError> {
        for ext in crate::storage::fs::YAML_EXTENSIONS {
            let path = self.rule_path(&format!("{}.{}", name, ext))?;
            if fs::try_exists(&path).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn write_primary(&self, path: &Path, yaml: &str) -> Result<(), RuleError> {
        atomic_write(path, yaml).await.map_err(|source| {
            tracing::error!(file = %path.display(), error = %source, "Failed to write rule file");
            RuleError::Write {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    async fn snapshot_best_effort(&self, name: &str, path: &Path) {
        if let Err(e) = self.backups.snapshot(name, path).await {
            tracing::warn!(rule = %name, error = %e, "Failed to back up rule file");
        }
    }

    async fn prune_best_effort(&self, name: &str) {
        if let Err(e) = self.backups.prune(name).await {
            tracing::warn!(rule = %name, error = %e, "Failed to prune backups");
        }
    }
}

/// Normalize, validate and sanitize a payload.
///
/// Field errors are reported together, including an unsafe name. A payload whose
/// only problem is its name fails with [`RuleError::InvalidName`].
fn prepare(payload: RulePayload) -> Result<RuleSpec, RuleError> {
    let (mut spec, mut errors) = normalize(payload);
    errors.extend(validate_rule(&spec));
    let sanitized = sanitize_name(&spec.name);
    if !errors.is_empty() {
        errors.extend(name_error(&spec.name));
        return Err(RuleError::Validation(errors));
    }
    spec.name = sanitized.ok_or_else(|| RuleError::InvalidName(spec.name.clone()))?;
    Ok(spec)
}

/// Find the index entry an update targets: by id, then by the previous name, then by
/// the new name. Names match either the rule name or its file stem.
fn resolve_target(
    rules: &[Rule],
    id: &str,
    previous_name: Option<&str>,
    name: &str,
) -> Option<usize> {
    let by_name = |wanted: &str| {
        rules
            .iter()
            .position(|r| r.spec.name == wanted || r.file_stem() == wanted)
    };
    rules
        .iter()
        .position(|r| r.id == id)
        .or_else(|| previous_name.and_then(by_name))
        .or_else(|| by_name(name))
}

/// A rule file shared by several routers cannot be rewritten or removed through
/// the API without clobbering the others. The file is shared when the rule is an
/// extra router of it, when another index entry points at it, or when the live
/// document defines more than one router.
fn ensure_owns_file(rules: &[Rule], rule: &Rule, live: Option<&str>) -> Result<(), RuleError> {
    let siblings_indexed = rules
        .iter()
        .any(|r| r.file_name == rule.file_name && r.id != rule.id);
    let siblings_on_disk = live
        .and_then(|content| parse_rules(content).ok())
        .is_some_and(|specs| specs.len() > 1);

    if rule.file_stem() == rule.spec.name && !siblings_indexed && !siblings_on_disk {
        return Ok(());
    }
    Err(RuleError::Validation(vec![FieldError::new(
        "name",
        format!(
            "rule is defined alongside other routers in {}; edit that file directly",
            rule.file_name
        ),
    )]))
}

fn retain_unparsable(previous: &[Rule], rules: &mut Vec<Rule>, failures: &[ParseFailure]) -> usize {
    let failed: HashMap<&str, &ParseFailure> = failures
        .iter()
        .map(|f| (f.file_name.as_str(), f))
        .collect();
    let present: HashSet<String> = rules.iter().map(|r| r.id.clone()).collect();

    let mut retained = 0;
    for old in previous {
        let Some(failure) = failed.get(old.file_name.as_str()) else { continue };
        if present.contains(&old.id) {
            continue;
        }
        let mut kept = old.clone();
        kept.is_valid = false;
        kept.validation_errors = vec![format!("{}: {}", failure.file_name, failure.error)];
        rules.push(kept);
        retained += 1;
    }
    retained
}

fn validate_document(yaml: &str) -> Vec<FieldError> {
    match parse_rules(yaml) {
        Err(e) => vec![FieldError::new("yamlContent", e.to_string())],
        Ok(specs) if specs.is_empty() => vec![FieldError::new(
            "yamlContent",
            "no router with a Host rule bound to a defined service",
        )],
        Ok(specs) => specs
            .iter()
            .flat_map(|spec| {
                validate_rule(spec).into_iter().map(move |e| {
                    FieldError::new(format!("{}.{}", spec.router_name, e.field), e.message)
                })
            })
            .collect(),
    }
}

async fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    let meta = fs::metadata(path).await.ok()?;
    meta.modified().ok().map(DateTime::<Utc>::from)
}
