//! Discovery of rules from the dynamic-configuration directory.
//!
//! # Data Flow
//! ```text
//! {dynamic}/*.yaml|*.yml (flat, sorted)
//!     → read file, parse document (codec)
//!     → one candidate per usable router
//!     → identity key (file stem, or stem/router for extra routers)
//!     → caller's resolver: key → id
//!     → Discovery { rules, failures }
//! ```
//!
//! # Design Decisions
//! - Read-only: persisting the result is the caller's job
//! - A file that fails to parse contributes no rules and is reported in `failures`
//! - Identity is keyed by file stem, not router name, so editing the router name
//!   inside a file keeps the rule's id
//! - Names are unique: a router's derived `{stem}-{router}` name is dropped when a
//!   file stem or an earlier rule already uses it

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::rules::codec::parse_rules;
use crate::rules::model::secondary_identity_key;
use crate::rules::validation::{name_error, validate_rule};
use crate::rules::Rule;
use crate::storage::fs::{file_stem, list_yaml_files};

/// A file that could not be turned into rules this pass.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub path: PathBuf,
    pub file_name: String,
    pub error: String,
}

/// Result of scanning the dynamic directory.
#[derive(Debug, Default)]
pub struct Discovery {
    pub rules: Vec<Rule>,
    pub failures: Vec<ParseFailure>,
}

/// Scan `dir` and build rules, asking `resolve_id` for the id of each identity key.
///
/// Only listing the directory can fail; per-file problems are logged and collected.
pub async fn discover<F>(dir: &Path, mut resolve_id: F) -> io::Result<Discovery>
where
    F: FnMut(&str) -> String,
{
    let files = list_yaml_files(dir).await?;
    let stems: HashSet<String> = files.iter().filter_map(|p| file_stem(p)).collect();
    let mut discovery = Discovery::default();
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut seen_names: HashSet<String> = HashSet::new();

    for path in files {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let Some(stem) = file_stem(&path) else { continue };

        let (content, modified) = match read_with_mtime(&path).await {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Failed to read rule file, skipping");
                discovery.failures.push(ParseFailure {
                    path: path.clone(),
                    file_name,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let specs = match parse_rules(&content) {
            Ok(specs) => specs,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Failed to parse rule file, skipping");
                discovery.failures.push(ParseFailure {
                    path: path.clone(),
                    file_name,
                    error: e.to_string(),
                });
                continue;
            }
        };

        if specs.is_empty() {
            tracing::debug!(file = %path.display(), "No usable routers in file");
        }

        for (position, mut spec) in specs.into_iter().enumerate() {
            let key = if position == 0 {
                spec.name = stem.clone();
                stem.clone()
            } else {
                spec.name = format!("{}-{}", stem, spec.router_name);
                secondary_identity_key(&stem, &spec.router_name)
            };

            if !seen_keys.insert(key.clone()) {
                tracing::warn!(
                    file = %path.display(),
                    key = %key,
                    "Rule identity already provided by another file, skipping"
                );
                continue;
            }

            // A derived name never shadows a file stem or an earlier rule.
            let derived = position > 0;
            if (derived && stems.contains(&spec.name)) || !seen_names.insert(spec.name.clone()) {
                tracing::warn!(
                    file = %path.display(),
                    router = %spec.router_name,
                    name = %spec.name,
                    "Rule name already taken by another rule, skipping router"
                );
                continue;
            }

            let errors: Vec<String> = name_error(&spec.name)
                .into_iter()
                .chain(validate_rule(&spec))
                .map(|e| e.to_string())
                .collect();

            discovery.rules.push(Rule {
                id: resolve_id(&key),
                spec,
                file_name: file_name.clone(),
                yaml_content: Some(content.clone()),
                created_at: None,
                last_modified: modified,
                is_valid: errors.is_empty(),
                validation_errors: errors,
            });
        }
    }

    Ok(discovery)
}

async fn read_with_mtime(path: &Path) -> io::Result<(String, Option<DateTime<Utc>>)> {
    let content = fs::read_to_string(path).await?;
    let modified = fs::metadata(path)
        .await?
        .modified()
        .ok()
        .map(DateTime::<Utc>::from);
    Ok((content, modified))
}
