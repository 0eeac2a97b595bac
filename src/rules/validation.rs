//! Rule validation.
//!
//! # Responsibilities
//! - Check required fields and non-empty lists
//! - Enforce the filename-safe pattern for rule names (`name_error`)
//! - Keep router, service and transport names free of whitespace and `@`
//! - Check backend URLs, hostnames and optional field formats
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function over a normalized spec: `&RuleSpec → Vec<FieldError>`

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::rules::model::RuleSpec;

/// One violated field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid name regex"))
}

fn interval_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+(ms|s|m|h)$").expect("valid interval regex"))
}

/// Whether `name` is usable as a rule name and file stem.
pub fn is_valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

/// Trim `name` and check it against the filename-safe pattern.
pub fn sanitize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    is_valid_name(trimmed).then(|| trimmed.to_string())
}

const NAME_MESSAGE: &str = "may only contain letters, digits, '-' and '_'";

/// The error for a rule name that cannot be used as a file stem, if any.
///
/// An empty name is reported by [`validate_rule`] instead.
pub fn name_error(name: &str) -> Option<FieldError> {
    (!name.is_empty() && !is_valid_name(name)).then(|| FieldError::new("name", NAME_MESSAGE))
}

/// Whether `name` is usable as a Traefik router, service or transport name.
fn is_valid_object_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c.is_whitespace() || c == '@')
}

/// Validate a normalized rule spec.
///
/// The filename pattern of `name` is checked separately, see [`name_error`].
pub fn validate_rule(spec: &RuleSpec) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if spec.name.is_empty() {
        errors.push(FieldError::new("name", "is required"));
    }

    for (field, value) in [
        ("routerName", &spec.router_name),
        ("serviceName", &spec.service_name),
    ] {
        if !value.is_empty() && !is_valid_object_name(value) {
            errors.push(FieldError::new(field, "must not contain whitespace or '@'"));
        }
    }

    if spec.hostname.is_empty() {
        errors.push(FieldError::new("hostname", "is required"));
    } else if spec
        .hostname
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '`' | '"' | '\'' | '(' | ')' | ','))
    {
        errors.push(FieldError::new("hostname", "contains invalid characters"));
    }

    if spec.backend_url.is_empty() {
        errors.push(FieldError::new("backendUrl", "at least one backend URL is required"));
    }
    for (i, raw) in spec.backend_url.iter().enumerate() {
        let field = format!("backendUrl[{}]", i);
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            Ok(_) => errors.push(FieldError::new(field, "must be an http or https URL")),
            Err(e) => errors.push(FieldError::new(field, format!("invalid URL: {}", e))),
        }
    }

    if spec.entry_points.is_empty() {
        errors.push(FieldError::new("entryPoints", "at least one entry point is required"));
    }

    if let Some(priority) = spec.priority {
        if priority < 0 {
            errors.push(FieldError::new("priority", "must not be negative"));
        }
    }

    if let Some(path) = &spec.health_check_path {
        if !path.starts_with('/') {
            errors.push(FieldError::new("healthCheckPath", "must start with '/'"));
        }
    }

    if let Some(interval) = &spec.health_check_interval {
        if !interval_pattern().is_match(interval) {
            errors.push(FieldError::new(
                "healthCheckInterval",
                "must be a duration such as 10s, 500ms, 1m or 1h",
            ));
        }
    }

    if let Some(transport) = &spec.servers_transport {
        if !is_valid_object_name(transport) {
            errors.push(FieldError::new(
                "serversTransport",
                "must not contain whitespace or '@'",
            ));
        }
    }

    errors
}
