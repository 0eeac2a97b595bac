//! Rule records and the loosely-typed payloads clients send.
//!
//! A [`RuleSpec`] is everything a user can edit. A [`Rule`] is a spec plus the
//! identity and bookkeeping fields the index tracks. [`RulePayload`] accepts the
//! looser shapes older clients send and is turned into a spec by [`normalize`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::validation::FieldError;

/// The editable part of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    pub name: String,
    pub router_name: String,
    pub service_name: String,
    pub hostname: String,
    #[serde(default)]
    pub backend_url: Vec<String>,
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default)]
    pub tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_resolver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_options: Option<String>,
    #[serde(default)]
    pub middlewares: Vec<String>,
    /// Router priority. Zero is stored as `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default = "default_true")]
    pub pass_host_header: bool,
    #[serde(default)]
    pub sticky_session: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky_cookie_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers_transport: Option<String>,
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

fn default_true() -> bool {
    true
}

impl RuleSpec {
    /// A spec with only the identifying fields set; everything else at its default.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            router_name: name.clone(),
            service_name: name.clone(),
            name,
            hostname: String::new(),
            backend_url: Vec::new(),
            entry_points: Vec::new(),
            tls: false,
            cert_resolver: None,
            tls_options: None,
            middlewares: Vec::new(),
            priority: None,
            pass_host_header: true,
            sticky_session: false,
            sticky_cookie_name: None,
            health_check_path: None,
            health_check_interval: None,
            servers_transport: None,
            insecure_skip_verify: false,
        }
    }
}

/// A rule as stored in the metadata index and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    #[serde(flatten)]
    pub spec: RuleSpec,
    /// Basename of the backing file, `{name}.yaml` or `{name}.yml`.
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaml_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_valid: bool,
    #[serde(default)]
    pub validation_errors: Vec<String>,
}

impl Rule {
    /// Stem of the backing file name.
    pub fn file_stem(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.file_name)
    }

    /// Key used to carry this rule's id across reconciliation passes.
    ///
    /// The primary rule of a file is keyed by the file stem alone, so editing the
    /// router name inside the file keeps the same id. Additional routers in the
    /// same file are keyed by `{stem}/{router}`.
    pub fn identity_key(&self) -> String {
        let stem = self.file_stem();
        if self.spec.name == stem {
            stem.to_string()
        } else {
            secondary_identity_key(stem, &self.spec.router_name)
        }
    }
}

pub(crate) fn secondary_identity_key(stem: &str, router_name: &str) -> String {
    format!("{}/{}", stem, router_name)
}

/// A list field that may arrive as an array or a comma/newline separated string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    Many(Vec<String>),
    One(String),
}

impl StringList {
    pub fn into_vec(self) -> Vec<String> {
        let raw = match self {
            StringList::Many(items) => items,
            StringList::One(text) => text
                .split(|c| c == ',' || c == '\n')
                .map(str::to_string)
                .collect(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// A boolean that may arrive as a bool, a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LooseBool {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl LooseBool {
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            LooseBool::Bool(b) => Some(*b),
            LooseBool::Number(n) => match n {
                0 => Some(false),
                1 => Some(true),
                _ => None,
            },
            LooseBool::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" | "" => Some(false),
                _ => None,
            },
        }
    }
}

/// An integer that may arrive as a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseInt {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseInt {
    /// `Ok(None)` for blank strings, `Err(())` when the value is not an integer.
    pub fn to_int(&self) -> Result<Option<i64>, ()> {
        match self {
            LooseInt::Int(n) => Ok(Some(*n)),
            LooseInt::Float(f) if f.fract() == 0.0 => Ok(Some(*f as i64)),
            LooseInt::Float(_) => Err(()),
            LooseInt::Text(text) if text.trim().is_empty() => Ok(None),
            LooseInt::Text(text) => text.trim().parse().map(Some).map_err(|_| ()),
        }
    }
}

/// Request body for create, update and validate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePayload {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "originalName")]
    pub previous_name: Option<String>,
    pub router_name: Option<String>,
    pub service_name: Option<String>,
    #[serde(alias = "host", alias = "domain")]
    pub hostname: Option<String>,
    #[serde(alias = "backendUrls", alias = "backend_url", alias = "backends")]
    pub backend_url: Option<StringList>,
    #[serde(alias = "entrypoints", alias = "entry_points")]
    pub entry_points: Option<StringList>,
    pub tls: Option<LooseBool>,
    pub cert_resolver: Option<String>,
    pub tls_options: Option<String>,
    pub middlewares: Option<StringList>,
    pub priority: Option<LooseInt>,
    pub pass_host_header: Option<LooseBool>,
    pub sticky_session: Option<LooseBool>,
    pub sticky_cookie_name: Option<String>,
    pub health_check_path: Option<String>,
    pub health_check_interval: Option<String>,
    pub servers_transport: Option<String>,
    pub insecure_skip_verify: Option<LooseBool>,
    pub yaml_content: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn coerce_bool(
    field: &str,
    value: Option<LooseBool>,
    default: bool,
    errors: &mut Vec<FieldError>,
) -> bool {
    match value {
        None => default,
        Some(v) => v.to_bool().unwrap_or_else(|| {
            errors.push(FieldError::new(field, "must be a boolean"));
            default
        }),
    }
}

/// Coerce a payload into a spec.
///
/// Type coercion failures are returned alongside the spec so the caller can report
/// them together with the validator's findings.
pub fn normalize(payload: RulePayload) -> (RuleSpec, Vec<FieldError>) {
    let mut errors = Vec::new();

    let name = non_blank(payload.name).unwrap_or_default();
    let router_name = non_blank(payload.router_name).unwrap_or_else(|| name.clone());
    let service_name = non_blank(payload.service_name).unwrap_or_else(|| name.clone());

    let tls = coerce_bool("tls", payload.tls, false, &mut errors);
    let pass_host_header =
        coerce_bool("passHostHeader", payload.pass_host_header, true, &mut errors);
    let sticky_session = coerce_bool("stickySession", payload.sticky_session, false, &mut errors);
    let insecure_skip_verify = coerce_bool(
        "insecureSkipVerify",
        payload.insecure_skip_verify,
        false,
        &mut errors,
    );

    let priority = match payload.priority.map(|p| p.to_int()) {
        None | Some(Ok(None)) => None,
        Some(Ok(Some(0))) => None,
        Some(Ok(Some(n))) => Some(n),
        Some(Err(())) => {
            errors.push(FieldError::new("priority", "must be an integer"));
            None
        }
    };

    let spec = RuleSpec {
        name,
        router_name,
        service_name,
        hostname: non_blank(payload.hostname).unwrap_or_default(),
        backend_url: payload.backend_url.map(StringList::into_vec).unwrap_or_default(),
        entry_points: payload.entry_points.map(StringList::into_vec).unwrap_or_default(),
        tls,
        cert_resolver: non_blank(payload.cert_resolver),
        tls_options: non_blank(payload.tls_options),
        middlewares: payload.middlewares.map(StringList::into_vec).unwrap_or_default(),
        priority,
        pass_host_header,
        sticky_session,
        sticky_cookie_name: non_blank(payload.sticky_cookie_name),
        health_check_path: non_blank(payload.health_check_path),
        health_check_interval: non_blank(payload.health_check_interval),
        servers_transport: non_blank(payload.servers_transport),
        insecure_skip_verify,
    };

    (spec, errors)
}
