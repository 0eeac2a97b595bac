//! Mapping between rule specs and Traefik dynamic-configuration documents.
//!
//! # Document Shape
//! ```text
//! http:
//!   routers:        { <router>: { rule, service, entryPoints, middlewares?, priority?, tls? } }
//!   services:       { <service>: { loadBalancer: { servers, passHostHeader, sticky?, healthCheck?, serversTransport? } } }
//!   serversTransports: { <name>: { insecureSkipVerify } }   # only with a transport
//! ```
//!
//! # Design Decisions
//! - Generation emits one router bound to one service per document
//! - Parsing keeps router order from the document so the first router is stable
//! - Unknown keys (middleware definitions, tcp/udp sections) are ignored

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::rules::model::RuleSpec;

/// Errors raised while reading or writing a dynamic-configuration document.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing `{0}` section")]
    MissingSection(&'static str),

    #[error("invalid `{path}`: {source}")]
    Shape {
        path: String,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Serialize)]
struct DynamicConfig {
    http: HttpSection,
}

#[derive(Debug, Serialize)]
struct HttpSection {
    routers: BTreeMap<String, RouterDef>,
    services: BTreeMap<String, ServiceDef>,
    #[serde(rename = "serversTransports", skip_serializing_if = "BTreeMap::is_empty")]
    servers_transports: BTreeMap<String, ServersTransportDef>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouterDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    entry_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    middlewares: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tls: Option<RouterTls>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RouterTls {
    Flag(bool),
    Options(TlsOptions),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TlsOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cert_resolver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    load_balancer: Option<LoadBalancerDef>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadBalancerDef {
    #[serde(default)]
    servers: Vec<ServerDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pass_host_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sticky: Option<StickyDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    health_check: Option<HealthCheckDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    servers_transport: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ServerDef {
    url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StickyDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cookie: Option<CookieDef>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CookieDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HealthCheckDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServersTransportDef {
    #[serde(default)]
    insecure_skip_verify: bool,
}

/// Build the router rule expression for a hostname.
pub fn host_rule(hostname: &str) -> String {
    format!("Host(`{}`)", hostname)
}

fn host_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"Host\(\s*[`"']?([^`"'\s,)]+)[`"']?"#).expect("valid host regex")
    })
}

/// Extract the first hostname from a `Host(...)` matcher expression.
pub fn extract_hostname(rule: &str) -> Option<String> {
    host_pattern()
        .captures(rule)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Serialize a spec into a dynamic-configuration document.
pub fn to_yaml(spec: &RuleSpec) -> Result<String, CodecError> {
    let tls = spec.tls.then(|| {
        RouterTls::Options(TlsOptions {
            cert_resolver: spec.cert_resolver.clone(),
            options: spec.tls_options.clone(),
        })
    });

    let router = RouterDef {
        rule: Some(host_rule(&spec.hostname)),
        service: Some(spec.service_name.clone()),
        entry_points: spec.entry_points.clone(),
        middlewares: spec.middlewares.clone(),
        priority: spec.priority.filter(|p| *p != 0),
        tls,
    };

    let health_check = spec.health_check_path.as_ref().map(|path| HealthCheckDef {
        path: Some(path.clone()),
        interval: spec.health_check_interval.clone(),
    });

    let service = ServiceDef {
        load_balancer: Some(LoadBalancerDef {
            servers: spec
                .backend_url
                .iter()
                .map(|url| ServerDef { url: url.clone() })
                .collect(),
            pass_host_header: Some(spec.pass_host_header),
            sticky: spec.sticky_session.then(|| StickyDef {
                cookie: Some(CookieDef {
                    name: spec.sticky_cookie_name.clone(),
                }),
            }),
            health_check,
            servers_transport: spec.servers_transport.clone(),
        }),
    };

    let mut servers_transports = BTreeMap::new();
    if let Some(transport) = &spec.servers_transport {
        servers_transports.insert(
            transport.clone(),
            ServersTransportDef {
                insecure_skip_verify: spec.insecure_skip_verify,
            },
        );
    }

    let document = DynamicConfig {
        http: HttpSection {
            routers: BTreeMap::from([(spec.router_name.clone(), router)]),
            services: BTreeMap::from([(spec.service_name.clone(), service)]),
            servers_transports,
        },
    };

    Ok(serde_yaml::to_string(&document)?)
}

fn section<'a>(parent: &'a Mapping, key: &str) -> Option<&'a Mapping> {
    parent.get(key).and_then(Value::as_mapping)
}

fn entries<T: DeserializeOwned>(
    mapping: Option<&Mapping>,
    path: &str,
) -> Result<Vec<(String, T)>, CodecError> {
    let Some(mapping) = mapping else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let Some(key) = key.as_str() else { continue };
        let value = if value.is_null() {
            Value::Mapping(Mapping::new())
        } else {
            value.clone()
        };
        let parsed = serde_yaml::from_value(value).map_err(|source| CodecError::Shape {
            path: format!("{}.{}", path, key),
            source,
        })?;
        out.push((key.to_string(), parsed));
    }
    Ok(out)
}

/// Parse a document into rule specs, one per usable router, in document order.
///
/// A router is usable when it has a non-empty rule with a `Host(...)` matcher and
/// references a service defined in the same document. The returned specs carry the
/// router name as `name`; callers assign the file-derived name.
pub fn parse_rules(content: &str) -> Result<Vec<RuleSpec>, CodecError> {
    let root: Value = serde_yaml::from_str(content)?;
    let root = root.as_mapping().ok_or(CodecError::MissingSection("http"))?;
    let http = section(root, "http").ok_or(CodecError::MissingSection("http"))?;
    let routers_map = section(http, "routers").ok_or(CodecError::MissingSection("http.routers"))?;

    let routers: Vec<(String, RouterDef)> = entries(Some(routers_map), "http.routers")?;
    let services: Vec<(String, ServiceDef)> = entries(section(http, "services"), "http.services")?;
    let transports: Vec<(String, ServersTransportDef)> =
        entries(section(http, "serversTransports"), "http.serversTransports")?;

    let mut specs = Vec::new();
    for (router_name, router) in routers {
        let Some(service_ref) = router.service.as_deref() else { continue };
        let service_name = service_ref.split('@').next().unwrap_or(service_ref);
        let Some((_, service)) = services.iter().find(|(name, _)| name == service_name) else {
            continue;
        };
        let Some(rule) = router.rule.as_deref().filter(|r| !r.trim().is_empty()) else {
            continue;
        };
        let Some(hostname) = extract_hostname(rule) else { continue };

        let mut spec = RuleSpec::named(router_name.clone());
        spec.service_name = service_name.to_string();
        spec.hostname = hostname;
        spec.entry_points = router.entry_points;
        spec.middlewares = router.middlewares;
        spec.priority = router.priority.filter(|p| *p != 0);

        match router.tls {
            Some(RouterTls::Options(opts)) => {
                spec.tls = true;
                spec.cert_resolver = opts.cert_resolver;
                spec.tls_options = opts.options;
            }
            Some(RouterTls::Flag(flag)) => spec.tls = flag,
            None => {}
        }

        if let Some(lb) = &service.load_balancer {
            spec.backend_url = lb.servers.iter().map(|s| s.url.clone()).collect();
            spec.pass_host_header = lb.pass_host_header.unwrap_or(true);
            if let Some(sticky) = &lb.sticky {
                spec.sticky_session = true;
                spec.sticky_cookie_name = sticky.cookie.as_ref().and_then(|c| c.name.clone());
            }
            if let Some(hc) = &lb.health_check {
                spec.health_check_path = hc.path.clone();
                spec.health_check_interval = hc.interval.clone();
            }
            if let Some(transport) = &lb.servers_transport {
                let transport_name = transport.split('@').next().unwrap_or(transport);
                spec.servers_transport = Some(transport_name.to_string());
                spec.insecure_skip_verify = transports
                    .iter()
                    .find(|(name, _)| name == transport_name)
                    .map(|(_, t)| t.insecure_skip_verify)
                    .unwrap_or(false);
            }
        }

        specs.push(spec);
    }

    Ok(specs)
}
