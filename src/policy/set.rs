//! Policy Set and Host Policy data model.
//!
//! # Design Decisions
//! - Built once from a validated `ProxyConfig`, immutable afterwards
//! - Shared read-only through `Arc`; no locking on the request path
//! - Everything that can fail (URL parsing, glob compilation, header
//!   encoding) happens here, never per request

use std::collections::{BTreeMap, HashMap};

use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::config::schema::{HostConfig, Mode, ProxyConfig};
use crate::policy::matcher::PathMatcher;
use crate::security::basic_auth;

/// Error building the Policy Set from configuration.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("host '{host}': invalid upstream url: {source}")]
    Upstream {
        host: String,
        #[source]
        source: url::ParseError,
    },

    #[error("host '{host}': invalid pattern for {method}: {source}")]
    Pattern {
        host: String,
        method: String,
        #[source]
        source: globset::Error,
    },

    #[error("host '{host}': outbound credentials cannot be encoded as a header")]
    Credentials { host: String },
}

/// A username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Full configuration of one virtual host.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    upstream: Url,
    mode: Mode,
    inbound: Option<Credentials>,
    outbound: Option<Credentials>,
    outbound_authorization: Option<HeaderValue>,
    restrictions: HashMap<String, PathMatcher>,
}

impl HostPolicy {
    /// Build a host policy; method keys are normalized to uppercase.
    pub fn new(
        upstream: Url,
        mode: Mode,
        restrictions: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, globset::Error> {
        let restrictions = compile_restrictions(restrictions).map_err(|(_, e)| e)?;
        Ok(Self {
            upstream,
            mode,
            inbound: None,
            outbound: None,
            outbound_authorization: None,
            restrictions,
        })
    }

    /// Require callers to authenticate with these credentials.
    pub fn with_inbound_credentials(mut self, credentials: Credentials) -> Self {
        self.inbound = Some(credentials);
        self
    }

    /// Inject these credentials into every forwarded request.
    pub fn with_outbound_credentials(
        mut self,
        credentials: Credentials,
    ) -> Result<Self, axum::http::header::InvalidHeaderValue> {
        self.outbound_authorization = Some(basic_auth::encode(&credentials)?);
        self.outbound = Some(credentials);
        Ok(self)
    }

    fn from_config(host: &str, settings: &HostConfig) -> Result<Self, PolicyError> {
        let upstream = Url::parse(&settings.to.url).map_err(|source| PolicyError::Upstream {
            host: host.to_string(),
            source,
        })?;

        let restrictions = compile_restrictions(&settings.restrictions).map_err(
            |(method, source)| PolicyError::Pattern {
                host: host.to_string(),
                method,
                source,
            },
        )?;

        let mut policy = Self {
            upstream,
            mode: settings.mode,
            inbound: None,
            outbound: None,
            outbound_authorization: None,
            restrictions,
        };

        if let Some(auth) = &settings.auth {
            policy = policy
                .with_inbound_credentials(Credentials::new(&auth.username, &auth.password));
        }
        if let (Some(username), Some(password)) = (&settings.to.username, &settings.to.password) {
            policy = policy
                .with_outbound_credentials(Credentials::new(username, password))
                .map_err(|_| PolicyError::Credentials {
                    host: host.to_string(),
                })?;
        }

        Ok(policy)
    }

    /// Base URL requests are forwarded to.
    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Credentials callers must present, if any.
    pub fn inbound_credentials(&self) -> Option<&Credentials> {
        self.inbound.as_ref()
    }

    /// Credentials injected upstream, if any.
    pub fn outbound_credentials(&self) -> Option<&Credentials> {
        self.outbound.as_ref()
    }

    /// Precomputed `Authorization` value for outbound requests.
    pub fn outbound_authorization(&self) -> Option<&HeaderValue> {
        self.outbound_authorization.as_ref()
    }

    /// Patterns configured for `method` (exact, case-sensitive lookup).
    pub fn restrictions_for(&self, method: &str) -> Option<&PathMatcher> {
        self.restrictions.get(method)
    }

    /// Configured methods, sorted.
    pub fn restricted_methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.restrictions.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    /// A RESTRICT host whose restrictions hold no pattern at all.
    pub fn denies_everything(&self) -> bool {
        self.mode == Mode::Restrict && self.restrictions.values().all(PathMatcher::is_empty)
    }
}

fn compile_restrictions(
    restrictions: &BTreeMap<String, Vec<String>>,
) -> Result<HashMap<String, PathMatcher>, (String, globset::Error)> {
    let mut compiled = HashMap::with_capacity(restrictions.len());
    for (method, patterns) in restrictions {
        let method = method.to_ascii_uppercase();
        let matcher = PathMatcher::new(patterns).map_err(|e| (method.clone(), e))?;
        compiled.insert(method, matcher);
    }
    Ok(compiled)
}

/// Immutable mapping of virtual host name to its policy.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    hosts: HashMap<String, HostPolicy>,
}

impl PolicySet {
    /// Build the Policy Set from a validated configuration.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, PolicyError> {
        let mut hosts = HashMap::with_capacity(config.proxy.len());
        for (host, settings) in &config.proxy {
            hosts.insert(host.clone(), HostPolicy::from_config(host, settings)?);
        }
        Ok(Self { hosts })
    }

    /// Build a Policy Set from already constructed host policies.
    pub fn from_hosts<I>(hosts: I) -> Self
    where
        I: IntoIterator<Item = (String, HostPolicy)>,
    {
        Self {
            hosts: hosts.into_iter().collect(),
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, host: &str) -> Option<&HostPolicy> {
        self.hosts.get(host)
    }

    /// Configured host names, sorted.
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = self.hosts.keys().map(String::as_str).collect();
        hosts.sort_unstable();
        hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
