//! URL safety checks for listing sources.
//!
//! Listing locators come from operator configuration and candidate URLs
//! come from scraped markup, so both are screened before any fetch. A
//! scraper of public listing sites only ever needs http(s) to dotted
//! public hostnames; everything else (loopback, private ranges, cloud
//! metadata endpoints, bare intranet names) is refused. Deployments that
//! know their source sites up front can additionally pin fetches to
//! those domains.

use std::collections::HashSet;
use std::net::IpAddr;

use ipnet::IpNet;
use url::Url;

use crate::error::{SecurityError, SecurityResult};

/// Address ranges a listing scraper has no business talking to:
/// unspecified, RFC1918 and CGNAT space, loopback, link-local (including
/// the cloud metadata service), and their IPv6 counterparts.
const DENIED_RANGES: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

/// Hostnames that name infrastructure rather than content.
const DENIED_HOSTS: &[&str] = &["localhost", "metadata.google.internal", "instance-data"];

/// Screens URLs before an extractor is allowed to fetch them.
///
/// The default posture suits scraping public sites; `trust_host` punches
/// holes for fixture servers in tests, `restrict_to_sources` pins a
/// deployment to its configured source domains.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    denied_ranges: Vec<IpNet>,
    extra_denied_hosts: HashSet<String>,
    trusted_hosts: HashSet<String>,
    /// When set, only these domains (and their subdomains) may be fetched.
    source_hosts: Option<HashSet<String>>,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlValidator {
    /// Create a validator with the default posture.
    pub fn new() -> Self {
        Self {
            denied_ranges: DENIED_RANGES
                .iter()
                .map(|r| r.parse().expect("builtin range parses"))
                .collect(),
            extra_denied_hosts: HashSet::new(),
            trusted_hosts: HashSet::new(),
            source_hosts: None,
        }
    }

    /// Exempt a host from all checks (fixture servers in tests).
    pub fn trust_host(mut self, host: impl Into<String>) -> Self {
        self.trusted_hosts.insert(host.into().to_lowercase());
        self
    }

    /// Refuse an additional host.
    pub fn deny_host(mut self, host: impl Into<String>) -> Self {
        self.extra_denied_hosts.insert(host.into().to_lowercase());
        self
    }

    /// Pin fetches to the given source domains and their subdomains.
    pub fn restrict_to_sources(
        mut self,
        domains: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.source_hosts = Some(
            domains
                .into_iter()
                .map(|d| d.into().to_lowercase())
                .collect(),
        );
        self
    }

    /// Screen a URL without touching the network.
    pub fn validate(&self, url: &str) -> SecurityResult<()> {
        let parsed = Url::parse(url)?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SecurityError::DisallowedScheme(parsed.scheme().to_string()));
        }

        let host = parsed
            .host_str()
            .ok_or(SecurityError::NoHost)?
            .to_lowercase();

        if self.trusted_hosts.contains(&host) {
            return Ok(());
        }

        if DENIED_HOSTS.contains(&host.as_str()) || self.extra_denied_hosts.contains(&host) {
            return Err(SecurityError::BlockedHost(host));
        }

        if let Some(ip) = ip_literal(&host) {
            if self.ip_denied(ip) {
                return Err(SecurityError::BlockedCidr(ip.to_string()));
            }
        } else if !host.contains('.') {
            // A public listing site always has a dotted FQDN; a bare
            // label is an intranet name.
            return Err(SecurityError::BlockedHost(host));
        }

        if let Some(sources) = &self.source_hosts {
            let within = sources
                .iter()
                .any(|s| host == *s || host.ends_with(&format!(".{s}")));
            if !within {
                return Err(SecurityError::BlockedHost(host));
            }
        }

        Ok(())
    }

    /// Screen a URL and its resolved addresses.
    ///
    /// Resolving catches hostnames pointed at internal addresses (DNS
    /// rebinding); IP literals were already screened by `validate`.
    pub async fn validate_with_dns(&self, url: &str) -> SecurityResult<()> {
        self.validate(url)?;

        let parsed = Url::parse(url)?;
        let host = parsed
            .host_str()
            .ok_or(SecurityError::NoHost)?
            .to_lowercase();

        if self.trusted_hosts.contains(&host) || ip_literal(&host).is_some() {
            return Ok(());
        }

        let port = parsed
            .port()
            .unwrap_or(if parsed.scheme() == "https" { 443 } else { 80 });
        let resolved = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| SecurityError::DnsResolution(e.to_string()))?;

        for addr in resolved {
            if self.ip_denied(addr.ip()) {
                return Err(SecurityError::BlockedCidr(format!(
                    "{host} resolves to {}",
                    addr.ip()
                )));
            }
        }

        Ok(())
    }

    fn ip_denied(&self, ip: IpAddr) -> bool {
        self.denied_ranges.iter().any(|range| range.contains(&ip))
    }
}

/// Parse a host as an IP literal, tolerating IPv6 brackets.
fn ip_literal(host: &str) -> Option<IpAddr> {
    host.trim_matches(|c| c == '[' || c == ']').parse().ok()
}
