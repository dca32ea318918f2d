//! Client-IP and destination-URL access policy.
//!
//! # Admission Rule
//! Each dimension (IP, URL) has a whitelist and a blacklist:
//! - whitelist non-empty: only whitelisted entries are admitted, the
//!   blacklist of that dimension is ignored
//! - whitelist empty: blacklisted entries are denied, everything else admitted
//!
//! A request is admitted only when both dimensions admit it.
//!
//! # Matching
//! - IP entries match the client address exactly. IPv4-mapped IPv6 peers are
//!   canonicalised to IPv4 before comparison.
//! - URL entries match when they are a substring of the normalized target
//!   `host[:port]/path[?query]`. Hosts are compared lowercased; an optional
//!   `scheme://` prefix on an entry is ignored.
//!
//! # Design Decisions
//! - The four lists live in one immutable snapshot behind `ArcSwap`; updates
//!   build a new snapshot and swap it in, so readers never see a torn list
//! - No I/O, no side effects beyond the held lists

use std::fmt;
use std::net::IpAddr;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Which property of a request a list applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Ip,
    Url,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Ip => write!(f, "ip"),
            Dimension::Url => write!(f, "url"),
        }
    }
}

/// Allow-list or deny-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Whitelist,
    Blacklist,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Whitelist => write!(f, "whitelist"),
            ListKind::Blacklist => write!(f, "blacklist"),
        }
    }
}

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub dimension: Dimension,
    pub subject: String,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} is not permitted", self.dimension, self.subject)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid IP entry '{0}': only digits and dots are allowed")]
    InvalidIpEntry(String),
}

/// The four policy lists. Also the `[policy]` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyLists {
    pub ip_whitelist: Vec<String>,
    pub ip_blacklist: Vec<String>,
    pub url_whitelist: Vec<String>,
    pub url_blacklist: Vec<String>,
}

impl PolicyLists {
    pub fn list(&self, dimension: Dimension, kind: ListKind) -> &[String] {
        match (dimension, kind) {
            (Dimension::Ip, ListKind::Whitelist) => &self.ip_whitelist,
            (Dimension::Ip, ListKind::Blacklist) => &self.ip_blacklist,
            (Dimension::Url, ListKind::Whitelist) => &self.url_whitelist,
            (Dimension::Url, ListKind::Blacklist) => &self.url_blacklist,
        }
    }

    fn list_mut(&mut self, dimension: Dimension, kind: ListKind) -> &mut Vec<String> {
        match (dimension, kind) {
            (Dimension::Ip, ListKind::Whitelist) => &mut self.ip_whitelist,
            (Dimension::Ip, ListKind::Blacklist) => &mut self.ip_blacklist,
            (Dimension::Url, ListKind::Whitelist) => &mut self.url_whitelist,
            (Dimension::Url, ListKind::Blacklist) => &mut self.url_blacklist,
        }
    }

    /// Clean and validate every list.
    fn normalized(self) -> Result<Self, PolicyError> {
        Ok(Self {
            ip_whitelist: normalize_entries(Dimension::Ip, self.ip_whitelist)?,
            ip_blacklist: normalize_entries(Dimension::Ip, self.ip_blacklist)?,
            url_whitelist: normalize_entries(Dimension::Url, self.url_whitelist)?,
            url_blacklist: normalize_entries(Dimension::Url, self.url_blacklist)?,
        })
    }
}

/// Shared access policy, read on every request and written by the control plane.
#[derive(Debug, Default)]
pub struct AccessPolicy {
    lists: ArcSwap<PolicyLists>,
}

impl AccessPolicy {
    /// Build a policy from initial lists.
    pub fn new(lists: PolicyLists) -> Result<Self, PolicyError> {
        Ok(Self {
            lists: ArcSwap::from_pointee(lists.normalized()?),
        })
    }

    /// Check the client address against the IP lists.
    pub fn is_ip_allowed(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical().to_string();
        let lists = self.lists.load();
        admits(&lists.ip_whitelist, &lists.ip_blacklist, |entry| *entry == ip)
    }

    /// Check a destination against the URL lists.
    pub fn is_url_allowed(&self, url: &Url) -> bool {
        let target = match_target(url);
        let lists = self.lists.load();
        admits(&lists.url_whitelist, &lists.url_blacklist, |entry| {
            target.contains(entry.as_str())
        })
    }

    /// The IP dimension alone, for requests without an absolute target.
    pub fn check_ip(&self, ip: IpAddr) -> Result<(), Denial> {
        if self.is_ip_allowed(ip) {
            Ok(())
        } else {
            Err(Denial {
                dimension: Dimension::Ip,
                subject: ip.to_canonical().to_string(),
            })
        }
    }

    /// Evaluate both dimensions, IP first.
    pub fn check(&self, ip: IpAddr, url: &Url) -> Result<(), Denial> {
        self.check_ip(ip)?;
        if !self.is_url_allowed(url) {
            return Err(Denial {
                dimension: Dimension::Url,
                subject: url.to_string(),
            });
        }
        Ok(())
    }

    /// Atomically replace one list. Invalid input leaves the policy untouched.
    pub fn update(
        &self,
        dimension: Dimension,
        kind: ListKind,
        entries: Vec<String>,
    ) -> Result<(), PolicyError> {
        let entries = normalize_entries(dimension, entries)?;
        self.lists.rcu(|current| {
            let mut next = PolicyLists::clone(current);
            *next.list_mut(dimension, kind) = entries.clone();
            next
        });
        tracing::info!(
            dimension = %dimension,
            kind = %kind,
            entries = entries.len(),
            "Access policy list replaced"
        );
        Ok(())
    }

    /// Atomically replace all four lists.
    pub fn replace_all(&self, lists: PolicyLists) -> Result<(), PolicyError> {
        self.lists.store(std::sync::Arc::new(lists.normalized()?));
        Ok(())
    }

    /// Current lists, for display.
    pub fn snapshot(&self) -> PolicyLists {
        PolicyLists::clone(&self.lists.load())
    }
}

/// Split comma-separated operator input into entries.
pub fn parse_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn admits<F>(whitelist: &[String], blacklist: &[String], matches: F) -> bool
where
    F: Fn(&String) -> bool,
{
    if !whitelist.is_empty() {
        whitelist.iter().any(&matches)
    } else {
        !blacklist.iter().any(&matches)
    }
}

fn normalize_entries(dimension: Dimension, entries: Vec<String>) -> Result<Vec<String>, PolicyError> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match dimension {
            Dimension::Ip => {
                if !entry.chars().all(|c| c.is_ascii_digit() || c == '.') {
                    return Err(PolicyError::InvalidIpEntry(entry.to_string()));
                }
                out.push(entry.to_string());
            }
            Dimension::Url => out.push(normalize_url_entry(entry)),
        }
    }
    Ok(out)
}

/// Drop any scheme and lowercase the host part, leaving path and query as-is.
/// An explicit `:80` is dropped for plain-HTTP entries, as in the match target.
fn normalize_url_entry(entry: &str) -> String {
    let (scheme, rest) = match entry.find("://") {
        Some(idx) => (Some(&entry[..idx]), &entry[idx + 3..]),
        None => (None, entry),
    };
    let split = rest.find(['/', '?']).unwrap_or(rest.len());
    let (host, tail) = rest.split_at(split);
    let mut host = host.to_ascii_lowercase();
    let plain_http = scheme.map_or(true, |s| s.eq_ignore_ascii_case("http"));
    if plain_http && host.ends_with(":80") {
        host.truncate(host.len() - 3);
    }
    format!("{host}{tail}")
}

/// The string URL entries are matched against.
fn match_target(url: &Url) -> String {
    let mut target = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if let Some(port) = url.port() {
        target.push(':');
        target.push_str(&port.to_string());
    }
    target.push_str(url.path());
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}
