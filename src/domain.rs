//! Decides whether a site's domain may connect at all.
//!
//! Runs once before the handshake so that hosts the remote service would
//! refuse (loopback names, local development hosts, reserved TLDs, the
//! platform's own subdomains) are turned away early.

use std::fmt;

/// Local development hosts that are never reachable from the remote service
pub const LOCAL_DEV_HOSTS: [&str; 4] = [
    "local.wordpress.test",
    "local.wordpress-trunk.test",
    "src.wordpress-develop.test",
    "build.wordpress-develop.test",
];

/// Loopback names that are never usable
pub const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "localhost.localdomain", "127.0.0.1"];

/// Top-level domains reserved for testing and link-local use
pub const RESERVED_TLDS: [&str; 2] = [".test", ".local"];

pub const DEFAULT_PLATFORM_DOMAIN: &str = "wordpress.com";

/// Platform hosts that stay forbidden whatever platform is configured
pub const PLATFORM_HOSTS: [&str; 1] = [DEFAULT_PLATFORM_DOMAIN];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DomainPolicy {
    #[default]
    Enforce,
    /// Allow any non-empty domain; for hosts that fail the heuristics
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    Empty,
    Forbidden,
    Tld,
    PlatformSubdomain,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::Empty => "domain_empty",
            RejectionReason::Forbidden => "domain_forbidden",
            RejectionReason::Tld => "domain_tld",
            RejectionReason::PlatformSubdomain => "subdomain_platform",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub domain: String,
    pub reason: RejectionReason,
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        self.reason.code()
    }

    /// Human-readable explanation
    pub fn message(&self) -> String {
        let domain = &self.domain;
        match self.reason {
            RejectionReason::Empty => {
                format!("Domain `{domain}` just failed is_usable_domain check as it is empty.")
            }
            RejectionReason::Forbidden => format!(
                "Domain `{domain}` just failed is_usable_domain check as it is in the forbidden array."
            ),
            RejectionReason::Tld => format!(
                "Domain `{domain}` just failed is_usable_domain check as it uses an invalid top level domain."
            ),
            RejectionReason::PlatformSubdomain => format!(
                "Domain `{domain}` just failed is_usable_domain check as it is a subdomain of the platform."
            ),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    Rejected(Rejection),
}

impl Eligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Eligibility::Allowed)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Eligibility::Allowed => None,
            Eligibility::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Domain eligibility rules for one platform
#[derive(Debug, Clone)]
pub struct DomainGate {
    platform_domain: String,
    platform_suffix: String,
}

impl Default for DomainGate {
    fn default() -> Self {
        Self::new(DEFAULT_PLATFORM_DOMAIN)
    }
}

impl DomainGate {
    pub fn new(platform_domain: &str) -> Self {
        let platform_domain = platform_domain.trim_start_matches('.').to_ascii_lowercase();
        Self {
            platform_suffix: format!(".{platform_domain}"),
            platform_domain,
        }
    }

    pub fn platform_domain(&self) -> &str {
        &self.platform_domain
    }

    /// Check a domain. Rules apply in order and the first failure wins.
    ///
    /// Every rule compares ASCII case-insensitively, including the exact
    /// forbidden-host match: `LOCALHOST` is rejected just like `localhost`.
    /// The forbidden hosts are the loopback names, the local development
    /// hosts, `wordpress.com` and the configured platform domain.
    pub fn check(&self, domain: &str, policy: DomainPolicy) -> Eligibility {
        let reject = |reason: RejectionReason| {
            Eligibility::Rejected(Rejection {
                domain: domain.to_string(),
                reason,
            })
        };

        if domain.is_empty() {
            return reject(RejectionReason::Empty);
        }

        if policy == DomainPolicy::Skip {
            return Eligibility::Allowed;
        }

        let lower = domain.to_ascii_lowercase();

        if self.is_forbidden(&lower) {
            return reject(RejectionReason::Forbidden);
        }

        if RESERVED_TLDS.iter().any(|tld| lower.ends_with(tld)) {
            return reject(RejectionReason::Tld);
        }

        if lower.ends_with(&self.platform_suffix) {
            return reject(RejectionReason::PlatformSubdomain);
        }

        Eligibility::Allowed
    }

    fn is_forbidden(&self, lower: &str) -> bool {
        lower == self.platform_domain
            || PLATFORM_HOSTS.contains(&lower)
            || LOOPBACK_HOSTS.contains(&lower)
            || LOCAL_DEV_HOSTS.contains(&lower)
    }
}

/// Check a domain against the default platform's rules
pub fn is_usable_domain(domain: &str, policy: DomainPolicy) -> Eligibility {
    DomainGate::default().check(domain, policy)
}
