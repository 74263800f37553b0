//! Collector URL validation.
//!
//! Rejects destinations an error reporter should never POST to: plain
//! HTTP when HTTPS is required, hosts outside the configured allow-list,
//! and private/loopback addresses in production (reports leaking to an
//! internal service are a data-exfiltration hazard, the same class of
//! problem as SSRF).

use std::net::{Ipv4Addr, Ipv6Addr};

use url::Url;

use crate::error_handling::ValidationError;

/// Validates a collector base URL.
///
/// # Arguments
///
/// * `url_str` - The URL to validate
/// * `require_https` - Reject non-HTTPS schemes
/// * `allowed_domains` - Exact hostnames or `*.suffix` wildcards; empty
///   allows any host that passes the other checks
/// * `production` - Enforce the private/loopback host rejection
pub fn validate_api_url(
    url_str: &str,
    require_https: bool,
    allowed_domains: &[String],
    production: bool,
) -> Result<(), ValidationError> {
    let url = Url::parse(url_str).map_err(|e| ValidationError::MalformedUrl {
        url: url_str.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "https" => {}
        "http" if !require_https => {}
        scheme => {
            return Err(ValidationError::HttpsRequired(scheme.to_string()));
        }
    }

    let host = match url.host() {
        Some(host) => host,
        None => return Err(ValidationError::MissingHost(url_str.to_string())),
    };

    let host_str = host.to_string();
    if !allowed_domains.is_empty() && !domain_allowed(&host_str, allowed_domains) {
        return Err(ValidationError::DomainNotAllowed(host_str));
    }

    if production {
        let private = match host {
            url::Host::Domain(domain) => is_localhost_domain(domain),
            url::Host::Ipv4(ip) => is_private_ipv4(ip),
            url::Host::Ipv6(ip) => is_private_ipv6(ip),
        };
        if private {
            return Err(ValidationError::PrivateHost(host_str));
        }
    }

    Ok(())
}

/// Checks a hostname against the allow-list.
///
/// Entries are matched case-insensitively, either exactly or as a
/// `*.suffix` wildcard covering any subdomain of `suffix`.
fn domain_allowed(host: &str, allowed_domains: &[String]) -> bool {
    let host = host.to_lowercase();
    allowed_domains.iter().any(|entry| {
        let entry = entry.to_lowercase();
        if let Some(suffix) = entry.strip_prefix("*.") {
            host == suffix || host.ends_with(&format!(".{}", suffix))
        } else {
            host == entry
        }
    })
}

/// Checks if an IPv4 address is private/internal (RFC 1918 and friends).
fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();

    // 127.0.0.0/8 (loopback)
    if octets[0] == 127 {
        return true;
    }

    // 10.0.0.0/8
    if octets[0] == 10 {
        return true;
    }

    // 172.16.0.0/12
    if octets[0] == 172 && (16..=31).contains(&octets[1]) {
        return true;
    }

    // 192.168.0.0/16
    if octets[0] == 192 && octets[1] == 168 {
        return true;
    }

    // 169.254.0.0/16 (link-local)
    if octets[0] == 169 && octets[1] == 254 {
        return true;
    }

    // 0.0.0.0/8 (this network)
    if octets[0] == 0 {
        return true;
    }

    // 224.0.0.0/4 (multicast) and 240.0.0.0/4 (reserved)
    if octets[0] >= 224 {
        return true;
    }

    false
}

/// Checks if an IPv6 address is private/internal (RFC 4193, RFC 4291).
fn is_private_ipv6(ip: Ipv6Addr) -> bool {
    let segments = ip.segments();

    // ::1 (loopback)
    if segments == [0, 0, 0, 0, 0, 0, 0, 1] {
        return true;
    }

    // fc00::/7 (unique local addresses)
    if (segments[0] & 0xfe00) == 0xfc00 {
        return true;
    }

    // fe80::/10 (link-local)
    if (segments[0] & 0xffc0) == 0xfe80 {
        return true;
    }

    // ff00::/8 (multicast)
    if segments[0] & 0xff00 == 0xff00 {
        return true;
    }

    false
}

/// Checks if a domain name is a localhost variant.
fn is_localhost_domain(domain: &str) -> bool {
    let domain_lower = domain.to_lowercase();
    matches!(
        domain_lower.as_str(),
        "localhost" | "localhost." | "localhost.localdomain" | "localhost.localdomain."
    ) || domain_lower.ends_with(".localhost")
        || domain_lower.ends_with(".localhost.")
}
