//! Destination matching for ACL rules.
//!
//! # Responsibilities
//! - Match the requested host name (exact or suffix, case-insensitive)
//! - Match the resolved IP address (single address or CIDR block)
//!
//! # Design Decisions
//! - Domain matchers only see the host name, IP matchers only see the address
//! - A destination whose address is unknown never matches an IP rule
//! - No regex to guarantee O(n) matching

use std::net::IpAddr;
use std::str::FromStr;

/// Trait for matching a destination against a rule condition.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the destination matches this condition.
    fn matches(&self, host: &str, ip: Option<IpAddr>) -> bool;

    /// Whether this condition inspects the destination's IP address.
    fn needs_ip(&self) -> bool {
        false
    }
}

/// Matches one domain exactly.
#[derive(Debug, Clone)]
pub struct DomainMatcher {
    domain: String,
}

impl DomainMatcher {
    /// The domain is normalized to lowercase for case-insensitive matching.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: normalize(&domain.into()),
        }
    }
}

impl Matcher for DomainMatcher {
    fn matches(&self, host: &str, _ip: Option<IpAddr>) -> bool {
        normalize(host) == self.domain
    }
}

/// Matches a domain and all of its subdomains.
#[derive(Debug, Clone)]
pub struct DomainSuffixMatcher {
    suffix: String,
}

impl DomainSuffixMatcher {
    pub fn new(suffix: impl Into<String>) -> Self {
        let suffix = normalize(&suffix.into());
        Self {
            suffix: suffix.trim_start_matches('.').to_string(),
        }
    }
}

impl Matcher for DomainSuffixMatcher {
    fn matches(&self, host: &str, _ip: Option<IpAddr>) -> bool {
        let host = normalize(host);
        host == self.suffix
            || host
                .strip_suffix(self.suffix.as_str())
                .is_some_and(|rest| rest.ends_with('.'))
    }
}

/// Matches one IP address.
#[derive(Debug, Clone)]
pub struct IpMatcher {
    addr: IpAddr,
}

impl IpMatcher {
    pub fn new(addr: IpAddr) -> Self {
        Self { addr }
    }
}

impl Matcher for IpMatcher {
    fn matches(&self, _host: &str, ip: Option<IpAddr>) -> bool {
        ip.is_some_and(|ip| canonical(ip) == canonical(self.addr))
    }

    fn needs_ip(&self) -> bool {
        true
    }
}

/// Matches every address inside a CIDR block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidrMatcher {
    network: IpAddr,
    prefix: u8,
}

impl CidrMatcher {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, canonical(ip)) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = mask_u32(self.prefix);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = mask_u128(self.prefix);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for CidrMatcher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| format!("invalid CIDR {:?}: missing prefix length", s))?;
        let network: IpAddr = addr
            .parse()
            .map_err(|_| format!("invalid CIDR {:?}: bad address", s))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| format!("invalid CIDR {:?}: bad prefix length", s))?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(format!("invalid CIDR {:?}: prefix length exceeds {}", s, max));
        }
        Ok(Self { network, prefix })
    }
}

impl Matcher for CidrMatcher {
    fn matches(&self, _host: &str, ip: Option<IpAddr>) -> bool {
        ip.is_some_and(|ip| self.contains(ip))
    }

    fn needs_ip(&self) -> bool {
        true
    }
}

/// Matches everything.
#[derive(Debug, Clone, Copy)]
pub struct AllMatcher;

impl Matcher for AllMatcher {
    fn matches(&self, _host: &str, _ip: Option<IpAddr>) -> bool {
        true
    }
}

fn normalize(domain: &str) -> String {
    domain.trim_end_matches('.').to_ascii_lowercase()
}

/// Map IPv4-mapped IPv6 addresses back to IPv4.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

fn mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn test_domain_matcher() {
        let matcher = DomainMatcher::new("Example.com");
        assert!(matcher.matches("example.com", None));
        assert!(matcher.matches("EXAMPLE.COM.", None));
        assert!(!matcher.matches("www.example.com", None));
    }

    #[test]
    fn test_suffix_matcher() {
        let matcher = DomainSuffixMatcher::new("example.com");
        assert!(matcher.matches("example.com", None));
        assert!(matcher.matches("a.b.example.com", None));
        assert!(!matcher.matches("badexample.com", None));
        assert!(!matcher.matches("example.org", None));
    }

    #[test]
    fn test_cidr_matcher() {
        let v4: CidrMatcher = "10.0.0.0/8".parse().unwrap();
        assert!(v4.matches("", ip("10.200.1.1")));
        assert!(!v4.matches("", ip("11.0.0.1")));
        assert!(v4.matches("", ip("::ffff:10.0.0.1")));
        assert!(!v4.matches("10.0.0.1", None));

        let v6: CidrMatcher = "2001:db8::/32".parse().unwrap();
        assert!(v6.matches("", ip("2001:db8::1")));
        assert!(!v6.matches("", ip("2001:db9::1")));

        let any: CidrMatcher = "0.0.0.0/0".parse().unwrap();
        assert!(any.matches("", ip("192.0.2.1")));
    }

    #[test]
    fn test_cidr_parse_errors() {
        assert!("10.0.0.0".parse::<CidrMatcher>().is_err());
        assert!("10.0.0.0/33".parse::<CidrMatcher>().is_err());
        assert!("nope/8".parse::<CidrMatcher>().is_err());
    }

    #[test]
    fn test_ip_matcher() {
        let matcher = IpMatcher::new("1.2.3.4".parse().unwrap());
        assert!(matcher.matches("", ip("1.2.3.4")));
        assert!(!matcher.matches("", ip("1.2.3.5")));
        assert!(!matcher.matches("1.2.3.4", None));
    }
}
