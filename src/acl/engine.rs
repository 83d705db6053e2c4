//! ACL rule file parsing and evaluation.

use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::acl::matcher::{
    AllMatcher, CidrMatcher, DomainMatcher, DomainSuffixMatcher, IpMatcher, Matcher,
};

/// What to do with a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Connect to the destination directly.
    Direct,
    /// Connect through the server's regular outbound path.
    Proxy,
    /// Refuse the request.
    Block,
    /// Connect to the rule's argument instead of the requested destination.
    Hijack,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Action::Direct),
            "proxy" => Ok(Action::Proxy),
            "block" => Ok(Action::Block),
            "hijack" => Ok(Action::Hijack),
            other => Err(format!("unknown action {:?}", other)),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Direct => "direct",
            Action::Proxy => "proxy",
            Action::Block => "block",
            Action::Hijack => "hijack",
        };
        f.write_str(name)
    }
}

/// Result of evaluating a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclDecision {
    pub action: Action,
    /// Hijack target; empty for other actions.
    pub argument: String,
}

/// Errors raised while loading a rule file.
#[derive(Debug, Error)]
pub enum AclError {
    #[error("failed to read ACL file: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

#[derive(Debug)]
struct Rule {
    action: Action,
    argument: String,
    matcher: Box<dyn Matcher>,
}

/// An ordered rule list plus the action for destinations no rule matches.
///
/// Read-only once loaded; shared between connections behind an `Arc`.
#[derive(Debug)]
pub struct AclEngine {
    rules: Vec<Rule>,
    default_action: Action,
}

impl AclEngine {
    /// Action taken by a freshly parsed engine when nothing matches.
    pub const PARSED_DEFAULT_ACTION: Action = Action::Proxy;

    /// Read and parse a rule file.
    pub fn load_from_file(path: &Path) -> Result<Self, AclError> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    pub fn default_action(&self) -> Action {
        self.default_action
    }

    pub fn set_default_action(&mut self, action: Action) {
        self.default_action = action;
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Whether any rule needs the destination's IP address.
    pub fn has_ip_rules(&self) -> bool {
        self.rules.iter().any(|rule| rule.matcher.needs_ip())
    }

    /// Evaluate a destination. The first matching rule wins.
    pub fn resolve(&self, host: &str, ip: Option<IpAddr>) -> AclDecision {
        let ip = ip.or_else(|| host.parse().ok());
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(host, ip))
            .map(|rule| AclDecision {
                action: rule.action,
                argument: rule.argument.clone(),
            })
            .unwrap_or(AclDecision {
                action: self.default_action,
                argument: String::new(),
            })
    }
}

impl FromStr for AclEngine {
    type Err = AclError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut rules = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let rule = parse_rule(line).map_err(|reason| AclError::Parse {
                line: index + 1,
                reason,
            })?;
            rules.push(rule);
        }
        Ok(Self {
            rules,
            default_action: Self::PARSED_DEFAULT_ACTION,
        })
    }
}

fn parse_rule(line: &str) -> Result<Rule, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let action: Action = fields[0].parse()?;
    let kind = fields
        .get(1)
        .ok_or_else(|| "missing rule type".to_string())?
        .to_ascii_lowercase();

    let (matcher, rest): (Box<dyn Matcher>, &[&str]) = if kind == "all" {
        (Box::new(AllMatcher), &fields[2..])
    } else {
        let target = fields
            .get(2)
            .ok_or_else(|| format!("missing argument for {} rule", kind))?;
        let matcher: Box<dyn Matcher> = match kind.as_str() {
            "domain" => Box::new(DomainMatcher::new(*target)),
            "domain-suffix" => Box::new(DomainSuffixMatcher::new(*target)),
            "ip" => Box::new(IpMatcher::new(
                target
                    .parse()
                    .map_err(|_| format!("invalid IP address {:?}", target))?,
            )),
            "cidr" => Box::new(target.parse::<CidrMatcher>()?),
            other => return Err(format!("unsupported rule type {:?}", other)),
        };
        (matcher, &fields[3..])
    };

    let argument = match (action, rest) {
        (Action::Hijack, [target]) => target.to_string(),
        (Action::Hijack, []) => return Err("hijack rule needs a target".into()),
        (_, []) => String::new(),
        _ => return Err(format!("unexpected trailing fields: {}", rest.join(" "))),
    };

    Ok(Rule {
        action,
        argument,
        matcher,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = "
# local networks stay local
direct cidr 192.168.0.0/16
block domain-suffix ads.example.com
hijack domain hijacked.example.com 1.2.3.4
proxy ip 8.8.8.8   # resolver
block all
";

    #[test]
    fn parses_rules_in_order() {
        let engine: AclEngine = RULES.parse().unwrap();
        assert_eq!(engine.rule_count(), 5);
        assert_eq!(engine.default_action(), AclEngine::PARSED_DEFAULT_ACTION);
    }

    #[test]
    fn first_match_wins() {
        let engine: AclEngine = RULES.parse().unwrap();

        assert_eq!(engine.resolve("192.168.1.10", None).action, Action::Direct);
        assert_eq!(engine.resolve("x.ads.example.com", None).action, Action::Block);
        assert_eq!(
            engine.resolve("hijacked.example.com", None),
            AclDecision {
                action: Action::Hijack,
                argument: "1.2.3.4".into(),
            }
        );
        assert_eq!(
            engine.resolve("dns.google", Some("8.8.8.8".parse().unwrap())).action,
            Action::Proxy
        );
        assert_eq!(engine.resolve("anything.else", None).action, Action::Block);
    }

    #[test]
    fn unmatched_destinations_use_default() {
        let mut engine: AclEngine = "block domain bad.example".parse().unwrap();
        assert_eq!(engine.resolve("good.example", None).action, Action::Proxy);
        engine.set_default_action(Action::Direct);
        let decision = engine.resolve("good.example", None);
        assert_eq!(decision.action, Action::Direct);
        assert!(decision.argument.is_empty());
    }

    #[test]
    fn parse_errors_carry_line_numbers() {
        let cases = [
            ("direct domain ok.example\nexplode all", 2),
            ("\n\nhijack domain x.example", 3),
            ("block country cn", 1),
            ("block cidr 10.0.0.0/40", 1),
            ("block", 1),
            ("direct domain a.example extra", 1),
        ];
        for (text, expected) in cases {
            match text.parse::<AclEngine>() {
                Err(AclError::Parse { line, .. }) => assert_eq!(line, expected, "{}", text),
                other => panic!("expected parse error for {:?}, got {:?}", text, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn empty_file_is_valid() {
        let engine: AclEngine = "# nothing here\n\n".parse().unwrap();
        assert_eq!(engine.rule_count(), 0);
    }
}
