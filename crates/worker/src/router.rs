//! Policy router: picks a caching strategy for each intercepted request.
//!
//! Rules are evaluated in fixed precedence:
//! 1. API prefix → NetworkFirst
//! 2. Dynamic (client-side) routes → NetworkFirst with the shell as fallback
//! 3. Everything else → CacheFirst
//!
//! Non-HTTP schemes and non-GET methods bypass the cache entirely.

use ordo_client::Method;
use ordo_client::fetch::is_http;
use ordo_core::{AppConfig, Error};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Caching strategy applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    NetworkFirstShellFallback,
    /// Forwarded to the origin, never cached.
    Passthrough,
}

/// Classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub strategy: Strategy,
    pub fallback: Option<Url>,
}

impl Route {
    fn plain(strategy: Strategy) -> Self {
        Self { strategy, fallback: None }
    }
}

/// Path matcher of a policy rule.
#[derive(Debug, Clone)]
pub enum RulePattern {
    Prefix(String),
    Regex(Regex),
}

impl RulePattern {
    /// `^...` is a regex, anything else a literal path prefix.
    pub fn parse(pattern: &str) -> Result<Self, Error> {
        if pattern.starts_with('^') {
            Regex::new(pattern)
                .map(RulePattern::Regex)
                .map_err(|e| Error::InvalidInput(format!("invalid route pattern {pattern}: {e}")))
        } else {
            Ok(RulePattern::Prefix(pattern.to_string()))
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            RulePattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
            RulePattern::Regex(re) => re.is_match(path),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub pattern: RulePattern,
    pub strategy: Strategy,
    pub fallback: Option<Url>,
}

/// Stateless classifier over an ordered rule list.
#[derive(Debug, Clone)]
pub struct PolicyRouter {
    rules: Vec<PolicyRule>,
}

impl PolicyRouter {
    /// Build the rule list from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let shell = origin
            .join(&config.shell_url)
            .map_err(|e| Error::InvalidUrl(format!("shell_url: {e}")))?;

        let mut rules = vec![PolicyRule {
            pattern: RulePattern::Prefix(config.api_prefix.clone()),
            strategy: Strategy::NetworkFirst,
            fallback: None,
        }];
        for route in &config.dynamic_routes {
            rules.push(PolicyRule {
                pattern: RulePattern::parse(route)?,
                strategy: Strategy::NetworkFirstShellFallback,
                fallback: Some(shell.clone()),
            });
        }

        Ok(Self { rules })
    }

    /// Classify a request. The same input always yields the same route.
    pub fn classify(&self, method: &Method, url: &Url) -> Route {
        if !is_http(url) || *method != Method::GET {
            return Route::plain(Strategy::Passthrough);
        }

        let path = url.path();
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| Route { strategy: rule.strategy, fallback: rule.fallback.clone() })
            .unwrap_or_else(|| Route::plain(Strategy::CacheFirst))
    }
}
