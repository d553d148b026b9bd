//! Probe role derivation from display names.

use super::ProbeRole;
use anyhow::{Context, Result};
use regex::Regex;

/// Matches a private (RFC 1918) IPv4 address anywhere in a monitor name.
pub const DEFAULT_ROUTER_PATTERN: &str =
    r"(^|[^\d.])(10\.\d{1,3}|192\.168|172\.(1[6-9]|2\d|3[01]))\.\d{1,3}\.\d{1,3}($|[^\d.])";

/// Decides the role of a probe from its display name.
///
/// Called once per probe identity at registration time.
pub trait RoleClassifier: Send + Sync {
    fn role_for(&self, name: &str) -> ProbeRole;
}

impl<F> RoleClassifier for F
where
    F: Fn(&str) -> ProbeRole + Send + Sync,
{
    fn role_for(&self, name: &str) -> ProbeRole {
        self(name)
    }
}

/// Names matching the pattern are routers; everything else is an external service.
#[derive(Debug, Clone)]
pub struct PatternRoleClassifier {
    pattern: Regex,
}

impl PatternRoleClassifier {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .with_context(|| format!("invalid router pattern '{}'", pattern))?;
        Ok(Self { pattern })
    }
}

impl Default for PatternRoleClassifier {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_ROUTER_PATTERN).expect("default router pattern is valid"),
        }
    }
}

impl RoleClassifier for PatternRoleClassifier {
    fn role_for(&self, name: &str) -> ProbeRole {
        if self.pattern.is_match(name) {
            ProbeRole::Router
        } else {
            ProbeRole::ExternalService
        }
    }
}
