//! Authorization oracle - capability queries consumed by the workflow
//!
//! The workflow never caches answers from the oracle: each decision asks
//! again right before it commits.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Capability required to decide the sales-manager stage
pub const CAP_APPROVE_SALES: &str = "approve-sales";

/// Capability required to decide the HR stage, list every request and export
pub const CAP_MANAGE_HR: &str = "manage-hr";

/// Capabilities that allow seeing requests owned by other staff
pub const REVIEWER_CAPABILITIES: [&str; 2] = [CAP_MANAGE_HR, CAP_APPROVE_SALES];

/// Codes this workflow checks. Rosters may grant others; they are stored
/// and reported but never consulted here.
pub const KNOWN_CAPABILITIES: [&str; 2] = [CAP_APPROVE_SALES, CAP_MANAGE_HR];

pub fn is_known_capability(code: &str) -> bool {
    KNOWN_CAPABILITIES.contains(&code)
}

/// Pure capability query
pub trait AuthorizationOracle: Send + Sync {
    /// Whether `actor_id` currently holds `capability`
    fn has_capability(&self, actor_id: &str, capability: &str) -> bool;

    /// Whether `actor_id` holds at least one of `capabilities`
    fn has_any_capability(&self, actor_id: &str, capabilities: &[&str]) -> bool {
        capabilities
            .iter()
            .any(|cap| self.has_capability(actor_id, cap))
    }
}

impl<T: AuthorizationOracle + ?Sized> AuthorizationOracle for &T {
    fn has_capability(&self, actor_id: &str, capability: &str) -> bool {
        (**self).has_capability(actor_id, capability)
    }
}

impl<T: AuthorizationOracle + ?Sized> AuthorizationOracle for Arc<T> {
    fn has_capability(&self, actor_id: &str, capability: &str) -> bool {
        (**self).has_capability(actor_id, capability)
    }
}

impl<T: AuthorizationOracle + ?Sized> AuthorizationOracle for Box<T> {
    fn has_capability(&self, actor_id: &str, capability: &str) -> bool {
        (**self).has_capability(actor_id, capability)
    }
}

/// In-memory grant table.
///
/// Grants can be changed while the oracle is shared, which makes it usable
/// for embedding callers that resolve capabilities elsewhere and for tests
/// that revoke a capability between two calls.
#[derive(Debug, Default)]
pub struct StaticOracle {
    grants: RwLock<HashMap<String, HashSet<String>>>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style grant
    pub fn with_grant(self, actor_id: &str, capability: &str) -> Self {
        self.grant(actor_id, capability);
        self
    }

    pub fn grant(&self, actor_id: &str, capability: &str) {
        let mut grants = self.grants.write().unwrap_or_else(|e| e.into_inner());
        grants
            .entry(actor_id.to_string())
            .or_default()
            .insert(capability.to_string());
    }

    pub fn revoke(&self, actor_id: &str, capability: &str) {
        let mut grants = self.grants.write().unwrap_or_else(|e| e.into_inner());
        if let Some(caps) = grants.get_mut(actor_id) {
            caps.remove(capability);
        }
    }
}

impl AuthorizationOracle for StaticOracle {
    fn has_capability(&self, actor_id: &str, capability: &str) -> bool {
        let grants = self.grants.read().unwrap_or_else(|e| e.into_inner());
        grants
            .get(actor_id)
            .is_some_and(|caps| caps.contains(capability))
    }
}
