//! Request-scoped context threaded through every operation

use uuid::Uuid;

/// Caller metadata for audit correlation.
///
/// Passed explicitly rather than held in task-local state, so every audit
/// record can be tied back to the edge request that caused it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id propagated from the edge, or freshly generated
    pub correlation_id: String,
    /// Client IP as seen by the edge
    pub ip_address: String,
    /// Client user agent
    pub user_agent: String,
}

impl RequestContext {
    pub fn new(
        correlation_id: impl Into<String>,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Context with a generated correlation id, for edges that do not
    /// propagate one
    pub fn generated(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), ip_address, user_agent)
    }
}
