//! Route matching contract.
//!
//! # Responsibilities
//! - Test a connection scope against a route's path pattern
//! - Compare the scope type with the connection type the route declares
//! - Report a tri-state outcome with the captured parameters
//!
//! # Design Decisions
//! - Path match + type match = `Full`
//! - Path match + type mismatch = `Partial` (kept as a fallback by the router)
//! - Anything else = `None`

use crate::routing::params::PathParams;
use crate::websocket::ConnectionScope;

/// Outcome of testing one route against one scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Match {
    None,
    Partial(PathParams),
    Full(PathParams),
}

impl Match {
    pub fn is_none(&self) -> bool {
        matches!(self, Match::None)
    }
}

/// Anything that can be tested against a connection scope.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    fn matches(&self, scope: &ConnectionScope) -> Match;
}
