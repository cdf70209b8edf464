//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming connection (scope: type, path, headers)
//!     → dispatcher.rs (single ordered scan over the route table)
//!     → matcher.rs (Match::None / Partial / Full per route)
//!     → pattern.rs + convertors.rs (path pattern test, typed parameters)
//!     → Return: Handle(route) | Reject | Lifespan
//!
//! Route registration (at startup):
//!     "/rooms/{room}/{id:int}"
//!     → pattern.rs compiles literal and parameter segments
//!     → route.rs binds pattern, handler, name, declared scope type
//!     → appended to the router in registration order
//!
//! Reverse lookup:
//!     name + params → url.rs (UrlPath)
//! ```
//!
//! # Design Decisions
//! - Registration order is the only tie-break; no specificity ranking
//! - First full match wins; the first partial match is a fallback
//! - No regex: patterns compile to literal/parameter segments
//! - Routes are immutable once the application starts serving

pub mod convertors;
pub mod dispatcher;
pub mod matcher;
pub mod params;
pub mod pattern;
pub mod route;
pub mod url;

pub use convertors::Convertor;
pub use dispatcher::{Outcome, Router};
pub use matcher::{Match, Matcher};
pub use params::{ParamValue, PathParams};
pub use pattern::PathPattern;
pub use route::{Handler, HandlerFuture, Route};
pub use url::UrlPath;
