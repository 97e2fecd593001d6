//! Pure decision layer
//!
//! Handlers decide synchronously and return a plan; the controller then
//! executes the plan against the injected host. This keeps every branch
//! unit-testable without a runtime or fakes.

use crate::generation::CacheGeneration;
use crate::net::{bust_url, CacheDirective, FetchRequest};

/// Work the activate handler must perform, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationPlan {
    /// Cache names to delete before clients are claimed
    pub deletions: Vec<String>,
}

/// Decide which store entries an activation must remove
///
/// Every name that is not the current generation goes, whatever namespace
/// it came from. Claiming is implicit: it always follows the deletions.
pub fn plan_activation(current: &CacheGeneration, existing: &[String]) -> ActivationPlan {
    ActivationPlan {
        deletions: existing
            .iter()
            .filter(|name| !current.matches(name))
            .cloned()
            .collect(),
    }
}

/// How an intercepted fetch will be satisfied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// Navigation: cache-busted network fetch, then a plain network retry.
    /// The cache store is never consulted.
    NavigationNetworkFirst {
        primary: FetchRequest,
        fallback: FetchRequest,
    },
    /// Resource: network fetch, then a cache lookup on failure
    ResourceNetworkFirst { request: FetchRequest },
}

/// Decide the fetch strategy for an intercepted request
pub fn plan_fetch(request: &FetchRequest, bust_param: &str, stamp_millis: i64) -> FetchPlan {
    if request.is_navigation() {
        let primary = FetchRequest {
            url: bust_url(&request.url, bust_param, stamp_millis),
            ..request.clone()
        }
        .with_cache(CacheDirective::NoStore);

        FetchPlan::NavigationNetworkFirst {
            primary,
            fallback: request.clone(),
        }
    } else {
        FetchPlan::ResourceNetworkFirst {
            request: request.clone(),
        }
    }
}
