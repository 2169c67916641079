//! Narrow interfaces to the cloud collaborators.
//!
//! The identity/session layer stays outside this crate: implementations
//! arrive already authenticated. All traits are synchronous; resource
//! processing is strictly sequential.

use std::collections::BTreeMap;

use crate::error::ServiceError;
use crate::model::ResourceRecord;

/// The scope a discovery query runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryScope {
    /// One subscription.
    Subscription(String),
    /// An explicit subscription list.
    Subscriptions(Vec<String>),
    /// Everything visible to the session.
    Tenant,
}

/// A discovery query: which resources to list.
#[derive(Debug, Clone)]
pub struct ResourceQuery {
    pub scope: QueryScope,
    /// Restrict to one resource type (exact, case-insensitive on the wire).
    pub resource_type: Option<String>,
    /// Only return resources that carry this tag key.
    pub required_tag: Option<String>,
}

impl ResourceQuery {
    pub fn new(scope: QueryScope) -> Self {
        Self {
            scope,
            resource_type: None,
            required_tag: None,
        }
    }
}

/// The paged-query capability of the discovery service.
pub trait ResourceExplorer {
    /// Total number of resources matching `query`, fetched via a
    /// count-only query.
    fn count(&self, query: &ResourceQuery) -> Result<usize, ServiceError>;

    /// One page of results covering `[offset, offset + limit)`.
    ///
    /// `offset` MUST be `None` for the first page: the backing service
    /// treats an explicit zero skip specially, so the argument is omitted
    /// entirely rather than passed as zero. Every later page passes
    /// `Some(offset)`.
    fn page(
        &self,
        query: &ResourceQuery,
        limit: usize,
        offset: Option<usize>,
    ) -> Result<Vec<ResourceRecord>, ServiceError>;
}

/// The tag read/write capability of the management plane.
pub trait TagClient {
    /// Fresh read of a single resource. `Ok(None)` when the resource no
    /// longer exists.
    fn get_resource(&self, resource_id: &str) -> Result<Option<ResourceRecord>, ServiceError>;

    /// Replace the FULL tag set on a resource. This is not a merge: any
    /// key absent from `tags` is removed from the resource.
    fn replace_tags(
        &self,
        resource_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), ServiceError>;
}

/// Operator confirmation, injected so the engines run headless in tests.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}
