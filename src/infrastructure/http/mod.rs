//! Bitbucket REST plumbing: transport, retrying executor, pagination and typed endpoints.

pub mod endpoints;
pub mod executor;
pub mod pagination;
pub mod request;
pub mod transport;

#[cfg(test)]
pub(crate) mod scripted;

pub use endpoints::{Endpoints, RestrictionScope};
pub use executor::{RequestExecutor, ResponseEnvelope, RetryPolicy, RetryingExecutor};
pub use pagination::{PaginatedLister, DEFAULT_PAGE_SIZE};
pub use request::{Method, RequestSpec};
pub use transport::{ReqwestTransport, Transport, TransportConfig, TransportError};
