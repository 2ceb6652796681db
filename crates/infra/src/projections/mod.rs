//! Read-model projections.
//!
//! Each projection consumes one aggregate type's events and maintains an
//! organization-isolated read model that can be rebuilt from the log at any
//! time.

pub mod companies;
pub mod license_pools;
pub mod sessions;
pub mod store;

pub use companies::{COMPANY_AGGREGATE_TYPE, CompanyProjection};
pub use license_pools::{LICENSE_POOL_AGGREGATE_TYPE, LicensePoolProjection};
pub use sessions::{SESSION_AGGREGATE_TYPE, SessionProjection};
pub use store::{ApplyOutcome, Projection, ProjectionError, ProjectionStore};
