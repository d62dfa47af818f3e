//! Application Layer - Use cases over the user domain

pub mod accounts;
pub mod content_limits;
pub mod profile_projection;

pub use accounts::{ProfileUpdate, RegisterUser, UserAccountService};
pub use content_limits::{
    ContentDecision, ContentLimitError, ContentRateLimiter, ContentUsage, ContentUsageReport,
};
pub use profile_projection::{ProfileProjectionService, ProjectedUserView};
