mod coordinator;
mod endpoint;

pub use coordinator::{Admission, PendingRequest, RefreshCoordinator, RefreshLease};
pub use endpoint::{RefreshedTokens, request_new_token};
