//! Client side of the manager approval screen: an authenticated REST client
//! and the view model that drives it.

pub mod approval_view;
pub mod error;
pub mod http;
pub mod session;

pub use approval_view::{ApprovalState, ManagerApproval};
pub use error::ClientError;
pub use http::{ClientConfig, HttpTimesheetApi, TimesheetApi};
pub use session::{AuthSession, HttpTokenRefresher, TokenPair, TokenRefresher};
