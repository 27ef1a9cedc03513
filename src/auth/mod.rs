//! The `auth` module models the signed-in user as a plain value.
//!
//! Nothing reads credentials from ambient storage: an [`AuthSession`] is
//! passed to the channel configuration and to the route guards.

pub mod route;
pub mod session;

pub use route::Route;
pub use session::AuthSession;
