//! Bearer token handles, secrets, and authorization grants.

pub mod grant;
pub mod handle;
pub mod secret;
