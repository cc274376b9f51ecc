//! Auth-domain scopes, token handles, and per-scope token resolution.

pub mod resolver;
pub mod scope;
pub mod token;

pub use resolver::*;
pub use scope::*;
pub use token::{grant::*, handle::*, secret::*};
