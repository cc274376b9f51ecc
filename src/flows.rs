//! Interactive authorization flows layered on the dispatcher.

pub mod pkce;

pub use pkce::*;
