//! Credential decorators for [`HttpClient`](crate::fetch::HttpClient).

mod basic_auth;

pub use basic_auth::BasicAuth;
