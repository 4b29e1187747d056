//! Types shared between the conversation controller, its front-ends, and the
//! development endpoint.

pub mod domain;
pub mod error;
pub mod protocol;
