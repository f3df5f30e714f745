//! Customer notification delivery.
//!
//! `EmailSender` abstracts the transactional email API; `HttpEmailSender`
//! renders the tracking update and posts it over HTTP.

mod http;
mod template;
mod types;

pub use http::HttpEmailSender;
pub use template::{render, RenderedEmail};
pub use types::*;
