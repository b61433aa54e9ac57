//! Client for the Huefy templated email API.
//!
//! [`HuefyClient`] sends emails rendered from server-side templates. Requests
//! go through a shared executor that retries transient failures with
//! exponential backoff and maps every failure to a [`HuefyError`].
//!
//! The [`mail`] and [`notification`] modules adapt the client to mailer and
//! notification style call sites.

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod mail;
pub mod message;
pub mod notification;
pub mod runtime;

pub use client::{EmailApi, EmailRequest, HuefyClient, TemplateData, TemplateValidation};
pub use config::HuefyConfig;
pub use error::{HuefyError, Result};
pub use message::HuefyMessage;
