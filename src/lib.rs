//! msgboard — message-traffic dashboard backend for the Twilio
//! Messaging API.

pub mod cache;
pub mod config;
pub mod dates;
pub mod error;
pub mod http;
pub mod model;
pub mod provider;
pub mod service;
pub mod session;
