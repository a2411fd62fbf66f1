//! `ackline` - tiered alarm escalation over SMS
//!
//! This library provides the escalation state machine, the transports and
//! stores it talks to, and the HTTP surface that feeds it acknowledgments.

pub mod cli;
pub mod config;
pub mod error;
pub mod escalation;
pub mod event;
pub mod http;
pub mod observability;
pub mod store;
pub mod transport;
