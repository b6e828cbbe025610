//! Generation task client: submits work to slow external generation
//! services, polls asynchronous video jobs to completion, and normalizes
//! structurally-varying provider replies into one predictable prompt list.

pub mod config;
pub mod error;
pub mod gateway;
pub mod normalize;
pub mod poll;
pub mod session;
pub mod transport;
