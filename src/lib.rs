//! Client library for the captain service discovery server.
//!
//! A [`CaptainClient`] keeps a local, versioned cache of the services and
//! settings keys it watches, refreshes it from one of several
//! interchangeable discovery endpoints on a background tokio task, keeps the
//! services this process provides registered, and reports online/offline
//! transitions to observers as [`ServiceEvent`]s.

mod address;
mod cache;
mod client;
mod config;
mod constants;
mod endpoint;
mod errors;
mod health;
mod reconciler;
mod registrar;
mod transport;

pub use address::*;
pub use cache::*;
pub use client::*;
pub use config::*;
pub use constants::*;
pub use endpoint::*;
pub use errors::*;
pub use health::*;
pub use registrar::*;
pub use transport::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
