//! Shared helpers for unit tests: mocked transports and recording observers.
mod common;

pub(crate) use common::*;
