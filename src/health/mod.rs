//! Health derivation and event fan-out.
//!
//! [`HealthTracker`] turns cache reloads into edge transitions and
//! [`ObserverBus`] delivers them to application observers.

mod health_tracker;
mod observer;

pub use health_tracker::*;
pub use observer::*;
