//! Flight-control orchestration core for a multirotor.
//!
//! A single cooperative loop calls [`FlightController::update`] as fast as it can. Each
//! call reads the clock once and runs whichever periodic tasks are due: the pilot-command
//! loop, the altitude PID, the stabilization loop and the arming-angle check. The
//! signal-loss failsafe is evaluated on every call.
//!
//! Hardware and the control math sit behind the traits in [`hal`]; [`drivers`] has the
//! concrete implementations used by the STM32 firmware.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod arming;
pub mod config;
pub mod demand;
pub mod drivers;
pub mod error;
pub mod hal;
pub mod orchestrator;
pub mod state;
pub mod timed_task;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use error::{Error, Result};
pub use orchestrator::{FlightController, TickReport};
pub use state::FlightMode;
