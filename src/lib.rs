//! School bus run outcome predictor.
//!
//! A single HTML form collects the attributes of one bus run, assembles a
//! [`types::TripRecord`], and runs it through the fitted encoder, scaler and
//! boosted-tree classifier to call the run a breakdown or a late arrival.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod form;
pub mod model;
pub mod render;
pub mod server;
#[cfg(feature = "torch")]
pub mod torch;
pub mod types;
