//! Geofenced attendance: distance, threshold gate, device acquisition and the
//! staged check-in sequence.

pub mod attempt;
pub mod distance;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod provider;
pub mod sequencer;
