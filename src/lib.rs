//! Ruck session tracking core.
//!
//! A rucking session fuses four live inputs (GPS fixes, heart-rate
//! samples, a periodic timer, user commands) into one aggregated
//! session state: elapsed time, distance, elevation, pace, splits and
//! calories. The [`coordinator`] actor serializes every event through
//! a single queue, the manager modules own one metric family each, and
//! everything external (clock, backend, checkpoint storage, message
//! generator) sits behind a trait so the whole pipeline runs
//! deterministically under test.

pub mod api;
pub mod calories;
pub mod checkpoint;
pub mod cheerleader;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod heart_rate;
pub mod lifecycle;
pub mod location;
pub mod sensors;
pub mod types;
pub mod uploads;
pub mod watchdog;
