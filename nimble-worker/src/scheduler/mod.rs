//! Scheduler layer for the worker
//!
//! This layer drives the acquire → execute → submit cycle and keeps the
//! worker alive across failures of any single cycle.

pub mod state;
pub mod worker_loop;

pub use worker_loop::WorkerLoop;
