//! Link Tests
//!
//! Connection lifecycle, write sequencing and dispatch, driven by hand
//! through a recording transport.

mod common;
mod engine_tests;
mod timer_tests;
