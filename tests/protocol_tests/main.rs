//! Protocol Tests
//!
//! Wire encoding, fragmentation and stream reassembly.

mod codec_tests;
mod fragmenter_tests;
