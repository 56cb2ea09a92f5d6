//! Protocol Module
//!
//! Defines the UART wire protocol spoken with the peer.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Len (1)  │ Type (1) │     Payload (Len - 1)       │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands (host → peer)
//! - 0x00: CONNECTION_TEST   - Payload: empty
//! - 0x01: REGISTER_READ     - Payload: register
//! - 0x02: REGISTER_WRITE    - Payload: register + value
//! - 0x03: VERSION_READ      - Payload: empty
//! - 0x04: SENSOR_SAMPLING   - Payload: interval seconds
//! - 0x05: DEVICE_NAME_READ  - Payload: empty
//! - 0x06: DEVICE_NAME_WRITE - Payload: ASCII name
//!
//! ### Responses (peer → host)
//! Each command type `t` is answered with type `t | 0x40`.
//!
//! ### Events (peer → host)
//! - 0x84: SENSOR_SAMPLING - Payload: state (1) [+ f32 big-endian (4)]

mod codec;
mod command;
mod fragmenter;
mod packet;
mod reassembler;
pub mod registry;
mod types;

pub use codec::{decode_command, decode_packet, encode_command, encode_packet, HEADER_SIZE};
pub use command::{Command, CommandType};
pub use fragmenter::PacketFragmenter;
pub use packet::{type_code, Event, Response, RxPacket};
pub use reassembler::{FeedSummary, FrameBuffer, FrameReassembler, RawFrame};
pub use types::{AsciiString, IntervalSeconds, RegisterNumber, SamplingState, MAX_PAYLOAD_LEN};
