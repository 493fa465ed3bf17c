//! # OpenOCD bit-bang adapter protocol
//!
//! This crate implements the byte protocol OpenOCD's `buspirate` JTAG driver speaks
//! with a bit-banging adapter. The adapter is a dumb, fast signal generator: the host
//! sends TDI/TMS bit-pairs, the adapter clocks them through the Test Access Port and
//! returns the sampled TDO bits.
//!
//! ## Overview
//!
//! - [`Command`]: everything the host can ask for (pin mode, features, telemetry,
//!   clock delay, serial speed, TAP shift)
//! - [`Reply`]: the framed answers of the adapter
//! - [`ShiftRequest`]: size arithmetic and payload layout of a TAP shift
//!
//! ## Message Format
//!
//! Every command is an opcode byte followed by fixed arguments. Multi-byte fields are
//! big-endian.
//!
//! | Opcode | Arguments | Reply |
//! |---|---|---|
//! | `0x00` | - | none, leaves the mode |
//! | `0x01` | mode | none |
//! | `0x02` | feature, action | none |
//! | `0x03` | - | `[0x03, 8, 4 x u16]` |
//! | `0x05` | bit count (u16), payload | `[0x05, bit count]`, TDO bytes |
//! | `0x06` | - | `OCD1` |
//! | `0x07` | speed, `0xAA`, `0x55` | `[0x07, speed]` |
//! | `0x08` | delay (u16) | none |
//!
//! Any other opcode is answered with a single `0x00`.
//!
//! ## Basic Usage
//!
//! ```
//! use oocd_protocol::{Command, Reply};
//! use std::io::Cursor;
//!
//! let mut buffer = Vec::new();
//! Command::TapShift { bit_count: 17 }.write_to(&mut buffer).expect("Writing to vector shouldn't fail");
//! assert_eq!(buffer, [0x05, 0x00, 0x11]);
//!
//! let reply = Reply::from_reader(&mut Cursor::new(b"OCD1")).expect("Identifier should parse");
//! assert_eq!(reply, Reply::Identifier);
//! ```
//!
//! ### Shift Payload
//!
//! ```
//! use oocd_protocol::{ShiftRequest, BIT_SEQUENCES_LIMIT};
//!
//! let request = ShiftRequest::clamped(12, BIT_SEQUENCES_LIMIT);
//! assert_eq!(request.encode_payload(&[0xA5, 0x0F], &[0x00, 0x08]), [0xA5, 0x00, 0x0F, 0x08]);
//! assert_eq!(request.sample_len(), 2);
//! ```
//!
//! ## Error Handling
//!
//! This library uses the [`error::ReadError`] type for protocol parsing errors.

pub mod protocol;
pub use protocol::*;
pub mod codec;
pub mod error;
