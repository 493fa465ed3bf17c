//! # OpenOCD Bit-Bang Adapter
//!
//! This crate implements the device side of the bit-bang JTAG adapter protocol spoken by
//! OpenOCD's `buspirate` driver. The device is a dumb, fast signal generator: it clocks
//! TDI/TMS bit-pairs received from the host through the Test Access Port and streams the
//! sampled TDO bits back.
//!
//! ## Architecture
//!
//! Hardware is reached only through three traits:
//!
//! - **[`TapLines`]**: level, direction and open-drain control of the JTAG and reset lines
//! - **[`Board`]**: LED, voltage regulators, pull-ups and the ADC
//! - **[`Transport`]**: a byte stream with a baud rate that can be split into reader and writer
//!
//! On top of these sit:
//!
//! - **[`TapEngine`]**: clocks bit-pairs chunk by chunk and samples TDO
//! - **[`Strategy`]**: moves the shift payload from the transport into the engine, either
//!   [`Inline`] or on a [`Background`] thread. Both produce identical bytes on the wire.
//! - **[`Device`]**: the command loop of a session
//! - **[`server::Server`]**: serves a device to OpenOCD over TCP
//!
//! The [`sim`] module provides simulated lines and a simulated board, so the whole
//! stack can run without hardware.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use oocd_server::{Background, TapEngine, server::Builder, sim::{SimulatedBoard, SimulatedLines}};
//!
//! let mut server = Builder::new()
//!     .default_delay(2)
//!     .build::<_, _, _, Background>(TapEngine::with_lines(SimulatedLines::new(1)), SimulatedBoard::default());
//! server.listen("127.0.0.1:4444").expect("Server failed");
//! ```
//!
//! ## Shift Timing
//!
//! Every bit-pair is one TCK period with a busy-wait of the current half-cycle delay
//! after each edge. The delay is set by the host and reset at the start of every
//! session. Without the `delay` feature the waits are compiled out.
//!
//! ## Logging
//!
//! This crate uses the `log` crate. Sessions and connections are logged at `info`,
//! every command at `debug` and the clocked chunks at `trace`.
//!
//! ## Thread Model
//!
//! Clients are served one after another. A [`Background`] shift runs one extra
//! thread for the duration of the shift, which only receives the payload.
pub mod board;
pub mod delay;
pub mod device;
pub mod engine;
pub mod handlers;
pub mod lines;
pub mod server;
pub mod sim;
pub mod stream;
pub mod transport;

pub use board::Board;
pub use delay::{DelayFunc, SpinDelay};
pub use device::{Device, SessionEnd};
pub use engine::TapEngine;
pub use lines::{Direction, Line, TapLines};
pub use stream::{Background, Inline, ShiftStream, Strategy};
pub use transport::{Link, Transport};
