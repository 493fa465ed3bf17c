//! # TAP shift engine
//!
//! Clocks TDI/TMS bit-pairs through the Test Access Port and samples TDO.
//!
//! Every bit-pair is one TCK period:
//!
//! 1. TCK low
//! 2. TDI and TMS take the next bits
//! 3. half-cycle delay
//! 4. TCK high, TDO is sampled on this edge
//! 5. half-cycle delay
//!
//! The payload is processed in chunks of [`CHUNK_BITS`] bit-pairs. Each chunk waits
//! only for its own payload bytes and its samples are flushed before the next chunk
//! starts, so the engine never holds more than one chunk regardless of the shift length.
use std::io;

use oocd_protocol::{CHUNK_BITS, ShiftRequest, lane_bytes};

use crate::{
    delay::{DelayFunc, SpinDelay},
    lines::{Line, TapLines},
    stream::ShiftStream,
};

/// The shift engine together with the lines it drives and its clock configuration.
#[derive(Debug)]
pub struct TapEngine<L, D = SpinDelay> {
    lines: L,
    #[cfg_attr(not(feature = "delay"), allow(dead_code))]
    delay: D,
    half_cycle_delay: u16,
}

impl<L: TapLines> TapEngine<L, SpinDelay> {
    pub fn with_lines(lines: L) -> TapEngine<L, SpinDelay> {
        TapEngine::new(lines, SpinDelay)
    }
}

impl<L: TapLines, D: DelayFunc> TapEngine<L, D> {
    /// The half-cycle delay in effect until the host sets one
    pub const DEFAULT_DELAY: u16 = 1;

    pub fn new(lines: L, delay: D) -> TapEngine<L, D> {
        TapEngine {
            lines,
            delay,
            half_cycle_delay: Self::DEFAULT_DELAY,
        }
    }

    /// Busy-wait iterations between two TCK edges
    pub fn half_cycle_delay(&self) -> u16 {
        self.half_cycle_delay
    }

    /// Changes the clock period of all following shifts.
    pub fn set_half_cycle_delay(&mut self, delay: u16) {
        self.half_cycle_delay = delay;
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }

    /// Clocks all bit-pairs of `request`.
    ///
    /// The payload is pulled from `stream` chunk by chunk and never beyond
    /// [`ShiftRequest::payload_len`]. Exactly [`ShiftRequest::sample_len`] bytes
    /// of TDO samples are flushed back, least significant bit first.
    pub fn shift(&mut self, request: &ShiftRequest, stream: &mut dyn ShiftStream) -> io::Result<()> {
        for (index, bits) in request.chunks().enumerate() {
            let bytes = lane_bytes(bits);
            let (tdi, tms) = unpack_lanes(stream.wait_for(2 * bytes)?);
            let tdo = self.clock_chunk(bits, tdi, tms);
            log::trace!(
                "Chunk {}: bits={}, tdi={:04x}, tms={:04x}, tdo={:04x}",
                index,
                bits,
                tdi,
                tms,
                tdo
            );
            stream.flush(&tdo.to_le_bytes()[..bytes])?;
        }
        Ok(())
    }

    /// Clocks up to [`CHUNK_BITS`] bit-pairs and returns the right-aligned samples.
    fn clock_chunk(&mut self, bits: u16, mut tdi: u16, mut tms: u16) -> u16 {
        debug_assert!(bits > 0 && bits <= CHUNK_BITS);
        let mut tdo = 0u16;
        for _ in 0..bits {
            self.lines.set_level(Line::Tck, false);
            self.lines.set_level(Line::Tdi, tdi & 1 != 0);
            tdi >>= 1;
            self.lines.set_level(Line::Tms, tms & 1 != 0);
            tms >>= 1;
            self.half_cycle_wait();

            self.lines.set_level(Line::Tck, true);
            // most recent sample enters at the top
            tdo >>= 1;
            if self.lines.level(Line::Tdo) {
                tdo |= 1 << (CHUNK_BITS - 1);
            }
            self.half_cycle_wait();
        }
        tdo >> (CHUNK_BITS - bits)
    }

    #[inline(always)]
    fn half_cycle_wait(&self) {
        #[cfg(feature = "delay")]
        self.delay.cycle_delay(u32::from(self.half_cycle_delay));
    }
}

/// Splits interleaved chunk bytes `[tdi_0, tms_0, tdi_1, tms_1]` into the two lanes.
fn unpack_lanes(data: &[u8]) -> (u16, u16) {
    let byte = |index: usize| data.get(index).copied().unwrap_or(0);
    (
        u16::from_le_bytes([byte(0), byte(2)]),
        u16::from_le_bytes([byte(1), byte(3)]),
    )
}
