//! The pins of the Test Access Port as seen by the adapter.

/// A single JTAG or reset signal.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Line {
    Tck,
    Tms,
    Tdi,
    Tdo,
    Srst,
    Trst,
}

impl Line {
    pub const ALL: [Line; 6] = [
        Line::Tck,
        Line::Tms,
        Line::Tdi,
        Line::Tdo,
        Line::Srst,
        Line::Trst,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Line::Tck => 0,
            Line::Tms => 1,
            Line::Tdi => 2,
            Line::Tdo => 3,
            Line::Srst => 4,
            Line::Trst => 5,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    #[default]
    Input,
    Output,
}

/// Capability to drive and sample the TAP lines.
///
/// This is the only way the shift engine touches hardware. Implementations map each
/// [`Line`] to a concrete pin; the engine never sees register addresses.
/// Pin access is assumed to be infallible.
pub trait TapLines {
    /// Whether a TRST line is wired. Adapters without one skip every TRST operation.
    const HAS_TRST: bool = true;

    /// Sets the output latch of `line`. Takes effect on the wire only while the line is an output.
    fn set_level(&mut self, line: Line, high: bool);

    /// Samples the current level of `line`.
    fn level(&mut self, line: Line) -> bool;

    fn set_direction(&mut self, line: Line, direction: Direction);

    /// With open-drain enabled the line is only ever pulled low and floats when high.
    fn set_open_drain(&mut self, line: Line, enabled: bool);
}
