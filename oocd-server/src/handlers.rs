//! The simple commands: pin mode, feature switches and telemetry.
use oocd_protocol::{AdcChannel, AdcReadings, Feature, PinMode};

use crate::{
    board::Board,
    lines::{Direction, Line, TapLines},
};

/// The lines the adapter drives in JTAG mode.
fn driven_lines<L: TapLines>() -> impl Iterator<Item = Line> {
    [Line::Tms, Line::Tdi, Line::Tck, Line::Srst]
        .into_iter()
        .chain(L::HAS_TRST.then_some(Line::Trst))
}

/// Puts the lines into `mode`.
///
/// The driven lines are latched low before anything else changes, so switching to an
/// output never produces a high glitch. TDO is an input in every mode.
pub fn configure_pins<L: TapLines>(lines: &mut L, mode: PinMode) {
    for line in driven_lines::<L>() {
        lines.set_level(line, false);
    }
    for line in driven_lines::<L>() {
        lines.set_open_drain(line, mode.open_drain());
    }
    let direction = if mode.drives_outputs() {
        Direction::Output
    } else {
        Direction::Input
    };
    for line in driven_lines::<L>() {
        lines.set_direction(line, direction);
    }
    lines.set_direction(Line::Tdo, Direction::Input);
}

/// Switches a single feature. Any non-zero `action` turns it on.
///
/// Returns the feature that was applied, `None` if the identifier is unknown
/// (or names TRST on an adapter without one) and nothing changed.
pub fn apply_feature<L: TapLines, B: Board>(
    lines: &mut L,
    board: &mut B,
    feature: u8,
    action: u8,
) -> Option<Feature> {
    let on = action != 0;
    let feature = Feature::from_id(feature)?;
    match feature {
        Feature::Led => board.set_led(on),
        Feature::Vreg => board.set_vreg(on),
        Feature::Pullup => board.set_pullups(on),
        Feature::Srst => lines.set_level(Line::Srst, on),
        Feature::Trst if L::HAS_TRST => lines.set_level(Line::Trst, on),
        Feature::Trst => return None,
    }
    Some(feature)
}

/// Samples all telemetry channels in reply order with the ADC powered only for the duration.
pub fn read_adcs<B: Board>(board: &mut B) -> AdcReadings {
    board.set_adc_enabled(true);
    let mut readings = AdcReadings::default();
    for channel in AdcChannel::REPLY_ORDER {
        readings.set(channel, board.read_adc(channel));
    }
    board.set_adc_enabled(false);
    readings
}
