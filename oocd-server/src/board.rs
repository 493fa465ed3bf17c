use oocd_protocol::AdcChannel;

/// Board peripherals that are not part of the TAP: indicator, supplies and the ADC.
pub trait Board {
    fn set_led(&mut self, on: bool);

    /// Switches the on-board voltage regulators
    fn set_vreg(&mut self, on: bool);

    /// Connects or disconnects the pull-up resistors of the I/O lines
    fn set_pullups(&mut self, on: bool);

    /// Powers the analog sampling facility up or down
    fn set_adc_enabled(&mut self, enabled: bool);

    /// Converts a single channel. Only meaningful while the ADC is enabled.
    fn read_adc(&mut self, channel: AdcChannel) -> u16;
}
