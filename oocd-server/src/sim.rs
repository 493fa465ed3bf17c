//! Simulated adapter hardware.
//!
//! [`SimulatedLines`] models the pins and a target made of a chain of one-bit bypass
//! registers between TDI and TDO. With no registers, TDO is wired straight to TDI.
//! [`SimulatedBoard`] keeps the feature switches and returns fixed ADC readings.
//!
//! Both are cheap handles to shared state, so a clone can be kept to inspect
//! the hardware while another handle is owned by a running server.
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use oocd_protocol::{AdcChannel, AdcReadings};

use crate::{
    board::Board,
    lines::{Direction, Line, TapLines},
};

/// Configuration and latch of a single simulated pin
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LineState {
    pub level: bool,
    pub direction: Direction,
    pub open_drain: bool,
}

#[derive(Debug, Default)]
struct Target {
    pins: [LineState; 6],
    bypass: VecDeque<bool>,
    tdo: bool,
    tms_trace: Vec<bool>,
    tdi_trace: Vec<bool>,
}

impl Target {
    /// What the target sees on `line`. Undriven lines read low.
    fn wire(&self, line: Line) -> bool {
        let pin = self.pins[line.index()];
        pin.direction == Direction::Output && pin.level
    }

    fn rising_edge(&mut self) {
        let tdi = self.wire(Line::Tdi);
        self.tms_trace.push(self.wire(Line::Tms));
        self.tdi_trace.push(tdi);
        if !self.bypass.is_empty() {
            self.bypass.pop_back();
            self.bypass.push_front(tdi);
        }
    }

    fn falling_edge(&mut self) {
        if let Some(last) = self.bypass.back() {
            self.tdo = *last;
        }
    }
}

#[derive(Clone, Debug)]
pub struct SimulatedLines<const TRST: bool = true> {
    target: Arc<Mutex<Target>>,
}

impl SimulatedLines<true> {
    /// Lines in front of `bypass_registers` chained bypass registers.
    pub fn new(bypass_registers: usize) -> SimulatedLines<true> {
        SimulatedLines::with_bypass(bypass_registers)
    }

    /// TDO tied directly to TDI
    pub fn wired() -> SimulatedLines<true> {
        SimulatedLines::with_bypass(0)
    }
}

impl<const TRST: bool> SimulatedLines<TRST> {
    pub fn with_bypass(bypass_registers: usize) -> SimulatedLines<TRST> {
        let target = Target {
            bypass: VecDeque::from(vec![false; bypass_registers]),
            ..Target::default()
        };
        SimulatedLines {
            target: Arc::new(Mutex::new(target)),
        }
    }

    fn target(&self) -> MutexGuard<'_, Target> {
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn line(&self, line: Line) -> LineState {
        self.target().pins[line.index()]
    }

    /// State of all lines, in [`Line::ALL`] order
    pub fn snapshot(&self) -> [LineState; 6] {
        self.target().pins
    }

    /// TMS as seen by the target at every rising TCK edge
    pub fn tms_trace(&self) -> Vec<bool> {
        self.target().tms_trace.clone()
    }

    /// TDI as seen by the target at every rising TCK edge
    pub fn tdi_trace(&self) -> Vec<bool> {
        self.target().tdi_trace.clone()
    }

    pub fn rising_edges(&self) -> usize {
        self.target().tms_trace.len()
    }

    pub fn clear_traces(&self) {
        let mut target = self.target();
        target.tms_trace.clear();
        target.tdi_trace.clear();
    }
}

impl<const TRST: bool> TapLines for SimulatedLines<TRST> {
    const HAS_TRST: bool = TRST;

    fn set_level(&mut self, line: Line, high: bool) {
        let mut target = self.target();
        let before = target.wire(line);
        target.pins[line.index()].level = high;
        if line == Line::Tck {
            match (before, target.wire(Line::Tck)) {
                (false, true) => target.rising_edge(),
                (true, false) => target.falling_edge(),
                _ => {}
            }
        }
    }

    fn level(&mut self, line: Line) -> bool {
        let target = self.target();
        match line {
            Line::Tdo if target.bypass.is_empty() => target.wire(Line::Tdi),
            Line::Tdo => target.tdo,
            other => target.pins[other.index()].level,
        }
    }

    fn set_direction(&mut self, line: Line, direction: Direction) {
        self.target().pins[line.index()].direction = direction;
    }

    fn set_open_drain(&mut self, line: Line, enabled: bool) {
        self.target().pins[line.index()].open_drain = enabled;
    }
}

#[derive(Debug, Default)]
struct BoardState {
    led: bool,
    vreg: bool,
    pullups: bool,
    adc_enabled: bool,
    conversions_while_disabled: usize,
    readings: AdcReadings,
}

#[derive(Clone, Debug, Default)]
pub struct SimulatedBoard {
    state: Arc<Mutex<BoardState>>,
}

impl SimulatedBoard {
    /// A board whose ADC always converts to `readings`
    pub fn new(readings: AdcReadings) -> SimulatedBoard {
        SimulatedBoard {
            state: Arc::new(Mutex::new(BoardState {
                readings,
                ..BoardState::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn led(&self) -> bool {
        self.state().led
    }

    pub fn vreg(&self) -> bool {
        self.state().vreg
    }

    pub fn pullups(&self) -> bool {
        self.state().pullups
    }

    pub fn adc_enabled(&self) -> bool {
        self.state().adc_enabled
    }

    /// Number of conversions requested while the ADC was powered down
    pub fn conversions_while_disabled(&self) -> usize {
        self.state().conversions_while_disabled
    }
}

impl Board for SimulatedBoard {
    fn set_led(&mut self, on: bool) {
        self.state().led = on;
    }

    fn set_vreg(&mut self, on: bool) {
        self.state().vreg = on;
    }

    fn set_pullups(&mut self, on: bool) {
        self.state().pullups = on;
    }

    fn set_adc_enabled(&mut self, enabled: bool) {
        self.state().adc_enabled = enabled;
    }

    fn read_adc(&mut self, channel: AdcChannel) -> u16 {
        let mut state = self.state();
        if !state.adc_enabled {
            state.conversions_while_disabled += 1;
            return 0;
        }
        state.readings.get(channel)
    }
}
