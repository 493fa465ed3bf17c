/// Busy-wait used between TCK half cycles.
pub trait DelayFunc {
    fn cycle_delay(&self, cycles: u32);
}

/// Spins the CPU for the requested number of iterations.
#[derive(Copy, Clone, Debug, Default)]
pub struct SpinDelay;

impl DelayFunc for SpinDelay {
    #[inline]
    fn cycle_delay(&self, cycles: u32) {
        for _ in 0..cycles {
            core::hint::spin_loop();
        }
    }
}

impl<F: Fn(u32)> DelayFunc for F {
    fn cycle_delay(&self, cycles: u32) {
        self(cycles)
    }
}
