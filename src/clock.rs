//! # Always-on timer
//!
//! ## Overview
//!
//! POWMAN counts milliseconds in a 64-bit register that survives dormant
//! mode. It is written through four 16-bit SET_TIME fields and read back as
//! two 32-bit halves.
//!
//! The fields may only change while the counter is stopped, so setting the
//! time always runs stop, write, restart in that order.

use crate::{Error, Powman, reg_access::RegisterBus, soc::TimerCtrl};

/// Oscillator that drives the always-on timer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerClockSource {
    /// Low-power oscillator. Keeps running while dormant.
    #[default]
    Lposc,
    /// Crystal oscillator. More accurate, but stops when the chip goes
    /// dormant.
    Xosc,
}

impl TimerClockSource {
    fn command(self) -> TimerCtrl {
        match self {
            TimerClockSource::Lposc => TimerCtrl::USE_LPOSC,
            TimerClockSource::Xosc => TimerCtrl::USE_XOSC,
        }
    }
}

/// Power manager configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct Config {
    timer_clock_source: TimerClockSource,
    ignore_debugger: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer_clock_source: TimerClockSource::Lposc,
            ignore_debugger: true,
        }
    }
}

impl Config {
    /// Select the oscillator for the always-on timer.
    pub fn with_timer_clock_source(mut self, source: TimerClockSource) -> Self {
        self.timer_clock_source = source;
        self
    }

    /// Whether an attached debugger is prevented from holding the power
    /// domains up. When it is not, sleep requests are silently ignored
    /// under a debug probe.
    pub fn with_ignore_debugger(mut self, ignore: bool) -> Self {
        self.ignore_debugger = ignore;
        self
    }

    /// Oscillator for the always-on timer.
    pub fn timer_clock_source(&self) -> TimerClockSource {
        self.timer_clock_source
    }

    /// Whether an attached debugger is ignored.
    pub fn ignore_debugger(&self) -> bool {
        self.ignore_debugger
    }
}

impl<B: RegisterBus> Powman<B> {
    /// Load the timer with `absolute_time_ms` and start it.
    ///
    /// The value is opaque to the driver; any epoch works as long as it is
    /// not zero.
    pub fn init_time(&mut self, absolute_time_ms: u64) -> Result<(), Error> {
        if absolute_time_ms == 0 {
            return Err(Error::InvalidArgument);
        }

        info!("Initializing time to {} ms", absolute_time_ms);

        self.regs.write_timer(TimerCtrl::empty());
        self.regs
            .write_timer(self.config.timer_clock_source.command());
        self.regs.write_set_time(absolute_time_ms);
        self.regs.write_timer(TimerCtrl::START_FRESH);
        self.regs
            .write_debugger_ignored(self.config.ignore_debugger);

        Ok(())
    }

    /// Current value of the timer in milliseconds.
    ///
    /// The two halves cannot be read atomically. The upper half is read on
    /// both sides of the lower one and the read is repeated until they
    /// agree, so a carry between them is never observed.
    pub fn current_time_ms(&self) -> u64 {
        loop {
            let hi = self.regs.read_time_upper();
            let lo = self.regs.read_time_lower();
            if hi == self.regs.read_time_upper() {
                return (u64::from(hi) << 32) | u64::from(lo);
            }
            core::hint::spin_loop();
        }
    }

    /// Whether the timer is counting.
    pub fn is_timer_running(&self) -> bool {
        self.regs.read_timer().contains(TimerCtrl::RUN)
    }
}
