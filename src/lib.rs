//! Bare-metal (`no_std`) driver for the always-on power manager (POWMAN)
//! of the RP2350.
//!
//! ## Overview
//!
//! POWMAN keeps a 64-bit millisecond counter running while the rest of the
//! chip is powered down, and can power the switched core back up when that
//! counter reaches an alarm value or when a GPIO sees an edge. This crate
//! sets and reads the counter, arms one of those wake sources, and puts the
//! chip into its dormant state.
//!
//! Waking from dormant is a reset: execution restarts at the normal boot
//! entry point, never at the instruction after the sleep call. The sleep
//! operations therefore never return on success.
//!
//! ## Examples
//!
//! ### Sleep for two seconds
//!
//! ```rust, no_run
//! use core::time::Duration;
//!
//! use rp_powman::{Config, Powman};
//!
//! let mut powman = Powman::take(Config::default()).unwrap();
//! powman.init_time(1_704_067_200).unwrap();
//!
//! // ... the application's work for this boot ...
//!
//! let Err(err) = powman.sleep_for(Duration::from_millis(2000));
//! panic!("cannot sleep: {err}");
//! ```
//!
//! ### Sleep until GPIO 15 rises
//!
//! ```rust, no_run
//! use rp_powman::{Config, Powman};
//!
//! let mut powman = Powman::take(Config::default()).unwrap();
//! let Err(err) = powman.sleep_until_gpio_edge(15);
//! panic!("cannot sleep: {err}");
//! ```
//!
//! ## Feature Flags
#![doc = document_features::document_features!()]
#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

use core::sync::atomic::{AtomicBool, Ordering};

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod clock;
#[cfg(any(test, feature = "emulation"))]
pub mod emulation;
pub mod reg_access;
pub mod sleep;
#[allow(missing_docs)]
pub mod soc;

pub use self::{
    clock::{Config, TimerClockSource},
    reg_access::{Mmio, RegisterBus, Registers},
    sleep::{GpioWakeupSource, TimerWakeupSource, WakeEdge, WakeSource, WakeupCause},
};

/// Errors reported by the driver.
///
/// Every check runs before the first register write, so an error means the
/// hardware was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// A time or duration was zero, or a GPIO index was out of range.
    InvalidArgument,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

impl core::error::Error for Error {}

mod private {
    pub trait Sealed {}
}

static TAKEN: AtomicBool = AtomicBool::new(false);

/// Owned handle to the power manager.
///
/// There is one register block, so there should be one handle; every
/// operation that touches POWMAN borrows it mutably.
#[derive(Debug)]
pub struct Powman<B: RegisterBus> {
    pub(crate) regs: Registers<B>,
    pub(crate) config: Config,
}

impl Powman<Mmio> {
    /// Create the handle over the real hardware.
    ///
    /// Returns `None` if it was already taken.
    pub fn take(config: Config) -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }

        Some(Self::new(unsafe { Mmio::steal() }, config))
    }
}

impl<B: RegisterBus> Powman<B> {
    /// Create a handle over `bus`.
    ///
    /// Nothing is written until one of the operations is called.
    pub const fn new(bus: B, config: Config) -> Self {
        Self {
            regs: Registers::new(bus),
            config,
        }
    }

    /// The configuration this handle was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Borrow the underlying bus.
    pub fn bus(&self) -> &B {
        self.regs.bus()
    }

    /// Give the bus back.
    pub fn release(self) -> B {
        self.regs.release()
    }

    /// Whether the power manager dropped a write for lack of the password
    /// since the flag was last cleared.
    pub fn bad_password_seen(&self) -> bool {
        self.regs.read_badpasswd() & soc::BADPASSWD_FLAG != 0
    }
}
