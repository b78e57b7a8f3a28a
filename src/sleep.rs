//! # Dormant mode
//!
//! ## Overview
//!
//! A sleep request arms exactly one wake source and then powers down the
//! switched core, the XIP cache and both SRAM banks. The only way back is
//! the armed source triggering a power-up, which restarts the processor
//! from the boot ROM.
//!
//! The sequence is:
//!
//! * arm the wake source ([`TimerWakeupSource`] or [`GpioWakeupSource`]);
//! * switch the regulator to its low-power mode;
//! * zero the four boot vectors, so the wake-up takes the normal boot path
//!   instead of jumping to a stale entry point;
//! * request the power-down and wait for interrupt.
//!
//! Once the power-down request is written there is nothing left to cancel.

use core::{convert::Infallible, time::Duration};

use crate::{
    Error,
    Powman,
    private,
    reg_access::RegisterBus,
    soc::{Inte, MAX_WAKE_GPIO, PadCtrl, PowerDomains, Pwrup, TimerCtrl, last_pwrup},
};

/// Something that can bring the chip out of dormant mode.
///
/// Implemented by the wake sources of this crate.
pub trait WakeSource: private::Sealed {
    /// Program the hardware so this source powers the chip back up.
    fn apply<B: RegisterBus>(&self, powman: &mut Powman<B>);
}

/// Wake up when the always-on timer reaches an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerWakeupSource {
    duration_ms: u64,
}

impl TimerWakeupSource {
    /// Wake up `duration` after the sleep request.
    ///
    /// The timer counts whole milliseconds; anything below one millisecond
    /// is rejected.
    pub fn new(duration: Duration) -> Result<Self, Error> {
        Self::from_millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Wake up `duration_ms` milliseconds after the sleep request.
    pub fn from_millis(duration_ms: u64) -> Result<Self, Error> {
        if duration_ms == 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(Self { duration_ms })
    }

    /// Requested sleep time in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

impl private::Sealed for TimerWakeupSource {}

impl WakeSource for TimerWakeupSource {
    fn apply<B: RegisterBus>(&self, powman: &mut Powman<B>) {
        // Wraps instead of saturating; no realistic duration gets near it.
        let alarm_ms = powman.current_time_ms().wrapping_add(self.duration_ms);
        debug!("Alarm at {} ms", alarm_ms);

        let regs = &mut powman.regs;
        regs.enable_interrupts(Inte::TIMER);
        // A running counter could match a half-written alarm.
        regs.write_timer(TimerCtrl::empty());
        regs.write_alarm_time(alarm_ms);
        regs.write_timer(TimerCtrl::START_ALARM);
    }
}

/// Edge that wakes the chip.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeEdge {
    /// Low to high. The pad is pulled down while waiting.
    #[default]
    Rising,
    /// High to low. The pad is pulled up while waiting.
    Falling,
}

impl WakeEdge {
    fn pad_ctrl(self) -> PadCtrl {
        let pull = match self {
            WakeEdge::Rising => PadCtrl::PDE,
            WakeEdge::Falling => PadCtrl::PUE,
        };
        PadCtrl::IE | PadCtrl::SCHMITT | pull
    }

    fn polarity(self) -> Pwrup {
        match self {
            WakeEdge::Rising => Pwrup::POLARITY,
            WakeEdge::Falling => Pwrup::empty(),
        }
    }
}

/// Wake up on an edge of a GPIO pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpioWakeupSource {
    gpio: u8,
    edge: WakeEdge,
}

impl GpioWakeupSource {
    /// Wake up on a rising edge of `gpio` (0..=50).
    pub fn new(gpio: u8) -> Result<Self, Error> {
        Self::with_edge(gpio, WakeEdge::Rising)
    }

    /// Wake up on the given `edge` of `gpio` (0..=50).
    pub fn with_edge(gpio: u8, edge: WakeEdge) -> Result<Self, Error> {
        if gpio > MAX_WAKE_GPIO {
            return Err(Error::InvalidArgument);
        }
        Ok(Self { gpio, edge })
    }

    /// The GPIO index.
    pub fn gpio(&self) -> u8 {
        self.gpio
    }

    /// The edge that wakes the chip.
    pub fn edge(&self) -> WakeEdge {
        self.edge
    }
}

impl private::Sealed for GpioWakeupSource {}

impl WakeSource for GpioWakeupSource {
    fn apply<B: RegisterBus>(&self, powman: &mut Powman<B>) {
        debug!("Arming GPIO{} as wake source", self.gpio);

        let regs = &mut powman.regs;
        regs.write_pad(self.gpio, self.edge.pad_ctrl());
        // This enable goes in without the password.
        regs.enable_interrupts_unprotected(Inte::PWRUP_WHILE_WAITING);
        regs.write_pwrup(
            0,
            Pwrup::ENABLE
                | Pwrup::MODE
                | self.edge.polarity()
                | Pwrup::from_bits_truncate(u16::from(self.gpio)),
        );
    }
}

/// What powered the switched core up last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeupCause {
    /// Cold boot or a chip-level reset; not a wake from dormant.
    ChipReset,
    /// A GPIO armed in the given PWRUP slot.
    Gpio(u8),
    /// A debugger requested power-up.
    Debugger,
    /// The timer alarm.
    Alarm,
    /// A value the driver does not know.
    Unknown(u32),
}

impl WakeupCause {
    fn from_raw(raw: u32) -> Self {
        match raw {
            last_pwrup::CHIP_RESET => WakeupCause::ChipReset,
            last_pwrup::PWRUP0..=last_pwrup::PWRUP3 => {
                WakeupCause::Gpio((raw - last_pwrup::PWRUP0) as u8)
            }
            last_pwrup::CORESIGHT => WakeupCause::Debugger,
            last_pwrup::ALARM => WakeupCause::Alarm,
            other => WakeupCause::Unknown(other),
        }
    }
}

impl<B: RegisterBus> Powman<B> {
    /// Enter dormant mode and wake up on `wake_source`.
    ///
    /// Does not return: the wake-up resets the chip and execution starts
    /// over from the program entry point.
    pub fn sleep_deep(&mut self, wake_source: &impl WakeSource) -> ! {
        self.sleep(wake_source);
        // An interrupt pending before the power-down took effect.
        loop {
            self.regs.wait_for_interrupt();
        }
    }

    /// Arm `wake_source` and request dormant mode.
    ///
    /// On hardware this only returns if the wait instruction retires before
    /// the power-down lands. Prefer [`Powman::sleep_deep`] unless the bus is
    /// simulated.
    pub fn sleep(&mut self, wake_source: &impl WakeSource) {
        // Sticky; drop whatever earlier code left so the check below only
        // reports this sequence.
        #[cfg(debug_assertions)]
        self.regs.clear_badpasswd();

        wake_source.apply(self);

        #[cfg(debug_assertions)]
        if self.bad_password_seen() {
            warn!("POWMAN dropped a write without password; the sleep request may be ignored");
        }

        self.power_off();
    }

    /// Sleep for `duration`.
    ///
    /// Fails without touching the hardware if `duration` is shorter than
    /// one millisecond. Otherwise it does not return.
    pub fn sleep_for(&mut self, duration: Duration) -> Result<Infallible, Error> {
        let source = TimerWakeupSource::new(duration)?;
        info!("Going to sleep for {} ms", source.duration_ms());
        self.sleep_deep(&source)
    }

    /// Sleep for `duration_ms` milliseconds. See [`Powman::sleep_for`].
    pub fn sleep_for_ms(&mut self, duration_ms: u64) -> Result<Infallible, Error> {
        self.sleep_for(Duration::from_millis(duration_ms))
    }

    /// Sleep until `gpio` sees a rising edge.
    ///
    /// Fails without touching the hardware if `gpio` is above 50.
    /// Otherwise it does not return.
    pub fn sleep_until_gpio_edge(&mut self, gpio: u8) -> Result<Infallible, Error> {
        let source = GpioWakeupSource::new(gpio)?;
        info!("Going to sleep until GPIO{} rises", gpio);
        self.sleep_deep(&source)
    }

    /// Decode what powered the switched core up most recently.
    pub fn last_wakeup_cause(&self) -> WakeupCause {
        WakeupCause::from_raw(self.regs.read_last_pwrup())
    }

    fn power_off(&mut self) {
        debug!("Entering dormant state");

        self.regs.enter_low_power_regulator();
        self.regs.clear_boot_vectors();
        self.regs.request_power_down(PowerDomains::DORMANT);
        self.regs.wait_for_interrupt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Config,
        emulation::{Event, SimulatedBus},
        reg_access::RegisterBus,
        soc::{PASSWORD, PASSWORD_MASK, POWMAN_BASE, offset, pad_address},
    };

    fn boot_vector_addresses() -> [u32; 4] {
        offset::BOOT.map(|boot| POWMAN_BASE + boot)
    }

    #[test]
    fn zero_duration_is_rejected_without_writing() {
        let mut sim = SimulatedBus::new();
        let mut powman = Powman::new(&mut sim, Config::default());

        assert_eq!(powman.sleep_for_ms(0), Err(Error::InvalidArgument));
        assert_eq!(
            powman.sleep_for(Duration::from_micros(999)),
            Err(Error::InvalidArgument)
        );
        assert!(sim.events().is_empty());
    }

    #[test]
    fn out_of_range_gpio_is_rejected_without_writing() {
        let mut sim = SimulatedBus::new();
        let mut powman = Powman::new(&mut sim, Config::default());

        assert_eq!(powman.sleep_until_gpio_edge(51), Err(Error::InvalidArgument));
        assert_eq!(powman.sleep_until_gpio_edge(u8::MAX), Err(Error::InvalidArgument));
        assert!(sim.events().is_empty());
    }

    #[test]
    fn gpio_bounds_are_inclusive() {
        for gpio in [0, MAX_WAKE_GPIO] {
            let mut sim = SimulatedBus::new();
            let mut powman = Powman::new(&mut sim, Config::default());

            powman.sleep(&GpioWakeupSource::new(gpio).unwrap());

            assert_eq!(sim.pad(gpio), 0x46);
            assert_eq!(
                sim.register(offset::PWRUP0),
                0x1C0 | u32::from(gpio)
            );
            assert_eq!(sim.events().last(), Some(&Event::WaitForInterrupt));
            assert!(!sim.bad_password());
        }
    }

    #[test]
    fn gpio_sleep_write_sequence() {
        let mut sim = SimulatedBus::new();
        let mut powman = Powman::new(&mut sim, Config::default());

        powman.sleep(&GpioWakeupSource::new(15).unwrap());

        let protected = |off: u32, payload: u32| Event::Write {
            address: POWMAN_BASE + off,
            value: PASSWORD | payload,
        };
        let raw = |address: u32, value: u32| Event::Write { address, value };

        let mut expected = Vec::new();
        if cfg!(debug_assertions) {
            expected.push(protected(offset::BADPASSWD, 0x01));
        }
        expected.extend([
            raw(pad_address(15), 0x46),
            raw(POWMAN_BASE + offset::INTE, 0x08),
            protected(offset::PWRUP0, 0x1C0 | 15),
            protected(offset::VREG_LP_ENTRY, 0x04),
            raw(POWMAN_BASE + offset::BOOT0, 0),
            raw(POWMAN_BASE + offset::BOOT1, 0),
            raw(POWMAN_BASE + offset::BOOT2, 0),
            raw(POWMAN_BASE + offset::BOOT3, 0),
            protected(offset::STATE, 0xF0),
            Event::WaitForInterrupt,
        ]);
        assert_eq!(sim.events(), expected.as_slice());
    }

    #[test]
    fn falling_edge_pulls_up_and_clears_polarity() {
        let mut sim = SimulatedBus::new();
        let mut powman = Powman::new(&mut sim, Config::default());

        powman.sleep(&GpioWakeupSource::with_edge(3, WakeEdge::Falling).unwrap());

        assert_eq!(sim.pad(3), 0x4A);
        assert_eq!(sim.register(offset::PWRUP0), 0x140 | 3);
    }

    #[test]
    fn timer_sleep_write_sequence() {
        let mut sim = SimulatedBus::new().with_running_counter(10_000);
        let mut powman = Powman::new(&mut sim, Config::default());

        powman.sleep(&TimerWakeupSource::from_millis(0x0001_0000).unwrap());

        let protected = |off: u32, payload: u32| Event::Write {
            address: POWMAN_BASE + off,
            value: PASSWORD | payload,
        };
        let raw = |address: u32, value: u32| Event::Write { address, value };
        let alarm = 10_000 + 0x0001_0000;

        let mut expected = Vec::new();
        if cfg!(debug_assertions) {
            expected.push(protected(offset::BADPASSWD, 0x01));
        }
        expected.extend([
            protected(offset::INTE, 0x02),
            protected(offset::TIMER, 0x00),
            protected(offset::ALARM_TIME_15TO0, alarm & 0xFFFF),
            protected(offset::ALARM_TIME_31TO16, alarm >> 16),
            protected(offset::ALARM_TIME_47TO32, 0),
            protected(offset::ALARM_TIME_63TO48, 0),
            protected(offset::TIMER, 0x72),
            protected(offset::VREG_LP_ENTRY, 0x04),
            raw(POWMAN_BASE + offset::BOOT0, 0),
            raw(POWMAN_BASE + offset::BOOT1, 0),
            raw(POWMAN_BASE + offset::BOOT2, 0),
            raw(POWMAN_BASE + offset::BOOT3, 0),
            protected(offset::STATE, 0xF0),
            Event::WaitForInterrupt,
        ]);
        assert_eq!(sim.events(), expected.as_slice());
        assert!(!sim.written_while_running());
        assert!(sim.running());
    }

    fn with_stale_boot_vectors() -> SimulatedBus {
        let mut sim = SimulatedBus::new();
        for (i, address) in boot_vector_addresses().into_iter().enumerate() {
            sim.write(address, 0x2000_0000 + i as u32);
        }
        sim.clear_events();
        sim
    }

    #[test]
    fn boot_vectors_are_zero_at_the_wait() {
        let mut sim = with_stale_boot_vectors();
        Powman::new(&mut sim, Config::default())
            .sleep(&TimerWakeupSource::from_millis(5).unwrap());
        assert_eq!(sim.boot_vectors_at_wait(), Some([0; 4]));

        let mut sim = with_stale_boot_vectors();
        Powman::new(&mut sim, Config::default()).sleep(&GpioWakeupSource::new(9).unwrap());
        assert_eq!(sim.boot_vectors_at_wait(), Some([0; 4]));
    }

    #[test]
    fn protected_and_unprotected_writes_are_split_as_expected() {
        let mut sim = SimulatedBus::new().with_tick(3);
        let mut powman = Powman::new(&mut sim, Config::default());
        powman.init_time(1_704_067_200).unwrap();
        powman.sleep(&TimerWakeupSource::from_millis(2000).unwrap());
        powman.sleep(&GpioWakeupSource::new(21).unwrap());

        let unprotected = boot_vector_addresses();
        for (address, value) in sim.writes() {
            if unprotected.contains(&address) {
                assert_eq!(value, 0);
            } else if address == POWMAN_BASE + offset::INTE && value & PASSWORD_MASK == 0 {
                assert_eq!(value, u32::from(Inte::PWRUP_WHILE_WAITING.bits()));
            } else if address == pad_address(21) {
                assert_eq!(value & PASSWORD_MASK, 0);
            } else {
                assert_eq!(value & PASSWORD_MASK, PASSWORD, "write to {address:#x}");
            }
        }
        assert!(!sim.bad_password());
    }

    #[test]
    fn end_to_end_timer_sleep() {
        let mut sim = SimulatedBus::new().with_tick(7);
        let mut powman = Powman::new(&mut sim, Config::default());

        powman.init_time(1_704_067_200).unwrap();
        let before = powman.current_time_ms();
        assert!(before >= 1_704_067_200);

        powman.sleep(&TimerWakeupSource::new(Duration::from_millis(2000)).unwrap());

        // The sequencer read the clock once, right after `before` was taken.
        let alarm = 2000 + before + 7;
        assert_eq!(sim.alarm_time(), alarm);
        assert_eq!(sim.register(offset::ALARM_TIME_15TO0), (alarm & 0xFFFF) as u32);
        assert_eq!(sim.register(offset::ALARM_TIME_31TO16), ((alarm >> 16) & 0xFFFF) as u32);
        assert_eq!(sim.register(offset::ALARM_TIME_47TO32), ((alarm >> 32) & 0xFFFF) as u32);
        assert_eq!(sim.register(offset::ALARM_TIME_63TO48), ((alarm >> 48) & 0xFFFF) as u32);
        assert_eq!(sim.boot_vectors_at_wait(), Some([0; 4]));
    }

    #[test]
    fn alarm_wraps_around() {
        let sim = SimulatedBus::new().with_running_counter(u64::MAX - 1);
        let mut powman = Powman::new(sim, Config::default());

        powman.sleep(&TimerWakeupSource::from_millis(3).unwrap());

        assert_eq!(powman.bus().alarm_time(), 1);
    }

    #[test]
    fn duration_is_truncated_to_milliseconds() {
        let source = TimerWakeupSource::new(Duration::from_micros(2_500)).unwrap();
        assert_eq!(source.duration_ms(), 2);
    }

    #[test]
    fn wakeup_cause_decoding() {
        let cases = [
            (0, WakeupCause::ChipReset),
            (1, WakeupCause::Gpio(0)),
            (4, WakeupCause::Gpio(3)),
            (5, WakeupCause::Debugger),
            (6, WakeupCause::Alarm),
            (9, WakeupCause::Unknown(9)),
        ];

        for (raw, cause) in cases {
            let powman = Powman::new(SimulatedBus::new().with_last_pwrup(raw), Config::default());
            assert_eq!(powman.last_wakeup_cause(), cause);
        }
    }

    #[test]
    fn wake_sources_report_their_settings() {
        let gpio = GpioWakeupSource::with_edge(12, WakeEdge::Falling).unwrap();
        assert_eq!(gpio.gpio(), 12);
        assert_eq!(gpio.edge(), WakeEdge::Falling);
        assert_eq!(GpioWakeupSource::new(12).unwrap().edge(), WakeEdge::Rising);
        assert_eq!(TimerWakeupSource::from_millis(2000).unwrap().duration_ms(), 2000);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn stale_bad_password_flag_is_cleared_before_arming() {
        let mut sim = SimulatedBus::new();
        sim.write(POWMAN_BASE + offset::STATE, 0x00F0);
        assert!(sim.bad_password());
        sim.clear_events();

        Powman::new(&mut sim, Config::default())
            .sleep(&TimerWakeupSource::from_millis(10).unwrap());

        assert_eq!(
            sim.writes().next(),
            Some((POWMAN_BASE + offset::BADPASSWD, PASSWORD | 0x01))
        );
        assert!(!sim.bad_password());
        assert_eq!(sim.register(offset::STATE), 0x00F0);
    }
}
