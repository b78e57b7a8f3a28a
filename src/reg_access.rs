//! # Register access
//!
//! ## Overview
//!
//! Every access to the power manager goes through [`Registers`]. POWMAN
//! drops any write whose upper half is not [`PASSWORD`], so
//! [`Registers`] takes only the 16-bit payload for those registers and
//! ORs the password in itself. Call sites cannot forget it and cannot
//! supply the wrong one.
//!
//! A few registers are written without the password: the boot vectors,
//! the pad controls (a different block) and the interrupt enable armed by
//! the GPIO wake path.
//!
//! The physical transport is abstracted by [`RegisterBus`]: [`Mmio`]
//! performs volatile loads and stores at the real addresses, while
//! [`crate::emulation::SimulatedBus`] models the block in memory.

#[cfg(debug_assertions)]
use crate::soc::BADPASSWD_FLAG;
use crate::soc::{
    DBG_PWRCFG_IGNORE,
    Inte,
    PASSWORD,
    POWMAN_BASE,
    PadCtrl,
    PowerDomains,
    Pwrup,
    TimerCtrl,
    VREG_LP_ENTRY_MODE_LOW_POWER,
    offset,
    pad_address,
};

/// Transport for 32-bit register traffic.
pub trait RegisterBus {
    /// Load the word at the absolute `address`.
    fn read(&self, address: u32) -> u32;

    /// Store `value` at the absolute `address`.
    fn write(&mut self, address: u32, value: u32);

    /// Halt the processor until an event or interrupt.
    fn wait_for_interrupt(&mut self);
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn read(&self, address: u32) -> u32 {
        (**self).read(address)
    }

    fn write(&mut self, address: u32, value: u32) {
        (**self).write(address, value)
    }

    fn wait_for_interrupt(&mut self) {
        (**self).wait_for_interrupt()
    }
}

/// Memory-mapped access to the real hardware.
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Create a bus over the physical register blocks.
    ///
    /// # Safety
    ///
    /// The caller must be running on an RP2350 and must not let any other
    /// code drive the POWMAN or PADS_BANK0 blocks while this bus is in use.
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Mmio {
    #[inline(always)]
    fn read(&self, address: u32) -> u32 {
        unsafe { (address as usize as *const u32).read_volatile() }
    }

    #[inline(always)]
    fn write(&mut self, address: u32, value: u32) {
        unsafe { (address as usize as *mut u32).write_volatile(value) }
    }

    #[inline(always)]
    fn wait_for_interrupt(&mut self) {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "arm")] {
                cortex_m::asm::wfi();
            } else if #[cfg(target_arch = "riscv32")] {
                #[allow(unused_unsafe)]
                unsafe {
                    riscv::asm::wfi();
                }
            } else {
                core::hint::spin_loop();
            }
        }
    }
}

/// Typed accessors over the POWMAN register block.
#[derive(Debug)]
pub struct Registers<B> {
    bus: B,
}

impl<B: RegisterBus> Registers<B> {
    pub(crate) const fn new(bus: B) -> Self {
        Self { bus }
    }

    pub(crate) fn bus(&self) -> &B {
        &self.bus
    }

    pub(crate) fn release(self) -> B {
        self.bus
    }

    fn read(&self, offset: u32) -> u32 {
        self.bus.read(POWMAN_BASE + offset)
    }

    /// The only path for password-qualified writes.
    fn write_protected(&mut self, offset: u32, payload: u16) {
        let value = PASSWORD | u32::from(payload);
        trace!("POWMAN[{:#x}] <= {:#x}", offset, value);
        self.bus.write(POWMAN_BASE + offset, value);
    }

    fn write_unprotected(&mut self, address: u32, value: u32) {
        trace!("[{:#x}] <= {:#x}", address, value);
        self.bus.write(address, value);
    }

    /// Write `value` across four 16-bit fields, least significant first.
    fn write_split(&mut self, fields: [u32; 4], value: u64) {
        for (i, field) in fields.into_iter().enumerate() {
            self.write_protected(field, (value >> (16 * i)) as u16);
        }
    }

    pub(crate) fn write_timer(&mut self, command: TimerCtrl) {
        self.write_protected(offset::TIMER, command.bits());
    }

    pub(crate) fn read_timer(&self) -> TimerCtrl {
        TimerCtrl::from_bits_truncate(self.read(offset::TIMER) as u16)
    }

    /// Counter must be stopped.
    pub(crate) fn write_set_time(&mut self, time_ms: u64) {
        self.write_split(offset::SET_TIME, time_ms);
    }

    /// Counter must be stopped.
    pub(crate) fn write_alarm_time(&mut self, time_ms: u64) {
        self.write_split(offset::ALARM_TIME, time_ms);
    }

    pub(crate) fn read_time_upper(&self) -> u32 {
        self.read(offset::READ_TIME_UPPER)
    }

    pub(crate) fn read_time_lower(&self) -> u32 {
        self.read(offset::READ_TIME_LOWER)
    }

    pub(crate) fn write_debugger_ignored(&mut self, ignored: bool) {
        let payload = if ignored { DBG_PWRCFG_IGNORE } else { 0 };
        self.write_protected(offset::DBG_PWRCFG, payload);
    }

    pub(crate) fn enable_interrupts(&mut self, enable: Inte) {
        self.write_protected(offset::INTE, enable.bits());
    }

    /// INTE written without the password, as the GPIO wake path does.
    pub(crate) fn enable_interrupts_unprotected(&mut self, enable: Inte) {
        self.write_unprotected(POWMAN_BASE + offset::INTE, u32::from(enable.bits()));
    }

    /// Select the wake source of PWRUP slot `slot` (0..=3).
    pub(crate) fn write_pwrup(&mut self, slot: u8, source: Pwrup) {
        self.write_protected(offset::PWRUP0 + 4 * u32::from(slot & 0x3), source.bits());
    }

    pub(crate) fn write_pad(&mut self, gpio: u8, ctrl: PadCtrl) {
        self.write_unprotected(pad_address(gpio), ctrl.bits());
    }

    pub(crate) fn enter_low_power_regulator(&mut self) {
        self.write_protected(offset::VREG_LP_ENTRY, VREG_LP_ENTRY_MODE_LOW_POWER);
    }

    pub(crate) fn clear_boot_vectors(&mut self) {
        for boot in offset::BOOT {
            self.write_unprotected(POWMAN_BASE + boot, 0);
        }
    }

    pub(crate) fn request_power_down(&mut self, domains: PowerDomains) {
        self.write_protected(offset::STATE, domains.request());
    }

    pub(crate) fn read_last_pwrup(&self) -> u32 {
        self.read(offset::LAST_SWCORE_PWRUP)
    }

    pub(crate) fn read_badpasswd(&self) -> u32 {
        self.read(offset::BADPASSWD)
    }

    /// Write-one-to-clear.
    #[cfg(debug_assertions)]
    pub(crate) fn clear_badpasswd(&mut self) {
        self.write_protected(offset::BADPASSWD, BADPASSWD_FLAG as u16);
    }

    pub(crate) fn wait_for_interrupt(&mut self) {
        self.bus.wait_for_interrupt();
    }
}
