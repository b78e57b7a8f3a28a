//! RP2350 register map for the always-on power manager.
//!
//! Offsets are bytes from [`POWMAN_BASE`]. Values here must match the
//! datasheet bit for bit; nothing in the driver checks them at runtime.

/// Base address of the POWMAN register block.
pub const POWMAN_BASE: u32 = 0x4010_0000;

/// Base address of the PADS_BANK0 register block.
pub const PADS_BANK0_BASE: u32 = 0x4003_8000;

/// Distance between two consecutive pad control registers.
pub const PAD_STRIDE: u32 = 4;

/// Highest GPIO index accepted as a wake source.
pub const MAX_WAKE_GPIO: u8 = 50;

/// Upper half of every write the power manager is expected to accept.
pub const PASSWORD: u32 = 0x5AFE_0000;

/// Mask selecting the password half of a written word.
pub const PASSWORD_MASK: u32 = 0xFFFF_0000;

/// Register offsets inside the POWMAN block.
pub mod offset {
    pub const BADPASSWD: u32 = 0x00;
    pub const VREG_LP_ENTRY: u32 = 0x10;
    pub const STATE: u32 = 0x38;

    pub const SET_TIME_63TO48: u32 = 0x60;
    pub const SET_TIME_47TO32: u32 = 0x64;
    pub const SET_TIME_31TO16: u32 = 0x68;
    pub const SET_TIME_15TO0: u32 = 0x6C;

    pub const READ_TIME_UPPER: u32 = 0x70;
    pub const READ_TIME_LOWER: u32 = 0x74;

    pub const ALARM_TIME_63TO48: u32 = 0x78;
    pub const ALARM_TIME_47TO32: u32 = 0x7C;
    pub const ALARM_TIME_31TO16: u32 = 0x80;
    pub const ALARM_TIME_15TO0: u32 = 0x84;

    pub const TIMER: u32 = 0x88;
    /// First of the four wake-source select registers.
    pub const PWRUP0: u32 = 0x8C;
    pub const LAST_SWCORE_PWRUP: u32 = 0xA0;
    pub const DBG_PWRCFG: u32 = 0xA4;

    pub const BOOT0: u32 = 0xD0;
    pub const BOOT1: u32 = 0xD4;
    pub const BOOT2: u32 = 0xD8;
    pub const BOOT3: u32 = 0xDC;

    pub const INTE: u32 = 0xE4;

    /// Set-time fields, least significant first.
    pub const SET_TIME: [u32; 4] = [
        SET_TIME_15TO0,
        SET_TIME_31TO16,
        SET_TIME_47TO32,
        SET_TIME_63TO48,
    ];

    /// Alarm-time fields, least significant first.
    pub const ALARM_TIME: [u32; 4] = [
        ALARM_TIME_15TO0,
        ALARM_TIME_31TO16,
        ALARM_TIME_47TO32,
        ALARM_TIME_63TO48,
    ];

    pub const BOOT: [u32; 4] = [BOOT0, BOOT1, BOOT2, BOOT3];
}

bitflags::bitflags! {
    /// Commands accepted by the TIMER register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimerCtrl: u16 {
        const NONSEC_WRITE   = 1 << 0;
        const RUN            = 1 << 1;
        /// Resets the sub-millisecond prescaler.
        const CLEAR          = 1 << 2;
        const ALARM_ENAB     = 1 << 4;
        const PWRUP_ON_ALARM = 1 << 5;
        /// Pending alarm flag, write one to clear.
        const ALARM          = 1 << 6;
        const USE_LPOSC      = 1 << 8;
        const USE_XOSC       = 1 << 9;
    }
}

impl TimerCtrl {
    /// Restart after the counter has been seeded.
    pub const START_FRESH: Self = Self::RUN.union(Self::CLEAR).union(Self::ALARM);

    /// Restart with the alarm armed to power the switched core back up.
    pub const START_ALARM: Self = Self::RUN
        .union(Self::ALARM_ENAB)
        .union(Self::PWRUP_ON_ALARM)
        .union(Self::ALARM);
}

bitflags::bitflags! {
    /// Interrupt enables of the power manager.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Inte: u16 {
        const VREG_OUTPUT_LOW     = 1 << 0;
        const TIMER               = 1 << 1;
        const STATE_REQ_IGNORED   = 1 << 2;
        const PWRUP_WHILE_WAITING = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Power domains switched off by a STATE request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PowerDomains: u16 {
        const SRAM1         = 1 << 0;
        const SRAM0         = 1 << 1;
        const XIP_CACHE     = 1 << 2;
        const SWITCHED_CORE = 1 << 3;
    }
}

impl PowerDomains {
    /// Everything the dormant profile turns off.
    pub const DORMANT: Self = Self::all();

    /// Payload for the STATE register: the request field sits above the
    /// current-state field.
    pub const fn request(self) -> u16 {
        self.bits() << 4
    }
}

/// VREG_LP_ENTRY: switch the regulator to low-power mode on entry.
pub const VREG_LP_ENTRY_MODE_LOW_POWER: u16 = 1 << 2;

/// DBG_PWRCFG: a connected debugger does not hold the domains up.
pub const DBG_PWRCFG_IGNORE: u16 = 1 << 0;

/// BADPASSWD: a write without the password was dropped.
pub const BADPASSWD_FLAG: u32 = 1 << 0;

bitflags::bitflags! {
    /// PADS_BANK0 GPIO pad control.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PadCtrl: u32 {
        const SLEWFAST  = 1 << 0;
        const SCHMITT   = 1 << 1;
        const PDE       = 1 << 2;
        const PUE       = 1 << 3;
        const IE        = 1 << 6;
        const OD        = 1 << 7;
        const ISO       = 1 << 8;
    }
}

bitflags::bitflags! {
    /// PWRUPx wake-source select, GPIO index in the low six bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Pwrup: u16 {
        const SOURCE   = 0x3F;
        const ENABLE   = 1 << 6;
        /// High level / rising edge when set.
        const POLARITY = 1 << 7;
        /// Edge-triggered when set, level-triggered otherwise.
        const MODE     = 1 << 8;
    }
}

/// Values of LAST_SWCORE_PWRUP.
pub mod last_pwrup {
    pub const CHIP_RESET: u32 = 0;
    pub const PWRUP0: u32 = 1;
    pub const PWRUP3: u32 = 4;
    pub const CORESIGHT: u32 = 5;
    pub const ALARM: u32 = 6;
}

/// Address of the pad control register of `gpio`; pad 0 sits one stride
/// past the bank's voltage-select register.
pub const fn pad_address(gpio: u8) -> u32 {
    PADS_BANK0_BASE + (gpio as u32 + 1) * PAD_STRIDE
}
