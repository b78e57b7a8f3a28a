//! In-memory model of the POWMAN and PADS_BANK0 blocks.
//!
//! [`SimulatedBus`] implements [`RegisterBus`] without touching hardware so
//! the driver can run on the host. It models only what this driver relies
//! on: the password check, the running counter with its split read-out,
//! and the wait instruction (which simply returns). Every write and wait is
//! logged in order.

use core::cell::Cell;

use crate::{
    reg_access::RegisterBus,
    soc::{
        BADPASSWD_FLAG,
        MAX_WAKE_GPIO,
        PADS_BANK0_BASE,
        PAD_STRIDE,
        PASSWORD,
        PASSWORD_MASK,
        POWMAN_BASE,
        TimerCtrl,
        offset,
    },
};

const POWMAN_WORDS: usize = 0x100 / 4;
// Voltage select followed by one register per pad.
const PAD_WORDS: usize = MAX_WAKE_GPIO as usize + 2;
const LOG_CAPACITY: usize = 128;

/// One observed bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// A store of `value` at the absolute `address`.
    Write {
        /// Absolute address.
        address: u32,
        /// Full 32-bit word, password bits included.
        value: u32,
    },
    /// The processor executed its wait-for-interrupt instruction.
    WaitForInterrupt,
}

/// Simulated register bus.
#[derive(Debug)]
pub struct SimulatedBus {
    powman: [u32; POWMAN_WORDS],
    pads: [u32; PAD_WORDS],
    counter: Cell<u64>,
    tick: u64,
    time_reads: Cell<usize>,
    running: bool,
    written_while_running: bool,
    boot_at_wait: Option<[u32; 4]>,
    events: heapless::Vec<Event, LOG_CAPACITY>,
    dropped_events: usize,
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBus {
    /// A stopped counter at zero that does not advance.
    pub const fn new() -> Self {
        Self {
            powman: [0; POWMAN_WORDS],
            pads: [0; PAD_WORDS],
            counter: Cell::new(0),
            tick: 0,
            time_reads: Cell::new(0),
            running: false,
            written_while_running: false,
            boot_at_wait: None,
            events: heapless::Vec::new(),
            dropped_events: 0,
        }
    }

    /// Advance the running counter by `tick` ms after every read of the
    /// lower time word.
    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// Load the counter and start it, as if a previous boot had set the
    /// time.
    pub fn with_running_counter(mut self, time_ms: u64) -> Self {
        self.counter.set(time_ms);
        self.running = true;
        self.powman[word(offset::TIMER)] = u32::from(TimerCtrl::RUN.bits());
        self
    }

    /// Preset the value reported by LAST_SWCORE_PWRUP.
    pub fn with_last_pwrup(mut self, raw: u32) -> Self {
        self.powman[word(offset::LAST_SWCORE_PWRUP)] = raw;
        self
    }

    /// Current counter value, without advancing it.
    pub fn counter(&self) -> u64 {
        self.counter.get()
    }

    /// Whether the TIMER RUN bit is set.
    pub fn running(&self) -> bool {
        self.running
    }

    /// Number of reads of the lower time word so far.
    pub fn time_reads(&self) -> usize {
        self.time_reads.get()
    }

    /// Stored word of the POWMAN register at `offset`, password stripped.
    pub fn register(&self, offset: u32) -> u32 {
        self.powman[word(offset)]
    }

    /// Stored pad control word of `gpio`.
    pub fn pad(&self, gpio: u8) -> u32 {
        self.pads[usize::from(gpio) + 1]
    }

    /// The alarm value assembled from its four fields.
    pub fn alarm_time(&self) -> u64 {
        offset::ALARM_TIME
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &field)| {
                acc | (u64::from(self.register(field) & 0xFFFF) << (16 * i))
            })
    }

    /// A write without the password reached a protected register.
    pub fn bad_password(&self) -> bool {
        self.powman[word(offset::BADPASSWD)] & BADPASSWD_FLAG != 0
    }

    /// A set-time or alarm field was written while the counter ran.
    pub fn written_while_running(&self) -> bool {
        self.written_while_running
    }

    /// Boot vectors as they were at the most recent wait.
    pub fn boot_vectors_at_wait(&self) -> Option<[u32; 4]> {
        self.boot_at_wait
    }

    /// Every logged transaction, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Logged writes as `(address, value)` pairs.
    pub fn writes(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.events.iter().filter_map(|event| match *event {
            Event::Write { address, value } => Some((address, value)),
            Event::WaitForInterrupt => None,
        })
    }

    /// Transactions that did not fit in the log.
    pub fn dropped_events(&self) -> usize {
        self.dropped_events
    }

    /// Forget the logged transactions; register state is kept.
    pub fn clear_events(&mut self) {
        self.events.clear();
        self.dropped_events = 0;
    }

    fn log(&mut self, event: Event) {
        if self.events.push(event).is_err() {
            self.dropped_events += 1;
        }
    }

    fn write_powman(&mut self, offset: u32, value: u32) {
        if offset::BOOT.contains(&offset) {
            self.powman[word(offset)] = value;
            return;
        }
        if offset == offset::INTE {
            self.powman[word(offset)] = value & !PASSWORD_MASK;
            return;
        }
        if value & PASSWORD_MASK != PASSWORD {
            self.powman[word(offset::BADPASSWD)] |= BADPASSWD_FLAG;
            return;
        }

        let payload = value & !PASSWORD_MASK;
        match offset {
            offset::BADPASSWD => self.powman[word(offset)] &= !(payload & BADPASSWD_FLAG),
            offset::TIMER => {
                let command = TimerCtrl::from_bits_truncate(payload as u16);
                self.running = command.contains(TimerCtrl::RUN);
                self.powman[word(offset)] = payload;
            }
            _ => {
                if let Some(i) = offset::SET_TIME.iter().position(|&field| field == offset) {
                    self.written_while_running |= self.running;
                    let shift = 16 * i;
                    let counter = self.counter.get() & !(0xFFFF_u64 << shift);
                    self.counter.set(counter | (u64::from(payload) << shift));
                } else if offset::ALARM_TIME.contains(&offset) {
                    self.written_while_running |= self.running;
                }
                self.powman[word(offset)] = payload;
            }
        }
    }
}

impl RegisterBus for SimulatedBus {
    fn read(&self, address: u32) -> u32 {
        if let Some(offset) = powman_offset(address) {
            match offset {
                offset::READ_TIME_UPPER => (self.counter.get() >> 32) as u32,
                offset::READ_TIME_LOWER => {
                    let now = self.counter.get();
                    if self.running {
                        self.counter.set(now.wrapping_add(self.tick));
                    }
                    self.time_reads.set(self.time_reads.get() + 1);
                    now as u32
                }
                _ => self.powman[word(offset)],
            }
        } else if let Some(index) = pad_index(address) {
            self.pads[index]
        } else {
            0
        }
    }

    fn write(&mut self, address: u32, value: u32) {
        self.log(Event::Write { address, value });

        if let Some(offset) = powman_offset(address) {
            self.write_powman(offset, value);
        } else if let Some(index) = pad_index(address) {
            self.pads[index] = value;
        }
    }

    fn wait_for_interrupt(&mut self) {
        self.log(Event::WaitForInterrupt);
        self.boot_at_wait = Some(offset::BOOT.map(|boot| self.register(boot)));
    }
}

const fn word(offset: u32) -> usize {
    (offset / 4) as usize
}

fn powman_offset(address: u32) -> Option<u32> {
    let offset = address.checked_sub(POWMAN_BASE)?;
    (word(offset) < POWMAN_WORDS && offset % 4 == 0).then_some(offset)
}

fn pad_index(address: u32) -> Option<usize> {
    let offset = address.checked_sub(PADS_BANK0_BASE)?;
    let index = (offset / PAD_STRIDE) as usize;
    (index < PAD_WORDS && offset % PAD_STRIDE == 0).then_some(index)
}
