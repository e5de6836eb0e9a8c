/*
    RivaPC
    https://github.com/dbalsom/rivapc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    devices::nv5::ptimer.rs

    PTIMER: the free-running time counter with an alarm. Nominally counts
    nanoseconds at the memory clock rate, scaled by a programmable
    numerator/denominator ratio. Ticked from the memory clock generator's
    periodic callback; the host timer system cannot run at the real clock
    rate, so each tick is scaled back up by the fix quotient.

*/

use crate::devices::nv5::{
    registers::{self, RegisterDescriptor},
    Nv5, TIMER_SYSTEM_FIX_QUOTIENT,
};

pub const PTIMER_INTR: u32 = 0x009100;
pub const PTIMER_INTR_EN: u32 = 0x009140;
pub const PTIMER_NUMERATOR: u32 = 0x009200;
pub const PTIMER_DENOMINATOR: u32 = 0x009210;
pub const PTIMER_TIME_0: u32 = 0x009400; // nanoseconds [31:5]
pub const PTIMER_TIME_1: u32 = 0x009410; // nanoseconds [28:0]
pub const PTIMER_ALARM: u32 = 0x009420; // nanoseconds [31:5]

/// Bit position of the alarm interrupt.
pub const PTIMER_INTR_ALARM: u32 = 0;

#[derive(Default)]
pub(crate) struct Ptimer {
    /// Interrupt state. Bit 0: alarm.
    pub interrupt_status: u32,
    pub interrupt_enable: u32,
    pub clock_numerator: u32,
    pub clock_denominator: u32,
    /// 64-bit free-running counter.
    pub time: u64,
    pub alarm: u32,
}

pub(crate) const PTIMER_REGISTERS: &[RegisterDescriptor] = &[
    RegisterDescriptor {
        address: PTIMER_INTR,
        name: "PTIMER: Interrupt Status",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PTIMER_INTR_EN,
        name: "PTIMER: Interrupt Enable",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PTIMER_NUMERATOR,
        name: "PTIMER: Numerator",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PTIMER_DENOMINATOR,
        name: "PTIMER: Denominator",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PTIMER_TIME_0,
        name: "PTIMER: Time0",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PTIMER_TIME_1,
        name: "PTIMER: Time1",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PTIMER_ALARM,
        name: "PTIMER: Alarm",
        read: None,
        write: None,
    },
];

impl Nv5 {
    pub(crate) fn ptimer_init(&mut self) {
        log::debug!("NV5: initialising PTIMER");
    }

    /// Raise a PTIMER interrupt and dispatch the shared line.
    pub(crate) fn ptimer_interrupt(&mut self, bit: u32) {
        self.ptimer.interrupt_status |= 1 << bit;
        self.pmc_handle_interrupts(true);
    }

    /// One memory-clock tick. `real_time_us` is the tick period in
    /// microseconds of host time; the counter advances by the number of
    /// memory clock cycles that period represents, scaled by the
    /// numerator/denominator ratio and the fix quotient.
    pub(crate) fn ptimer_tick(&mut self, real_time_us: f64) {
        // Do not divide by zero.
        if self.ptimer.clock_numerator == 0 || self.ptimer.clock_denominator == 0 {
            return;
        }

        let cycles = (real_time_us / 1_000_000.0) / (1.0 / self.memory_clock_frequency);

        let elapsed = cycles * (f64::from(self.ptimer.clock_numerator) * TIMER_SYSTEM_FIX_QUOTIENT)
            / f64::from(self.ptimer.clock_denominator);

        // Truncate it.
        self.ptimer.time = self.ptimer.time.wrapping_add(elapsed as u64);

        log::trace!("NV5: PTIMER ticked (time={:016X})", self.ptimer.time);

        // Level-evaluated: while the counter sits at or past the alarm the
        // interrupt re-fires on every tick.
        if self.ptimer.time >= u64::from(self.ptimer.alarm) {
            log::trace!("NV5: PTIMER alarm fired at TIME={:08X}", self.ptimer.alarm);
            self.ptimer_interrupt(PTIMER_INTR_ALARM);
        }
    }

    pub(crate) fn ptimer_read(&mut self, address: u32) -> u32 {
        let Some(reg) = registers::lookup(PTIMER_REGISTERS, address) else {
            log::warn!("NV5: PTIMER unknown register read (address={:08X}), returning 0", address);
            return 0;
        };

        let value = if let Some(read) = reg.read {
            read(self)
        }
        else {
            match reg.address {
                PTIMER_INTR => self.ptimer.interrupt_status,
                PTIMER_INTR_EN => self.ptimer.interrupt_enable,
                PTIMER_NUMERATOR => self.ptimer.clock_numerator,
                PTIMER_DENOMINATOR => self.ptimer.clock_denominator,
                PTIMER_TIME_0 => self.ptimer.time as u32,
                PTIMER_TIME_1 => (self.ptimer.time >> 32) as u32,
                PTIMER_ALARM => self.ptimer.alarm,
                _ => 0,
            }
        };

        // TIME0 and TIME1 are polled constantly; logging them drowns out
        // everything else.
        if reg.address != PTIMER_TIME_0 && reg.address != PTIMER_TIME_1 {
            log::trace!("NV5: PTIMER read {:08X}: {} (value={:08X})", address, reg.name, value);
        }

        value
    }

    pub(crate) fn ptimer_write(&mut self, address: u32, value: u32) {
        let Some(reg) = registers::lookup(PTIMER_REGISTERS, address) else {
            log::warn!("NV5: PTIMER unknown register write {:08X} -> {:08X}, discarded", value, address);
            return;
        };

        log::trace!("NV5: PTIMER write {:08X} -> {:08X}: {}", value, address, reg.name);

        if let Some(write) = reg.write {
            write(self, value);
            return;
        }

        match reg.address {
            PTIMER_INTR => {
                self.ptimer.interrupt_status &= !value;
                self.pmc_clear_interrupts();
                self.pmc_handle_interrupts(true);
            }
            PTIMER_INTR_EN => {
                self.ptimer.interrupt_enable = value & 0x1;
            }
            PTIMER_NUMERATOR => {
                self.ptimer.clock_numerator = value & 0xFFFF;
            }
            PTIMER_DENOMINATOR => {
                // Prevent div0.
                let value = if value == 0 { 1 } else { value };
                self.ptimer.clock_denominator = value & 0xFFFF;
            }
            PTIMER_TIME_0 => {
                self.ptimer.time = (self.ptimer.time & !0xFFFF_FFFFu64) | u64::from(value & 0xFFFF_FFE0);
            }
            PTIMER_TIME_1 => {
                self.ptimer.time =
                    (self.ptimer.time & 0xFFFF_FFFF) | (u64::from(value & 0xFFFF_FFE0) << 32);
            }
            PTIMER_ALARM => {
                self.ptimer.alarm = value & 0xFFFF_FFE0;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::{LatchedLine, NullMemory, NullVga},
        devices::nv5::Nv5Config,
    };

    fn test_nv5() -> Nv5 {
        let mut nv5 = Nv5::new(
            Nv5Config::default(),
            Box::new(NullVga),
            Box::new(NullMemory),
            Box::new(LatchedLine::new()),
        );
        nv5.mmio_write_u32(PTIMER_NUMERATOR, 1);
        nv5.mmio_write_u32(PTIMER_DENOMINATOR, 1);
        nv5.mmio_write_u32(PTIMER_INTR_EN, 1);
        nv5
    }

    #[test]
    fn zero_denominator_is_corrected_to_one() {
        let mut nv5 = test_nv5();

        nv5.mmio_write_u32(PTIMER_DENOMINATOR, 0);
        assert_eq!(nv5.mmio_read_u32(PTIMER_DENOMINATOR), 1);
    }

    #[test]
    fn time_lanes_are_independently_writable() {
        let mut nv5 = test_nv5();

        nv5.mmio_write_u32(PTIMER_TIME_0, 0x1234_5660);
        nv5.mmio_write_u32(PTIMER_TIME_1, 0x0000_00E0);
        assert_eq!(nv5.ptimer.time, 0x0000_00E0_1234_5660);

        assert_eq!(nv5.mmio_read_u32(PTIMER_TIME_0), 0x1234_5660);
        assert_eq!(nv5.mmio_read_u32(PTIMER_TIME_1), 0x0000_00E0);

        // The low 5 bits of each lane are not stored.
        nv5.mmio_write_u32(PTIMER_TIME_0, 0x1F);
        assert_eq!(nv5.mmio_read_u32(PTIMER_TIME_0), 0);
    }

    #[test]
    fn tick_advances_by_the_scaled_cycle_count() {
        let mut nv5 = test_nv5();

        // Default memory clock: 13.5 MHz * 200 / (7 << 12) ~= 94168.5 Hz.
        // 1000us of host time is ~94.17 cycles; the fix quotient scales that
        // to ~941 counts.
        nv5.ptimer_tick(1000.0);
        assert_eq!(nv5.ptimer.time, 941);
    }

    #[test]
    fn alarm_is_level_evaluated() {
        let mut nv5 = test_nv5();

        nv5.mmio_write_u32(PTIMER_ALARM, 0x20);
        nv5.ptimer.time = 0x1F;

        nv5.ptimer_tick(1000.0);
        assert_eq!(nv5.ptimer.interrupt_status & 0x1, 0x1);
        assert!(nv5.irq_asserted());

        // Clearing the status drops the line...
        nv5.mmio_write_u32(PTIMER_INTR, 0x1);
        assert_eq!(nv5.ptimer.interrupt_status, 0);
        assert!(!nv5.irq_asserted());

        // ...but the counter is still past the alarm, so the next tick
        // re-fires the condition.
        nv5.ptimer_tick(1000.0);
        assert_eq!(nv5.ptimer.interrupt_status & 0x1, 0x1);
        assert!(nv5.irq_asserted());
    }

    #[test]
    fn memory_clock_drives_the_counter_through_run() {
        let mut nv5 = test_nv5();

        let period = nv5.memory_clock_timer.as_ref().unwrap().period_us();
        nv5.run(period * 3.0);
        assert!(nv5.ptimer.time > 0);
    }
}
