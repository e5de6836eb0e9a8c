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

    devices::nv5::pramdac.rs

    PRAMDAC: final pixel presentation. Modeled here are the two M/N/P
    frequency synthesizers (pixel and memory clock) and the raster timing
    register block. The divider algorithm comes from the old riva driver,
    verified against the NT driver's CalcMNP. Palette/CLUT output belongs to
    the SVGA core.

*/

use modular_bitfield::prelude::*;

use crate::devices::{
    nv5::{
        registers::{self, RegisterDescriptor},
        Nv5, CRYSTAL_FREQUENCY, TIMER_SYSTEM_FIX_QUOTIENT,
    },
    rivatimer::RivaTimer,
};

pub const PRAMDAC_CLOCK_MEMORY: u32 = 0x680504;
pub const PRAMDAC_CLOCK_PIXEL: u32 = 0x680508;
pub const PRAMDAC_COEFF_SELECT: u32 = 0x68050C;
pub const PRAMDAC_GENERAL_CONTROL: u32 = 0x680600;
pub const PRAMDAC_VSERR_WIDTH: u32 = 0x680700;
pub const PRAMDAC_VEQU_END: u32 = 0x680704;
pub const PRAMDAC_VBBLANK_END: u32 = 0x680708;
pub const PRAMDAC_VBLANK_END: u32 = 0x68070C;
pub const PRAMDAC_VBLANK_START: u32 = 0x680710;
pub const PRAMDAC_VBBLANK_START: u32 = 0x680714;
pub const PRAMDAC_VEQU_START: u32 = 0x680718;
pub const PRAMDAC_VTOTAL: u32 = 0x68071C;
pub const PRAMDAC_HSYNC_WIDTH: u32 = 0x680720;
pub const PRAMDAC_HBURST_START: u32 = 0x680724;
pub const PRAMDAC_HBURST_END: u32 = 0x680728;
pub const PRAMDAC_HBLANK_START: u32 = 0x68072C;
pub const PRAMDAC_HBLANK_END: u32 = 0x680730;
pub const PRAMDAC_HTOTAL: u32 = 0x680734;
pub const PRAMDAC_HEQU_WIDTH: u32 = 0x680738;
pub const PRAMDAC_HSERR_WIDTH: u32 = 0x68073C;

/// Synthesizer coefficients as packed in the clock registers:
/// M divisor 7:0, N divisor 15:8, P divisor 18:16.
#[bitfield]
#[derive(Copy, Clone)]
pub struct ClockCoefficients {
    pub m: B8,
    pub n: B8,
    pub p: B3,
    #[skip]
    __: B13,
}

// Defaults come from the VBIOS in reality; these give a bring-up clock the
// driver will immediately reprogram. The default P exceeds the 3-bit
// register field and is latched directly into state, so packing back into
// register form is done with plain shifts.
const CLOCK_DEFAULT_M: u8 = 0x07;
const CLOCK_DEFAULT_N: u8 = 0xC8;
const CLOCK_DEFAULT_P: u8 = 0x0C;

fn pack_coefficients(m: u8, n: u8, p: u8) -> u32 {
    u32::from(m) | u32::from(n) << 8 | u32::from(p) << 16
}

#[derive(Default)]
pub(crate) struct Pramdac {
    pub pixel_clock_m: u8,
    pub pixel_clock_n: u8,
    pub pixel_clock_p: u8,
    pub memory_clock_m: u8,
    pub memory_clock_n: u8,
    pub memory_clock_p: u8,

    pub coeff_select: u32,
    pub general_control: u32,

    pub vserr_width: u32,
    pub vequ_end: u32,
    pub vbblank_end: u32,
    pub vblank_end: u32,
    pub vblank_start: u32,
    pub vbblank_start: u32,
    pub vequ_start: u32,
    pub vtotal: u32,
    pub hsync_width: u32,
    pub hburst_start: u32,
    pub hburst_end: u32,
    pub hblank_start: u32,
    pub hblank_end: u32,
    pub htotal: u32,
    pub hequ_width: u32,
    pub hserr_width: u32,
}

pub(crate) const PRAMDAC_REGISTERS: &[RegisterDescriptor] = &[
    RegisterDescriptor {
        address: PRAMDAC_CLOCK_PIXEL,
        name: "PRAMDAC: Pixel Clock",
        read: Some(Nv5::pramdac_pixel_clock_read),
        write: Some(Nv5::pramdac_pixel_clock_write),
    },
    RegisterDescriptor {
        address: PRAMDAC_CLOCK_MEMORY,
        name: "PRAMDAC: Memory Clock",
        read: Some(Nv5::pramdac_memory_clock_read),
        write: Some(Nv5::pramdac_memory_clock_write),
    },
    RegisterDescriptor {
        address: PRAMDAC_COEFF_SELECT,
        name: "PRAMDAC: PLL Clock Coefficient Select",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_GENERAL_CONTROL,
        name: "PRAMDAC: General Control",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_VSERR_WIDTH,
        name: "PRAMDAC: Vertical Sync Error Width",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_VEQU_END,
        name: "PRAMDAC: VEqu End",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_VBBLANK_END,
        name: "PRAMDAC: VBBlank End",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_VBLANK_END,
        name: "PRAMDAC: Vertical Blanking Interval End",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_VBLANK_START,
        name: "PRAMDAC: Vertical Blanking Interval Start",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_VBBLANK_START,
        name: "PRAMDAC: VBBlank Start",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_VEQU_START,
        name: "PRAMDAC: VEqu Start",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_VTOTAL,
        name: "PRAMDAC: Total Vertical Lines",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_HSYNC_WIDTH,
        name: "PRAMDAC: Horizontal Sync Pulse Width",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_HBURST_START,
        name: "PRAMDAC: Horizontal Burst Signal Start",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_HBURST_END,
        name: "PRAMDAC: Horizontal Burst Signal End",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_HBLANK_START,
        name: "PRAMDAC: Horizontal Blanking Interval Start",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_HBLANK_END,
        name: "PRAMDAC: Horizontal Blanking Interval End",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_HTOTAL,
        name: "PRAMDAC: Total Horizontal Lines",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_HEQU_WIDTH,
        name: "PRAMDAC: HEqu Width",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PRAMDAC_HSERR_WIDTH,
        name: "PRAMDAC: Horizontal Sync Error Width",
        read: None,
        write: None,
    },
];

impl Nv5 {
    pub(crate) fn pramdac_init(&mut self) {
        log::debug!("NV5: initialising PRAMDAC");

        self.pramdac.pixel_clock_m = CLOCK_DEFAULT_M;
        self.pramdac.pixel_clock_n = CLOCK_DEFAULT_N;
        self.pramdac.pixel_clock_p = CLOCK_DEFAULT_P;
        self.pramdac.memory_clock_m = CLOCK_DEFAULT_M;
        self.pramdac.memory_clock_n = CLOCK_DEFAULT_N;
        self.pramdac.memory_clock_p = CLOCK_DEFAULT_P;

        self.pramdac_set_pixel_clock();
        self.pramdac_set_memory_clock();
    }

    pub(crate) fn pramdac_pixel_clock_read(&mut self) -> u32 {
        pack_coefficients(
            self.pramdac.pixel_clock_m,
            self.pramdac.pixel_clock_n,
            self.pramdac.pixel_clock_p,
        )
    }

    pub(crate) fn pramdac_memory_clock_read(&mut self) -> u32 {
        pack_coefficients(
            self.pramdac.memory_clock_m,
            self.pramdac.memory_clock_n,
            self.pramdac.memory_clock_p,
        )
    }

    pub(crate) fn pramdac_pixel_clock_write(&mut self, value: u32) {
        let coeff = ClockCoefficients::from_bytes(value.to_le_bytes());
        self.pramdac.pixel_clock_m = coeff.m();
        self.pramdac.pixel_clock_n = coeff.n();
        self.pramdac.pixel_clock_p = coeff.p();

        self.pramdac_set_pixel_clock();
    }

    pub(crate) fn pramdac_memory_clock_write(&mut self, value: u32) {
        let coeff = ClockCoefficients::from_bytes(value.to_le_bytes());
        self.pramdac.memory_clock_m = coeff.m();
        self.pramdac.memory_clock_n = coeff.n();
        self.pramdac.memory_clock_p = coeff.p();

        self.pramdac_set_memory_clock();
    }

    pub(crate) fn pramdac_set_pixel_clock(&mut self) {
        // Prevent division by 0.
        if self.pramdac.pixel_clock_m == 0 {
            self.pramdac.pixel_clock_m = 1;
        }
        if self.pramdac.pixel_clock_n == 0 {
            self.pramdac.pixel_clock_n = 1;
        }

        let divisor = (u64::from(self.pramdac.pixel_clock_m) << self.pramdac.pixel_clock_p) as f64;
        let frequency = CRYSTAL_FREQUENCY * f64::from(self.pramdac.pixel_clock_n) / divisor;
        let period_us = (1_000_000.0 * TIMER_SYSTEM_FIX_QUOTIENT) / frequency;

        log::debug!("NV5: pixel clock = {:.2} MHz", frequency / 1_000_000.0);

        self.pixel_clock_frequency = frequency;

        // Create and start the timer lazily; reprogram it in place after.
        let timer = self.pixel_clock_timer.get_or_insert_with(|| {
            let mut timer = RivaTimer::new(period_us);
            timer.start();
            timer
        });
        timer.set_period(period_us);
    }

    pub(crate) fn pramdac_set_memory_clock(&mut self) {
        if self.pramdac.memory_clock_m == 0 {
            self.pramdac.memory_clock_m = 1;
        }
        if self.pramdac.memory_clock_n == 0 {
            self.pramdac.memory_clock_n = 1;
        }

        let divisor = (u64::from(self.pramdac.memory_clock_m) << self.pramdac.memory_clock_p) as f64;
        let frequency = CRYSTAL_FREQUENCY * f64::from(self.pramdac.memory_clock_n) / divisor;
        let period_us = (1_000_000.0 * TIMER_SYSTEM_FIX_QUOTIENT) / frequency;

        log::debug!("NV5: memory clock = {:.2} MHz", frequency / 1_000_000.0);

        self.memory_clock_frequency = frequency;

        let timer = self.memory_clock_timer.get_or_insert_with(|| {
            let mut timer = RivaTimer::new(period_us);
            timer.start();
            timer
        });
        timer.set_period(period_us);
    }

    pub(crate) fn pramdac_read(&mut self, address: u32) -> u32 {
        let Some(reg) = registers::lookup(PRAMDAC_REGISTERS, address) else {
            log::warn!("NV5: PRAMDAC unknown register read (address={:08X}), returning 0", address);
            return 0;
        };

        let value = if let Some(read) = reg.read {
            read(self)
        }
        else {
            match reg.address {
                PRAMDAC_COEFF_SELECT => self.pramdac.coeff_select,
                PRAMDAC_GENERAL_CONTROL => self.pramdac.general_control,
                PRAMDAC_VSERR_WIDTH => self.pramdac.vserr_width,
                PRAMDAC_VEQU_END => self.pramdac.vequ_end,
                PRAMDAC_VBBLANK_END => self.pramdac.vbblank_end,
                PRAMDAC_VBLANK_END => self.pramdac.vblank_end,
                PRAMDAC_VBLANK_START => self.pramdac.vblank_start,
                PRAMDAC_VBBLANK_START => self.pramdac.vbblank_start,
                PRAMDAC_VEQU_START => self.pramdac.vequ_start,
                PRAMDAC_VTOTAL => self.pramdac.vtotal,
                PRAMDAC_HSYNC_WIDTH => self.pramdac.hsync_width,
                PRAMDAC_HBURST_START => self.pramdac.hburst_start,
                PRAMDAC_HBURST_END => self.pramdac.hburst_end,
                PRAMDAC_HBLANK_START => self.pramdac.hblank_start,
                PRAMDAC_HBLANK_END => self.pramdac.hblank_end,
                PRAMDAC_HTOTAL => self.pramdac.htotal,
                PRAMDAC_HEQU_WIDTH => self.pramdac.hequ_width,
                PRAMDAC_HSERR_WIDTH => self.pramdac.hserr_width,
                _ => 0,
            }
        };

        log::trace!("NV5: PRAMDAC read {:08X}: {} (value={:08X})", address, reg.name, value);
        value
    }

    pub(crate) fn pramdac_write(&mut self, address: u32, value: u32) {
        let Some(reg) = registers::lookup(PRAMDAC_REGISTERS, address) else {
            log::warn!("NV5: PRAMDAC unknown register write {:08X} -> {:08X}, discarded", value, address);
            return;
        };

        log::trace!("NV5: PRAMDAC write {:08X} -> {:08X}: {}", value, address, reg.name);

        if let Some(write) = reg.write {
            write(self, value);
            return;
        }

        // Raster timing is stored here; the SVGA core picks it up when it
        // recalculates its own timings.
        match reg.address {
            PRAMDAC_COEFF_SELECT => self.pramdac.coeff_select = value,
            PRAMDAC_GENERAL_CONTROL => self.pramdac.general_control = value,
            PRAMDAC_VSERR_WIDTH => self.pramdac.vserr_width = value,
            PRAMDAC_VEQU_END => self.pramdac.vequ_end = value,
            PRAMDAC_VBBLANK_END => self.pramdac.vbblank_end = value,
            PRAMDAC_VBLANK_END => self.pramdac.vblank_end = value,
            PRAMDAC_VBLANK_START => self.pramdac.vblank_start = value,
            PRAMDAC_VBBLANK_START => self.pramdac.vbblank_start = value,
            PRAMDAC_VEQU_START => self.pramdac.vequ_start = value,
            PRAMDAC_VTOTAL => self.pramdac.vtotal = value,
            PRAMDAC_HSYNC_WIDTH => self.pramdac.hsync_width = value,
            PRAMDAC_HBURST_START => self.pramdac.hburst_start = value,
            PRAMDAC_HBURST_END => self.pramdac.hburst_end = value,
            PRAMDAC_HBLANK_START => self.pramdac.hblank_start = value,
            PRAMDAC_HBLANK_END => self.pramdac.hblank_end = value,
            PRAMDAC_HTOTAL => self.pramdac.htotal = value,
            PRAMDAC_HEQU_WIDTH => self.pramdac.hequ_width = value,
            PRAMDAC_HSERR_WIDTH => self.pramdac.hserr_width = value,
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
        Nv5::new(
            Nv5Config::default(),
            Box::new(NullVga),
            Box::new(NullMemory),
            Box::new(LatchedLine::new()),
        )
    }

    #[test]
    fn default_coefficients_derive_the_bring_up_clock() {
        let mut nv5 = test_nv5();

        // 13.5 MHz * 200 / (7 << 12)
        let expected = 13_500_000.0 * 200.0 / f64::from(7u32 << 12);
        assert!((nv5.memory_clock_frequency - expected).abs() < 1e-6);
        assert!((nv5.pixel_clock_frequency - expected).abs() < 1e-6);

        let period = nv5.memory_clock_timer.as_ref().unwrap().period_us();
        assert!((period - 1_000_000.0 * 10.0 / expected).abs() < 1e-6);

        assert_eq!(nv5.mmio_read_u32(PRAMDAC_CLOCK_MEMORY), 0x000C_C807);
    }

    #[test]
    fn divider_write_reprograms_the_timer_in_place() {
        let mut nv5 = test_nv5();

        let old_period = nv5.memory_clock_timer.as_ref().unwrap().period_us();

        // M=7, N=200, P=4: 13.5 MHz * 200 / (7 << 4) ~= 24.1 MHz.
        nv5.mmio_write_u32(PRAMDAC_CLOCK_MEMORY, 0x0004_C807);

        let expected = 13_500_000.0 * 200.0 / f64::from(7u32 << 4);
        assert!((nv5.memory_clock_frequency - expected).abs() < 1e-6);

        let timer = nv5.memory_clock_timer.as_ref().unwrap();
        assert!(timer.is_running());
        assert!(timer.period_us() < old_period);

        assert_eq!(nv5.mmio_read_u32(PRAMDAC_CLOCK_MEMORY), 0x0004_C807);
    }

    #[test]
    fn zero_dividers_are_clamped_to_one() {
        let mut nv5 = test_nv5();

        nv5.mmio_write_u32(PRAMDAC_CLOCK_PIXEL, 0);
        assert_eq!(nv5.mmio_read_u32(PRAMDAC_CLOCK_PIXEL), 0x0000_0101);

        let expected = 13_500_000.0 * 1.0 / 1.0;
        assert!((nv5.pixel_clock_frequency - expected).abs() < 1e-6);
    }

    #[test]
    fn raster_timing_registers_are_plain_storage() {
        let mut nv5 = test_nv5();

        nv5.mmio_write_u32(PRAMDAC_HTOTAL, 0x320);
        nv5.mmio_write_u32(PRAMDAC_VBLANK_START, 0x1E0);
        assert_eq!(nv5.mmio_read_u32(PRAMDAC_HTOTAL), 0x320);
        assert_eq!(nv5.mmio_read_u32(PRAMDAC_VBLANK_START), 0x1E0);
    }
}
