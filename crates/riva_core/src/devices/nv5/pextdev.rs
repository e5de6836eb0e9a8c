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

    devices::nv5::pextdev.rs

    PEXTDEV: external devices, i.e. the board strap pins sampled at power-on.
    The strap word is assembled once from the device configuration and is
    read-only thereafter.

*/

use modular_bitfield::prelude::*;

use crate::devices::nv5::{
    registers::{self, RegisterDescriptor},
    BusGeneration, Nv5,
};

pub const PSTRAPS: u32 = 0x101000;

pub const PSTRAPS_BUS_SPEED_66MHZ: u8 = 0x1;
pub const PSTRAPS_TVMODE_NTSC: u8 = 0x1;
pub const PSTRAPS_CRYSTAL_13500K: u8 = 0x0;
pub const PSTRAPS_BUS_TYPE_PCI: u8 = 0x0;
pub const PSTRAPS_BUS_TYPE_AGP: u8 = 0x1;
pub const PSTRAPS_AGP2X_DISABLED: u8 = 0x1;

#[bitfield]
#[derive(Copy, Clone)]
pub struct StrapsRegister {
    pub bus_speed_66mhz: B1,
    pub bios_present: B1,
    pub ram_type_8mbit: B1,
    pub nec_mode: B1,
    pub bus_width_128: B1,
    pub bus_type_agp: B1,
    pub crystal_14318k: B1,
    pub tv_mode: B2,
    pub agp_2x_disabled: B1,
    #[skip]
    __: B22,
}

#[derive(Default)]
pub(crate) struct Pextdev {
    pub straps: u32,
}

pub(crate) const PEXTDEV_REGISTERS: &[RegisterDescriptor] = &[RegisterDescriptor {
    address: PSTRAPS,
    name: "Straps: Chip Configuration",
    read: None,
    write: None,
}];

impl Nv5 {
    pub(crate) fn pextdev_init(&mut self) {
        log::debug!("NV5: initialising PEXTDEV straps");

        // Current settings:
        // AGP2X      disabled
        // TV mode    NTSC
        // Crystal    13.5 MHz
        // Bus speed  66 MHz
        let bus_type = match self.config().bus_generation {
            BusGeneration::Pci => PSTRAPS_BUS_TYPE_PCI,
            BusGeneration::Agp4x => PSTRAPS_BUS_TYPE_AGP,
        };

        let straps = StrapsRegister::new()
            .with_bus_speed_66mhz(PSTRAPS_BUS_SPEED_66MHZ)
            .with_bios_present(1)
            .with_ram_type_8mbit(0)
            .with_nec_mode(0)
            .with_bus_width_128(0)
            .with_bus_type_agp(bus_type)
            .with_crystal_14318k(PSTRAPS_CRYSTAL_13500K)
            .with_tv_mode(PSTRAPS_TVMODE_NTSC)
            .with_agp_2x_disabled(PSTRAPS_AGP2X_DISABLED);

        self.pextdev.straps = u32::from_le_bytes(straps.into_bytes());

        log::debug!("NV5: straps={:04X}", self.pextdev.straps);
    }

    pub(crate) fn pextdev_read(&mut self, address: u32) -> u32 {
        let Some(reg) = registers::lookup(PEXTDEV_REGISTERS, address) else {
            log::warn!("NV5: PEXTDEV unknown register read (address={:08X}), returning 0", address);
            return 0;
        };

        let value = if let Some(read) = reg.read {
            read(self)
        }
        else {
            match reg.address {
                PSTRAPS => self.pextdev.straps,
                _ => 0,
            }
        };

        log::trace!("NV5: PEXTDEV read {:08X}: {} (value={:08X})", address, reg.name, value);
        value
    }

    pub(crate) fn pextdev_write(&mut self, address: u32, value: u32) {
        if address == PSTRAPS {
            log::warn!("NV5: attempted write {:08X} to the straps, something is wrong", value);
            return;
        }

        let Some(reg) = registers::lookup(PEXTDEV_REGISTERS, address) else {
            log::warn!("NV5: PEXTDEV unknown register write {:08X} -> {:08X}, discarded", value, address);
            return;
        };

        log::trace!("NV5: PEXTDEV write {:08X} -> {:08X}: {}", value, address, reg.name);

        if let Some(write) = reg.write {
            write(self, value);
        }
    }

    /// True if the board straps report a 66 MHz capable bus.
    pub(crate) fn straps_bus_66mhz(&self) -> bool {
        StrapsRegister::from_bytes(self.pextdev.straps.to_le_bytes()).bus_speed_66mhz() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::{LatchedLine, NullMemory, NullVga},
        devices::nv5::Nv5Config,
    };

    fn test_nv5_with(cfg: Nv5Config) -> Nv5 {
        Nv5::new(
            cfg,
            Box::new(NullVga),
            Box::new(NullMemory),
            Box::new(LatchedLine::new()),
        )
    }

    #[test]
    fn straps_reflect_board_configuration() {
        let mut nv5 = test_nv5_with(Nv5Config::default());

        // 66 MHz, BIOS present, NTSC, AGP2X disabled, PCI bus.
        assert_eq!(nv5.mmio_read_u32(PSTRAPS), 0x0000_0283);
        assert!(nv5.straps_bus_66mhz());

        let mut nv5 = test_nv5_with(Nv5Config {
            bus_generation: BusGeneration::Agp4x,
            ..Default::default()
        });
        assert_eq!(nv5.mmio_read_u32(PSTRAPS), 0x0000_02A3);
    }

    #[test]
    fn straps_are_read_only() {
        let mut nv5 = test_nv5_with(Nv5Config::default());

        let before = nv5.mmio_read_u32(PSTRAPS);
        nv5.mmio_write_u32(PSTRAPS, 0xFFFF_FFFF);
        assert_eq!(nv5.mmio_read_u32(PSTRAPS), before);
    }
}
