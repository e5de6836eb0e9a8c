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

    devices::nv5::pfifo.rs

    PFIFO: the FIFO for graphics object submission. Only the instance-memory
    configuration registers are modeled; submission itself belongs to the
    render pipeline. The whole subsystem is gated by its bit in the PMC
    global subsystem enable word.

*/

use crate::devices::nv5::{
    registers::{self, RegisterDescriptor},
    Nv5,
};

pub const PFIFO_INTR: u32 = 0x002100;
pub const PFIFO_INTR_EN: u32 = 0x002140;
pub const PFIFO_CONFIG_RAMHT: u32 = 0x002210;
pub const PFIFO_CONFIG_RAMFC: u32 = 0x002214;
pub const PFIFO_CONFIG_RAMRO: u32 = 0x002218;

#[derive(Default)]
pub(crate) struct Pfifo {
    /// Interrupt state:
    /// Bit 0  - Cache error
    /// Bit 4  - RAMRO triggered
    /// Bit 8  - RAMRO overflow (too many invalid submissions)
    /// Bit 12 - DMA pusher
    /// Bit 16 - DMA page table entry
    pub interrupt_status: u32,
    pub interrupt_enable: u32,
    pub ramht_config: u32,
    pub ramfc_config: u32,
    pub ramro_config: u32,
}

pub(crate) const PFIFO_REGISTERS: &[RegisterDescriptor] = &[
    RegisterDescriptor {
        address: PFIFO_INTR,
        name: "PFIFO: Interrupt Status",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PFIFO_INTR_EN,
        name: "PFIFO: Interrupt Enable",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PFIFO_CONFIG_RAMHT,
        name: "PFIFO: RAMIN RAMHT Config",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PFIFO_CONFIG_RAMFC,
        name: "PFIFO: RAMIN RAMFC Config",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PFIFO_CONFIG_RAMRO,
        name: "PFIFO: RAMIN RAMRO Config",
        read: None,
        write: None,
    },
];

impl Nv5 {
    pub(crate) fn pfifo_init(&mut self) {
        log::debug!("NV5: initialising PFIFO");
    }

    pub(crate) fn pfifo_read(&mut self, address: u32) -> u32 {
        // Check the subsystem enablement state before doing anything.
        if !self.pfifo_enabled() {
            log::debug!("NV5: repressing PFIFO read, subsystem disabled by PMC_ENABLE, returning 0");
            return 0;
        }

        let Some(reg) = registers::lookup(PFIFO_REGISTERS, address) else {
            log::warn!("NV5: PFIFO unknown register read (address={:08X}), returning 0", address);
            return 0;
        };

        let value = if let Some(read) = reg.read {
            read(self)
        }
        else {
            match reg.address {
                PFIFO_INTR => self.pfifo.interrupt_status,
                PFIFO_INTR_EN => self.pfifo.interrupt_enable,
                PFIFO_CONFIG_RAMHT => self.pfifo.ramht_config,
                PFIFO_CONFIG_RAMFC => self.pfifo.ramfc_config,
                PFIFO_CONFIG_RAMRO => self.pfifo.ramro_config,
                _ => 0,
            }
        };

        log::trace!("NV5: PFIFO read {:08X}: {} (value={:08X})", address, reg.name, value);
        value
    }

    pub(crate) fn pfifo_write(&mut self, address: u32, value: u32) {
        if !self.pfifo_enabled() {
            log::debug!("NV5: repressing PFIFO write, subsystem disabled by PMC_ENABLE");
            return;
        }

        let Some(reg) = registers::lookup(PFIFO_REGISTERS, address) else {
            log::warn!("NV5: PFIFO unknown register write {:08X} -> {:08X}, discarded", value, address);
            return;
        };

        log::trace!("NV5: PFIFO write {:08X} -> {:08X}: {}", value, address, reg.name);

        if let Some(write) = reg.write {
            write(self, value);
            return;
        }

        match reg.address {
            PFIFO_INTR => {
                self.pfifo.interrupt_status &= !value;
                self.pmc_clear_interrupts();
                self.pmc_handle_interrupts(true);
            }
            PFIFO_INTR_EN => {
                self.pfifo.interrupt_enable = value & 0x0000_1111;
            }
            PFIFO_CONFIG_RAMHT => {
                self.pfifo.ramht_config = value;

                let base = ((value >> 12) & 0x0F) << 12;
                let size = match (value >> 16) & 0x03 {
                    0 => 0x1000,
                    1 => 0x2000,
                    2 => 0x4000,
                    _ => 0x8000,
                };
                log::debug!("NV5: RAMHT reconfiguration, base={:05X} size={:05X} bytes", base, size);
            }
            PFIFO_CONFIG_RAMFC => {
                self.pfifo.ramfc_config = value;

                let base = ((value >> 9) & 0x7F) << 9;
                log::debug!("NV5: RAMFC reconfiguration, base={:05X}", base);
            }
            PFIFO_CONFIG_RAMRO => {
                self.pfifo.ramro_config = value;

                let base = ((value >> 9) & 0x7F) << 9;
                let size = if (value >> 16) & 0x01 == 0 { 0x200 } else { 0x2000 };
                log::debug!("NV5: RAMRO reconfiguration, base={:05X} size={:04X} bytes", base, size);
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
        devices::nv5::{
            pmc::{PMC_ENABLE, PMC_ENABLE_PFIFO},
            Nv5Config,
        },
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
    fn disabled_subsystem_discards_all_traffic() {
        let mut nv5 = test_nv5();

        // The gate is clear at bring-up; even a valid register is inert.
        nv5.mmio_write_u32(PFIFO_CONFIG_RAMHT, 0x0003_3000);
        assert_eq!(nv5.pfifo.ramht_config, 0);

        nv5.pfifo.interrupt_status = 0x1;
        assert_eq!(nv5.mmio_read_u32(PFIFO_INTR), 0);
    }

    #[test]
    fn enabled_subsystem_stores_configuration() {
        let mut nv5 = test_nv5();

        nv5.mmio_write_u32(PMC_ENABLE, 1 << PMC_ENABLE_PFIFO);
        nv5.mmio_write_u32(PFIFO_CONFIG_RAMHT, 0x0003_3000);
        assert_eq!(nv5.mmio_read_u32(PFIFO_CONFIG_RAMHT), 0x0003_3000);

        nv5.mmio_write_u32(PFIFO_INTR_EN, 0xFFFF_FFFF);
        assert_eq!(nv5.pfifo.interrupt_enable, 0x1111);
    }
}
