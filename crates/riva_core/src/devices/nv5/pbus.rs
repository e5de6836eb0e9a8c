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

    devices::nv5::pbus.rs

    PBUS: the chip's 128-bit unified bus controller. Holds the bus-error
    interrupt pair, mirrors PCI configuration space into MMIO at 0x1800, and
    owns the real-mode access shifter state (see rma.rs).

*/

use crate::devices::nv5::{
    registers::{self, RegisterDescriptor},
    rma::RmaState,
    Nv5,
};

pub const PBUS_INTR: u32 = 0x001100;
pub const PBUS_INTR_EN: u32 = 0x001140;

// PCI configuration space is mirrored into MMIO here.
const PBUS_PCI_START: u32 = 0x001800;
const PBUS_PCI_END: u32 = 0x0018FF;

#[derive(Default)]
pub(crate) struct Pbus {
    /// Interrupt state. Bit 0: PCI bus error.
    pub interrupt_status: u32,
    pub interrupt_enable: u32,
    pub rma: RmaState,
}

pub(crate) const PBUS_REGISTERS: &[RegisterDescriptor] = &[
    RegisterDescriptor {
        address: PBUS_INTR,
        name: "PBUS: Interrupt Status",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PBUS_INTR_EN,
        name: "PBUS: Interrupt Enable",
        read: None,
        write: None,
    },
];

impl Nv5 {
    pub(crate) fn pbus_init(&mut self) {
        log::debug!("NV5: initialising PBUS");
    }

    pub(crate) fn pbus_read(&mut self, address: u32) -> u32 {
        // The PCI mirror window reflects configuration space byte for byte.
        if (PBUS_PCI_START..=PBUS_PCI_END).contains(&address) {
            let offset = (address & 0xFF) as u8;
            let dword = u32::from(self.pci_read(0, offset))
                | u32::from(self.pci_read(0, offset + 1)) << 8
                | u32::from(self.pci_read(0, offset + 2)) << 16
                | u32::from(self.pci_read(0, offset + 3)) << 24;
            log::trace!("NV5: PBUS PCI mirror read {:06X} (value={:08X})", address, dword);
            return dword;
        }

        let Some(reg) = registers::lookup(PBUS_REGISTERS, address) else {
            log::warn!("NV5: PBUS unknown register read (address={:08X}), returning 0", address);
            return 0;
        };

        let value = if let Some(read) = reg.read {
            read(self)
        }
        else {
            match reg.address {
                PBUS_INTR => self.pbus.interrupt_status,
                PBUS_INTR_EN => self.pbus.interrupt_enable,
                _ => 0,
            }
        };

        log::trace!("NV5: PBUS read {:08X}: {} (value={:08X})", address, reg.name, value);
        value
    }

    pub(crate) fn pbus_write(&mut self, address: u32, value: u32) {
        if (PBUS_PCI_START..=PBUS_PCI_END).contains(&address) {
            let offset = (address & 0xFF) as u8;
            log::trace!("NV5: PBUS PCI mirror write {:08X} -> {:06X}", value, address);
            for i in 0..4 {
                self.pci_write(0, offset + i, (value >> (i << 3)) as u8);
            }
            return;
        }

        let Some(reg) = registers::lookup(PBUS_REGISTERS, address) else {
            log::warn!("NV5: PBUS unknown register write {:08X} -> {:08X}, discarded", value, address);
            return;
        };

        log::trace!("NV5: PBUS write {:08X} -> {:08X}: {}", value, address, reg.name);

        if let Some(write) = reg.write {
            write(self, value);
            return;
        }

        match reg.address {
            PBUS_INTR => {
                self.pbus.interrupt_status &= !value;
                self.pmc_clear_interrupts();
                self.pmc_handle_interrupts(true);
            }
            PBUS_INTR_EN => {
                self.pbus.interrupt_enable = value & 0x0000_0001;
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
        Nv5::new(
            Nv5Config::default(),
            Box::new(NullVga),
            Box::new(NullMemory),
            Box::new(LatchedLine::new()),
        )
    }

    #[test]
    fn pci_mirror_reflects_configuration_space() {
        let mut nv5 = test_nv5();

        // Vendor 0x10DE in the low word, device 0x002D in the high word.
        assert_eq!(nv5.mmio_read_u32(0x001800), 0x002D_10DE);
    }

    #[test]
    fn bus_error_is_write_one_to_clear() {
        let mut nv5 = test_nv5();

        nv5.mmio_write_u32(PBUS_INTR_EN, 0x1);
        nv5.pbus.interrupt_status = 0x1;
        nv5.pmc_handle_interrupts(true);
        assert!(nv5.irq_asserted());

        nv5.mmio_write_u32(PBUS_INTR, 0x1);
        assert_eq!(nv5.pbus.interrupt_status, 0);
        assert!(!nv5.irq_asserted());
    }
}
