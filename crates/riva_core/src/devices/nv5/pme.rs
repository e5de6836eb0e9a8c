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

    devices::nv5::pme.rs

    PME: the NVIDIA Mediaport, an external MPEG decoder interface. Only the
    interrupt pair is modeled.

*/

use crate::devices::nv5::{
    registers::{self, RegisterDescriptor},
    Nv5,
};

pub const PME_INTR: u32 = 0x200100;
pub const PME_INTR_EN: u32 = 0x200140;

#[derive(Default)]
pub(crate) struct Pme {
    /// Interrupt state:
    /// Bit 0  - Image notifier
    /// Bit 4  - Vertical blank interval notifier
    /// Bit 8  - Video notifier
    /// Bit 12 - Audio notifier
    /// Bit 16 - VMI notifier
    pub interrupt_status: u32,
    pub interrupt_enable: u32,
}

pub(crate) const PME_REGISTERS: &[RegisterDescriptor] = &[
    RegisterDescriptor {
        address: PME_INTR,
        name: "PME: Interrupt Status",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PME_INTR_EN,
        name: "PME: Interrupt Enable",
        read: None,
        write: None,
    },
];

impl Nv5 {
    pub(crate) fn pme_init(&mut self) {
        log::debug!("NV5: initialising PME");
    }

    pub(crate) fn pme_read(&mut self, address: u32) -> u32 {
        let Some(reg) = registers::lookup(PME_REGISTERS, address) else {
            log::warn!("NV5: PME unknown register read (address={:08X}), returning 0", address);
            return 0;
        };

        let value = if let Some(read) = reg.read {
            read(self)
        }
        else {
            match reg.address {
                PME_INTR => self.pme.interrupt_status,
                PME_INTR_EN => self.pme.interrupt_enable,
                _ => 0,
            }
        };

        log::trace!("NV5: PME read {:08X}: {} (value={:08X})", address, reg.name, value);
        value
    }

    pub(crate) fn pme_write(&mut self, address: u32, value: u32) {
        let Some(reg) = registers::lookup(PME_REGISTERS, address) else {
            log::warn!("NV5: PME unknown register write {:08X} -> {:08X}, discarded", value, address);
            return;
        };

        log::trace!("NV5: PME write {:08X} -> {:08X}: {}", value, address, reg.name);

        if let Some(write) = reg.write {
            write(self, value);
            return;
        }

        match reg.address {
            PME_INTR => {
                self.pme.interrupt_status &= !value;
                self.pmc_clear_interrupts();
                self.pmc_handle_interrupts(true);
            }
            PME_INTR_EN => {
                self.pme.interrupt_enable = value & 0x0000_1111;
            }
            _ => {}
        }
    }
}
