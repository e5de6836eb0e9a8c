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

    devices::nv5::pgraph.rs

    PGRAPH interrupt and debug registers. The 2D/3D engine itself is a
    separate subsystem outside this core; only the interrupt pairs that feed
    the PMC aggregate (including the vblank bit, which reports as PFB) and
    the debug scratch registers live here.

*/

use crate::devices::nv5::{
    registers::{self, RegisterDescriptor},
    Nv5,
};

pub const PGRAPH_DEBUG_0: u32 = 0x400080;
pub const PGRAPH_DEBUG_1: u32 = 0x400084;
pub const PGRAPH_DEBUG_2: u32 = 0x400088;
pub const PGRAPH_DEBUG_3: u32 = 0x40008C;
pub const PGRAPH_INTR_0: u32 = 0x400100;
pub const PGRAPH_INTR_1: u32 = 0x400104;
pub const PGRAPH_INTR_EN_0: u32 = 0x400140;
pub const PGRAPH_INTR_EN_1: u32 = 0x400144;

/// INTR_0 bit 8: vblank, fired every frame. Reports through the PFB bit of
/// the PMC aggregate.
pub const PGRAPH_INTR_VBLANK: u32 = 1 << 8;

#[derive(Default)]
pub(crate) struct Pgraph {
    pub debug: [u32; 4],
    pub interrupt_status_0: u32,
    pub interrupt_enable_0: u32,
    pub interrupt_status_1: u32,
    pub interrupt_enable_1: u32,
}

pub(crate) const PGRAPH_REGISTERS: &[RegisterDescriptor] = &[
    RegisterDescriptor {
        address: PGRAPH_DEBUG_0,
        name: "PGRAPH: Debug 0",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PGRAPH_DEBUG_1,
        name: "PGRAPH: Debug 1",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PGRAPH_DEBUG_2,
        name: "PGRAPH: Debug 2",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PGRAPH_DEBUG_3,
        name: "PGRAPH: Debug 3",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PGRAPH_INTR_0,
        name: "PGRAPH: Interrupt Status 0",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PGRAPH_INTR_1,
        name: "PGRAPH: Interrupt Status 1",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PGRAPH_INTR_EN_0,
        name: "PGRAPH: Interrupt Enable 0",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PGRAPH_INTR_EN_1,
        name: "PGRAPH: Interrupt Enable 1",
        read: None,
        write: None,
    },
];

impl Nv5 {
    pub(crate) fn pgraph_init(&mut self) {
        log::debug!("NV5: initialising PGRAPH interrupt state");
    }

    pub(crate) fn pgraph_read(&mut self, address: u32) -> u32 {
        let Some(reg) = registers::lookup(PGRAPH_REGISTERS, address) else {
            log::warn!("NV5: PGRAPH unknown register read (address={:08X}), returning 0", address);
            return 0;
        };

        let value = if let Some(read) = reg.read {
            read(self)
        }
        else {
            match reg.address {
                PGRAPH_DEBUG_0 => self.pgraph.debug[0],
                PGRAPH_DEBUG_1 => self.pgraph.debug[1],
                PGRAPH_DEBUG_2 => self.pgraph.debug[2],
                PGRAPH_DEBUG_3 => self.pgraph.debug[3],
                PGRAPH_INTR_0 => self.pgraph.interrupt_status_0,
                PGRAPH_INTR_1 => self.pgraph.interrupt_status_1,
                PGRAPH_INTR_EN_0 => self.pgraph.interrupt_enable_0,
                PGRAPH_INTR_EN_1 => self.pgraph.interrupt_enable_1,
                _ => 0,
            }
        };

        log::trace!("NV5: PGRAPH read {:08X}: {} (value={:08X})", address, reg.name, value);
        value
    }

    pub(crate) fn pgraph_write(&mut self, address: u32, value: u32) {
        let Some(reg) = registers::lookup(PGRAPH_REGISTERS, address) else {
            log::warn!("NV5: PGRAPH unknown register write {:08X} -> {:08X}, discarded", value, address);
            return;
        };

        log::trace!("NV5: PGRAPH write {:08X} -> {:08X}: {}", value, address, reg.name);

        if let Some(write) = reg.write {
            write(self, value);
            return;
        }

        match reg.address {
            PGRAPH_DEBUG_0 => self.pgraph.debug[0] = value,
            PGRAPH_DEBUG_1 => self.pgraph.debug[1] = value,
            PGRAPH_DEBUG_2 => self.pgraph.debug[2] = value,
            PGRAPH_DEBUG_3 => self.pgraph.debug[3] = value,
            PGRAPH_INTR_0 => {
                self.pgraph.interrupt_status_0 &= !value;
                self.pmc_clear_interrupts();
                self.pmc_handle_interrupts(true);
            }
            PGRAPH_INTR_1 => {
                self.pgraph.interrupt_status_1 &= !value;
                self.pmc_clear_interrupts();
                self.pmc_handle_interrupts(true);
            }
            PGRAPH_INTR_EN_0 => self.pgraph.interrupt_enable_0 = value,
            PGRAPH_INTR_EN_1 => self.pgraph.interrupt_enable_1 = value,
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
    fn vblank_is_write_one_to_clear() {
        let mut nv5 = test_nv5();

        nv5.mmio_write_u32(PGRAPH_INTR_EN_0, PGRAPH_INTR_VBLANK);
        nv5.pgraph.interrupt_status_0 = PGRAPH_INTR_VBLANK | 0x1;
        nv5.pmc_handle_interrupts(true);
        assert!(nv5.irq_asserted());

        nv5.mmio_write_u32(PGRAPH_INTR_0, PGRAPH_INTR_VBLANK);
        assert_eq!(nv5.pgraph.interrupt_status_0, 0x1);
        // Bit 0 is not enabled, so nothing remains pending.
        assert!(!nv5.irq_asserted());
    }
}
