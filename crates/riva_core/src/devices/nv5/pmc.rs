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

    devices::nv5::pmc.rs

    PMC - Master control for the chip. Holds the global subsystem enable
    word and aggregates every subsystem's interrupt status/enable pair into
    one pending word driving the shared PCI interrupt line.

*/

use crate::devices::nv5::{
    pgraph::PGRAPH_INTR_VBLANK,
    registers::{self, RegisterDescriptor},
    ChipRevision, Nv5,
};

pub const PMC_BOOT: u32 = 0x000000;
pub const PMC_INTERRUPT_STATUS: u32 = 0x000100;
pub const PMC_INTERRUPT_ENABLE: u32 = 0x000140;
pub const PMC_ENABLE: u32 = 0x000200;

// Aggregate interrupt bit positions. The per-subsystem registers are laid
// out so their pending bits line up with these.
pub const PMC_INTERRUPT_PMEDIA: u32 = 4;
pub const PMC_INTERRUPT_PFIFO: u32 = 8;
pub const PMC_INTERRUPT_PGRAPH0: u32 = 12;
pub const PMC_INTERRUPT_PGRAPH1: u32 = 13;
pub const PMC_INTERRUPT_PVIDEO: u32 = 16;
pub const PMC_INTERRUPT_PTIMER: u32 = 20;
pub const PMC_INTERRUPT_PFB: u32 = 24;
pub const PMC_INTERRUPT_PBUS: u32 = 28;
pub const PMC_INTERRUPT_SOFTWARE: u32 = 31;

pub const PMC_INTERRUPT_ENABLE_HARDWARE: u32 = 0x1;
pub const PMC_INTERRUPT_ENABLE_SOFTWARE: u32 = 0x2;

/// Bit position of the PFIFO gate in the global subsystem enable word.
pub const PMC_ENABLE_PFIFO: u32 = 8;

// Boot/manufacturing ID per chip stepping.
const BOOT_REG_REV_A00: u32 = 0x2015_4000;
const BOOT_REG_REV_B00: u32 = 0x2015_4010;
const BOOT_REG_REV_C00: u32 = 0x2015_4020;

#[derive(Default)]
pub(crate) struct Pmc {
    /// Boot manufacturing information, fixed per configured revision.
    pub boot: u32,
    /// The consolidated pending-interrupt word. Always a pure function of
    /// the per-subsystem status/enable pairs; recomputed, never patched.
    pub interrupt_status: u32,
    /// Global interrupt enable: bit 0 hardware, bit 1 software.
    pub interrupt_enable: u32,
    /// Global subsystem enable word.
    pub enable: u32,
    /// Software interrupt requested via a PMC interrupt-status write.
    pub software_pending: bool,
}

pub(crate) const PMC_REGISTERS: &[RegisterDescriptor] = &[
    RegisterDescriptor {
        address: PMC_BOOT,
        name: "PMC: Boot Manufacturing Information",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PMC_INTERRUPT_STATUS,
        name: "PMC: Current Pending Subsystem Interrupts",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PMC_INTERRUPT_ENABLE,
        name: "PMC: Global Interrupt Enable",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PMC_ENABLE,
        name: "PMC: Global Subsystem Enable",
        read: None,
        write: None,
    },
];

impl Nv5 {
    pub(crate) fn pmc_init(&mut self) {
        log::debug!("NV5: initialising PMC");

        self.pmc.boot = match self.config().revision {
            ChipRevision::A00 => BOOT_REG_REV_A00,
            ChipRevision::B00 => BOOT_REG_REV_B00,
            ChipRevision::C00 => BOOT_REG_REV_C00,
        };

        self.pmc.interrupt_enable = PMC_INTERRUPT_ENABLE_HARDWARE | PMC_INTERRUPT_ENABLE_SOFTWARE;
    }

    /// True if the global subsystem enable word has the FIFO gate set.
    pub(crate) fn pfifo_enabled(&self) -> bool {
        self.pmc.enable & (1 << PMC_ENABLE_PFIFO) != 0
    }

    pub(crate) fn pmc_clear_interrupts(&mut self) {
        log::trace!("NV5: clearing IRQs");
        self.irq.deassert();
    }

    /// Recompute the aggregate pending word from every subsystem's
    /// status/enable pair, then optionally dispatch the shared line
    /// (`send_now` follows a register write that may newly justify an
    /// interrupt).
    pub(crate) fn pmc_handle_interrupts(&mut self, send_now: bool) -> u32 {
        let mut intr = 0u32;

        if self.pme.interrupt_status & self.pme.interrupt_enable != 0 {
            intr |= 1 << PMC_INTERRUPT_PMEDIA;
        }

        if self.pfifo.interrupt_status & self.pfifo.interrupt_enable != 0 {
            intr |= 1 << PMC_INTERRUPT_PFIFO;
        }

        // The vblank interrupt lives in PGRAPH INTR_0 bit 8 but reports
        // through the aggregate's PFB bit; everything else in INTR_0 reports
        // as PGRAPH0.
        let pgraph_pending_0 = self.pgraph.interrupt_status_0 & self.pgraph.interrupt_enable_0;
        if pgraph_pending_0 & PGRAPH_INTR_VBLANK != 0 {
            intr |= 1 << PMC_INTERRUPT_PFB;
        }
        if pgraph_pending_0 & !PGRAPH_INTR_VBLANK != 0 {
            intr |= 1 << PMC_INTERRUPT_PGRAPH0;
        }
        if self.pgraph.interrupt_status_1 & self.pgraph.interrupt_enable_1 != 0 {
            intr |= 1 << PMC_INTERRUPT_PGRAPH1;
        }

        if self.pvideo.interrupt_status & self.pvideo.interrupt_enable != 0 {
            intr |= 1 << PMC_INTERRUPT_PVIDEO;
        }

        if self.ptimer.interrupt_status & self.ptimer.interrupt_enable != 0 {
            intr |= 1 << PMC_INTERRUPT_PTIMER;
        }

        if self.pbus.interrupt_status & self.pbus.interrupt_enable != 0 {
            intr |= 1 << PMC_INTERRUPT_PBUS;
        }

        if self.pmc.software_pending {
            intr |= 1 << PMC_INTERRUPT_SOFTWARE;
        }

        self.pmc.interrupt_status = intr;

        // If interrupts are globally disabled, don't bother.
        if self.pmc.interrupt_enable == 0 {
            self.pmc_clear_interrupts();
            return intr;
        }

        if send_now {
            if intr == 0 {
                self.pmc_clear_interrupts();
                return intr;
            }

            // Any of bits 30:0 classifies the aggregate as hardware
            // originated; only the bare software bit takes the software
            // gate. The comment/code mismatch upstream is unresolved;
            // this preserves the code's behavior.
            if intr & 0x7FFF_FFFF != 0 {
                if self.pmc.interrupt_enable & PMC_INTERRUPT_ENABLE_HARDWARE != 0 {
                    log::debug!("NV5: firing hardware-originated interrupt PMC_INTR_0={:08X}", intr);
                    self.irq.assert();
                }
                else {
                    log::debug!(
                        "NV5: NOT firing hardware-originated interrupt PMC_INTR_0={:08X}, hardware interrupts are disabled",
                        intr
                    );
                }
            }
            else if self.pmc.interrupt_enable & PMC_INTERRUPT_ENABLE_SOFTWARE != 0 {
                log::debug!("NV5: firing software-originated interrupt PMC_INTR_0={:08X}", intr);
                self.irq.assert();
            }
            else {
                log::debug!(
                    "NV5: NOT firing software-originated interrupt PMC_INTR_0={:08X}, software interrupts are disabled",
                    intr
                );
            }
        }

        intr
    }

    pub(crate) fn pmc_read(&mut self, address: u32) -> u32 {
        let Some(reg) = registers::lookup(PMC_REGISTERS, address) else {
            log::warn!("NV5: PMC unknown register read (address={:08X}), returning 0", address);
            return 0;
        };

        let value = if let Some(read) = reg.read {
            read(self)
        }
        else {
            match reg.address {
                PMC_BOOT => self.pmc.boot,
                PMC_INTERRUPT_STATUS => {
                    self.pmc_clear_interrupts();
                    self.pmc_handle_interrupts(false)
                }
                PMC_INTERRUPT_ENABLE => self.pmc.interrupt_enable,
                PMC_ENABLE => self.pmc.enable,
                _ => 0,
            }
        };

        log::trace!("NV5: PMC read {:08X}: {} (value={:08X})", address, reg.name, value);
        value
    }

    pub(crate) fn pmc_write(&mut self, address: u32, value: u32) {
        let Some(reg) = registers::lookup(PMC_REGISTERS, address) else {
            log::warn!("NV5: PMC unknown register write {:08X} -> {:08X}, discarded", value, address);
            return;
        };

        log::trace!("NV5: PMC write {:08X} -> {:08X}: {}", value, address, reg.name);

        if let Some(write) = reg.write {
            write(self, value);
            return;
        }

        match reg.address {
            PMC_INTERRUPT_STATUS => {
                // Only the software interrupt can be raised or cleared from
                // here. Hardware interrupts are requested through the INTR_EN
                // registers of the subsystem being triggered.
                if value & 0x7FFF_FFFF != 0 {
                    log::warn!(
                        "NV5: PMC interrupt-status write {:08X} carries hardware bits; those are ignored",
                        value
                    );
                }

                self.pmc.software_pending = value & (1 << PMC_INTERRUPT_SOFTWARE) != 0;
                self.pmc_handle_interrupts(true);
            }
            PMC_INTERRUPT_ENABLE => {
                self.pmc.interrupt_enable = value & 0x03;
                self.pmc_handle_interrupts(value != 0);
            }
            PMC_ENABLE => {
                self.pmc.enable = value;
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
        devices::nv5::{ptimer, Nv5Config},
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
    fn bring_up_state() {
        let mut nv5 = test_nv5();

        assert_eq!(nv5.mmio_read_u32(PMC_BOOT), 0x2015_4020);
        assert_eq!(
            nv5.mmio_read_u32(PMC_INTERRUPT_ENABLE),
            PMC_INTERRUPT_ENABLE_HARDWARE | PMC_INTERRUPT_ENABLE_SOFTWARE
        );
        assert_eq!(nv5.mmio_read_u32(PMC_INTERRUPT_STATUS), 0);
        assert!(!nv5.irq_asserted());
    }

    #[test]
    fn unknown_register_in_a_mapped_range_is_benign() {
        let mut nv5 = test_nv5();

        // 0x000004 is inside the PMC aperture but has no descriptor.
        nv5.mmio_write_u32(0x000004, 0xDEAD_BEEF);
        assert_eq!(nv5.mmio_read_u32(0x000004), 0);
    }

    #[test]
    fn aggregate_bit_tracks_status_and_enable() {
        let mut nv5 = test_nv5();

        nv5.ptimer.interrupt_status = 0x1;
        nv5.ptimer.interrupt_enable = 0x0;
        assert_eq!(nv5.pmc_handle_interrupts(false) & (1 << PMC_INTERRUPT_PTIMER), 0);

        nv5.ptimer.interrupt_enable = 0x1;
        assert_ne!(nv5.pmc_handle_interrupts(false) & (1 << PMC_INTERRUPT_PTIMER), 0);

        nv5.ptimer.interrupt_status = 0x0;
        assert_eq!(nv5.pmc_handle_interrupts(false) & (1 << PMC_INTERRUPT_PTIMER), 0);
    }

    #[test]
    fn aggregate_never_retains_stale_bits() {
        let mut nv5 = test_nv5();

        nv5.pbus.interrupt_status = 0x1;
        nv5.pbus.interrupt_enable = 0x1;
        nv5.pmc_handle_interrupts(true);
        assert_ne!(nv5.pmc.interrupt_status & (1 << PMC_INTERRUPT_PBUS), 0);

        nv5.pbus.interrupt_status = 0x0;
        nv5.pmc_handle_interrupts(false);
        assert_eq!(nv5.pmc.interrupt_status, 0);
    }

    #[test]
    fn vblank_reports_through_the_pfb_bit() {
        let mut nv5 = test_nv5();

        nv5.pgraph.interrupt_status_0 = PGRAPH_INTR_VBLANK;
        nv5.pgraph.interrupt_enable_0 = PGRAPH_INTR_VBLANK;
        let intr = nv5.pmc_handle_interrupts(false);
        assert_ne!(intr & (1 << PMC_INTERRUPT_PFB), 0);
        assert_eq!(intr & (1 << PMC_INTERRUPT_PGRAPH0), 0);

        nv5.pgraph.interrupt_status_0 |= 0x1;
        nv5.pgraph.interrupt_enable_0 |= 0x1;
        let intr = nv5.pmc_handle_interrupts(false);
        assert_ne!(intr & (1 << PMC_INTERRUPT_PFB), 0);
        assert_ne!(intr & (1 << PMC_INTERRUPT_PGRAPH0), 0);
    }

    #[test]
    fn hardware_interrupts_gate_on_the_hardware_enable() {
        let mut nv5 = test_nv5();

        nv5.pbus.interrupt_status = 0x1;
        nv5.pbus.interrupt_enable = 0x1;
        nv5.pmc_handle_interrupts(true);
        assert!(nv5.irq_asserted());

        // Globally disabled: the line drops even with subsystems pending.
        nv5.mmio_write_u32(PMC_INTERRUPT_ENABLE, 0);
        assert!(!nv5.irq_asserted());

        // Software-only enable does not pass a hardware-classified aggregate.
        nv5.mmio_write_u32(PMC_INTERRUPT_ENABLE, PMC_INTERRUPT_ENABLE_SOFTWARE);
        assert!(!nv5.irq_asserted());

        nv5.mmio_write_u32(PMC_INTERRUPT_ENABLE, PMC_INTERRUPT_ENABLE_HARDWARE);
        assert!(nv5.irq_asserted());
    }

    #[test]
    fn software_interrupt_classification() {
        let mut nv5 = test_nv5();

        nv5.mmio_write_u32(PMC_INTERRUPT_STATUS, 1 << PMC_INTERRUPT_SOFTWARE);
        assert!(nv5.irq_asserted());
        assert_eq!(nv5.pmc.interrupt_status, 1 << PMC_INTERRUPT_SOFTWARE);

        // Clearing the software request drops the line.
        nv5.mmio_write_u32(PMC_INTERRUPT_STATUS, 0);
        assert!(!nv5.irq_asserted());

        // With the software gate off the request is suppressed.
        nv5.mmio_write_u32(PMC_INTERRUPT_ENABLE, PMC_INTERRUPT_ENABLE_HARDWARE);
        nv5.mmio_write_u32(PMC_INTERRUPT_STATUS, 1 << PMC_INTERRUPT_SOFTWARE);
        assert!(!nv5.irq_asserted());
    }

    #[test]
    fn subsystem_enable_word_gates_pfifo() {
        let mut nv5 = test_nv5();

        assert!(!nv5.pfifo_enabled());
        nv5.mmio_write_u32(PMC_ENABLE, 1 << PMC_ENABLE_PFIFO);
        assert!(nv5.pfifo_enabled());
    }

    #[test]
    fn write_one_to_clear_releases_the_line_when_nothing_remains() {
        let mut nv5 = test_nv5();

        nv5.mmio_write_u32(PMC_ENABLE, 1 << PMC_ENABLE_PFIFO);
        nv5.pfifo.interrupt_status = 0x11;
        nv5.pfifo.interrupt_enable = 0x11;
        nv5.ptimer.interrupt_status = 0x1;
        nv5.ptimer.interrupt_enable = 0x1;
        nv5.pmc_handle_interrupts(true);
        assert!(nv5.irq_asserted());

        // Clear only the FIFO's cache-error bit: RAMRO and the timer remain.
        nv5.mmio_write_u32(crate::devices::nv5::pfifo::PFIFO_INTR, 0x01);
        assert_eq!(nv5.pfifo.interrupt_status, 0x10);
        assert!(nv5.irq_asserted());

        nv5.mmio_write_u32(crate::devices::nv5::pfifo::PFIFO_INTR, 0x10);
        assert!(nv5.irq_asserted()); // timer still pending

        nv5.mmio_write_u32(ptimer::PTIMER_INTR, 0x1);
        assert!(!nv5.irq_asserted());
    }
}
