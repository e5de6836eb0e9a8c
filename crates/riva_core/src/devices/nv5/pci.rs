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

    devices::nv5::pci.rs

    PCI configuration space. BAR0 points at the register aperture and BAR1
    at the linear framebuffer; only the top byte of each is writable. Writes
    that move an aperture or toggle the VBIOS expansion ROM queue a
    DeviceEvent so the host can update its memory map. Everything else is
    plain byte storage.

*/

use crate::{bus::DeviceEvent, devices::nv5::Nv5};

pub const PCI_VENDOR_NV: u16 = 0x10DE;
pub const PCI_DEVICE_NV5: u16 = 0x002D;

pub const PCI_CFG_VENDOR_ID: u8 = 0x00;
pub const PCI_CFG_DEVICE_ID: u8 = 0x02;
pub const PCI_CFG_COMMAND_L: u8 = 0x04;
pub const PCI_CFG_COMMAND_H: u8 = 0x05;
pub const PCI_CFG_STATUS_L: u8 = 0x06;
pub const PCI_CFG_STATUS_H: u8 = 0x07;
pub const PCI_CFG_REVISION: u8 = 0x08;
pub const PCI_CFG_PROG_IF: u8 = 0x09;
pub const PCI_CFG_SUBCLASS_CODE: u8 = 0x0A;
pub const PCI_CFG_CLASS_CODE: u8 = 0x0B;
pub const PCI_CFG_CACHE_LINE_SIZE: u8 = 0x0C;
pub const PCI_CFG_LATENCY_TIMER: u8 = 0x0D;
pub const PCI_CFG_HEADER_TYPE: u8 = 0x0E;
pub const PCI_CFG_BIST: u8 = 0x0F;
pub const PCI_CFG_BAR0_L: u8 = 0x10;
pub const PCI_CFG_BAR0_BASE_ADDRESS: u8 = 0x13;
pub const PCI_CFG_BAR1_L: u8 = 0x14;
pub const PCI_CFG_BAR1_BASE_ADDRESS: u8 = 0x17;
pub const PCI_CFG_BAR_INVALID_START: u8 = 0x18;
pub const PCI_CFG_BAR_INVALID_END: u8 = 0x27;
pub const PCI_CFG_SUBSYSTEM_ID: u8 = 0x2C;
pub const PCI_CFG_ENABLE_VBIOS: u8 = 0x30;
pub const PCI_CFG_VBIOS_BASE_L: u8 = 0x32;
pub const PCI_CFG_VBIOS_BASE_H: u8 = 0x33;
pub const PCI_CFG_INT_LINE: u8 = 0x3C;
pub const PCI_CFG_INT_PIN: u8 = 0x3D;
pub const PCI_CFG_MIN_GRANT: u8 = 0x3E;
pub const PCI_CFG_MAX_LATENCY: u8 = 0x3F;
pub const PCI_CFG_SUBSYSTEM_ID_MIRROR_START: u8 = 0x40;
pub const PCI_CFG_SUBSYSTEM_ID_MIRROR_END: u8 = 0x43;

pub const PCI_COMMAND_IO: u8 = 0x01;
pub const PCI_COMMAND_MEM: u8 = 0x02;
pub const PCI_COMMAND_MASTER: u8 = 0x04;

const PCI_STATUS_L_CAP_LIST: u8 = 0x10;
const PCI_STATUS_L_66MHZ_CAPABLE: u8 = 0x20;
const PCI_STATUS_L_FAST_BACK: u8 = 0x80;
const PCI_STATUS_H_DEVSEL_TIMING: u8 = 5;
const PCI_STATUS_H_MEDIUM_DEVSEL_TIMING: u8 = 0x02;

// BARs are marked prefetchable per the datasheet.
const PCI_CFG_BAR_PREFETCHABLE: u8 = 1 << 3;

const PCI_INT_PIN_INTA: u8 = 0x01;
const PCI_CFG_CACHE_LINE_SIZE_DEFAULT: u8 = 0x40;
const PCI_CFG_MIN_GRANT_DEFAULT: u8 = 0x03;
const PCI_CFG_MAX_LATENCY_DEFAULT: u8 = 0x01;

pub(crate) struct PciConfig {
    pub regs: [u8; 256],
    pub vbios_enabled: bool,
    pub int_line: u8,
}

impl Default for PciConfig {
    fn default() -> Self {
        Self {
            regs: [0; 256],
            vbios_enabled: false,
            int_line: 0xFF,
        }
    }
}

impl Nv5 {
    pub(crate) fn pci_init(&mut self) {
        self.pci.int_line = 0xFF;
        self.pci.regs[PCI_CFG_COMMAND_L as usize] = PCI_COMMAND_IO | PCI_COMMAND_MEM;
    }

    /// Read one byte of configuration space. The function number does not
    /// participate in decoding on this device.
    pub fn pci_read(&mut self, _function: u8, addr: u8) -> u8 {
        let ret = match addr {
            PCI_CFG_VENDOR_ID => PCI_VENDOR_NV as u8,
            0x01 => (PCI_VENDOR_NV >> 8) as u8,
            PCI_CFG_DEVICE_ID => PCI_DEVICE_NV5 as u8,
            0x03 => (PCI_DEVICE_NV5 >> 8) as u8,
            PCI_CFG_COMMAND_L => {
                self.pci.regs[PCI_CFG_COMMAND_L as usize] & (PCI_COMMAND_IO | PCI_COMMAND_MEM | PCI_COMMAND_MASTER)
            }
            PCI_CFG_COMMAND_H => self.pci.regs[PCI_CFG_COMMAND_H as usize],
            PCI_CFG_STATUS_L => {
                let mut status =
                    self.pci.regs[PCI_CFG_STATUS_L as usize] | PCI_STATUS_L_CAP_LIST | PCI_STATUS_L_FAST_BACK;
                if self.straps_bus_66mhz() {
                    status |= PCI_STATUS_L_66MHZ_CAPABLE;
                }
                status
            }
            PCI_CFG_STATUS_H => {
                self.pci.regs[PCI_CFG_STATUS_H as usize]
                    | (PCI_STATUS_H_MEDIUM_DEVSEL_TIMING << PCI_STATUS_H_DEVSEL_TIMING)
            }
            PCI_CFG_REVISION => self.config().revision.revision_id(),
            PCI_CFG_PROG_IF | PCI_CFG_SUBCLASS_CODE => 0x00,
            PCI_CFG_CLASS_CODE => 0x03, // VGA-compatible display controller
            PCI_CFG_CACHE_LINE_SIZE => PCI_CFG_CACHE_LINE_SIZE_DEFAULT,
            PCI_CFG_LATENCY_TIMER | PCI_CFG_HEADER_TYPE | PCI_CFG_BIST => 0x00,
            PCI_CFG_BAR0_L | PCI_CFG_BAR1_L => PCI_CFG_BAR_PREFETCHABLE,
            // The middle BAR bytes are hardwired to zero per the datasheet.
            0x11 | 0x12 | 0x15 | 0x16 => 0x00,
            PCI_CFG_BAR0_BASE_ADDRESS => (self.bar0_mmio_base >> 24) as u8,
            PCI_CFG_BAR1_BASE_ADDRESS => (self.bar1_lfb_base >> 24) as u8,
            // BARs 2-5 are not present.
            PCI_CFG_BAR_INVALID_START..=PCI_CFG_BAR_INVALID_END => 0x00,
            PCI_CFG_ENABLE_VBIOS => self.pci.vbios_enabled as u8,
            PCI_CFG_INT_LINE => self.pci.int_line,
            PCI_CFG_INT_PIN => PCI_INT_PIN_INTA,
            PCI_CFG_MIN_GRANT => PCI_CFG_MIN_GRANT_DEFAULT,
            PCI_CFG_MAX_LATENCY => PCI_CFG_MAX_LATENCY_DEFAULT,
            PCI_CFG_SUBSYSTEM_ID_MIRROR_START..=PCI_CFG_SUBSYSTEM_ID_MIRROR_END => {
                self.pci.regs[(PCI_CFG_SUBSYSTEM_ID + (addr & 0x03)) as usize]
            }
            _ => self.pci.regs[addr as usize],
        };

        log::trace!("NV5: pci_read addr={:02X} ret={:02X}", addr, ret);
        ret
    }

    /// Write one byte of configuration space, intercepting the offsets that
    /// relocate apertures or toggle the VBIOS ROM.
    pub fn pci_write(&mut self, _function: u8, addr: u8, value: u8) {
        // Only the most significant byte of each BAR can be modified.
        if (PCI_CFG_BAR0_L..PCI_CFG_BAR0_BASE_ADDRESS).contains(&addr)
            || (PCI_CFG_BAR1_L..PCI_CFG_BAR1_BASE_ADDRESS).contains(&addr)
        {
            return;
        }

        log::trace!("NV5: pci_write addr={:02X} val={:02X}", addr, value);

        self.pci.regs[addr as usize] = value;

        match addr {
            PCI_CFG_COMMAND_L => {
                self.pci_update_mappings();
            }
            PCI_CFG_STATUS_L => {
                self.pci.regs[PCI_CFG_STATUS_L as usize] =
                    value | PCI_STATUS_L_CAP_LIST | PCI_STATUS_L_66MHZ_CAPABLE | PCI_STATUS_L_FAST_BACK;
            }
            PCI_CFG_STATUS_H => {
                self.pci.regs[PCI_CFG_STATUS_H as usize] =
                    value | (PCI_STATUS_H_MEDIUM_DEVSEL_TIMING << PCI_STATUS_H_DEVSEL_TIMING);
            }
            PCI_CFG_BAR0_BASE_ADDRESS => {
                self.bar0_mmio_base = u32::from(value) << 24;
                self.pci_update_mappings();
            }
            PCI_CFG_BAR1_BASE_ADDRESS => {
                self.bar1_lfb_base = u32::from(value) << 24;
                self.pci_update_mappings();
            }
            PCI_CFG_ENABLE_VBIOS | PCI_CFG_VBIOS_BASE_L | PCI_CFG_VBIOS_BASE_H => {
                // Make sure we are actually toggling the VBIOS, not moving
                // the ROM base.
                if addr == PCI_CFG_ENABLE_VBIOS {
                    self.pci.vbios_enabled = value & 0x01 != 0;
                }

                if self.pci.vbios_enabled {
                    if addr != PCI_CFG_ENABLE_VBIOS {
                        let new_base = u32::from(self.pci.regs[PCI_CFG_VBIOS_BASE_H as usize]) << 24
                            | u32::from(self.pci.regs[PCI_CFG_VBIOS_BASE_L as usize]) << 16;
                        log::debug!("NV5: VBIOS relocation -> {:08X}", new_base);
                        self.events.push_back(DeviceEvent::VbiosRelocated(new_base));
                    }
                    else {
                        log::debug!("NV5: VBIOS enable");
                        self.events.push_back(DeviceEvent::VbiosVisibilityChanged(true));
                    }
                }
                else {
                    log::debug!("NV5: VBIOS disable");
                    self.events.push_back(DeviceEvent::VbiosVisibilityChanged(false));
                }
            }
            PCI_CFG_INT_LINE => {
                self.pci.int_line = value;
            }
            // BARs 2-5 are not present and cannot be written.
            PCI_CFG_BAR_INVALID_START..=PCI_CFG_BAR_INVALID_END => {}
            // Mirrored into the subsystem ID.
            PCI_CFG_SUBSYSTEM_ID_MIRROR_START..=PCI_CFG_SUBSYSTEM_ID_MIRROR_END => {
                self.pci.regs[(PCI_CFG_SUBSYSTEM_ID + (addr & 0x03)) as usize] = value;
            }
            _ => {}
        }
    }

    fn pci_update_mappings(&mut self) {
        let command = self.pci.regs[PCI_CFG_COMMAND_L as usize];
        let io_enabled = command & PCI_COMMAND_IO != 0;
        let mem_enabled = command & PCI_COMMAND_MEM != 0;

        log::debug!(
            "NV5: memory mapping config change, io={} mem={} BAR0={:08X} BAR1={:08X}",
            io_enabled,
            mem_enabled,
            self.bar0_mmio_base,
            self.bar1_lfb_base
        );

        self.events.push_back(DeviceEvent::MappingsChanged {
            mmio_base: self.bar0_mmio_base,
            lfb_base: self.bar1_lfb_base,
            io_enabled,
            mem_enabled,
        });
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

    fn drain_events(nv5: &mut Nv5) -> Vec<crate::bus::DeviceEvent> {
        let mut events = Vec::new();
        while let Some(event) = nv5.poll_event() {
            events.push(event);
        }
        events
    }

    #[test]
    fn identification_registers() {
        let mut nv5 = test_nv5();

        assert_eq!(nv5.pci_read(0, PCI_CFG_VENDOR_ID), 0xDE);
        assert_eq!(nv5.pci_read(0, 0x01), 0x10);
        assert_eq!(nv5.pci_read(0, PCI_CFG_DEVICE_ID), 0x2D);
        assert_eq!(nv5.pci_read(0, 0x03), 0x00);
        assert_eq!(nv5.pci_read(0, PCI_CFG_CLASS_CODE), 0x03);
        assert_eq!(nv5.pci_read(0, PCI_CFG_REVISION), 0x15);
        assert_eq!(nv5.pci_read(0, PCI_CFG_INT_PIN), 0x01);
    }

    #[test]
    fn status_reports_66mhz_capability_from_the_straps() {
        let mut nv5 = test_nv5();
        assert_ne!(nv5.pci_read(0, PCI_CFG_STATUS_L) & 0x20, 0);
    }

    #[test]
    fn only_the_bar_top_byte_is_writable() {
        let mut nv5 = test_nv5();
        drain_events(&mut nv5);

        nv5.pci_write(0, PCI_CFG_BAR0_L, 0xFF);
        nv5.pci_write(0, 0x11, 0xFF);
        assert_eq!(nv5.pci_read(0, PCI_CFG_BAR0_L), PCI_CFG_BAR_PREFETCHABLE);
        assert_eq!(nv5.pci_read(0, 0x11), 0x00);
        assert!(drain_events(&mut nv5).is_empty());

        nv5.pci_write(0, PCI_CFG_BAR0_BASE_ADDRESS, 0xE0);
        assert_eq!(nv5.pci_read(0, PCI_CFG_BAR0_BASE_ADDRESS), 0xE0);
        assert_eq!(nv5.bar0_mmio_base, 0xE000_0000);

        let events = drain_events(&mut nv5);
        assert!(events.iter().any(|event| matches!(
            event,
            crate::bus::DeviceEvent::MappingsChanged { mmio_base: 0xE000_0000, .. }
        )));
    }

    #[test]
    fn vbios_enable_and_relocation_emit_events() {
        let mut nv5 = test_nv5();
        drain_events(&mut nv5);

        nv5.pci_write(0, PCI_CFG_ENABLE_VBIOS, 0x01);
        assert_eq!(
            drain_events(&mut nv5),
            vec![crate::bus::DeviceEvent::VbiosVisibilityChanged(true)]
        );

        nv5.pci_write(0, PCI_CFG_VBIOS_BASE_H, 0xC0);
        assert_eq!(
            drain_events(&mut nv5),
            vec![crate::bus::DeviceEvent::VbiosRelocated(0xC000_0000)]
        );

        nv5.pci_write(0, PCI_CFG_ENABLE_VBIOS, 0x00);
        assert_eq!(
            drain_events(&mut nv5),
            vec![crate::bus::DeviceEvent::VbiosVisibilityChanged(false)]
        );
    }

    #[test]
    fn subsystem_id_mirror() {
        let mut nv5 = test_nv5();

        nv5.pci_write(0, 0x41, 0xAB);
        assert_eq!(nv5.pci_read(0, 0x2D), 0xAB);
        assert_eq!(nv5.pci_read(0, 0x41), 0xAB);
    }
}
