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

    devices::nv5::mod.rs

    Implement the NVidia RIVA TNT2 Model 64 (NV5) graphics controller.

    Resources:
    "Envytools" hardware documentation, https://envytools.readthedocs.io
    NVIDIA RIVA TNT2 (NV5) datasheet excerpts
    Reverse-engineered NT driver CalcMNP and VBIOS clock programming

*/

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{
    bus::{DeviceEvent, InterruptLine, LinearMemory, VgaPorts},
    devices::rivatimer::RivaTimer,
};

mod arbiter;
mod pbus;
mod pci;
mod pextdev;
mod pfb;
mod pfifo;
mod pgraph;
mod pmc;
mod pme;
mod pramdac;
mod ptimer;
mod pvideo;
mod registers;
mod rma;

use pbus::Pbus;
use pci::PciConfig;
use pextdev::Pextdev;
use pfb::Pfb;
use pfifo::Pfifo;
use pgraph::Pgraph;
use pmc::Pmc;
use pme::Pme;
use pramdac::Pramdac;
use ptimer::Ptimer;
use pvideo::Pvideo;

/// Size of the register aperture (PCI BAR0).
pub const MMIO_SIZE: u32 = 0x100_0000;
/// Size of the linear framebuffer aperture (PCI BAR1).
pub const LFB_SIZE: u32 = 0x200_0000;

/// All register addresses live in a 24-bit window.
const MMIO_ADDRESS_MASK: u32 = 0xFF_FFFF;

/// 13.5 MHz clock crystal. The 14.318180 MHz strap option is not wired up;
/// every known NV5 board uses the 13.5 MHz part.
pub const CRYSTAL_FREQUENCY: f64 = 13_500_000.0;

/// The host timer system cannot tick anywhere near the real memory clock
/// rate, so timer periods are stretched by this factor and each tick advances
/// device time by the same factor.
pub const TIMER_SYSTEM_FIX_QUOTIENT: f64 = 10.0;

// The Weitek-compatible VGA window. Accesses here are byte-aligned VGA
// registers, not 32-bit GPU registers, and bypass the composer entirely.
const PRMVIO_START: u32 = 0x0C0000;
const PRMVIO_END: u32 = 0x0C0400;

// CRTC index/data pairs exposed through MMIO for real-mode software.
const PRMCIO_CRTC_REGISTER_CUR_INDEX_MONO: u32 = 0x6013B4;
const PRMCIO_CRTC_REGISTER_CUR_MONO: u32 = 0x6013B5;
const PRMCIO_CRTC_REGISTER_CUR_INDEX_COLOR: u32 = 0x6013D4;
const PRMCIO_CRTC_REGISTER_CUR_COLOR: u32 = 0x6013D5;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChipRevision {
    A00,
    B00,
    #[default]
    C00,
}

impl ChipRevision {
    /// The PCI revision ID byte reported for this stepping.
    pub fn revision_id(self) -> u8 {
        match self {
            ChipRevision::A00 => 0x00,
            ChipRevision::B00 => 0x10,
            ChipRevision::C00 => 0x15,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusGeneration {
    #[default]
    Pci,
    Agp4x,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VramSize {
    Vram16Mb,
    #[default]
    Vram32Mb,
}

impl VramSize {
    pub fn size_bytes(self) -> usize {
        match self {
            VramSize::Vram16Mb => 0x100_0000,
            VramSize::Vram32Mb => 0x200_0000,
        }
    }
}

/// Board-level configuration, normally supplied by the machine configuration
/// layer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nv5Config {
    pub revision: ChipRevision,
    pub bus_generation: BusGeneration,
    pub vram_size: VramSize,
}

/// The NV5 device. Owns all subsystem register state; every MMIO or port
/// access runs synchronously on the caller's thread.
pub struct Nv5 {
    cfg: Nv5Config,

    pub(crate) pci: PciConfig,
    pub(crate) pmc: Pmc,
    pub(crate) pbus: Pbus,
    pub(crate) pfifo: Pfifo,
    pub(crate) pfb: Pfb,
    pub(crate) pextdev: Pextdev,
    pub(crate) pgraph: Pgraph,
    pub(crate) pme: Pme,
    pub(crate) ptimer: Ptimer,
    pub(crate) pvideo: Pvideo,
    pub(crate) pramdac: Pramdac,

    pub(crate) bar0_mmio_base: u32,
    pub(crate) bar1_lfb_base: u32,

    pub(crate) pixel_clock_timer: Option<RivaTimer>,
    pub(crate) memory_clock_timer: Option<RivaTimer>,
    pub(crate) pixel_clock_frequency: f64,
    pub(crate) memory_clock_frequency: f64,

    pub(crate) vga: Box<dyn VgaPorts>,
    pub(crate) vram: Box<dyn LinearMemory>,
    pub(crate) irq: Box<dyn InterruptLine>,

    pub(crate) events: VecDeque<DeviceEvent>,
}

impl Nv5 {
    pub fn new(
        cfg: Nv5Config,
        vga: Box<dyn VgaPorts>,
        vram: Box<dyn LinearMemory>,
        irq: Box<dyn InterruptLine>,
    ) -> Self {
        // Overlapping dispatch ranges and duplicate register descriptors are
        // construction-time defects.
        arbiter::validate_ranges(arbiter::MMIO_RANGES);
        registers::validate_table(pmc::PMC_REGISTERS, "PMC");
        registers::validate_table(pbus::PBUS_REGISTERS, "PBUS");
        registers::validate_table(pfifo::PFIFO_REGISTERS, "PFIFO");
        registers::validate_table(pfb::PFB_REGISTERS, "PFB");
        registers::validate_table(pextdev::PEXTDEV_REGISTERS, "PEXTDEV");
        registers::validate_table(pgraph::PGRAPH_REGISTERS, "PGRAPH");
        registers::validate_table(pme::PME_REGISTERS, "PME");
        registers::validate_table(ptimer::PTIMER_REGISTERS, "PTIMER");
        registers::validate_table(pvideo::PVIDEO_REGISTERS, "PVIDEO");
        registers::validate_table(pramdac::PRAMDAC_REGISTERS, "PRAMDAC");

        let mut nv5 = Self {
            cfg,
            pci: PciConfig::default(),
            pmc: Pmc::default(),
            pbus: Pbus::default(),
            pfifo: Pfifo::default(),
            pfb: Pfb::default(),
            pextdev: Pextdev::default(),
            pgraph: Pgraph::default(),
            pme: Pme::default(),
            ptimer: Ptimer::default(),
            pvideo: Pvideo::default(),
            pramdac: Pramdac::default(),
            bar0_mmio_base: 0,
            bar1_lfb_base: 0,
            pixel_clock_timer: None,
            memory_clock_timer: None,
            pixel_clock_frequency: 0.0,
            memory_clock_frequency: 0.0,
            vga,
            vram,
            irq,
            events: VecDeque::new(),
        };

        log::debug!("NV5: initialising core");

        nv5.pextdev_init();
        nv5.pmc_init();
        nv5.pbus_init();
        nv5.pfb_init();
        nv5.pramdac_init();
        nv5.pfifo_init();
        nv5.pgraph_init();
        nv5.ptimer_init();
        nv5.pvideo_init();
        nv5.pme_init();
        nv5.pci_init();

        nv5
    }

    pub fn config(&self) -> &Nv5Config {
        &self.cfg
    }

    /// Drain the next pending host notification, if any.
    pub fn poll_event(&mut self) -> Option<DeviceEvent> {
        self.events.pop_front()
    }

    /// State of the shared interrupt line.
    pub fn irq_asserted(&self) -> bool {
        self.irq.asserted()
    }

    /// Advance the device by `us` microseconds of host time. This is the
    /// host's periodic callback entry point; it drives both clock generators
    /// and, through the memory clock, the PTIMER time counter.
    pub fn run(&mut self, us: f64) {
        if let Some(timer) = &mut self.pixel_clock_timer {
            // The pixel clock paces the raster engine, which lives in the
            // SVGA/render collaborators. Nothing to do per tick here yet.
            timer.advance(us);
        }

        let mut ticks = 0;
        let mut period_us = 0.0;
        if let Some(timer) = &mut self.memory_clock_timer {
            ticks = timer.advance(us);
            period_us = timer.period_us();
        }
        for _ in 0..ticks {
            self.ptimer_tick(period_us);
        }
    }

    // Determine if this address needs to be redirected to the SVGA subsystem.
    fn is_svga_redirect_address(address: u32) -> bool {
        (PRMVIO_START..=PRMVIO_END).contains(&address)
            || address == PRMCIO_CRTC_REGISTER_CUR_COLOR
            || address == PRMCIO_CRTC_REGISTER_CUR_INDEX_COLOR
            || address == PRMCIO_CRTC_REGISTER_CUR_MONO
            || address == PRMCIO_CRTC_REGISTER_CUR_INDEX_MONO
    }

    // All GPU registers are canonically 32-bit; narrower accesses are
    // composed on top of the 32-bit primitive below. The VGA-compatible
    // window is the exception: those registers are byte-aligned and go to
    // the SVGA core as 1, 2 or 4 byte accesses, lowest byte first.

    pub fn mmio_read_u8(&mut self, address: u32) -> u8 {
        let address = address & MMIO_ADDRESS_MASK;

        if Nv5::is_svga_redirect_address(address) {
            let port = (address & 0x3FF) as u16;
            let byte = self.vga.port_in(port);
            log::trace!("NV5: redirected MMIO read8 to SVGA: addr={:06X} returned {:02X}", address, byte);
            return byte;
        }

        let dword = self.mmio_read_u32(address);
        (dword >> ((address & 3) << 3)) as u8
    }

    pub fn mmio_read_u16(&mut self, address: u32) -> u16 {
        let address = address & MMIO_ADDRESS_MASK;

        if Nv5::is_svga_redirect_address(address) {
            let port = (address & 0x3FF) as u16;
            let word = u16::from(self.vga.port_in(port)) | u16::from(self.vga.port_in(port + 1)) << 8;
            log::trace!("NV5: redirected MMIO read16 to SVGA: addr={:06X} returned {:04X}", address, word);
            return word;
        }

        let dword = self.mmio_read_u32(address);
        (dword >> ((address & 3) << 3)) as u16
    }

    pub fn mmio_read_u32(&mut self, address: u32) -> u32 {
        let address = address & MMIO_ADDRESS_MASK;

        if Nv5::is_svga_redirect_address(address) {
            let port = (address & 0x3FF) as u16;
            let dword = u32::from(self.vga.port_in(port))
                | u32::from(self.vga.port_in(port + 1)) << 8
                | u32::from(self.vga.port_in(port + 2)) << 16
                | u32::from(self.vga.port_in(port + 3)) << 24;
            log::trace!("NV5: redirected MMIO read32 to SVGA: addr={:06X} returned {:08X}", address, dword);
            return dword;
        }

        self.mmio_arbitrate_read(address)
    }

    pub fn mmio_write_u8(&mut self, address: u32, data: u8) {
        let address = address & MMIO_ADDRESS_MASK;

        if Nv5::is_svga_redirect_address(address) {
            let port = (address & 0x3FF) as u16;
            log::trace!("NV5: redirected MMIO write8 to SVGA: addr={:06X} val={:02X}", address, data);
            self.vga.port_out(port, data);
            return;
        }

        // Read-modify-write: replace one byte lane of the full register.
        let shift = (address & 3) << 3;
        let mut dword = self.mmio_read_u32(address);
        dword &= !(0xFFu32 << shift);
        dword |= u32::from(data) << shift;
        self.mmio_write_u32(address, dword);
    }

    pub fn mmio_write_u16(&mut self, address: u32, data: u16) {
        let address = address & MMIO_ADDRESS_MASK;

        if Nv5::is_svga_redirect_address(address) {
            let port = (address & 0x3FF) as u16;
            log::trace!("NV5: redirected MMIO write16 to SVGA: addr={:06X} val={:04X}", address, data);
            self.vga.port_out(port, data as u8);
            self.vga.port_out(port + 1, (data >> 8) as u8);
            return;
        }

        let shift = (address & 3) << 3;
        let mut dword = self.mmio_read_u32(address);
        dword &= !(0xFFFFu32 << shift);
        dword |= u32::from(data) << shift;
        self.mmio_write_u32(address, dword);
    }

    pub fn mmio_write_u32(&mut self, address: u32, data: u32) {
        let address = address & MMIO_ADDRESS_MASK;

        if Nv5::is_svga_redirect_address(address) {
            let port = (address & 0x3FF) as u16;
            log::trace!("NV5: redirected MMIO write32 to SVGA: addr={:06X} val={:08X}", address, data);
            self.vga.port_out(port, data as u8);
            self.vga.port_out(port + 1, (data >> 8) as u8);
            self.vga.port_out(port + 2, (data >> 16) as u8);
            self.vga.port_out(port + 3, (data >> 24) as u8);
            return;
        }

        self.mmio_arbitrate_write(address, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{LatchedLine, NullMemory, NullVga};
    use std::{cell::RefCell, rc::Rc};

    // An arbitrary register backed by plain storage, for composer tests.
    const SCRATCH_REGISTER: u32 = 0x68071C; // PRAMDAC VTOTAL

    fn test_nv5() -> Nv5 {
        Nv5::new(
            Nv5Config::default(),
            Box::new(NullVga),
            Box::new(NullMemory),
            Box::new(LatchedLine::new()),
        )
    }

    #[test]
    fn narrow_reads_slice_the_aligned_dword() {
        let mut nv5 = test_nv5();
        nv5.mmio_write_u32(SCRATCH_REGISTER, 0xAABBCCDD);

        assert_eq!(nv5.mmio_read_u8(SCRATCH_REGISTER), 0xDD);
        assert_eq!(nv5.mmio_read_u8(SCRATCH_REGISTER + 1), 0xCC);
        assert_eq!(nv5.mmio_read_u8(SCRATCH_REGISTER + 2), 0xBB);
        assert_eq!(nv5.mmio_read_u8(SCRATCH_REGISTER + 3), 0xAA);

        assert_eq!(nv5.mmio_read_u16(SCRATCH_REGISTER), 0xCCDD);
        assert_eq!(nv5.mmio_read_u16(SCRATCH_REGISTER + 2), 0xAABB);
    }

    #[test]
    fn narrow_writes_preserve_untouched_lanes() {
        let mut nv5 = test_nv5();
        nv5.mmio_write_u32(SCRATCH_REGISTER, 0xAABBCCDD);

        nv5.mmio_write_u8(SCRATCH_REGISTER + 1, 0x42);
        assert_eq!(nv5.mmio_read_u32(SCRATCH_REGISTER), 0xAABB42DD);

        nv5.mmio_write_u16(SCRATCH_REGISTER + 2, 0x1234);
        assert_eq!(nv5.mmio_read_u32(SCRATCH_REGISTER), 0x123442DD);
    }

    #[derive(Default)]
    struct PortLog {
        reads: Vec<u16>,
        writes: Vec<(u16, u8)>,
    }

    struct RecordingVga(Rc<RefCell<PortLog>>);

    impl crate::bus::VgaPorts for RecordingVga {
        fn port_in(&mut self, port: u16) -> u8 {
            self.0.borrow_mut().reads.push(port);
            port as u8
        }

        fn port_out(&mut self, port: u16, data: u8) {
            self.0.borrow_mut().writes.push((port, data));
        }
    }

    #[test]
    fn vga_window_accesses_bypass_the_composer() {
        let log = Rc::new(RefCell::new(PortLog::default()));
        let mut nv5 = Nv5::new(
            Nv5Config::default(),
            Box::new(RecordingVga(log.clone())),
            Box::new(NullMemory),
            Box::new(LatchedLine::new()),
        );

        nv5.mmio_write_u32(0x0C0000, 0x11223344);
        assert_eq!(
            log.borrow().writes,
            vec![(0x000, 0x44), (0x001, 0x33), (0x002, 0x22), (0x003, 0x11)]
        );

        let word = nv5.mmio_read_u16(0x0C0002);
        assert_eq!(log.borrow().reads, vec![0x002, 0x003]);
        assert_eq!(word, 0x0302);

        // The CRTC data register exposed through PRMCIO is also redirected.
        nv5.mmio_write_u8(0x6013D5, 0x7F);
        assert_eq!(*log.borrow().writes.last().unwrap(), (0x3D5, 0x7F));
    }
}
