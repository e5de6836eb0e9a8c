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

    devices::nv5::rma.rs

    Real-Mode Access: a byte shifter that lets 16-bit VBIOS code build full
    32-bit MMIO transactions through the four CRTC-side ports 3D0h-3D3h.
    One byte at a time assembles a target address, then a data dword; the
    fourth data byte fires the transaction. The window a port pair reaches
    is selected by the RMA mode byte in CRTC register 38h.

*/

use crate::devices::nv5::{Nv5, MMIO_SIZE};

/// The CRTC-side port window the shifter listens on.
pub const RMA_REGISTER_START: u16 = 0x3D0;
pub const RMA_REGISTER_END: u16 = 0x3D3;

/// RMA mode is a 4-bit field of CRTC register 38h. Bit 0 enables the
/// shifter; bits 3:1 select which dword of the shifter a port pair reaches.
pub const RMA_MODE_MAX: u8 = 0x0F;

// Fixed signature returned from shifter addresses 0-3, used by legacy
// software as a presence handshake. Most significant byte first.
const RMA_SIGNATURE_MSB: u8 = 0x65;
const RMA_SIGNATURE_BYTE2: u8 = 0xD0;
const RMA_SIGNATURE_BYTE1: u8 = 0x16;
const RMA_SIGNATURE_LSB: u8 = 0x2B;

#[derive(Default)]
pub(crate) struct RmaState {
    /// Assembled 32-bit target address.
    pub addr: u32,
    /// Assembled 32-bit data value.
    pub data: u32,
    /// Mode byte from CRTC register 38h, masked to 4 bits.
    pub mode: u8,
    /// The last byte written to each of the four ports.
    pub regs: [u8; 4],
}

impl Nv5 {
    pub fn rma_mode(&self) -> u8 {
        self.pbus.rma.mode
    }

    /// Called by the SVGA core when CRTC register 38h is written.
    pub fn set_rma_mode(&mut self, mode: u8) {
        self.pbus.rma.mode = mode & RMA_MODE_MAX;
    }

    /// Read one of the RMA ports (3D0h-3D3h), as forwarded by the SVGA core.
    pub fn rma_port_read(&mut self, port: u16) -> u8 {
        if self.pbus.rma.mode & 0x01 == 0 {
            return 0;
        }

        let rma_address = (u32::from(self.pbus.rma.mode & (RMA_MODE_MAX - 1)) << 1) + u32::from(port & 0x03);
        self.rma_read(rma_address)
    }

    /// Write one of the RMA ports (3D0h-3D3h), as forwarded by the SVGA core.
    pub fn rma_port_write(&mut self, port: u16, data: u8) {
        self.pbus.rma.regs[(port & 0x03) as usize] = data;

        // Halfway through sending something.
        if self.pbus.rma.mode & 0x01 == 0 {
            return;
        }

        let rma_address = (u32::from(self.pbus.rma.mode & (RMA_MODE_MAX - 1)) << 1) + u32::from(port & 0x03);
        self.rma_write(rma_address, data);
    }

    // Shifter layout, dword-indexed by the expanded address:
    // 0x00  signature (reads)
    // 0x00  target address (writes)
    // 0x08  data; fourth byte completes one 32-bit transaction
    // 0x10  data with auto-increment

    pub(crate) fn rma_read(&mut self, address: u32) -> u8 {
        match address {
            0x00 => RMA_SIGNATURE_MSB,
            0x01 => RMA_SIGNATURE_BYTE2,
            0x02 => RMA_SIGNATURE_BYTE1,
            0x03 => RMA_SIGNATURE_LSB,
            0x08..=0x0B => {
                let final_address = self.pbus.rma.addr.wrapping_add(address & 0x03);

                let byte = if self.pbus.rma.addr < MMIO_SIZE {
                    self.mmio_read_u8(final_address)
                }
                else {
                    let vram_mask = self.config().vram_size.size_bytes() - 1;
                    self.vram.read_u8((final_address - MMIO_SIZE) as usize & vram_mask)
                };

                log::trace!(
                    "NV5: RMA read, address={:02X} final address={:08X} data={:02X}",
                    address,
                    final_address,
                    byte
                );

                byte
            }
            _ => 0,
        }
    }

    pub(crate) fn rma_write(&mut self, address: u32, data: u8) {
        let shift = (address & 0x03) << 3;

        if address < 0x08 {
            self.pbus.rma.addr &= !(0xFFu32 << shift);
            self.pbus.rma.addr |= u32::from(data) << shift;
            return;
        }

        self.pbus.rma.data &= !(0xFFu32 << shift);
        self.pbus.rma.data |= u32::from(data) << shift;

        // The fourth data byte completes the transaction.
        if address & 0x03 == 0x03 {
            let (target, dword) = (self.pbus.rma.addr, self.pbus.rma.data);

            log::trace!(
                "NV5: RMA write transaction complete, final address={:08X} data={:08X}",
                target,
                dword
            );

            if target < MMIO_SIZE {
                self.mmio_write_u32(target, dword);
            }
            else {
                let vram_mask = self.config().vram_size.size_bytes() - 1;
                self.vram.write_u32((target - MMIO_SIZE) as usize & vram_mask, dword);
            }

            // Streaming transfers: advance to the next dword.
            if address & 0x10 != 0 {
                self.pbus.rma.addr = self.pbus.rma.addr.wrapping_add(0x04);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::{LatchedLine, LinearMemory, NullMemory, NullVga},
        devices::nv5::Nv5Config,
    };
    use std::{cell::RefCell, rc::Rc};

    fn test_nv5() -> Nv5 {
        Nv5::new(
            Nv5Config::default(),
            Box::new(NullVga),
            Box::new(NullMemory),
            Box::new(LatchedLine::new()),
        )
    }

    #[derive(Default)]
    struct VramLog {
        writes: Vec<(usize, u32)>,
    }

    struct RecordingVram(Rc<RefCell<VramLog>>);

    impl LinearMemory for RecordingVram {
        fn read_u8(&mut self, offset: usize) -> u8 {
            offset as u8
        }

        fn write_u32(&mut self, offset: usize, data: u32) {
            self.0.borrow_mut().writes.push((offset, data));
        }
    }

    #[test]
    fn signature_handshake() {
        let mut nv5 = test_nv5();
        nv5.set_rma_mode(0x01);

        assert_eq!(nv5.rma_port_read(RMA_REGISTER_START), 0x65);
        assert_eq!(nv5.rma_port_read(RMA_REGISTER_START + 1), 0xD0);
        assert_eq!(nv5.rma_port_read(RMA_REGISTER_START + 2), 0x16);
        assert_eq!(nv5.rma_port_read(RMA_REGISTER_END), 0x2B);
    }

    #[test]
    fn disabled_mode_returns_zero_and_latches_nothing() {
        let mut nv5 = test_nv5();
        nv5.set_rma_mode(0x00);

        assert_eq!(nv5.rma_port_read(RMA_REGISTER_START), 0);
        nv5.rma_port_write(RMA_REGISTER_START, 0xAA);
        assert_eq!(nv5.pbus.rma.addr, 0);
        assert_eq!(nv5.pbus.rma.regs[0], 0xAA);
    }

    #[test]
    fn address_and_data_assembly_performs_one_transaction() {
        let mut nv5 = test_nv5();

        // Shifter addresses 0-3: target address, little-endian.
        for (lane, byte) in [0x00u8, 0x00, 0x00, 0x00].iter().enumerate() {
            nv5.rma_write(lane as u32, *byte);
        }
        assert_eq!(nv5.pbus.rma.addr, 0);

        // Shifter addresses 8-0xB: data; fourth byte fires the write.
        for (lane, byte) in [0x78u8, 0x56, 0x34, 0x12].iter().enumerate() {
            nv5.rma_write(0x08 + lane as u32, *byte);
        }
        assert_eq!(nv5.pbus.rma.data, 0x1234_5678);
    }

    #[test]
    fn register_aperture_transaction_reaches_mmio() {
        let mut nv5 = test_nv5();

        // Assemble the PRAMDAC VTOTAL address through the port interface.
        nv5.set_rma_mode(0x01);
        for (port, byte) in [(0x3D0u16, 0x1Cu8), (0x3D1, 0x07), (0x3D2, 0x68), (0x3D3, 0x00)] {
            nv5.rma_port_write(port, byte);
        }
        assert_eq!(nv5.pbus.rma.addr, 0x0068_071C);

        nv5.set_rma_mode(0x05); // ports now reach the data dword
        for (port, byte) in [(0x3D0u16, 0x78u8), (0x3D1, 0x56), (0x3D2, 0x34), (0x3D3, 0x12)] {
            nv5.rma_port_write(port, byte);
        }

        assert_eq!(nv5.mmio_read_u32(0x0068_071C), 0x1234_5678);

        // Data-port reads return single bytes of the target.
        assert_eq!(nv5.rma_port_read(0x3D0), 0x78);
        assert_eq!(nv5.rma_port_read(0x3D3), 0x12);
    }

    #[test]
    fn framebuffer_transaction_subtracts_the_register_aperture() {
        let log = Rc::new(RefCell::new(VramLog::default()));
        let mut nv5 = Nv5::new(
            Nv5Config::default(),
            Box::new(NullVga),
            Box::new(RecordingVram(log.clone())),
            Box::new(LatchedLine::new()),
        );

        nv5.pbus.rma.addr = MMIO_SIZE + 0x10;
        for (lane, byte) in [0xEFu8, 0xBE, 0xAD, 0xDE].iter().enumerate() {
            nv5.rma_write(0x08 + lane as u32, *byte);
        }

        assert_eq!(log.borrow().writes, vec![(0x10, 0xDEAD_BEEF)]);
    }

    #[test]
    fn auto_increment_advances_after_each_completed_transaction() {
        let mut nv5 = test_nv5();

        nv5.pbus.rma.addr = 0x0068_071C;

        // Shifter addresses 0x10-0x13: data with auto-increment.
        for (lane, byte) in [0x01u8, 0x00, 0x00, 0x00].iter().enumerate() {
            nv5.rma_write(0x10 + lane as u32, *byte);
        }
        assert_eq!(nv5.pbus.rma.addr, 0x0068_0720);

        // Incomplete transactions do not advance the address.
        nv5.rma_write(0x10, 0x02);
        assert_eq!(nv5.pbus.rma.addr, 0x0068_0720);
    }
}
