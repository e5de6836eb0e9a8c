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

    bus.rs

    Traits for the seams between the GPU core and its host machine: the
    shared PCI interrupt line, the legacy SVGA register core, and linear
    VRAM. The host implements these; the core only calls through them.

*/

/// The shared PCI interrupt line (INTA#). The host owns the actual line
/// state; the core asserts and deasserts it as aggregate interrupt state
/// changes.
pub trait InterruptLine {
    fn assert(&mut self);
    fn deassert(&mut self);
    fn asserted(&self) -> bool;
}

/// A latched line suitable for hosts that poll, and for tests.
#[derive(Default)]
pub struct LatchedLine {
    asserted: bool,
}

impl LatchedLine {
    pub fn new() -> Self {
        Self { asserted: false }
    }
}

impl InterruptLine for LatchedLine {
    fn assert(&mut self) {
        self.asserted = true;
    }

    fn deassert(&mut self) {
        self.asserted = false;
    }

    fn asserted(&self) -> bool {
        self.asserted
    }
}

/// The legacy SVGA register core, addressed by 10-bit port number. MMIO
/// accesses that land in the VGA-compatible window are redirected here
/// byte-at-a-time, lowest byte first.
pub trait VgaPorts {
    fn port_in(&mut self, port: u16) -> u8;
    fn port_out(&mut self, port: u16, data: u8);
}

/// A disconnected SVGA core. Reads return open bus.
pub struct NullVga;

impl VgaPorts for NullVga {
    fn port_in(&mut self, _port: u16) -> u8 {
        0xFF
    }

    fn port_out(&mut self, _port: u16, _data: u8) {}
}

/// Linear framebuffer memory behind the real-mode access path. Offsets are
/// relative to the start of VRAM; the caller has already subtracted the
/// register aperture.
pub trait LinearMemory {
    fn read_u8(&mut self, offset: usize) -> u8;
    fn write_u32(&mut self, offset: usize, data: u32);
}

/// A disconnected framebuffer. Reads return zero, writes are dropped.
pub struct NullMemory;

impl LinearMemory for NullMemory {
    fn read_u8(&mut self, _offset: usize) -> u8 {
        0
    }

    fn write_u32(&mut self, _offset: usize, _data: u32) {}
}

/// Events produced by PCI configuration writes that require the host to
/// update its memory mapping tables. Drained via [`crate::Nv5::poll_event`].
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceEvent {
    /// The command register or a BAR changed; apertures may have moved.
    MappingsChanged {
        mmio_base: u32,
        lfb_base: u32,
        io_enabled: bool,
        mem_enabled: bool,
    },
    /// The VBIOS expansion ROM was enabled or disabled.
    VbiosVisibilityChanged(bool),
    /// The VBIOS expansion ROM base moved while enabled.
    VbiosRelocated(u32),
}
