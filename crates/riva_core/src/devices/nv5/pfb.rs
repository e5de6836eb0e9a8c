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

    devices::nv5::pfb.rs

    PFB: the GPU's interface to VRAM. Boot straps describe the installed
    memory; CONFIG_0 packs the scanout horizontal resolution and pixel
    depth. Actual geometry changes are driven through PRAMDAC and the SVGA
    core, so CONFIG_0 writes only decode the fields for diagnostics here.

*/

use modular_bitfield::prelude::*;

use crate::devices::nv5::{
    registers::{self, RegisterDescriptor},
    Nv5, VramSize,
};

pub const PFB_BOOT: u32 = 0x100000;
pub const PFB_CONFIG_0: u32 = 0x100200;
pub const PFB_CONFIG_1: u32 = 0x100204;

pub const PFB_BOOT_RAM_AMOUNT_32MB: u8 = 0x0;
pub const PFB_BOOT_RAM_AMOUNT_16MB: u8 = 0x3;

pub const PFB_CONFIG_0_DEPTH_8BPP: u8 = 0x1;
pub const PFB_CONFIG_0_DEPTH_16BPP: u8 = 0x2;
pub const PFB_CONFIG_0_DEPTH_32BPP: u8 = 0x3;

#[bitfield]
#[derive(Copy, Clone)]
pub struct PfbBootRegister {
    pub ram_amount: B2,
    pub ram_width_128: B1,
    pub ram_banks_4: B1,
    pub ram_data_twiddle: B1,
    pub ram_extension_8mb: B1,
    #[skip]
    __: B26,
}

#[bitfield]
#[derive(Copy, Clone)]
pub struct PfbConfig0Register {
    pub horiz_resolution: B6,
    #[skip]
    __: B2,
    pub pixel_depth: B2,
    #[skip]
    __: B22,
}

#[derive(Default)]
pub(crate) struct Pfb {
    pub boot: u32,
    pub config_0: u32,
    pub config_1: u32,
}

pub(crate) const PFB_REGISTERS: &[RegisterDescriptor] = &[
    RegisterDescriptor {
        address: PFB_BOOT,
        name: "PFB: Boot Config",
        read: None,
        write: None,
    },
    RegisterDescriptor {
        address: PFB_CONFIG_0,
        name: "PFB: Framebuffer Config 0",
        read: Some(Nv5::pfb_config0_read),
        write: Some(Nv5::pfb_config0_write),
    },
    RegisterDescriptor {
        address: PFB_CONFIG_1,
        name: "PFB: Framebuffer Config 1",
        read: None,
        write: None,
    },
];

impl Nv5 {
    pub(crate) fn pfb_init(&mut self) {
        log::debug!("NV5: initialising PFB");

        let ram_amount = match self.config().vram_size {
            VramSize::Vram16Mb => PFB_BOOT_RAM_AMOUNT_16MB,
            VramSize::Vram32Mb => PFB_BOOT_RAM_AMOUNT_32MB,
        };

        let boot = PfbBootRegister::new()
            .with_ram_amount(ram_amount)
            .with_ram_width_128(0)
            .with_ram_banks_4(1)
            .with_ram_data_twiddle(0)
            .with_ram_extension_8mb(0);

        self.pfb.boot = u32::from_le_bytes(boot.into_bytes());
    }

    pub(crate) fn pfb_read(&mut self, address: u32) -> u32 {
        let Some(reg) = registers::lookup(PFB_REGISTERS, address) else {
            log::warn!("NV5: PFB unknown register read (address={:08X}), returning 0", address);
            return 0;
        };

        let value = if let Some(read) = reg.read {
            read(self)
        }
        else {
            match reg.address {
                PFB_BOOT => self.pfb.boot,
                PFB_CONFIG_1 => self.pfb.config_1,
                _ => 0,
            }
        };

        log::trace!("NV5: PFB read {:08X}: {} (value={:08X})", address, reg.name, value);
        value
    }

    pub(crate) fn pfb_write(&mut self, address: u32, value: u32) {
        let Some(reg) = registers::lookup(PFB_REGISTERS, address) else {
            log::warn!("NV5: PFB unknown register write {:08X} -> {:08X}, discarded", value, address);
            return;
        };

        log::trace!("NV5: PFB write {:08X} -> {:08X}: {}", value, address, reg.name);

        if let Some(write) = reg.write {
            write(self, value);
            return;
        }

        match reg.address {
            PFB_CONFIG_1 => {
                self.pfb.config_1 = value;
            }
            _ => {}
        }
    }

    pub(crate) fn pfb_config0_read(&mut self) -> u32 {
        self.pfb.config_0
    }

    pub(crate) fn pfb_config0_write(&mut self, value: u32) {
        self.pfb.config_0 = value;

        // Size and depth for scanout are really set through PRAMDAC; decode
        // these fields for the log only.
        let config = PfbConfig0Register::from_bytes(value.to_le_bytes());
        let horiz_pixels = u32::from(config.horiz_resolution()) << 5;

        log::debug!("NV5: framebuffer config change, horizontal size={} pixels", horiz_pixels);

        match config.pixel_depth() {
            PFB_CONFIG_0_DEPTH_8BPP => log::debug!("NV5: bit depth=8bpp"),
            PFB_CONFIG_0_DEPTH_16BPP => log::debug!("NV5: bit depth=16bpp"),
            PFB_CONFIG_0_DEPTH_32BPP => log::debug!("NV5: bit depth=32bpp"),
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

    fn test_nv5_with(cfg: Nv5Config) -> Nv5 {
        Nv5::new(
            cfg,
            Box::new(NullVga),
            Box::new(NullMemory),
            Box::new(LatchedLine::new()),
        )
    }

    #[test]
    fn boot_straps_reflect_installed_memory() {
        let mut nv5 = test_nv5_with(Nv5Config::default());
        let boot = nv5.mmio_read_u32(PFB_BOOT);
        assert_eq!(boot & 0x03, u32::from(PFB_BOOT_RAM_AMOUNT_32MB));
        assert_ne!(boot & 0x08, 0); // 4 banks

        let mut nv5 = test_nv5_with(Nv5Config {
            vram_size: crate::devices::nv5::VramSize::Vram16Mb,
            ..Default::default()
        });
        assert_eq!(nv5.mmio_read_u32(PFB_BOOT) & 0x03, u32::from(PFB_BOOT_RAM_AMOUNT_16MB));
    }

    #[test]
    fn config_registers_are_plain_storage() {
        let mut nv5 = test_nv5_with(Nv5Config::default());

        // 640 pixels, 16bpp.
        nv5.mmio_write_u32(PFB_CONFIG_0, 0x0000_0214);
        assert_eq!(nv5.mmio_read_u32(PFB_CONFIG_0), 0x0000_0214);

        nv5.mmio_write_u32(PFB_CONFIG_1, 0x5555_AAAA);
        assert_eq!(nv5.mmio_read_u32(PFB_CONFIG_1), 0x5555_AAAA);
    }
}
