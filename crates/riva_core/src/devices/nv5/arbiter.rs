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

    devices::nv5::arbiter.rs

    The NV5 MMIO arbiter. Routes every 32-bit register access to the owning
    GPU subsystem based on address. All register accesses are internally
    32-bit; the composer in mod.rs has already handled narrower widths.

*/

use strum_macros::Display;

use crate::devices::nv5::Nv5;

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "UPPERCASE")]
pub(crate) enum Subsystem {
    Pmc,
    Pbus,
    Pfifo,
    Prm,
    Pram,
    Prmio,
    Ptimer,
    Pfb,
    Pextdev,
    Prom,
    Palt,
    Pme,
    Pgraph,
    Prmcio,
    Pvideo,
    Pramdac,
    User,
}

pub(crate) struct AddressRange {
    pub start: u32,
    pub end: u32,
    pub subsystem: Subsystem,
}

const fn range(start: u32, end: u32, subsystem: Subsystem) -> AddressRange {
    AddressRange { start, end, subsystem }
}

/// Every subsystem aperture in the 24-bit register window, low to high.
/// The PCI mirror at 0x1800 lives inside the PBUS range and is routed by the
/// PBUS engine; legacy-VGA traffic never reaches arbitration (the composer
/// intercepts it). Ranges must not overlap.
pub(crate) const MMIO_RANGES: &[AddressRange] = &[
    range(0x000000, 0x000FFF, Subsystem::Pmc),
    range(0x001000, 0x001FFF, Subsystem::Pbus),
    range(0x002000, 0x003FFF, Subsystem::Pfifo),
    range(0x004000, 0x004FFF, Subsystem::Prm),
    range(0x006000, 0x006FFF, Subsystem::Pram),
    range(0x007000, 0x007FFF, Subsystem::Prmio),
    range(0x009000, 0x009FFF, Subsystem::Ptimer),
    range(0x100000, 0x100FFF, Subsystem::Pfb),
    range(0x101000, 0x101FFF, Subsystem::Pextdev),
    range(0x110000, 0x11FFFF, Subsystem::Prom),
    range(0x120000, 0x12FFFF, Subsystem::Palt),
    range(0x200000, 0x200FFF, Subsystem::Pme),
    range(0x400000, 0x5C1FFF, Subsystem::Pgraph),
    range(0x601000, 0x601FFF, Subsystem::Prmcio),
    range(0x680000, 0x6802FF, Subsystem::Pvideo),
    range(0x680300, 0x680FFF, Subsystem::Pramdac),
    range(0x800000, 0xFFFFFF, Subsystem::User),
];

/// Overlapping or inverted ranges are a construction-time defect: with
/// first-match dispatch an overlap silently shadows a subsystem.
pub(crate) fn validate_ranges(ranges: &[AddressRange]) {
    for (i, range) in ranges.iter().enumerate() {
        assert!(
            range.start <= range.end,
            "MMIO range table: {} range {:06X}-{:06X} is inverted",
            range.subsystem,
            range.start,
            range.end
        );
        for other in &ranges[..i] {
            assert!(
                range.start > other.end || range.end < other.start,
                "MMIO range table: {} ({:06X}-{:06X}) overlaps {} ({:06X}-{:06X})",
                range.subsystem,
                range.start,
                range.end,
                other.subsystem,
                other.start,
                other.end
            );
        }
    }
}

fn find_range(address: u32) -> Option<&'static AddressRange> {
    MMIO_RANGES
        .iter()
        .find(|range| address >= range.start && address <= range.end)
}

impl Nv5 {
    pub(crate) fn mmio_arbitrate_read(&mut self, address: u32) -> u32 {
        // A few registers are byte aligned rather than dword aligned; they
        // are handled before arbitration, so the low bits can go here.
        let address = address & 0xFFFFFC;

        let Some(range) = find_range(address) else {
            log::warn!(
                "NV5: MMIO read arbitration failed, address {:06X} is not mapped to any GPU subsystem, returning 0",
                address
            );
            return 0;
        };

        match range.subsystem {
            Subsystem::Pmc => self.pmc_read(address),
            Subsystem::Pbus => self.pbus_read(address),
            Subsystem::Pfifo => self.pfifo_read(address),
            Subsystem::Ptimer => self.ptimer_read(address),
            Subsystem::Pfb => self.pfb_read(address),
            Subsystem::Pextdev => self.pextdev_read(address),
            Subsystem::Pme => self.pme_read(address),
            Subsystem::Pgraph => self.pgraph_read(address),
            Subsystem::Pvideo => self.pvideo_read(address),
            Subsystem::Pramdac => self.pramdac_read(address),
            _ => {
                log::trace!(
                    "NV5: {} read from {:06X} (subsystem not implemented), returning 0",
                    range.subsystem,
                    address
                );
                0
            }
        }
    }

    pub(crate) fn mmio_arbitrate_write(&mut self, address: u32, value: u32) {
        let address = address & 0xFFFFFC;

        let Some(range) = find_range(address) else {
            log::warn!(
                "NV5: MMIO write arbitration failed, address {:06X} is not mapped to any GPU subsystem",
                address
            );
            return;
        };

        match range.subsystem {
            Subsystem::Pmc => self.pmc_write(address, value),
            Subsystem::Pbus => self.pbus_write(address, value),
            Subsystem::Pfifo => self.pfifo_write(address, value),
            Subsystem::Ptimer => self.ptimer_write(address, value),
            Subsystem::Pfb => self.pfb_write(address, value),
            Subsystem::Pextdev => self.pextdev_write(address, value),
            Subsystem::Pme => self.pme_write(address, value),
            Subsystem::Pgraph => self.pgraph_write(address, value),
            Subsystem::Pvideo => self.pvideo_write(address, value),
            Subsystem::Pramdac => self.pramdac_write(address, value),
            _ => {
                log::trace!(
                    "NV5: {} write {:08X} -> {:06X} (subsystem not implemented), discarded",
                    range.subsystem,
                    value,
                    address
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::{LatchedLine, NullMemory, NullVga},
        devices::nv5::{Nv5Config, Nv5},
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
    fn production_range_table_is_valid() {
        validate_ranges(MMIO_RANGES);
    }

    #[test]
    #[should_panic(expected = "overlaps")]
    fn duplicated_range_fails_validation() {
        // The kind of defect the table used to ship with: one subsystem
        // listed twice.
        let table = [
            range(0x100000, 0x100FFF, Subsystem::Pfb),
            range(0x100000, 0x100FFF, Subsystem::Pfb),
        ];
        validate_ranges(&table);
    }

    #[test]
    #[should_panic(expected = "overlaps")]
    fn partial_overlap_fails_validation() {
        let table = [
            range(0x000000, 0x000FFF, Subsystem::Pmc),
            range(0x000800, 0x0017FF, Subsystem::Pbus),
        ];
        validate_ranges(&table);
    }

    #[test]
    fn unmapped_address_reads_zero_and_discards_writes() {
        let mut nv5 = test_nv5();

        // 0x005000 falls in the hole between PRM and PRAM.
        nv5.mmio_write_u32(0x005000, 0xDEADBEEF);
        assert_eq!(nv5.mmio_read_u32(0x005000), 0);
    }

    #[test]
    fn stub_subsystems_read_zero() {
        let mut nv5 = test_nv5();

        nv5.mmio_write_u32(0x004000, 0x12345678); // PRM
        assert_eq!(nv5.mmio_read_u32(0x004000), 0);
        assert_eq!(nv5.mmio_read_u32(0x800000), 0); // USER
    }
}
