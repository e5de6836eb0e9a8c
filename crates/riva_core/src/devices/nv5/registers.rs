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

    devices::nv5::registers.rs

    The declarative register descriptor table shared by every subsystem
    engine. A descriptor maps an address to a display name and optional
    read/write hooks; registers without hooks fall back to the engine's own
    address match. This is the single place subsystem register semantics are
    allowed to diverge from the uniform lookup pattern.

*/

use crate::devices::nv5::Nv5;

pub(crate) type RegisterReadFn = fn(&mut Nv5) -> u32;
pub(crate) type RegisterWriteFn = fn(&mut Nv5, u32);

pub(crate) struct RegisterDescriptor {
    pub address: u32,
    pub name: &'static str,
    pub read: Option<RegisterReadFn>,
    pub write: Option<RegisterWriteFn>,
}

/// Find the descriptor for an exact address match, if any.
pub(crate) fn lookup(table: &[RegisterDescriptor], address: u32) -> Option<&RegisterDescriptor> {
    table.iter().find(|reg| reg.address == address)
}

/// Duplicate addresses within one table are a construction-time defect.
pub(crate) fn validate_table(table: &[RegisterDescriptor], subsystem: &str) {
    for (i, reg) in table.iter().enumerate() {
        assert!(
            !table[..i].iter().any(|other| other.address == reg.address),
            "{} register table contains a duplicate descriptor for {:08X} ({})",
            subsystem,
            reg.address,
            reg.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TABLE: &[RegisterDescriptor] = &[
        RegisterDescriptor {
            address: 0x100,
            name: "Test Register A",
            read: None,
            write: None,
        },
        RegisterDescriptor {
            address: 0x140,
            name: "Test Register B",
            read: None,
            write: None,
        },
    ];

    #[test]
    fn lookup_finds_exact_matches_only() {
        assert_eq!(lookup(TEST_TABLE, 0x100).unwrap().name, "Test Register A");
        assert_eq!(lookup(TEST_TABLE, 0x140).unwrap().name, "Test Register B");
        assert!(lookup(TEST_TABLE, 0x104).is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate descriptor")]
    fn duplicate_addresses_fail_validation() {
        let table = [
            RegisterDescriptor {
                address: 0x100,
                name: "First",
                read: None,
                write: None,
            },
            RegisterDescriptor {
                address: 0x100,
                name: "Second",
                read: None,
                write: None,
            },
        ];
        validate_table(&table, "TEST");
    }
}
