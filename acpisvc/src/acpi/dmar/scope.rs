//! Device scope sub-records inside a hardware unit.
//!
//! Format: type(1) + length(1) + reserved(2) + enum_id(1) + start_bus(1) +
//! path(variable, 2 bytes per hop)

use core::iter::FusedIterator;

use crate::error::{IntegrityError, SvcResult};

/// Fixed part of a device scope; path hops start here.
pub const DEVICE_SCOPE_HEADER_SIZE: usize = 6;

/// Device scope entry types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeType {
    /// PCI endpoint device.
    Endpoint,
    /// PCI-PCI bridge; the scope covers its whole sub-hierarchy.
    Bridge,
    IoApic,
    /// MSI capable HPET.
    Hpet,
    /// ACPI name-space enumerated device.
    NamespaceDevice,
    Unknown(u8),
}

impl From<u8> for ScopeType {
    fn from(raw: u8) -> Self {
        match raw {
            1 => Self::Endpoint,
            2 => Self::Bridge,
            3 => Self::IoApic,
            4 => Self::Hpet,
            5 => Self::NamespaceDevice,
            other => Self::Unknown(other),
        }
    }
}

/// One hop of a device scope path.
///
/// The raw hop is read as a little-endian u16: the device number is the top
/// eight bits and the function number is the low three bits. Bits 3-7 of the
/// low byte are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathHop {
    pub device: u8,
    pub function: u8,
}

impl PathHop {
    pub const fn new(device: u8, function: u8) -> Self {
        Self { device, function }
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self {
            device: (raw >> 8) as u8,
            function: (raw & 0x7) as u8,
        }
    }

    /// Packed `(device << 3) | function` byte used by the IOMMU descriptor.
    pub const fn dev_func(&self) -> u8 {
        (self.device << 3) | (self.function & 0x7)
    }

    pub const fn from_dev_func(dev_func: u8) -> Self {
        Self {
            device: dev_func >> 3,
            function: dev_func & 0x7,
        }
    }
}

/// A validated device scope, borrowed from the table.
#[derive(Debug, Clone, Copy)]
pub struct DeviceScope<'a> {
    offset: usize,
    entry_type: ScopeType,
    enumeration_id: u8,
    start_bus: u8,
    path: &'a [u8],
}

impl<'a> DeviceScope<'a> {
    /// Table offset of the sub-record.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn entry_type(&self) -> ScopeType {
        self.entry_type
    }

    /// IOAPIC ID or HPET number; unused for PCI scopes.
    pub fn enumeration_id(&self) -> u8 {
        self.enumeration_id
    }

    pub fn start_bus(&self) -> u8 {
        self.start_bus
    }

    /// Number of path hops. Zero means the scope names a whole bus.
    pub fn hop_count(&self) -> usize {
        self.path.len() / 2
    }

    pub fn hops(&self) -> impl Iterator<Item = PathHop> + 'a {
        self.path
            .chunks_exact(2)
            .map(|raw| PathHop::from_raw(u16::from_le_bytes([raw[0], raw[1]])))
    }
}

/// Walker over the device scopes of one hardware unit.
///
/// Every sub-record must be at least [`DEVICE_SCOPE_HEADER_SIZE`] bytes,
/// hold a whole number of hops, and end inside the unit. The first violation
/// is reported once and the walk stops.
#[derive(Debug, Clone)]
pub struct ScopeIter<'a> {
    data: &'a [u8],
    base: usize,
    offset: usize,
    failed: bool,
}

impl<'a> ScopeIter<'a> {
    /// `data` covers exactly the scope region; `base` is its table offset.
    pub fn new(data: &'a [u8], base: usize) -> Self {
        Self {
            data,
            base,
            offset: 0,
            failed: false,
        }
    }

    fn fail(&mut self, err: IntegrityError) -> Option<SvcResult<DeviceScope<'a>>> {
        self.failed = true;
        Some(Err(err.into()))
    }
}

impl<'a> Iterator for ScopeIter<'a> {
    type Item = SvcResult<DeviceScope<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        let offset = self.base + self.offset;
        let remaining = &self.data[self.offset..];
        let length = match remaining.get(1) {
            Some(len) => *len as usize,
            None => {
                return self.fail(IntegrityError::ScopeTooShort {
                    offset,
                    length: remaining.len(),
                })
            }
        };

        if length < DEVICE_SCOPE_HEADER_SIZE {
            return self.fail(IntegrityError::ScopeTooShort { offset, length });
        }
        if length > remaining.len() {
            return self.fail(IntegrityError::ScopeOverrun {
                offset,
                length,
                end: self.base + self.data.len(),
            });
        }
        if (length - DEVICE_SCOPE_HEADER_SIZE) % 2 != 0 {
            return self.fail(IntegrityError::OddPathLength { offset, length });
        }

        let bytes = &remaining[..length];
        self.offset += length;
        Some(Ok(DeviceScope {
            offset,
            entry_type: ScopeType::from(bytes[0]),
            enumeration_id: bytes[4],
            start_bus: bytes[5],
            path: &bytes[DEVICE_SCOPE_HEADER_SIZE..],
        }))
    }
}

impl FusedIterator for ScopeIter<'_> {}
