//! Intel IOMMU descriptor
//!
//! The creation call takes the descriptor as packed little-endian bytes:
//!
//! ```text
//! header (15 bytes)
//!   0   register_base  u64
//!   8   pci_segment    u16
//!   10  whole_segment  u8
//!   11  num_scopes     u32
//! scope entry (11 bytes, repeated num_scopes times)
//!   0   type           u8   (0 = endpoint, 1 = bridge)
//!   1   start_bus      u8
//!   2   num_hops       u32
//!   6   dev_func       [u8; MAX_HOPS]
//! ```
//!
//! The encoding is exactly `15 + 11 * num_scopes` bytes, with no trailing
//! slack.

use alloc::vec::Vec;
use core::mem::size_of;

pub use crate::acpi::dmar::PathHop;
use crate::{
    acpi::{read_u16, read_u32, read_u64, read_u8},
    error::{AcpiSvcError, SvcResult},
    iommu::IommuCreateError,
};

/// Maximum number of path hops a scope entry can carry.
pub const MAX_HOPS: usize = 5;

/// Encoded size of the descriptor header.
pub const DESC_HEADER_LEN: usize = 8 + 2 + 1 + 4;

/// Encoded size of one scope entry.
pub const SCOPE_ENTRY_LEN: usize = 1 + 1 + 4 + MAX_HOPS;

/// Scope entry kinds in the descriptor format.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IommuScopeKind {
    Endpoint = 0,
    Bridge = 1,
}

impl IommuScopeKind {
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Endpoint),
            1 => Some(Self::Bridge),
            _ => None,
        }
    }
}

/// One compiled scope: a starting bus and a device/function path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeEntry {
    kind: IommuScopeKind,
    start_bus: u8,
    path: [PathHop; MAX_HOPS],
    num_hops: u8,
}

impl ScopeEntry {
    /// Build an entry from at most [`MAX_HOPS`] hops; extra hops are
    /// ignored, so callers check the hop count first.
    pub fn new(kind: IommuScopeKind, start_bus: u8, hops: impl IntoIterator<Item = PathHop>) -> Self {
        let mut path = [PathHop::default(); MAX_HOPS];
        let mut num_hops = 0;
        for (slot, hop) in path.iter_mut().zip(hops) {
            *slot = hop;
            num_hops += 1;
        }
        Self {
            kind,
            start_bus,
            path,
            num_hops,
        }
    }

    pub fn kind(&self) -> IommuScopeKind {
        self.kind
    }

    pub fn start_bus(&self) -> u8 {
        self.start_bus
    }

    pub fn num_hops(&self) -> usize {
        self.num_hops as usize
    }

    pub fn hops(&self) -> &[PathHop] {
        &self.path[..self.num_hops()]
    }

    /// Path in the packed `(device << 3) | function` form.
    pub fn dev_func(&self) -> [u8; MAX_HOPS] {
        let mut out = [0u8; MAX_HOPS];
        for (slot, hop) in out.iter_mut().zip(self.hops()) {
            *slot = hop.dev_func();
        }
        out
    }
}

/// Append-only scope storage with a fixed capacity.
///
/// The capacity comes from a counting pass and the backing storage is
/// reserved once, at exactly that size. Appends past the capacity fail with
/// [`AcpiSvcError::CapacityViolation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTable {
    entries: Vec<ScopeEntry>,
    capacity: usize,
}

impl ScopeTable {
    pub fn with_capacity(capacity: usize) -> SvcResult<Self> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity)
            .map_err(|_| AcpiSvcError::AllocationFailure {
                requested: capacity.saturating_mul(size_of::<ScopeEntry>()),
            })?;
        Ok(Self { entries, capacity })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail unless `additional` more entries fit.
    pub fn ensure_room(&self, additional: usize) -> SvcResult<()> {
        let required = self.entries.len().saturating_add(additional);
        if required > self.capacity {
            return Err(AcpiSvcError::CapacityViolation {
                capacity: self.capacity,
                required,
            });
        }
        Ok(())
    }

    pub(crate) fn push(&mut self, entry: ScopeEntry) -> SvcResult<()> {
        self.ensure_room(1)?;
        self.entries.push(entry);
        Ok(())
    }

    pub fn as_slice(&self) -> &[ScopeEntry] {
        &self.entries
    }
}

/// Descriptor for one Intel IOMMU hardware unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntelIommuDesc {
    register_base: u64,
    pci_segment: u16,
    whole_segment: bool,
    scopes: ScopeTable,
}

impl IntelIommuDesc {
    /// Allocate a descriptor with room for exactly `capacity` scopes.
    pub fn new(
        register_base: u64,
        pci_segment: u16,
        whole_segment: bool,
        capacity: usize,
    ) -> SvcResult<Self> {
        Ok(Self {
            register_base,
            pci_segment,
            whole_segment,
            scopes: ScopeTable::with_capacity(capacity)?,
        })
    }

    pub fn register_base(&self) -> u64 {
        self.register_base
    }

    pub fn pci_segment(&self) -> u16 {
        self.pci_segment
    }

    pub fn whole_segment(&self) -> bool {
        self.whole_segment
    }

    pub fn num_scopes(&self) -> usize {
        self.scopes.len()
    }

    pub fn scopes(&self) -> &[ScopeEntry] {
        self.scopes.as_slice()
    }

    pub fn scope_table(&self) -> &ScopeTable {
        &self.scopes
    }

    pub(crate) fn scope_table_mut(&mut self) -> &mut ScopeTable {
        &mut self.scopes
    }

    /// Size of the packed encoding.
    pub fn encoded_len(&self) -> usize {
        DESC_HEADER_LEN + SCOPE_ENTRY_LEN * self.num_scopes()
    }

    /// Pack the descriptor for the creation call.
    pub fn to_bytes(&self) -> SvcResult<Vec<u8>> {
        let len = self.encoded_len();
        let mut out = Vec::new();
        out.try_reserve_exact(len)
            .map_err(|_| AcpiSvcError::AllocationFailure { requested: len })?;

        out.extend_from_slice(&self.register_base.to_le_bytes());
        out.extend_from_slice(&self.pci_segment.to_le_bytes());
        out.push(self.whole_segment as u8);
        out.extend_from_slice(&(self.num_scopes() as u32).to_le_bytes());
        for scope in self.scopes() {
            out.push(scope.kind() as u8);
            out.push(scope.start_bus());
            out.extend_from_slice(&(scope.num_hops() as u32).to_le_bytes());
            out.extend_from_slice(&scope.dev_func());
        }

        debug_assert_eq!(out.len(), len);
        Ok(out)
    }

    /// Unpack a descriptor received by the creation call.
    ///
    /// The length must match `num_scopes` exactly, every scope type must be
    /// known and every hop count must fit.
    pub fn decode(bytes: &[u8]) -> Result<Self, IommuCreateError> {
        const INVALID: IommuCreateError = IommuCreateError::InvalidDescriptor;

        let register_base = read_u64(bytes, 0).ok_or(INVALID)?;
        let pci_segment = read_u16(bytes, 8).ok_or(INVALID)?;
        let whole_segment = match read_u8(bytes, 10).ok_or(INVALID)? {
            0 => false,
            1 => true,
            _ => return Err(INVALID),
        };
        let num_scopes = read_u32(bytes, 11).ok_or(INVALID)? as usize;

        let expected = num_scopes
            .checked_mul(SCOPE_ENTRY_LEN)
            .and_then(|n| n.checked_add(DESC_HEADER_LEN))
            .ok_or(INVALID)?;
        if bytes.len() != expected {
            return Err(INVALID);
        }

        let mut desc = Self::new(register_base, pci_segment, whole_segment, num_scopes)
            .map_err(|_| IommuCreateError::NoMemory)?;
        for raw in bytes[DESC_HEADER_LEN..].chunks_exact(SCOPE_ENTRY_LEN) {
            let kind = IommuScopeKind::from_wire(raw[0]).ok_or(INVALID)?;
            let num_hops = read_u32(raw, 2).ok_or(INVALID)? as usize;
            if num_hops > MAX_HOPS {
                return Err(INVALID);
            }
            let hops = raw[6..6 + num_hops]
                .iter()
                .map(|df| PathHop::from_dev_func(*df));
            desc.scopes
                .push(ScopeEntry::new(kind, raw[1], hops))
                .map_err(|_| INVALID)?;
        }
        Ok(desc)
    }
}
