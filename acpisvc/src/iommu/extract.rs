//! PCI device scope extraction
//!
//! Descriptor storage is sized in two passes over a hardware unit: a
//! counting pass with no output, then a fill pass into storage allocated for
//! exactly that count. Only endpoint and bridge scopes are kept; other scope
//! types are walked so offsets stay correct, then dropped.

use log::trace;

use super::desc::{IntelIommuDesc, IommuScopeKind, ScopeEntry, MAX_HOPS};
use crate::{
    acpi::dmar::{DeviceScope, HardwareUnit, ScopeType},
    error::{IntegrityError, SvcResult},
};

/// Map a scope to its descriptor kind, or `None` for scope types the IOMMU
/// does not track.
fn descriptor_kind(scope: &DeviceScope<'_>) -> SvcResult<Option<IommuScopeKind>> {
    let kind = match scope.entry_type() {
        ScopeType::Endpoint => IommuScopeKind::Endpoint,
        ScopeType::Bridge => IommuScopeKind::Bridge,
        _ => return Ok(None),
    };
    if scope.hop_count() > MAX_HOPS {
        return Err(IntegrityError::TooManyHops {
            offset: scope.offset(),
            hops: scope.hop_count(),
            max: MAX_HOPS,
        }
        .into());
    }
    Ok(Some(kind))
}

/// Count the endpoint and bridge scopes declared by `unit`.
///
/// Walks every scope sub-record, so a malformed scope anywhere in the unit is
/// reported here, before any descriptor storage is allocated.
pub fn count_scopes(unit: &HardwareUnit<'_>) -> SvcResult<usize> {
    let mut count = 0;
    for scope in unit.scopes() {
        let scope = scope?;
        trace!(
            "[IOMMU]   DMAR scope: {:?}, bus {}",
            scope.entry_type(),
            scope.start_bus()
        );
        for (i, hop) in scope.hops().enumerate() {
            trace!(
                "[IOMMU]     path {}: {:02x}.{:02x}",
                i,
                hop.device,
                hop.function
            );
        }

        if descriptor_kind(&scope)?.is_some() {
            count += 1;
        }
    }
    Ok(count)
}

/// Append `unit`'s endpoint and bridge scopes to `desc`.
///
/// The descriptor may already hold scopes from other units. Room for all of
/// this unit's scopes is checked once, before the first append, so a
/// capacity failure leaves `desc` untouched. Returns the number appended.
pub fn fill_scopes(unit: &HardwareUnit<'_>, desc: &mut IntelIommuDesc) -> SvcResult<usize> {
    debug_assert_eq!(unit.segment(), desc.pci_segment());

    let count = count_scopes(unit)?;
    let table = desc.scope_table_mut();
    table.ensure_room(count)?;

    for scope in unit.scopes() {
        let scope = scope?;
        if let Some(kind) = descriptor_kind(&scope)? {
            table.push(ScopeEntry::new(kind, scope.start_bus(), scope.hops()))?;
        }
    }
    Ok(count)
}
