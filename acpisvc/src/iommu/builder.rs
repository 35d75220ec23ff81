//! Descriptor builders
//!
//! A unit without INCLUDE_PCI_ALL gets a descriptor holding only its own
//! endpoint and bridge scopes. A whole-segment unit is built by a
//! [`SegmentAggregator`], which decides what the catch-all descriptor says
//! about the other units on its segment.

use log::debug;

use super::{
    desc::IntelIommuDesc,
    extract::{count_scopes, fill_scopes},
};
use crate::{
    acpi::dmar::{DmarTable, HardwareUnit},
    error::SvcResult,
};

/// Build the descriptor for a unit that lists its scopes explicitly.
pub fn build_non_whole_segment(unit: &HardwareUnit<'_>) -> SvcResult<IntelIommuDesc> {
    debug_assert!(!unit.is_whole_segment());

    let num_scopes = count_scopes(unit)?;
    let mut desc = IntelIommuDesc::new(unit.register_base(), unit.segment(), false, num_scopes)?;
    fill_scopes(unit, &mut desc)?;
    Ok(desc)
}

/// Builds descriptors for whole-segment (catch-all) units.
///
/// VT-d lists a whole-segment unit after every other unit on its segment, so
/// an aggregator only needs the records that precede the unit.
pub trait SegmentAggregator {
    fn build(&self, table: &DmarTable<'_>, unit: &HardwareUnit<'_>) -> SvcResult<IntelIommuDesc>;
}

/// Gathers the scopes of every earlier unit on the same segment into the
/// catch-all descriptor.
///
/// The gathered scopes are the devices the catch-all unit does *not* own,
/// but they are stored as ordinary scope entries with no exclusion marker;
/// the consumer has to read `whole_segment == true` as "everything on the
/// segment except these". The unit's own scopes are not included.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorUnitUnion;

impl PriorUnitUnion {
    fn same_segment_units<'a>(
        table: &DmarTable<'a>,
        unit: &HardwareUnit<'_>,
    ) -> impl Iterator<Item = SvcResult<HardwareUnit<'a>>> + 'a {
        let segment = unit.segment();
        table
            .records_before(unit.offset())
            .hardware_units()
            .filter(move |prior| match prior {
                Ok(prior) => prior.segment() == segment,
                Err(_) => true,
            })
    }
}

impl SegmentAggregator for PriorUnitUnion {
    fn build(&self, table: &DmarTable<'_>, unit: &HardwareUnit<'_>) -> SvcResult<IntelIommuDesc> {
        debug_assert!(unit.is_whole_segment());

        let mut num_scopes = 0;
        for prior in Self::same_segment_units(table, unit) {
            num_scopes += count_scopes(&prior?)?;
        }
        debug!(
            "[IOMMU] Segment {} catch-all at {:#x}: {} scopes claimed by earlier units",
            unit.segment(),
            unit.register_base(),
            num_scopes
        );

        let mut desc = IntelIommuDesc::new(unit.register_base(), unit.segment(), true, num_scopes)?;
        for prior in Self::same_segment_units(table, unit) {
            fill_scopes(&prior?, &mut desc)?;
        }
        Ok(desc)
    }
}
