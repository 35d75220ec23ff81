//! DMAR compiler
//!
//! Walks the DMAR table once. Each hardware unit is built into a descriptor,
//! encoded, and passed to the IOMMU creation call before the walk moves on.
//! The first failure stops the walk and is returned; IOMMU objects created
//! for earlier units stay live.

use alloc::vec::Vec;

use log::{debug, info, warn};

use super::{
    builder::{build_non_whole_segment, PriorUnitUnion, SegmentAggregator},
    desc::IntelIommuDesc,
    IommuFactory, IommuHandle, IommuKind,
};
use crate::{
    acpi::dmar::{DmarTable, HardwareUnit, RecordType},
    cap::RootResource,
    config::CompilerConfig,
    error::{AcpiSvcError, SvcResult},
};

/// Compiles a DMAR table into live IOMMU objects.
pub struct DmarCompiler<'f, F: IommuFactory, A: SegmentAggregator = PriorUnitUnion> {
    authority: &'f RootResource,
    factory: &'f F,
    config: CompilerConfig,
    aggregator: A,
}

impl<'f, F: IommuFactory> DmarCompiler<'f, F> {
    pub fn new(authority: &'f RootResource, factory: &'f F, config: CompilerConfig) -> Self {
        Self {
            authority,
            factory,
            config,
            aggregator: PriorUnitUnion,
        }
    }
}

impl<'f, F: IommuFactory, A: SegmentAggregator> DmarCompiler<'f, F, A> {
    /// Replace the whole-segment aggregation policy.
    pub fn with_aggregator<B: SegmentAggregator>(self, aggregator: B) -> DmarCompiler<'f, F, B> {
        DmarCompiler {
            authority: self.authority,
            factory: self.factory,
            config: self.config,
            aggregator,
        }
    }

    /// Compile `data` and create one IOMMU per hardware unit.
    ///
    /// Returns the created handles in table order.
    pub fn compile(&self, data: &[u8]) -> SvcResult<Vec<IommuHandle>> {
        let table = DmarTable::parse(data, &self.config)?;
        let mut handles = Vec::new();

        for record in table.records() {
            let record = record?;
            debug!(
                "[IOMMU] DMAR record: {:?} at {:#x} (len {})",
                record.record_type(),
                record.offset(),
                record.len()
            );
            if record.record_type() != RecordType::HardwareUnit {
                continue;
            }

            let unit = HardwareUnit::parse(&record)?;
            info!(
                "[IOMMU] DMAR hardware unit: seg={}, base={:#x}, flags={:#x}",
                unit.segment(),
                unit.register_base(),
                unit.flags().bits()
            );

            let desc = self.build_descriptor(&table, &unit).map_err(|e| {
                warn!("[IOMMU] Failed to create iommu desc: {}", e);
                e
            })?;
            handles.push(self.create(desc)?);
        }

        Ok(handles)
    }

    fn build_descriptor(
        &self,
        table: &DmarTable<'_>,
        unit: &HardwareUnit<'_>,
    ) -> SvcResult<IntelIommuDesc> {
        if unit.is_whole_segment() {
            self.aggregator.build(table, unit)
        } else {
            build_non_whole_segment(unit)
        }
    }

    /// Hand the descriptor to the creation call. The descriptor and its
    /// encoding are dropped on every path out of here.
    fn create(&self, desc: IntelIommuDesc) -> SvcResult<IommuHandle> {
        let register_base = desc.register_base();
        let bytes = desc.to_bytes()?;
        let num_scopes = desc.num_scopes();
        drop(desc);

        match self
            .factory
            .create_iommu(self.authority, IommuKind::Intel, &bytes)
        {
            Ok(handle) => {
                info!(
                    "[IOMMU] Created IOMMU {:#x} for unit at {:#x} ({} scopes)",
                    handle.token().id(),
                    register_base,
                    num_scopes
                );
                Ok(handle)
            }
            Err(reason) => {
                warn!(
                    "[IOMMU] Failed to create iommu at {:#x}: {:?}",
                    register_base, reason
                );
                Err(AcpiSvcError::BoundaryCallFailure {
                    register_base,
                    reason,
                })
            }
        }
    }
}

/// Compile `data` with the default configuration and aggregation policy.
pub fn compile_dmar<F: IommuFactory>(
    data: &[u8],
    authority: &RootResource,
    factory: &F,
) -> SvcResult<Vec<IommuHandle>> {
    DmarCompiler::new(authority, factory, CompilerConfig::default()).compile(data)
}
