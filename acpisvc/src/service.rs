//! Service entry point for IOMMU publication
//!
//! Looks up the first DMAR table and compiles it. A platform without a DMAR
//! table has no remapping hardware to publish; that is reported as
//! [`AcpiSvcError::NotFound`] and the caller decides whether it is fatal.

use alloc::vec::Vec;

use log::{info, warn};

use crate::{
    acpi::{AcpiTableSource, DMAR_SIGNATURE},
    cap::RootResource,
    config::CompilerConfig,
    error::{AcpiSvcError, SvcResult},
    iommu::{compiler::DmarCompiler, IommuFactory, IommuHandle},
};

/// Outcome of a successful publication pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IommuReport {
    /// Created IOMMUs in DMAR table order.
    pub handles: Vec<IommuHandle>,
}

impl IommuReport {
    pub fn count(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Publish one IOMMU object per DMAR hardware unit.
pub fn publish_iommus<S, F>(
    source: &S,
    authority: &RootResource,
    factory: &F,
    config: CompilerConfig,
) -> SvcResult<IommuReport>
where
    S: AcpiTableSource + ?Sized,
    F: IommuFactory,
{
    let Some(dmar) = source.find_table(DMAR_SIGNATURE, 1) else {
        warn!("[ACPI] could not find DMAR");
        return Err(AcpiSvcError::NotFound { table: "DMAR" });
    };

    match DmarCompiler::new(authority, factory, config).compile(dmar) {
        Ok(handles) => {
            info!("[ACPI] Published {} IOMMUs", handles.len());
            Ok(IommuReport { handles })
        }
        Err(e) => {
            warn!("[ACPI] Failed to publish iommus: {}", e);
            Err(e)
        }
    }
}
