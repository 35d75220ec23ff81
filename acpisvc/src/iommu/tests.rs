//! End-to-end tests: DMAR bytes in, IOMMU creation calls out.

#![cfg(test)]

use alloc::vec::Vec;
use core::cell::RefCell;

use super::{
    builder::SegmentAggregator,
    compiler::{compile_dmar, DmarCompiler},
    desc::{IntelIommuDesc, IommuScopeKind, PathHop, DESC_HEADER_LEN, SCOPE_ENTRY_LEN},
    registry::IommuRegistry,
    IommuCreateError, IommuFactory, IommuHandle, IommuKind,
};
use crate::{
    acpi::dmar::{DmarTable, HardwareUnit},
    cap::{token::ObjectType, CapabilityToken, RootResource, Rights},
    config::CompilerConfig,
    error::{AcpiSvcError, IntegrityError, SvcResult},
    test_support::{scope, DmarBuilder, SCOPE_BRIDGE, SCOPE_ENDPOINT, SCOPE_IOAPIC},
};

/// Records every creation call; optionally fails the n-th one.
#[derive(Default)]
struct RecordingFactory {
    calls: RefCell<Vec<(IommuKind, Vec<u8>)>>,
    fail_on: Option<(usize, IommuCreateError)>,
}

impl RecordingFactory {
    fn failing_on(call: usize, error: IommuCreateError) -> Self {
        Self {
            fail_on: Some((call, error)),
            ..Self::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    fn descriptors(&self) -> Vec<IntelIommuDesc> {
        self.calls
            .borrow()
            .iter()
            .map(|(_, bytes)| IntelIommuDesc::decode(bytes).unwrap())
            .collect()
    }
}

impl IommuFactory for RecordingFactory {
    fn create_iommu(
        &self,
        _authority: &RootResource,
        kind: IommuKind,
        desc: &[u8],
    ) -> Result<IommuHandle, IommuCreateError> {
        let mut calls = self.calls.borrow_mut();
        calls.push((kind, desc.to_vec()));
        let n = calls.len();
        match self.fail_on {
            Some((call, error)) if call == n => Err(error),
            _ => Ok(IommuHandle(CapabilityToken::new(
                n as u64,
                0,
                ObjectType::Iommu,
                0,
            ))),
        }
    }
}

fn root() -> RootResource {
    RootResource::root()
}

#[test]
fn test_single_endpoint_unit() {
    let data = DmarBuilder::new()
        .hardware_unit(0, 0xFED9_0000, false, &[scope(SCOPE_ENDPOINT, 1, &[(2, 0)])])
        .build();
    let factory = RecordingFactory::default();

    let handles = compile_dmar(&data, &root(), &factory).unwrap();
    assert_eq!(handles.len(), 1);

    let calls = factory.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, IommuKind::Intel);
    assert_eq!(calls[0].1.len(), DESC_HEADER_LEN + SCOPE_ENTRY_LEN);
    drop(calls);

    let desc = &factory.descriptors()[0];
    assert_eq!(desc.register_base(), 0xFED9_0000);
    assert_eq!(desc.pci_segment(), 0);
    assert!(!desc.whole_segment());
    assert_eq!(desc.num_scopes(), 1);
    let entry = desc.scopes()[0];
    assert_eq!(entry.kind(), IommuScopeKind::Endpoint);
    assert_eq!(entry.start_bus(), 1);
    assert_eq!(entry.num_hops(), 1);
    assert_eq!(entry.dev_func()[0], 0x10);
}

#[test]
fn test_oversized_table_makes_no_calls() {
    let data = DmarBuilder::new()
        .hardware_unit(0, 0xFED9_0000, false, &[scope(SCOPE_ENDPOINT, 1, &[(2, 0)])])
        .declared_length(5000)
        .build();
    let factory = RecordingFactory::default();

    assert_eq!(
        compile_dmar(&data, &root(), &factory),
        Err(AcpiSvcError::IntegrityViolation(
            IntegrityError::TableTooLong {
                length: 5000,
                max: 4096
            }
        ))
    );
    assert_eq!(factory.call_count(), 0);
}

#[test]
fn test_no_hardware_units() {
    let data = DmarBuilder::new()
        .record(1, &[0u8; 20])
        .record(2, &[0u8; 4])
        .build();
    let factory = RecordingFactory::default();

    assert_eq!(compile_dmar(&data, &root(), &factory), Ok(Vec::new()));
    assert_eq!(factory.call_count(), 0);
}

#[test]
fn test_descriptor_lengths_match_scope_counts() {
    let data = DmarBuilder::new()
        .hardware_unit(
            0,
            0x1000,
            false,
            &[
                scope(SCOPE_ENDPOINT, 0, &[(2, 0)]),
                scope(SCOPE_IOAPIC, 0xf0, &[(0x1f, 0)]),
                scope(SCOPE_BRIDGE, 0, &[(0x1c, 0), (0, 0)]),
            ],
        )
        .hardware_unit(1, 0x2000, false, &[])
        .hardware_unit(0, 0x3000, true, &[])
        .build();
    let factory = RecordingFactory::default();
    compile_dmar(&data, &root(), &factory).unwrap();

    let lens: Vec<usize> = factory.calls.borrow().iter().map(|(_, b)| b.len()).collect();
    assert_eq!(
        lens,
        [
            DESC_HEADER_LEN + 2 * SCOPE_ENTRY_LEN,
            DESC_HEADER_LEN,
            DESC_HEADER_LEN + 2 * SCOPE_ENTRY_LEN,
        ]
    );
}

#[test]
fn test_whole_segment_unit_aggregates_prior_scopes() {
    let data = DmarBuilder::new()
        .hardware_unit(0, 0x1000, false, &[scope(SCOPE_ENDPOINT, 0, &[(2, 0)])])
        .hardware_unit(0, 0x2000, false, &[scope(SCOPE_BRIDGE, 0, &[(0x1c, 4)])])
        .hardware_unit(0, 0x3000, true, &[])
        .build();
    let registry = IommuRegistry::new();

    let handles = compile_dmar(&data, &root(), &registry).unwrap();
    assert_eq!(handles.len(), 3);

    let catch_all = registry.get(0x3000).unwrap();
    assert_eq!(catch_all.handle, handles[2]);
    assert!(catch_all.desc.whole_segment());
    let scopes = catch_all.desc.scopes();
    assert_eq!(scopes.len(), 2);
    assert_eq!(scopes[0].hops(), &[PathHop::new(2, 0)]);
    assert_eq!(scopes[1].kind(), IommuScopeKind::Bridge);
    assert_eq!(scopes[1].hops(), &[PathHop::new(0x1c, 4)]);
}

#[test]
fn test_boundary_failure_stops_walk() {
    let data = DmarBuilder::new()
        .hardware_unit(0, 0x1000, false, &[])
        .hardware_unit(0, 0x2000, false, &[])
        .hardware_unit(0, 0x3000, true, &[])
        .build();
    let factory = RecordingFactory::failing_on(2, IommuCreateError::NoMemory);

    assert_eq!(
        compile_dmar(&data, &root(), &factory),
        Err(AcpiSvcError::BoundaryCallFailure {
            register_base: 0x2000,
            reason: IommuCreateError::NoMemory
        })
    );
    assert_eq!(factory.call_count(), 2);
}

#[test]
fn test_earlier_objects_survive_failure() {
    let data = DmarBuilder::new()
        .hardware_unit(0, 0x1000, false, &[])
        .hardware_unit(0, 0x1000, true, &[])
        .build();
    let registry = IommuRegistry::new();

    assert_eq!(
        compile_dmar(&data, &root(), &registry),
        Err(AcpiSvcError::BoundaryCallFailure {
            register_base: 0x1000,
            reason: IommuCreateError::AlreadyExists
        })
    );
    assert_eq!(registry.len(), 1);
    assert!(!registry.get(0x1000).unwrap().desc.whole_segment());
}

#[test]
fn test_missing_authority() {
    let data = DmarBuilder::new().hardware_unit(0, 0x1000, true, &[]).build();
    let registry = IommuRegistry::new();
    let authority = root().restrict(Rights::READ | Rights::WRITE);

    assert_eq!(
        compile_dmar(&data, &authority, &registry),
        Err(AcpiSvcError::BoundaryCallFailure {
            register_base: 0x1000,
            reason: IommuCreateError::AccessDenied
        })
    );
    assert!(registry.is_empty());
}

#[test]
fn test_trailing_garbage_after_created_units() {
    let data = DmarBuilder::new()
        .hardware_unit(0, 0x1000, false, &[scope(SCOPE_ENDPOINT, 0, &[(2, 0)])])
        .raw(&[0xAA, 0xBB])
        .build();
    let factory = RecordingFactory::default();

    assert_eq!(
        compile_dmar(&data, &root(), &factory),
        Err(AcpiSvcError::IntegrityViolation(
            IntegrityError::MisalignedEnd { offset: 72, end: 74 }
        ))
    );
    assert_eq!(factory.call_count(), 1);
}

#[test]
fn test_corrupt_unit_is_not_created() {
    let mut bad = scope(SCOPE_ENDPOINT, 0, &[(2, 0)]);
    bad[1] = 32;
    let data = DmarBuilder::new()
        .hardware_unit(0, 0x1000, false, &[])
        .hardware_unit(0, 0x2000, false, &[bad])
        .build();
    let factory = RecordingFactory::default();

    assert!(matches!(
        compile_dmar(&data, &root(), &factory),
        Err(AcpiSvcError::IntegrityViolation(
            IntegrityError::ScopeOverrun { .. }
        ))
    ));
    assert_eq!(factory.call_count(), 1);
}

/// Catch-all policy that only lists the unit's own scopes.
struct OwnScopesOnly;

impl SegmentAggregator for OwnScopesOnly {
    fn build(&self, _table: &DmarTable<'_>, unit: &HardwareUnit<'_>) -> SvcResult<IntelIommuDesc> {
        let count = super::extract::count_scopes(unit)?;
        let mut desc = IntelIommuDesc::new(unit.register_base(), unit.segment(), true, count)?;
        super::extract::fill_scopes(unit, &mut desc)?;
        Ok(desc)
    }
}

#[test]
fn test_custom_aggregator() {
    let data = DmarBuilder::new()
        .hardware_unit(0, 0x1000, false, &[scope(SCOPE_ENDPOINT, 0, &[(2, 0)])])
        .hardware_unit(0, 0x2000, true, &[scope(SCOPE_ENDPOINT, 3, &[(4, 1)])])
        .build();
    let factory = RecordingFactory::default();
    let authority = root();

    DmarCompiler::new(&authority, &factory, CompilerConfig::default())
        .with_aggregator(OwnScopesOnly)
        .compile(&data)
        .unwrap();

    let descs = factory.descriptors();
    assert_eq!(descs.len(), 2);
    assert!(descs[1].whole_segment());
    assert_eq!(descs[1].scopes()[0].start_bus(), 3);
    assert_eq!(descs[1].scopes()[0].hops(), &[PathHop::new(4, 1)]);
}

#[test]
fn test_compile_is_repeatable() {
    let data = DmarBuilder::new()
        .hardware_unit(0, 0x1000, false, &[scope(SCOPE_ENDPOINT, 0, &[(2, 0)])])
        .hardware_unit(0, 0x2000, true, &[])
        .build();
    let first = RecordingFactory::default();
    let second = RecordingFactory::default();
    compile_dmar(&data, &root(), &first).unwrap();
    compile_dmar(&data, &root(), &second).unwrap();
    assert_eq!(*first.calls.borrow(), *second.calls.borrow());
}
