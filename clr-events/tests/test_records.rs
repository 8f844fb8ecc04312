use fixtures::*;

use clr_events::enums::{GcAllocationKind, GcReason, GcType};
use clr_events::events::{GcAllocationTick, GcSampledObjectAllocation, GcStart, ModuleLoad};
use clr_events::render::to_xml;
use clr_events::{
    Catalog, FieldAccess, FieldValue, Guid, PointerWidth, RawRecord, RecordKind, RecordView,
    Validation,
};
use pretty_assertions::assert_eq;

fn kind(name: &str) -> &'static RecordKind {
    Catalog::clr().kind(name).expect("kind in catalog")
}

#[test]
fn test_gc_start_sixteen_bytes_at_version_zero() {
    ensure_env_logger_initialized();
    let data = Payload::new(PointerWidth::Bits64)
        .u32(5)
        .u32(1)
        .u32(0)
        .u32(0)
        .build();
    assert_eq!(data.len(), 16);

    let view = RecordView::new(kind("GCStart"), RawRecord::new(&data, 0, PointerWidth::Bits64));
    let gc = GcStart::new(&view);
    assert_eq!(gc.count(), 5);
    assert_eq!(gc.reason(), GcReason::Induced);
    assert_eq!(gc.depth(), 0);
    assert_eq!(gc.clr_instance_id(), 0);
    assert_eq!(gc.gc_type(), GcType::Blocking);
    assert_eq!(
        view.validate(),
        Validation::LengthMismatch {
            expected: 8,
            actual: 16
        }
    );
}

#[test]
fn test_gc_start_version_one_layout() {
    let data = Payload::new(PointerWidth::Bits64)
        .u32(12)
        .u32(2)
        .u32(6)
        .u32(1)
        .u16(9)
        .build();
    let view = RecordView::new(kind("GCStart"), RawRecord::new(&data, 1, PointerWidth::Bits64));
    let gc = GcStart::new(&view);
    assert_eq!(gc.count(), 12);
    assert_eq!(gc.depth(), 2);
    assert_eq!(gc.reason(), GcReason::OutOfSpaceLargeObjectHeap);
    assert_eq!(gc.gc_type(), GcType::Background);
    assert_eq!(gc.clr_instance_id(), 9);
    assert_eq!(gc.client_sequence_number(), 0);
    assert!(view.validate().is_ok());

    assert_eq!(
        view.payload_names(),
        vec!["Count", "Depth", "Reason", "Type", "ClrInstanceID"]
    );
    assert_eq!(view.payload_value(2), Some(FieldValue::U32(6)));
    assert_eq!(view.payload_value(5), None);
}

fn allocation_tick_v4(width: PointerWidth) -> Vec<u8> {
    Payload::new(width)
        .u32(100_000)
        .u32(1)
        .u16(3)
        .u64(0x1_0000_0000)
        .address(0xdead_beef)
        .string("System.Byte[]")
        .u32(2)
        .address(0x0bad_cafe)
        .u64(85_000)
        .build()
}

#[test]
fn test_version_monotonicity() {
    let data = allocation_tick_v4(PointerWidth::Bits64);
    let full = RecordView::new(
        kind("GCAllocationTick"),
        RawRecord::new(&data, 4, PointerWidth::Bits64),
    );
    assert!(full.validate().is_ok());

    for version in 0..=4u8 {
        let view = RecordView::new(
            kind("GCAllocationTick"),
            RawRecord::new(&data, version, PointerWidth::Bits64),
        );
        for field in kind("GCAllocationTick").fields {
            let value = view.value(field.name);
            if field.present_in(version) {
                assert_eq!(value, full.value(field.name), "{} at v{}", field.name, version);
            } else {
                assert_eq!(value, None, "{} at v{}", field.name, version);
                assert_eq!(view.u64(field.name), 0);
            }
        }
    }

    let v1 = RecordView::new(
        kind("GCAllocationTick"),
        RawRecord::new(&data, 1, PointerWidth::Bits64),
    );
    let tick = GcAllocationTick::new(&v1);
    assert_eq!(tick.allocation_amount(), 100_000);
    assert_eq!(tick.embedded_type_name(), "");
    assert_eq!(tick.object_size(), 0);
}

#[test]
fn test_pointer_width_equivalence() {
    let narrow = allocation_tick_v4(PointerWidth::Bits32);
    let wide = allocation_tick_v4(PointerWidth::Bits64);
    assert_eq!(wide.len() - narrow.len(), 8);

    let narrow = RecordView::new(
        kind("GCAllocationTick"),
        RawRecord::new(&narrow, 4, PointerWidth::Bits32),
    );
    let wide = RecordView::new(
        kind("GCAllocationTick"),
        RawRecord::new(&wide, 4, PointerWidth::Bits64),
    );
    assert!(narrow.validate().is_ok());
    for view in [&narrow, &wide] {
        let tick = GcAllocationTick::new(view);
        assert_eq!(tick.allocation_amount(), 0x1_0000_0000);
        assert_eq!(tick.kind(), GcAllocationKind::Large);
        assert_eq!(tick.type_id(), 0xdead_beef);
        assert_eq!(tick.embedded_type_name(), "System.Byte[]");
        assert_eq!(tick.heap_index(), 2);
        assert_eq!(tick.address(), 0x0bad_cafe);
        assert_eq!(tick.object_size(), 85_000);
    }
    assert_eq!(narrow.payload_names(), wide.payload_names());

    let sample = |width| {
        Payload::new(width)
            .address(0x1000)
            .address(0x2000)
            .u32(4)
            .u64(96)
            .u16(1)
            .build()
    };
    let narrow = sample(PointerWidth::Bits32);
    let wide = sample(PointerWidth::Bits64);
    let kind = kind("GCSampledObjectAllocationHigh");
    let narrow = RecordView::new(kind, RawRecord::new(&narrow, 0, PointerWidth::Bits32));
    let wide = RecordView::new(kind, RawRecord::new(&wide, 0, PointerWidth::Bits64));
    for view in [&narrow, &wide] {
        let sample = GcSampledObjectAllocation::new(view);
        assert!(view.validate().is_ok());
        assert_eq!(sample.address(), 0x1000);
        assert_eq!(sample.type_id(), 0x2000);
        assert_eq!(sample.object_count_for_type_sample(), 4);
        assert_eq!(sample.total_size_for_type_sample(), 96);
        assert_eq!(sample.clr_instance_id(), 1);
    }
}

#[test]
fn test_truncated_fields_read_as_defaults() {
    ensure_env_logger_initialized();
    let data = Payload::new(PointerWidth::Bits64).u32(3).u32(1).u16(0).build();
    let view = RecordView::new(kind("GCStart"), RawRecord::new(&data, 1, PointerWidth::Bits64));
    assert_eq!(view.u32("Count"), 3);
    assert_eq!(view.u32("Depth"), 1);
    assert_eq!(view.u32("Reason"), 0);
    assert_eq!(view.u16("ClrInstanceID"), 0);
    assert!(!view.has("Reason"));
    assert_eq!(view.value("Type"), Some(FieldValue::U32(0)));
    assert_eq!(
        view.validate(),
        Validation::LengthMismatch {
            expected: 18,
            actual: 10
        }
    );
}

#[test]
fn test_newer_versions_may_only_grow() {
    let mut data = Payload::new(PointerWidth::Bits64)
        .u32(1)
        .u32(0)
        .u32(0)
        .u32(0)
        .u16(0)
        .u64(77)
        .build();
    data.extend([0xaa; 4]);
    let view = RecordView::new(kind("GCStart"), RawRecord::new(&data, 3, PointerWidth::Bits64));
    assert!(view.validate().is_ok());
    assert_eq!(view.u64("ClientSequenceNumber"), 77);

    let short = &data[..20];
    let view = RecordView::new(kind("GCStart"), RawRecord::new(short, 3, PointerWidth::Bits64));
    assert_eq!(
        view.validate(),
        Validation::Truncated {
            minimum: 26,
            actual: 20
        }
    );
}

#[test]
fn test_kind_without_fields_accepts_any_payload() {
    let data = [0x5a; 40];
    let kind = kind("GCPerHeapHistory");
    for version in [0, 3] {
        let view = RecordView::new(kind, RawRecord::new(&data, version, PointerWidth::Bits64));
        assert_eq!(view.validate(), Validation::Ok);
        assert_eq!(view.payload_names(), Vec::<&str>::new());
    }
    let view = RecordView::new(kind, RawRecord::new(&[], 0, PointerWidth::Bits64));
    assert!(view.validate().is_ok());
}

#[test]
fn test_gc_end_depth_widens_at_version_one() {
    let v0 = Payload::new(PointerWidth::Bits64).u32(4).u16(2).build();
    let v1 = Payload::new(PointerWidth::Bits64).u32(4).u32(2).u16(1).build();
    let kind = kind("GCEnd");
    let v0 = RecordView::new(kind, RawRecord::new(&v0, 0, PointerWidth::Bits64));
    let v1 = RecordView::new(kind, RawRecord::new(&v1, 1, PointerWidth::Bits64));
    assert!(v0.validate().is_ok());
    assert!(v1.validate().is_ok());
    assert_eq!(v0.u32("Depth"), 2);
    assert_eq!(v1.u32("Depth"), 2);
    assert_eq!(v0.payload_names(), vec!["Count", "Depth"]);
}

#[test]
fn test_field_inserted_mid_layout() {
    let v0 = Payload::new(PointerWidth::Bits64)
        .u64(1)
        .u64(2)
        .u32(0x10)
        .string("Lib, Version=1.0.0.0")
        .build();
    let v1 = Payload::new(PointerWidth::Bits64)
        .u64(1)
        .u64(2)
        .u64(99)
        .u32(0x10)
        .string("Lib, Version=1.0.0.0")
        .u16(5)
        .build();
    let kind = kind("AssemblyLoad");
    for (data, version) in [(&v0, 0), (&v1, 1)] {
        let view = RecordView::new(kind, RawRecord::new(data, version, PointerWidth::Bits64));
        assert!(view.validate().is_ok());
        assert_eq!(view.u32("AssemblyFlags"), 0x10);
        assert_eq!(view.string("FullyQualifiedAssemblyName"), "Lib, Version=1.0.0.0");
    }
}

#[test]
fn test_module_load_pdb_info() {
    let signature = Guid::from_fields(0x01020304, 0x0506, 0x0708, [9, 10, 11, 12, 13, 14, 15, 16]);
    let data = Payload::new(PointerWidth::Bits64)
        .u64(0x7ff8_0000)
        .u64(0x7ff9_0000)
        .u32(0x8)
        .u32(0)
        .string("C:\\app\\App.dll")
        .string("")
        .u16(7)
        .guid(signature)
        .u32(1)
        .string("App.pdb")
        .guid(Guid::ZERO)
        .u32(0)
        .string("")
        .build();
    let view = RecordView::new(kind("ModuleLoad"), RawRecord::new(&data, 2, PointerWidth::Bits64));
    assert!(view.validate().is_ok());
    let module = ModuleLoad::new(&view);
    assert_eq!(module.module_id(), 0x7ff8_0000);
    assert_eq!(module.il_path(), "C:\\app\\App.dll");
    assert_eq!(module.native_path(), "");
    assert_eq!(module.managed_pdb_signature(), signature);
    assert_eq!(module.managed_pdb_age(), 1);
    assert_eq!(module.managed_pdb_build_path(), "App.pdb");
    assert!(module.native_pdb_signature().is_zero());
}

#[test]
fn test_contention_stop_duration() {
    let data = Payload::new(PointerWidth::Bits64).u8(0).u16(1).f64(1500.5).build();
    let view = RecordView::new(
        kind("ContentionStop"),
        RawRecord::new(&data, 1, PointerWidth::Bits64),
    );
    assert!(view.validate().is_ok());
    assert_eq!(view.f64("DurationNs"), 1500.5);
}

#[test]
fn test_deep_clone_outlives_buffer() {
    let owned = {
        let data = Payload::new(PointerWidth::Bits64).u32(1).u16(4).build();
        let view = RecordView::new(kind("GCTriggered"), RawRecord::new(&data, 0, PointerWidth::Bits64));
        view.deep_clone()
    };
    let view = owned.view();
    assert_eq!(view.u32("Reason"), 1);
    assert_eq!(view.u16("ClrInstanceID"), 4);
}

#[test]
fn test_xml_rendering() {
    let data = Payload::new(PointerWidth::Bits64).u32(1).u16(3).build();
    let view = RecordView::new(kind("GCTriggered"), RawRecord::new(&data, 0, PointerWidth::Bits64));
    assert_eq!(
        to_xml(&view),
        "<Event Name=\"GarbageCollection/GCTriggered\" Version=\"0\" Reason=\"Induced\" ClrInstanceID=\"3\"/>"
    );

    let data = Payload::new(PointerWidth::Bits64)
        .u8(0)
        .u16(1)
        .f64(2.5)
        .build();
    let view = RecordView::new(
        kind("ContentionStop"),
        RawRecord::new(&data, 1, PointerWidth::Bits64),
    );
    assert!(to_xml(&view).contains("DurationNs=\"2.5\""));
}
