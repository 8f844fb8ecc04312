use fixtures::*;

use std::cell::RefCell;
use std::rc::Rc;

use clr_events::catalog::CLR_NATIVE_PROVIDER_GUID;
use clr_events::events::{ClrEvent, GcSampledObjectAllocation};
use clr_events::{
    Catalog, DecodeContext, Error, EventHeader, FieldAccess, Guid, PointerWidth, RawEvent,
    RecordKind, RecordView, Registry, RegistryOptions, TypeNameHistory, ILLEGAL_EVENT_ID,
};
use pretty_assertions::assert_eq;

const LIST: &[u64] = &[0x100];

fn kind(name: &str) -> &'static RecordKind {
    Catalog::clr().kind(name).expect("kind in catalog")
}

fn triggered_payload(reason: u32) -> Vec<u8> {
    Payload::new(PointerWidth::Bits64).u32(reason).u16(1).build()
}

fn sampled_payload(type_id: u64) -> Vec<u8> {
    Payload::new(PointerWidth::Bits64)
        .address(0x1_0000)
        .address(type_id)
        .u32(1)
        .u64(24)
        .u16(1)
        .build()
}

#[test]
fn test_dispatch_by_event_id() {
    ensure_env_logger_initialized();
    let reasons = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::default();
    let seen = reasons.clone();
    registry.subscribe(kind("GCTriggered").clone(), move |_, view, _| {
        seen.borrow_mut().push(view.u32("Reason"));
    });
    assert_eq!(registry.len(), 1);

    let header = header(kind("GCTriggered"), 0, PointerWidth::Bits64);
    let payload = triggered_payload(1);
    assert_eq!(registry.dispatch(&RawEvent::new(header, &payload)), 1);
    let payload = triggered_payload(4);
    assert_eq!(registry.dispatch(&RawEvent::new(header, &payload)), 1);
    assert_eq!(*reasons.borrow(), vec![1, 4]);
    assert_eq!(registry.unhandled(), 0);
}

#[test]
fn test_dispatch_by_task_and_opcode() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::default();
    for name in ["GCTriggered", "GCPerHeapHistory"] {
        let calls = calls.clone();
        registry.subscribe(kind(name).clone(), move |_, view, _| {
            calls.borrow_mut().push(view.kind().event_name);
        });
    }

    let mut classic = header(kind("GCTriggered"), 0, PointerWidth::Bits64);
    classic.event_id = ILLEGAL_EVENT_ID;
    let payload = triggered_payload(1);
    assert_eq!(registry.dispatch(&RawEvent::new(classic, &payload)), 1);

    let per_heap = header(kind("GCPerHeapHistory"), 0, PointerWidth::Bits64);
    assert_eq!(registry.dispatch(&RawEvent::new(per_heap, &[])), 1);

    assert_eq!(*calls.borrow(), vec!["GCTriggered", "GCPerHeapHistory"]);
}

#[test]
fn test_native_provider_needs_the_alias() {
    let mut header = header(kind("GCTriggered"), 0, PointerWidth::Bits64);
    header.provider_guid = CLR_NATIVE_PROVIDER_GUID;
    header.task_guid = Guid::ZERO;
    let payload = triggered_payload(2);

    let mut plain = Registry::default();
    plain.subscribe(kind("GCTriggered").clone(), |_, _, _| {});
    assert_eq!(plain.dispatch(&RawEvent::new(header, &payload)), 0);
    assert_eq!(plain.unhandled(), 1);

    let calls = Rc::new(RefCell::new(0));
    let mut aliased = Registry::for_catalog(Catalog::clr(), RegistryOptions::default());
    let counter = calls.clone();
    aliased.subscribe(kind("GCTriggered").clone(), move |_, view, _| {
        assert_eq!(view.u32("Reason"), 2);
        *counter.borrow_mut() += 1;
    });
    assert_eq!(aliased.dispatch(&RawEvent::new(header, &payload)), 1);
    assert_eq!(*calls.borrow(), 1);
    assert_eq!(aliased.unhandled(), 0);
}

#[test]
fn test_every_subscriber_called_once() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::for_catalog(Catalog::clr(), RegistryOptions::default());
    for tag in ["first", "second"] {
        let calls = calls.clone();
        registry.subscribe(kind("GCTriggered").clone(), move |_, _, _| {
            calls.borrow_mut().push(tag);
        });
    }
    let header = header(kind("GCTriggered"), 0, PointerWidth::Bits64);
    let payload = triggered_payload(0);
    assert_eq!(registry.dispatch(&RawEvent::new(header, &payload)), 2);
    assert_eq!(*calls.borrow(), vec!["first", "second"]);
}

#[test]
fn test_unsubscribe_removes_every_binding() {
    let calls = Rc::new(RefCell::new(0));
    let mut registry = Registry::for_catalog(Catalog::clr(), RegistryOptions::default());
    let counter = calls.clone();
    let handle = registry.subscribe(kind("GCTriggered").clone(), move |_, _, _| {
        *counter.borrow_mut() += 1;
    });

    registry.unsubscribe(handle).expect("subscribed");
    assert!(registry.is_empty());

    let payload = triggered_payload(0);
    let mut by_id = header(kind("GCTriggered"), 0, PointerWidth::Bits64);
    assert_eq!(registry.dispatch(&RawEvent::new(by_id, &payload)), 0);
    by_id.provider_guid = CLR_NATIVE_PROVIDER_GUID;
    assert_eq!(registry.dispatch(&RawEvent::new(by_id, &payload)), 0);
    by_id.event_id = ILLEGAL_EVENT_ID;
    assert_eq!(registry.dispatch(&RawEvent::new(by_id, &payload)), 0);
    assert_eq!(*calls.borrow(), 0);
    assert_eq!(registry.unhandled(), 3);

    let err = registry.unsubscribe(handle).unwrap_err();
    assert!(matches!(err, Error::UnknownSubscription(id) if id == handle.id()));
}

type Calls = Rc<RefCell<Vec<(&'static str, &'static str)>>>;

fn recorder(
    calls: Calls,
    name: &'static str,
) -> impl FnMut(&EventHeader, &RecordView, &DecodeContext) + 'static {
    move |_, view, _| calls.borrow_mut().push((name, view.kind().event_name))
}

#[test]
fn test_subscribe_catalog_selection() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::for_catalog(Catalog::clr(), RegistryOptions::default());
    let handles = registry.subscribe_catalog(
        Catalog::clr(),
        |_, event| event.starts_with("Exception") || event == "GCTriggered",
        |kind| recorder(calls.clone(), kind.event_name),
    );
    assert_eq!(handles.len(), 2);

    let exception = Payload::new(PointerWidth::Bits64)
        .string("System.InvalidOperationException")
        .string("boom")
        .address(0x4000)
        .u32(0x80131509)
        .u16(0x10)
        .u16(1)
        .build();
    let mut header = header(kind("ExceptionThrown"), 1, PointerWidth::Bits64);
    assert_eq!(registry.dispatch(&RawEvent::new(header, &exception)), 1);
    header.provider_guid = CLR_NATIVE_PROVIDER_GUID;
    assert_eq!(registry.dispatch(&RawEvent::new(header, &exception)), 1);

    assert_eq!(
        *calls.borrow(),
        vec![
            ("ExceptionThrown", "ExceptionThrown"),
            ("ExceptionThrown", "ExceptionThrown")
        ]
    );
}

#[test]
fn test_subscribe_catalog_binds_the_catalog_alias() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::default();
    let handles = registry.subscribe_catalog(
        Catalog::clr(),
        |_, event| event == "GCTriggered",
        |kind| recorder(calls.clone(), kind.event_name),
    );
    assert_eq!(handles.len(), 1);

    let mut native = header(kind("GCTriggered"), 0, PointerWidth::Bits64);
    native.provider_guid = CLR_NATIVE_PROVIDER_GUID;
    native.task_guid = Guid::ZERO;
    let payload = triggered_payload(3);
    assert_eq!(registry.dispatch(&RawEvent::new(native, &payload)), 1);
    assert_eq!(registry.unhandled(), 0);
    assert_eq!(*calls.borrow(), vec![("GCTriggered", "GCTriggered")]);

    registry.unsubscribe(handles[0]).expect("subscribed");
    assert_eq!(registry.dispatch(&RawEvent::new(native, &payload)), 0);
    assert_eq!(registry.unhandled(), 1);
}

#[test]
fn test_mismatched_payload_still_dispatched() {
    ensure_env_logger_initialized();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::default();
    let seen = calls.clone();
    registry.subscribe(kind("GCStart").clone(), move |_, view, _| {
        seen.borrow_mut().push((view.u32("Count"), view.validate().is_ok()));
    });
    let payload = Payload::new(PointerWidth::Bits64)
        .u32(5)
        .u32(1)
        .u32(0)
        .u32(0)
        .build();
    let header = header(kind("GCStart"), 0, PointerWidth::Bits64);
    assert_eq!(registry.dispatch(&RawEvent::new(header, &payload)), 1);
    assert_eq!(*calls.borrow(), vec![(5, false)]);
}

#[test]
fn test_type_names_follow_bulk_type_records() {
    ensure_env_logger_initialized();
    let names = Rc::new(RefCell::new(Vec::new()));
    let mut registry = Registry::default();
    let seen = names.clone();
    registry.subscribe(
        kind("GCSampledObjectAllocationHigh").clone(),
        move |header, view, ctx| {
            let sample = GcSampledObjectAllocation::new(view);
            seen.borrow_mut()
                .push(sample.type_name(header, ctx).map(str::to_owned));
        },
    );

    let bulk_kind = kind("BulkType");
    let sampled_kind = kind("GCSampledObjectAllocationHigh");
    let sample = sampled_payload(0x200);

    let mut sampled = header(sampled_kind, 0, PointerWidth::Bits64);
    sampled.timestamp = 50;
    registry.dispatch(&RawEvent::new(sampled, &sample));

    let mut bulk = header(bulk_kind, 0, PointerWidth::Bits64);
    bulk.timestamp = 100;
    let payload = bulk_type_payload(&[(0x100, "System.Int32", NO_PARAMETERS), (0x200, "List`1", LIST)]);
    assert_eq!(registry.dispatch(&RawEvent::new(bulk, &payload)), 0);
    assert_eq!(registry.context().type_names().len(), 2);

    sampled.timestamp = 200;
    registry.dispatch(&RawEvent::new(sampled, &sample));

    bulk.timestamp = 300;
    let payload = bulk_type_payload(&[(0x200, "Reloaded", NO_PARAMETERS)]);
    registry.dispatch(&RawEvent::new(bulk, &payload));

    sampled.timestamp = 250;
    registry.dispatch(&RawEvent::new(sampled, &sample));
    sampled.timestamp = 300;
    registry.dispatch(&RawEvent::new(sampled, &sample));

    sampled.process_id = 99;
    registry.dispatch(&RawEvent::new(sampled, &sample));

    assert_eq!(
        *names.borrow(),
        vec![
            None,
            Some("List`1".to_string()),
            Some("List`1".to_string()),
            Some("Reloaded".to_string()),
            None,
        ]
    );
}

#[test]
fn test_type_tracking_can_be_disabled() {
    let mut registry = Registry::new(RegistryOptions::new().track_type_names(false));
    let header = header(kind("BulkType"), 0, PointerWidth::Bits64);
    let payload = bulk_type_payload(&[(0x100, "System.Int32", NO_PARAMETERS)]);
    registry.dispatch(&RawEvent::new(header, &payload));
    assert!(registry.context().type_names().is_empty());
    assert_eq!(registry.unhandled(), 1);
}

#[test]
fn test_persisted_type_names() {
    let mut registry = Registry::default();
    let mut header = header(kind("BulkType"), 0, PointerWidth::Bits64);
    header.timestamp = 10;
    let payload = bulk_type_payload(&[(0x100, "System.Int32", NO_PARAMETERS), (0x200, "System.String", NO_PARAMETERS)]);
    registry.dispatch(&RawEvent::new(header, &payload));
    header.timestamp = 20;
    let payload = bulk_type_payload(&[(0x100, "Renamed", NO_PARAMETERS)]);
    registry.dispatch(&RawEvent::new(header, &payload));

    let bytes = registry
        .into_context()
        .into_type_names()
        .to_bytes()
        .expect("serialize");
    assert_eq!(&bytes[..8], b"CLRTYPES");

    let restored = TypeNameHistory::from_bytes(&bytes).expect("deserialize");
    assert_eq!(restored.len(), 2);
    assert_eq!(restored.lookup(0x100, 1234, 15), Some("System.Int32"));
    assert_eq!(restored.lookup(0x100, 1234, 25), Some("Renamed"));
    assert_eq!(restored.lookup(0x200, 1234, 25), Some("System.String"));

    // A restored store resolves allocations in a later session.
    let names = Rc::new(RefCell::new(Vec::new()));
    let mut registry =
        Registry::default().with_context(DecodeContext::with_type_names(restored));
    let seen = names.clone();
    registry.subscribe(kind("GCAllocationTick").clone(), move |header, view, ctx| {
        if let ClrEvent::GcAllocationTick(tick) = ClrEvent::from_view(view) {
            seen.borrow_mut().push(tick.type_name(header, ctx));
        }
    });
    let tick = Payload::new(PointerWidth::Bits64)
        .u32(100)
        .u32(0)
        .u16(1)
        .u64(100)
        .address(0x200)
        .string("")
        .u32(0)
        .build();
    let mut header = header_for_tick();
    header.timestamp = 30;
    registry.dispatch(&RawEvent::new(header, &tick));
    assert_eq!(*names.borrow(), vec![Some("System.String".to_string())]);
}

fn header_for_tick() -> EventHeader {
    header(kind("GCAllocationTick"), 2, PointerWidth::Bits64)
}
