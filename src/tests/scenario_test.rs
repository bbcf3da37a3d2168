use std::sync::Arc;

use anyhow::Context;

use crate::field_path::PathIndex::Member;
use crate::{
    ir, ClockClass, CtfError, DecoderConfig, Encoding, EventClass, FieldClass, FieldPath,
    IntFieldClass, Meaning, MetadataUpdate, Phase, Scope, StreamClass, TraceClass,
};

fn run(tc: &mut TraceClass) -> crate::Result<ir::TraceClass> {
    let mut ir_tc = ir::TraceClass::new();
    MetadataUpdate::new(DecoderConfig::default()).run(tc, &mut ir_tc)?;
    Ok(ir_tc)
}

#[test]
fn test_packet_header_fields_with_meaning() -> anyhow::Result<()> {
    let ph = FieldClass::structure([
        ("magic", FieldClass::int(32, false)),
        ("stream_id", FieldClass::int(32, false)),
    ]);
    let mut tc = TraceClass::new()
        .with_packet_header(ph)
        .with_stream_class(StreamClass::new(0))?
        .with_stream_class(StreamClass::new(1))?;
    run(&mut tc)?;

    let ph = tc.packet_header().context("packet header")?;
    let magic = ph.member("magic").context("magic")?;
    let stream_id = ph.member("stream_id").context("stream_id")?;
    assert_eq!(magic.meaning(), Meaning::Magic);
    assert_eq!(stream_id.meaning(), Meaning::StreamClassId);

    // Nothing reads them, so they stay decoder business
    assert!(!magic.in_ir());
    assert!(!stream_id.in_ir());
    Ok(())
}

#[test]
fn test_sequence_of_utf8_bytes() -> anyhow::Result<()> {
    let byte = FieldClass::from(IntFieldClass::new(8, true).with_encoding(Encoding::Utf8));
    let payload = FieldClass::structure([
        ("len", FieldClass::int(8, false)),
        ("msg", FieldClass::sequence("len", byte)),
    ]);
    let sc = StreamClass::new(0).with_event_class(EventClass::new(0, "log").with_payload(payload))?;
    let mut tc = TraceClass::new().with_stream_class(sc)?;
    let ir_tc = run(&mut tc)?;

    let payload = tc.stream_classes()[0].event_classes()[0]
        .payload()
        .context("payload")?;
    let len = payload.member("len").context("len")?;
    let msg = payload.member("msg").context("msg")?;
    let seq = msg.as_sequence().context("msg is a sequence")?;

    assert_eq!(
        seq.length_path(),
        Some(&FieldPath::new(Scope::EventPayload, vec![Member(0)]))
    );
    assert_eq!(len.as_int().and_then(|int| int.storing_index()), Some(0));
    assert_eq!(seq.stored_length_index(), Some(0));
    assert_eq!(tc.stored_value_count(), 1);
    assert!(seq.is_text());
    assert!(seq.element().is_unsigned_int());
    assert!(msg.in_ir());
    // The text needs its length
    assert!(len.in_ir());

    let ir_payload = ir_tc.stream_classes[0].event_classes[0]
        .payload
        .as_ref()
        .context("IR payload")?;
    assert_eq!(ir_payload.member("msg"), Some(&ir::FieldClass::String));
    assert!(matches!(
        ir_payload.member("len"),
        Some(ir::FieldClass::UnsignedInteger(_))
    ));
    Ok(())
}

#[test]
fn test_variant_tag_in_later_sibling_struct() -> anyhow::Result<()> {
    let tag = FieldClass::enumeration(
        IntFieldClass::new(8, false),
        vec![crate::EnumMapping::new("a", vec![crate::EnumRange::unsigned(0, 0)])],
    );
    let payload = FieldClass::structure([
        (
            "first",
            FieldClass::structure([(
                "v",
                FieldClass::variant("event.fields.second.tag", [("a", FieldClass::int(8, false))]),
            )]),
        ),
        ("second", FieldClass::structure([("tag", tag)])),
    ]);
    let sc = StreamClass::new(0).with_event_class(EventClass::new(0, "e").with_payload(payload))?;
    let mut tc = TraceClass::new().with_stream_class(sc)?;

    assert!(matches!(run(&mut tc), Err(CtfError::PathOrdering(_))));
    assert_eq!(tc.phase(), Phase::Unresolved);
    Ok(())
}

#[test]
fn test_content_size_without_packet_size() -> anyhow::Result<()> {
    let pc = FieldClass::structure([("content_size", FieldClass::int(64, false))]);
    let mut tc = TraceClass::new().with_stream_class(StreamClass::new(0).with_packet_context(pc))?;

    assert!(matches!(run(&mut tc), Err(CtfError::Structural(_))));
    Ok(())
}

#[test]
fn test_kernel_like_trace_class() -> anyhow::Result<()> {
    let mut tc = TraceClass::new()
        .with_uuid([7; 16])
        .with_environment_entry("hostname", crate::EnvValue::Str("box".to_string()))
        .with_environment_entry("tracer_major", crate::EnvValue::Int(2));
    let monotonic = tc.add_clock_class(
        ClockClass::new("monotonic", 1_000_000_000)
            .with_description("Monotonic Clock")
            .with_offset(1_600_000_000, 42)
            .with_absolute(true),
    );
    let clocked = |bits| {
        FieldClass::from(IntFieldClass::new(bits, false).with_mapped_clock_class(Arc::clone(&monotonic)))
    };

    tc.set_packet_header(FieldClass::structure([
        ("magic", FieldClass::int(32, false)),
        ("uuid", FieldClass::array(16, FieldClass::int(8, false))),
        ("stream_id", FieldClass::int(32, false)),
        ("stream_instance_id", FieldClass::int(64, false)),
    ]))?;

    let pc = FieldClass::structure([
        ("timestamp_begin", clocked(64)),
        ("timestamp_end", clocked(64)),
        ("content_size", FieldClass::int(64, false)),
        ("packet_size", FieldClass::int(64, false)),
        ("packet_seq_num", FieldClass::int(64, false)),
        ("events_discarded", FieldClass::int(64, false)),
        ("cpu_id", FieldClass::int(32, false)),
    ]);
    let eh = FieldClass::structure([("id", FieldClass::int(16, false)), ("timestamp", clocked(64))]);
    let switch = EventClass::new(0, "sched_switch").with_payload(FieldClass::structure([
        ("prev_comm", FieldClass::array(16, FieldClass::from(IntFieldClass::new(8, true).with_encoding(Encoding::Utf8)))),
        ("prev_tid", FieldClass::int(32, true)),
        ("next_tid", FieldClass::int(32, true)),
    ]));
    let wakeup = EventClass::new(1, "sched_wakeup")
        .with_log_level(crate::LogLevel::Info)
        .with_payload(FieldClass::structure([("tid", FieldClass::int(32, true))]));
    let sc = StreamClass::new(0)
        .with_packet_context(pc)
        .with_event_header(eh)
        .with_event_class(switch)?
        .with_event_class(wakeup)?;
    tc.add_stream_class(sc)?;

    let ir_tc = run(&mut tc)?;

    let sc = &tc.stream_classes()[0];
    assert!(Arc::ptr_eq(sc.default_clock_class().context("default clock class")?, &monotonic));
    assert!(sc.packets_have_ts_begin());
    assert!(sc.packets_have_ts_end());
    assert!(sc.discarded_events_have_default_cs());
    assert!(sc.discarded_packets_have_default_cs());
    // The end timestamp does not update the clock
    let ts_end = sc.packet_context().and_then(|pc| pc.member("timestamp_end"));
    assert!(ts_end.and_then(|fc| fc.as_int()).is_some_and(|int| int.mapped_clock_class().is_none()));

    assert_eq!(ir_tc.uuid, Some([7; 16]));
    assert_eq!(ir_tc.environment.len(), 2);
    assert_eq!(ir_tc.environment_entry("tracer_major"), Some(&crate::EnvValue::Int(2)));

    let ir_cc = &ir_tc.clock_classes[0];
    assert_eq!(ir_cc.name, "monotonic");
    assert_eq!(ir_cc.description.as_deref(), Some("Monotonic Clock"));
    assert_eq!((ir_cc.offset_seconds, ir_cc.offset_cycles), (1_600_000_000, 42));
    assert!(ir_cc.origin_is_unix_epoch);

    let ir_sc = ir_tc.stream_class_by_id(0).context("IR stream class 0")?;
    assert!(ir_sc.supports_packets);
    assert!(ir_sc.supports_discarded_events);
    assert!(ir_sc.discarded_packets_have_default_clock_snapshots);
    assert!(Arc::ptr_eq(ir_sc.default_clock_class.as_ref().context("IR default clock class")?, ir_cc));
    let ir_pc = ir_sc.packet_context.as_ref().context("IR packet context")?;
    assert_eq!(ir_pc.member_count(), 1);
    assert!(ir_pc.member("cpu_id").is_some());

    let ir_switch = ir_sc.event_class_by_id(0).context("sched_switch")?;
    assert_eq!(ir_switch.name, "sched_switch");
    let ir_payload = ir_switch.payload.as_ref().context("sched_switch payload")?;
    assert_eq!(ir_payload.member("prev_comm"), Some(&ir::FieldClass::String));
    assert!(matches!(
        ir_payload.member("prev_tid"),
        Some(ir::FieldClass::SignedInteger(ir::IntegerFieldClass { field_value_range: 32, .. }))
    ));
    let ir_wakeup = ir_sc.event_class_by_id(1).context("sched_wakeup")?;
    assert_eq!(ir_wakeup.log_level, Some(crate::LogLevel::Info));

    assert_eq!(tc.phase(), Phase::Translated);
    Ok(())
}
