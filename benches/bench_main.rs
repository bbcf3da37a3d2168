use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use ctfir::{
    ir, ClockClass, DecoderConfig, Encoding, EnumMapping, EnumRange, EventClass, FieldClass,
    IntFieldClass, MetadataUpdate, StreamClass, TraceClass,
};

fn event_payload(i: usize) -> FieldClass {
    let tag = FieldClass::enumeration(
        IntFieldClass::new(8, false),
        vec![
            EnumMapping::new("_int", vec![EnumRange::unsigned(0, 0)]),
            EnumMapping::new("_str", vec![EnumRange::unsigned(1, 1)]),
        ],
    );
    let text = FieldClass::from(IntFieldClass::new(8, false).with_encoding(Encoding::Utf8));

    let mut members = vec![
        ("_len".to_string(), FieldClass::int(16, false)),
        ("_msg".to_string(), FieldClass::sequence("_len", text)),
        ("_tag".to_string(), tag),
        (
            "_value".to_string(),
            FieldClass::variant(
                "_tag",
                [("_int", FieldClass::int(64, true)), ("_str", FieldClass::string())],
            ),
        ),
    ];
    for j in 0..i % 8 {
        members.push((format!("_arg{}", j), FieldClass::int(32, j % 2 == 0)));
    }

    FieldClass::structure(members)
}

pub fn create_trace_class(stream_classes: usize, event_classes: usize) -> TraceClass {
    let mut tc = TraceClass::new().with_packet_header(FieldClass::structure([
        ("magic", FieldClass::int(32, false)),
        ("uuid", FieldClass::array(16, FieldClass::int(8, false))),
        ("stream_id", FieldClass::int(32, false)),
    ]));
    let clock = tc.add_clock_class(ClockClass::new("monotonic", 1_000_000_000));

    for sc_id in 0..stream_classes {
        let clocked = FieldClass::from(
            IntFieldClass::new(64, false).with_mapped_clock_class(clock.clone()),
        );
        let mut sc = StreamClass::new(sc_id as u64)
            .with_packet_context(FieldClass::structure([
                ("timestamp_begin", clocked.clone()),
                ("timestamp_end", clocked.clone()),
                ("packet_size", FieldClass::int(64, false)),
                ("content_size", FieldClass::int(64, false)),
                ("cpu_id", FieldClass::int(32, false)),
            ]))
            .with_event_header(FieldClass::structure([
                ("id", FieldClass::int(32, false)),
                ("timestamp", clocked),
            ]));

        for ec_id in 0..event_classes {
            let ec = EventClass::new(ec_id as u64, format!("event_{}", ec_id))
                .with_payload(event_payload(ec_id));
            sc.add_event_class(ec).unwrap();
        }
        tc.add_stream_class(sc).unwrap();
    }

    tc
}

pub fn bench_full_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_update");

    for event_classes in [10, 100, 1_000, 10_000].iter() {
        let tc = create_trace_class(4, *event_classes);
        let update = MetadataUpdate::new(DecoderConfig::default());

        group.bench_with_input(BenchmarkId::from_parameter(event_classes), &tc, |b, tc| {
            b.iter_batched(
                || (tc.clone(), ir::TraceClass::new()),
                |(mut tc, mut ir_tc)| {
                    update.run(&mut tc, &mut ir_tc).unwrap();
                    black_box(ir_tc)
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

pub fn bench_metadata_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("metadata_only");

    for event_classes in [10, 100, 1_000, 10_000].iter() {
        let tc = create_trace_class(4, *event_classes);
        let update = MetadataUpdate::new(DecoderConfig::default().with_create_trace_class(false));

        group.bench_with_input(BenchmarkId::from_parameter(event_classes), &tc, |b, tc| {
            b.iter_batched(
                || (tc.clone(), ir::TraceClass::new()),
                |(mut tc, mut ir_tc)| {
                    update.run(&mut tc, &mut ir_tc).unwrap();
                    black_box(tc)
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

pub fn bench_incremental_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_update");

    for event_classes in [10, 100, 1_000].iter() {
        let mut tc = create_trace_class(1, *event_classes);
        let mut ir_tc = ir::TraceClass::new();
        let update = MetadataUpdate::new(DecoderConfig::default());
        update.run(&mut tc, &mut ir_tc).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(event_classes),
            &(tc, ir_tc),
            |b, (tc, ir_tc)| {
                b.iter_batched(
                    || {
                        let mut tc = tc.clone();
                        let ec = EventClass::new(u64::MAX, "late").with_payload(event_payload(7));
                        tc.stream_class_by_id_mut(0).unwrap().add_event_class(ec).unwrap();
                        (tc, ir_tc.clone())
                    },
                    |(mut tc, mut ir_tc)| {
                        update.run(&mut tc, &mut ir_tc).unwrap();
                        black_box(ir_tc)
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_full_update,
    bench_metadata_only,
    bench_incremental_update
);
criterion_main!(benches);
