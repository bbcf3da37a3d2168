use anyhow::{Context, Result};
use ctfir::{
    ir, ClockClass, DecoderConfig, Encoding, EnvValue, EventClass, FieldClass, IntFieldClass,
    MetadataUpdate, StreamClass, TraceClass,
};

fn main() -> Result<()> {
    // Optional clock class offset: [seconds] [nanoseconds]
    let args: Vec<String> = std::env::args().collect();
    let offset_s = match args.get(1) {
        Some(arg) => arg.parse().context("Invalid offset seconds")?,
        None => 0,
    };
    let offset_ns = match args.get(2) {
        Some(arg) => arg.parse().context("Invalid offset nanoseconds")?,
        None => 0,
    };

    let config = DecoderConfig::default().with_clock_class_offset(offset_s, offset_ns);
    let mut tc = sample_trace_class()?;
    let mut ir_tc = ir::TraceClass::new();
    MetadataUpdate::new(config)
        .run(&mut tc, &mut ir_tc)
        .context("Metadata update failed")?;

    println!("Stored values: {}", tc.stored_value_count());
    print_trace_class(&ir_tc);

    Ok(())
}

fn sample_trace_class() -> Result<TraceClass> {
    let mut tc = TraceClass::new()
        .with_uuid(*b"ctfir-sample-tc!")
        .with_environment_entry("hostname", EnvValue::Str("localhost".to_string()))
        .with_environment_entry("tracer_major", EnvValue::Int(2))
        .with_packet_header(FieldClass::structure([
            ("magic", FieldClass::int(32, false)),
            ("stream_id", FieldClass::int(32, false)),
        ]));
    let clock = tc.add_clock_class(
        ClockClass::new("monotonic", 1_000_000_000)
            .with_description("Monotonic Clock")
            .with_offset(1_700_000_000, 0),
    );
    let clocked = FieldClass::from(IntFieldClass::new(64, false).with_mapped_clock_class(clock));
    let text = FieldClass::from(IntFieldClass::new(8, false).with_encoding(Encoding::Utf8));

    let sc = StreamClass::new(0)
        .with_packet_context(FieldClass::structure([
            ("timestamp_begin", clocked.clone()),
            ("timestamp_end", clocked.clone()),
            ("packet_size", FieldClass::int(64, false)),
            ("content_size", FieldClass::int(64, false)),
            ("cpu_id", FieldClass::int(32, false)),
        ]))
        .with_event_header(FieldClass::structure([
            ("id", FieldClass::int(16, false)),
            ("timestamp", clocked),
        ]))
        .with_event_class(EventClass::new(0, "sched_switch").with_payload(
            FieldClass::structure([
                ("_prev_comm", FieldClass::array(16, text.clone())),
                ("_prev_tid", FieldClass::int(32, true)),
                ("_next_tid", FieldClass::int(32, true)),
            ]),
        ))?
        .with_event_class(EventClass::new(1, "printk").with_payload(FieldClass::structure([
            ("_len", FieldClass::int(16, false)),
            ("_msg", FieldClass::sequence("_len", text)),
        ])))?;
    tc.add_stream_class(sc)?;

    Ok(tc)
}

fn print_trace_class(tc: &ir::TraceClass) {
    println!("Trace class");
    for (name, value) in &tc.environment {
        match value {
            EnvValue::Int(v) => println!("  env {} = {}", name, v),
            EnvValue::Str(v) => println!("  env {} = \"{}\"", name, v),
        }
    }
    for cc in &tc.clock_classes {
        println!(
            "  Clock class \"{}\" ({} Hz, offset {} s + {} cycles, unix epoch: {})",
            cc.name, cc.frequency, cc.offset_seconds, cc.offset_cycles, cc.origin_is_unix_epoch
        );
    }

    for sc in &tc.stream_classes {
        println!("  Stream class {}", sc.id);
        if let Some(cc) = &sc.default_clock_class {
            println!("    default clock class: {}", cc.name);
        }
        if let Some(fc) = &sc.packet_context {
            print_field_class("packet context", fc, 4);
        }
        if let Some(fc) = &sc.event_common_context {
            print_field_class("event common context", fc, 4);
        }
        for ec in &sc.event_classes {
            println!("    Event class {} \"{}\"", ec.id, ec.name);
            if let Some(fc) = &ec.specific_context {
                print_field_class("specific context", fc, 6);
            }
            if let Some(fc) = &ec.payload {
                print_field_class("payload", fc, 6);
            }
        }
    }
}

fn print_field_class(name: &str, fc: &ir::FieldClass, indent: usize) {
    let pad = " ".repeat(indent);
    match fc {
        ir::FieldClass::Structure { members } => {
            println!("{}{}: structure", pad, name);
            for member in members {
                print_field_class(&member.name, &member.fc, indent + 2);
            }
        }
        ir::FieldClass::Variant { options, .. } => {
            println!("{}{}: variant", pad, name);
            for option in options {
                print_field_class(&option.name, &option.fc, indent + 2);
            }
        }
        ir::FieldClass::StaticArray { elem, length } => {
            println!("{}{}: array[{}]", pad, name, length);
            print_field_class("element", elem, indent + 2);
        }
        ir::FieldClass::DynamicArray { elem, .. } => {
            println!("{}{}: dynamic array", pad, name);
            print_field_class("element", elem, indent + 2);
        }
        other => println!("{}{}: {}", pad, name, ir_kind_name(other)),
    }
}

fn ir_kind_name(fc: &ir::FieldClass) -> &'static str {
    match fc {
        ir::FieldClass::UnsignedInteger(_) => "unsigned integer",
        ir::FieldClass::SignedInteger(_) => "signed integer",
        ir::FieldClass::UnsignedEnumeration(_) => "unsigned enumeration",
        ir::FieldClass::SignedEnumeration(_) => "signed enumeration",
        ir::FieldClass::Real { single_precision: true } => "single precision real",
        ir::FieldClass::Real { .. } => "double precision real",
        ir::FieldClass::String => "string",
        ir::FieldClass::Structure { .. } => "structure",
        ir::FieldClass::StaticArray { .. } => "static array",
        ir::FieldClass::DynamicArray { .. } => "dynamic array",
        ir::FieldClass::Variant { .. } => "variant",
    }
}
