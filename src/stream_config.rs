use log::debug;

use crate::{
    field_class::{FieldClass, Meaning},
    trace_class::TraceClass,
};

fn has_member_with_meaning(pc: &FieldClass, name: &str, meaning: Meaning) -> bool {
    pc.member(name)
        .is_some_and(|fc| fc.as_int().is_some() && fc.meaning == meaning)
}

/// Derives what packets of each stream class carry from the meanings of
/// their packet context members.
pub(crate) fn update_stream_class_config(tc: &mut TraceClass) {
    for sc in tc.stream_classes.iter_mut().filter(|sc| !sc.is_translated()) {
        let Some(pc) = sc.packet_context_fc.as_ref() else {
            continue;
        };

        sc.packets_have_ts_begin =
            has_member_with_meaning(pc, "timestamp_begin", Meaning::PacketBeginningTime);
        sc.packets_have_ts_end =
            has_member_with_meaning(pc, "timestamp_end", Meaning::PacketEndTime);
        sc.has_discarded_events = has_member_with_meaning(
            pc,
            "events_discarded",
            Meaning::DiscardedEventCounterSnapshot,
        );
        sc.has_discarded_packets = has_member_with_meaning(
            pc,
            "packet_seq_num",
            Meaning::DiscardedPacketCounterSnapshot,
        );

        let have_default_cs = sc.packets_have_ts_begin && sc.packets_have_ts_end;
        sc.discarded_events_have_default_cs = sc.has_discarded_events && have_default_cs;
        sc.discarded_packets_have_default_cs = sc.has_discarded_packets && have_default_cs;

        debug!(
            "Stream class {}: ts-begin={}, ts-end={}, discarded-events={}, discarded-packets={}",
            sc.id,
            sc.packets_have_ts_begin,
            sc.packets_have_ts_end,
            sc.has_discarded_events,
            sc.has_discarded_packets
        );
    }
}
