use log::{debug, trace};

use crate::{
    field_class::{FieldClass, FieldClassKind, Meaning},
    field_path::Scope,
    trace_class::TraceClass,
};

const PACKET_HEADER_MEANINGS: [(&str, Meaning); 3] = [
    ("magic", Meaning::Magic),
    ("stream_id", Meaning::StreamClassId),
    ("stream_instance_id", Meaning::DataStreamId),
];

const PACKET_CONTEXT_MEANINGS: [(&str, Meaning); 5] = [
    ("timestamp_begin", Meaning::PacketBeginningTime),
    ("events_discarded", Meaning::DiscardedEventCounterSnapshot),
    ("packet_seq_num", Meaning::DiscardedPacketCounterSnapshot),
    ("packet_size", Meaning::ExpectedPacketTotalSize),
    ("content_size", Meaning::ExpectedPacketContentSize),
];

const EVENT_HEADER_MEANINGS: [(&str, Meaning); 1] = [("id", Meaning::EventClassId)];

/// Tags the well-known integer fields of the header and packet context
/// scopes which are not translated yet.
pub(crate) fn tag_meanings(tc: &mut TraceClass) {
    debug!("Tagging field class meanings");

    for root in tc.pending_roots_mut() {
        match root.scope {
            Scope::PacketHeader => {
                for (name, meaning) in PACKET_HEADER_MEANINGS {
                    set_int_meaning_by_name(root.fc, None, name, meaning);
                }
                if let Some(uuid) = root.fc.member_mut("uuid") {
                    if matches!(uuid.kind, FieldClassKind::Array(_)) {
                        uuid.meaning = Meaning::Uuid;
                    }
                }
            }
            Scope::PacketContext => {
                for (name, meaning) in PACKET_CONTEXT_MEANINGS {
                    set_int_meaning_by_name(root.fc, None, name, meaning);
                }
                // The end time must not update the clock while decoding
                if let Some(int) = root
                    .fc
                    .member_mut("timestamp_end")
                    .filter(|fc| fc.as_int().is_some())
                {
                    int.meaning = Meaning::PacketEndTime;
                    if let Some(int) = int.as_int_mut() {
                        int.mapped_clock_class = None;
                    }
                }
            }
            Scope::EventHeader => {
                for (name, meaning) in EVENT_HEADER_MEANINGS {
                    set_int_meaning_by_name(root.fc, None, name, meaning);
                }
            }
            _ => {}
        }
    }
}

/// Every integer named `target` below `fc` gets `meaning`. Variants fan
/// out to all their options.
fn set_int_meaning_by_name(fc: &mut FieldClass, name: Option<&str>, target: &str, meaning: Meaning) {
    match &mut fc.kind {
        FieldClassKind::Int(_) | FieldClassKind::Enum(_) => {
            if name == Some(target) {
                trace!("Field \"{}\" has meaning {:?}", target, meaning);
                fc.meaning = meaning;
            }
        }
        FieldClassKind::Struct(s) => {
            for member in &mut s.members {
                set_int_meaning_by_name(&mut member.fc, Some(&member.name), target, meaning);
            }
        }
        FieldClassKind::Variant(v) => {
            for option in &mut v.options {
                set_int_meaning_by_name(&mut option.fc, Some(&option.name), target, meaning);
            }
        }
        FieldClassKind::Array(a) => set_int_meaning_by_name(&mut a.elem, None, target, meaning),
        FieldClassKind::Sequence(s) => set_int_meaning_by_name(&mut s.elem, None, target, meaning),
        _ => {}
    }
}
