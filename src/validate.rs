use log::{debug, error, warn};

use crate::{
    field_class::{FieldClass, FieldClassKind, Meaning},
    field_path::Scope,
    trace_class::{StreamClass, TraceClass},
    CtfError, Result,
};

const PACKET_CONTEXT_UNSIGNED_MEMBERS: [&str; 6] = [
    "timestamp_begin",
    "timestamp_end",
    "events_discarded",
    "packet_seq_num",
    "packet_size",
    "content_size",
];

fn structural(msg: String) -> CtfError {
    error!("Invalid {}", msg);
    CtfError::Structural(msg)
}

/// Checks the shape of the well-known header and packet context members
/// of the parts of `tc` which are not translated yet.
///
/// The packet header is checked on every run: new stream classes can make
/// its `stream_id` member mandatory.
pub(crate) fn validate_trace_class(tc: &TraceClass) -> Result<()> {
    debug!("Validating trace class");

    if let Some(ph) = tc.packet_header() {
        validate_packet_header(ph, tc.stream_classes().len())?;
    }

    for sc in tc.stream_classes() {
        if !sc.is_translated() {
            validate_stream_class(sc)?;
        }
        if sc.has_pending_work() {
            validate_event_header(sc)?;
        }
    }

    Ok(())
}

fn validate_packet_header(ph: &FieldClass, stream_class_count: usize) -> Result<()> {
    let Some(s) = ph.as_struct() else {
        return Err(structural(format!(
            "packet header field class: expecting a structure, got a {}",
            ph.kind_name()
        )));
    };

    if let Some(index) = s.members().iter().position(|m| m.name() == "magic") {
        if index != 0 {
            return Err(structural(format!(
                "packet header field class: `magic` member is not the first member (index {})",
                index
            )));
        }

        let magic = &s.members()[0].fc;
        if !magic.as_int().is_some_and(|int| !int.is_signed && int.size == 32) {
            return Err(structural(
                "packet header field class: `magic` member is not a 32-bit unsigned integer field class"
                    .to_string(),
            ));
        }
    }

    match ph.member("stream_id") {
        Some(_) => check_unsigned_int("packet header", ph, "stream_id")?,
        None if stream_class_count > 1 => {
            return Err(structural(format!(
                "packet header field class: no `stream_id` member, but trace class contains {} stream classes",
                stream_class_count
            )))
        }
        None => {}
    }

    check_unsigned_int("packet header", ph, "stream_instance_id")?;

    if let Some(uuid) = ph.member("uuid") {
        let is_uuid = uuid.as_array().is_some_and(|a| {
            a.length == 16
                && a.elem.alignment == 8
                && matches!(&a.elem.kind, FieldClassKind::Int(int) if !int.is_signed && int.size == 8)
        });
        if !is_uuid {
            return Err(structural(
                "packet header field class: `uuid` member is not an array of 16 byte-aligned 8-bit unsigned integers"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_stream_class(sc: &StreamClass) -> Result<()> {
    if let Some(pc) = sc.packet_context() {
        if pc.as_struct().is_none() {
            return Err(structural(format!(
                "packet context field class of stream class {}: expecting a structure, got a {}",
                sc.id(),
                pc.kind_name()
            )));
        }

        for name in PACKET_CONTEXT_UNSIGNED_MEMBERS {
            check_unsigned_int("packet context", pc, name)?;
        }

        if pc.member("content_size").is_some() && pc.member("packet_size").is_none() {
            return Err(structural(format!(
                "packet context field class of stream class {}: `content_size` member exists without a `packet_size` member",
                sc.id()
            )));
        }
    }

    Ok(())
}

/// Event header checks. New event classes can make the `id` member
/// mandatory, so these also run for translated stream classes.
fn validate_event_header(sc: &StreamClass) -> Result<()> {
    match sc.event_header() {
        Some(eh) => {
            if eh.as_struct().is_none() {
                return Err(structural(format!(
                    "event header field class of stream class {}: expecting a structure, got a {}",
                    sc.id(),
                    eh.kind_name()
                )));
            }

            match eh.member("id") {
                Some(_) => check_unsigned_int("event header", eh, "id")?,
                None if sc.event_classes().len() > 1 => {
                    return Err(structural(format!(
                        "event header field class of stream class {}: no `id` member, but stream class contains {} event classes",
                        sc.id(),
                        sc.event_classes().len()
                    )))
                }
                None => {}
            }
        }
        None if sc.event_classes().len() > 1 => {
            return Err(structural(format!(
                "stream class {}: no event header field class, but stream class contains {} event classes",
                sc.id(),
                sc.event_classes().len()
            )))
        }
        None => {}
    }

    Ok(())
}

fn check_unsigned_int(scope_name: &str, parent: &FieldClass, name: &str) -> Result<()> {
    match parent.member(name) {
        Some(fc) if !fc.is_unsigned_int() => Err(structural(format!(
            "{} field class: `{}` member is not an unsigned integer field class (got a {})",
            scope_name,
            name,
            fc.kind_name()
        ))),
        _ => Ok(()),
    }
}

/// Reports the header fields nothing will ever read: header scopes have
/// no IR counterpart. Returns how many were reported.
pub(crate) fn warn_meaningless_header_fields(tc: &TraceClass) -> usize {
    let mut count = 0;

    if !tc.is_translated() {
        if let Some(ph) = tc.packet_header() {
            count += warn_meaningless_fields(ph, None, Scope::PacketHeader);
        }
    }

    for sc in tc.stream_classes().iter().filter(|sc| !sc.is_translated()) {
        if let Some(eh) = sc.event_header() {
            count += warn_meaningless_fields(eh, None, Scope::EventHeader);
        }
    }

    count
}

fn warn_meaningless_fields(fc: &FieldClass, name: Option<&str>, scope: Scope) -> usize {
    let ignored = |name: Option<&str>| {
        warn!(
            "User field found in {}: ignoring: name=\"{}\"",
            scope,
            name.unwrap_or("")
        );
        1
    };

    match &fc.kind {
        FieldClassKind::Float(_) | FieldClassKind::String(_) => ignored(name),
        FieldClassKind::Int(_) | FieldClassKind::Enum(_) => match fc.as_int() {
            Some(int)
                if fc.meaning == Meaning::None
                    && int.storing_index.is_none()
                    && int.mapped_clock_class.is_none() =>
            {
                ignored(name)
            }
            _ => 0,
        },
        FieldClassKind::Struct(s) => s
            .members
            .iter()
            .map(|m| warn_meaningless_fields(&m.fc, Some(&m.name), scope))
            .sum(),
        FieldClassKind::Variant(v) => v
            .options
            .iter()
            .map(|o| warn_meaningless_fields(&o.fc, Some(&o.name), scope))
            .sum(),
        FieldClassKind::Array(a) if fc.meaning == Meaning::None => {
            warn_meaningless_fields(&a.elem, name, scope)
        }
        FieldClassKind::Array(_) => 0,
        FieldClassKind::Sequence(s) => warn_meaningless_fields(&s.elem, name, scope),
    }
}
