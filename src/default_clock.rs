use std::sync::Arc;

use log::{debug, error};

use crate::{
    clock_class::ClockClass,
    field_class::{FieldClass, FieldClassKind},
    trace_class::{StreamClass, TraceClass},
    CtfError, Result,
};

fn clock_class_error(msg: String) -> CtfError {
    error!("Invalid clock class reference: {}", msg);
    CtfError::ClockClass(msg)
}

/// Finds the clock class mapped by integers below `fc`. A stream class maps
/// at most one clock class, `found` is the one seen so far.
fn find_mapped_clock_class(
    fc: Option<&FieldClass>,
    found: &mut Option<Arc<ClockClass>>,
) -> Result<()> {
    let Some(fc) = fc else {
        return Ok(());
    };

    match &fc.kind {
        FieldClassKind::Int(_) | FieldClassKind::Enum(_) => {
            let Some(cc) = fc.as_int().and_then(|int| int.mapped_clock_class.as_ref()) else {
                return Ok(());
            };
            if let Some(other) = found.as_ref() {
                if !Arc::ptr_eq(other, cc) {
                    return Err(clock_class_error(format!(
                        "more than one clock class: expected \"{}\", found \"{}\"",
                        other.name(),
                        cc.name()
                    )));
                }
            } else {
                *found = Some(Arc::clone(cc));
            }
        }
        FieldClassKind::Struct(s) => {
            for member in &s.members {
                find_mapped_clock_class(Some(&member.fc), found)?;
            }
        }
        FieldClassKind::Variant(v) => {
            for option in &v.options {
                find_mapped_clock_class(Some(&option.fc), found)?;
            }
        }
        FieldClassKind::Array(a) => find_mapped_clock_class(Some(&a.elem), found)?,
        FieldClassKind::Sequence(s) => find_mapped_clock_class(Some(&s.elem), found)?,
        _ => {}
    }

    Ok(())
}

fn update_stream_class_default_clock_class(sc: &mut StreamClass) -> Result<()> {
    let mut clock_class = sc.default_clock_class.clone();

    if !sc.is_translated() {
        find_mapped_clock_class(sc.packet_context_fc.as_ref(), &mut clock_class)?;
        find_mapped_clock_class(sc.event_header_fc.as_ref(), &mut clock_class)?;
        find_mapped_clock_class(sc.event_common_context_fc.as_ref(), &mut clock_class)?;
    }

    for ec in sc.event_classes.iter().filter(|ec| !ec.is_translated()) {
        find_mapped_clock_class(ec.spec_context_fc.as_ref(), &mut clock_class)
            .and_then(|_| find_mapped_clock_class(ec.payload_fc.as_ref(), &mut clock_class))
            .map_err(|err| {
                error!("In event class {} of stream class {}", ec.id, sc.id);
                err
            })?;
    }

    let Some(cc) = clock_class else {
        return Ok(());
    };
    if sc.default_clock_class.is_some() {
        return Ok(());
    }
    if sc.is_translated() {
        return Err(clock_class_error(format!(
            "stream class {} is translated without a default clock class, but new event classes map \"{}\"",
            sc.id,
            cc.name()
        )));
    }

    debug!("Stream class {} default clock class: \"{}\"", sc.id, cc.name());
    sc.default_clock_class = Some(cc);
    Ok(())
}

/// Gives every stream class the clock class its field classes map as the
/// default one. The packet header cannot map any clock class.
pub(crate) fn update_default_clock_classes(tc: &mut TraceClass) -> Result<()> {
    if !tc.is_translated() {
        let mut clock_class = None;
        find_mapped_clock_class(tc.packet_header_fc.as_ref(), &mut clock_class)?;
        if let Some(cc) = clock_class {
            return Err(clock_class_error(format!(
                "packet header field class maps clock class \"{}\"",
                cc.name()
            )));
        }
    }

    for sc in tc.stream_classes.iter_mut() {
        update_stream_class_default_clock_class(sc)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field_class::IntFieldClass, trace_class::EventClass, Phase};

    fn clocked(cc: &Arc<ClockClass>) -> FieldClass {
        FieldClass::from(IntFieldClass::new(64, false).with_mapped_clock_class(Arc::clone(cc)))
    }

    #[test]
    fn test_default_clock_class_from_event_header() -> Result<()> {
        let mut tc = TraceClass::new();
        let cc = tc.add_clock_class(ClockClass::new("monotonic", 1_000_000_000));
        let eh = FieldClass::structure([("timestamp", clocked(&cc))]);
        tc.add_stream_class(StreamClass::new(0).with_event_header(eh))?;
        update_default_clock_classes(&mut tc)?;

        let default = tc.stream_classes()[0].default_clock_class().expect("default clock class");
        assert!(Arc::ptr_eq(default, &cc));
        Ok(())
    }

    #[test]
    fn test_two_clock_classes_in_one_stream_class() -> Result<()> {
        let mut tc = TraceClass::new();
        let a = tc.add_clock_class(ClockClass::new("a", 1_000));
        let b = tc.add_clock_class(ClockClass::new("b", 1_000));
        let ec = EventClass::new(0, "e").with_payload(FieldClass::structure([("ts", clocked(&b))]));
        let sc = StreamClass::new(0)
            .with_event_header(FieldClass::structure([("timestamp", clocked(&a))]))
            .with_event_class(ec)?;
        tc.add_stream_class(sc)?;

        assert!(matches!(
            update_default_clock_classes(&mut tc),
            Err(CtfError::ClockClass(_))
        ));
        Ok(())
    }

    #[test]
    fn test_same_values_different_identity() -> Result<()> {
        let mut tc = TraceClass::new();
        let a = tc.add_clock_class(ClockClass::new("monotonic", 1_000));
        let b = tc.add_clock_class(ClockClass::new("monotonic", 1_000));
        let pc = FieldClass::structure([("timestamp_begin", clocked(&a)), ("other", clocked(&b))]);
        tc.add_stream_class(StreamClass::new(0).with_packet_context(pc))?;

        assert!(matches!(
            update_default_clock_classes(&mut tc),
            Err(CtfError::ClockClass(_))
        ));
        Ok(())
    }

    #[test]
    fn test_explicit_default_must_match() -> Result<()> {
        let mut tc = TraceClass::new();
        let a = tc.add_clock_class(ClockClass::new("a", 1_000));
        let b = tc.add_clock_class(ClockClass::new("b", 1_000));
        let sc = StreamClass::new(0)
            .with_default_clock_class(a.clone())
            .with_event_header(FieldClass::structure([("timestamp", clocked(&a))]));
        tc.add_stream_class(sc)?;
        update_default_clock_classes(&mut tc)?;

        let sc = StreamClass::new(1)
            .with_default_clock_class(a)
            .with_event_header(FieldClass::structure([("timestamp", clocked(&b))]));
        tc.add_stream_class(sc)?;
        assert!(matches!(
            update_default_clock_classes(&mut tc),
            Err(CtfError::ClockClass(_))
        ));
        Ok(())
    }

    #[test]
    fn test_packet_header_cannot_map_a_clock_class() -> Result<()> {
        let mut tc = TraceClass::new();
        let cc = tc.add_clock_class(ClockClass::new("monotonic", 1_000));
        tc.set_packet_header(FieldClass::structure([("ts", clocked(&cc))]))?;

        assert!(matches!(
            update_default_clock_classes(&mut tc),
            Err(CtfError::ClockClass(_))
        ));
        Ok(())
    }

    #[test]
    fn test_new_event_class_in_translated_stream_class() -> Result<()> {
        let mut tc = TraceClass::new();
        let cc = tc.add_clock_class(ClockClass::new("monotonic", 1_000));
        tc.add_stream_class(StreamClass::new(0))?;
        let sc = tc.stream_class_by_id_mut(0).expect("stream class 0");
        sc.advance(Phase::Translated);
        sc.add_event_class(
            EventClass::new(0, "late").with_payload(FieldClass::structure([("ts", clocked(&cc))])),
        )?;

        assert!(matches!(
            update_default_clock_classes(&mut tc),
            Err(CtfError::ClockClass(_))
        ));
        Ok(())
    }
}
