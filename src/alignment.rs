use log::debug;

use crate::{
    field_class::{FieldClass, FieldClassKind},
    trace_class::TraceClass,
};

pub(crate) fn update_alignments(tc: &mut TraceClass) {
    debug!("Updating field class alignments");

    for root in tc.pending_roots_mut() {
        update_alignment(root.fc);
    }
}

/// Computes the alignment of compound field classes from their children,
/// bottom-up, and returns the alignment of `fc`.
///
/// A structure is at least as aligned as its most aligned member. Arrays
/// and sequences take the alignment of their element, even when empty.
/// A variant keeps its own alignment: only the selected option applies.
fn update_alignment(fc: &mut FieldClass) -> u32 {
    match &mut fc.kind {
        FieldClassKind::Struct(s) => {
            for member in &mut s.members {
                let alignment = update_alignment(&mut member.fc);
                fc.alignment = fc.alignment.max(alignment);
            }
        }
        FieldClassKind::Variant(v) => {
            for option in &mut v.options {
                update_alignment(&mut option.fc);
            }
        }
        FieldClassKind::Array(a) => fc.alignment = update_alignment(&mut a.elem),
        FieldClassKind::Sequence(s) => fc.alignment = update_alignment(&mut s.elem),
        _ => {}
    }

    fc.alignment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        trace_class::{EventClass, StreamClass},
        Result,
    };

    fn run(payload: FieldClass) -> Result<FieldClass> {
        let sc = StreamClass::new(0).with_event_class(EventClass::new(0, "e").with_payload(payload))?;
        let mut tc = TraceClass::new().with_stream_class(sc)?;
        update_alignments(&mut tc);
        Ok(tc.stream_classes()[0].event_classes()[0]
            .payload()
            .cloned()
            .expect("payload"))
    }

    #[test]
    fn test_struct_takes_max_member_alignment() -> Result<()> {
        let payload = run(FieldClass::structure([
            ("a", FieldClass::int(3, false)),
            ("b", FieldClass::int(32, false).with_alignment(32)),
            (
                "inner",
                FieldClass::structure([("c", FieldClass::float(64).with_alignment(64))]),
            ),
        ]))?;

        assert_eq!(payload.alignment(), 64);
        assert_eq!(payload.member("inner").map(|fc| fc.alignment()), Some(64));
        assert_eq!(payload.member("a").map(|fc| fc.alignment()), Some(1));
        Ok(())
    }

    #[test]
    fn test_declared_struct_alignment_is_kept() -> Result<()> {
        let payload = run(FieldClass::structure([("a", FieldClass::int(8, false))]).with_alignment(64))?;
        assert_eq!(payload.alignment(), 64);
        Ok(())
    }

    #[test]
    fn test_array_and_sequence_take_element_alignment() -> Result<()> {
        let payload = run(FieldClass::structure([
            ("len", FieldClass::int(8, false)),
            ("empty", FieldClass::array(0, FieldClass::int(32, false).with_alignment(32))),
            (
                "seq",
                FieldClass::sequence(
                    "len",
                    FieldClass::structure([("x", FieldClass::int(16, false).with_alignment(16))]),
                ),
            ),
        ]))?;

        assert_eq!(payload.member("empty").map(|fc| fc.alignment()), Some(32));
        assert_eq!(payload.member("seq").map(|fc| fc.alignment()), Some(16));
        assert_eq!(payload.alignment(), 32);
        Ok(())
    }

    #[test]
    fn test_variant_alignment_is_not_propagated() -> Result<()> {
        let payload = run(FieldClass::structure([(
            "v",
            FieldClass::variant(
                "tag",
                [(
                    "wide",
                    FieldClass::structure([("x", FieldClass::int(64, false).with_alignment(64))]),
                )],
            ),
        )]))?;

        let v = payload.member("v").expect("v");
        assert_eq!(v.alignment(), 1);
        let option = &v.as_variant().expect("variant").options()[0];
        assert_eq!(option.field_class().alignment(), 64);
        assert_eq!(payload.alignment(), 1);
        Ok(())
    }
}
