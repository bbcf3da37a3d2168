use log::{debug, trace};

use crate::{
    field_class::{FieldClass, FieldClassKind},
    field_path::{FieldPath, PathIndex, Scope},
    trace_class::TraceClass,
    CtfError, Result,
};

/// A sequence or variant and the field class whose value it needs.
struct StoredRef {
    sc: Option<usize>,
    ec: Option<usize>,
    referrer: FieldPath,
    target: FieldPath,
}

/// Gives every length and tag field class a slot in the stored value
/// array and copies the slot to the sequences and variants reading it.
///
/// Slots are allocated in decoding order. A field class needed by several
/// referrers gets a single slot.
pub(crate) fn update_stored_value_indexes(tc: &mut TraceClass) -> Result<()> {
    let mut refs = Vec::new();
    for root in tc.pending_roots_mut() {
        let mut path = Vec::new();
        collect_refs(root.fc, root.scope, &mut path, &mut |referrer, target| {
            refs.push(StoredRef {
                sc: root.sc,
                ec: root.ec,
                referrer,
                target,
            })
        });
    }

    let mut count = tc.stored_value_count;
    for r in &refs {
        let target = tc
            .field_class_at_mut(&r.target, r.sc, r.ec)
            .and_then(|fc| fc.as_int_mut())
            .ok_or_else(|| {
                CtfError::PathLookup(format!("no integer field class at {}", r.target))
            })?;

        let index = match target.storing_index {
            Some(index) => index,
            None => {
                trace!("Storing value of {} at index {}", r.target, count);
                target.storing_index = Some(count);
                count += 1;
                count - 1
            }
        };

        let referrer = tc
            .field_class_at_mut(&r.referrer, r.sc, r.ec)
            .ok_or_else(|| CtfError::PathLookup(format!("no field class at {}", r.referrer)))?;
        match &mut referrer.kind {
            FieldClassKind::Sequence(seq) => seq.stored_length_index = Some(index),
            FieldClassKind::Variant(var) => var.stored_tag_index = Some(index),
            _ => {}
        }
    }

    debug!(
        "Stored value count: {} ({} new)",
        count,
        count - tc.stored_value_count
    );
    tc.stored_value_count = count;
    Ok(())
}

fn collect_refs(
    fc: &FieldClass,
    scope: Scope,
    path: &mut Vec<PathIndex>,
    found: &mut impl FnMut(FieldPath, FieldPath),
) {
    let target = match &fc.kind {
        FieldClassKind::Sequence(seq) => seq.length_path.as_ref(),
        FieldClassKind::Variant(var) => var.tag_path.as_ref(),
        _ => None,
    };
    if let Some(target) = target {
        found(FieldPath::new(scope, path.clone()), target.clone());
    }

    for i in 0..fc.child_count() {
        let index = match fc.kind {
            FieldClassKind::Array(_) | FieldClassKind::Sequence(_) => PathIndex::Element,
            _ => PathIndex::Member(i),
        };
        path.push(index);
        collect_refs(fc.child(index), scope, path, found);
        path.pop();
    }
}
