use log::{debug, trace};

use crate::{
    field_class::{Encoding, FieldClass, FieldClassKind},
    trace_class::TraceClass,
};

/// Marks arrays and sequences of UTF-8 bytes as text.
pub(crate) fn reclassify_text(tc: &mut TraceClass) {
    debug!("Reclassifying text arrays and sequences");

    for root in tc.pending_roots_mut() {
        update_text(root.fc);
    }
}

fn update_text(fc: &mut FieldClass) {
    match &mut fc.kind {
        FieldClassKind::Struct(s) => {
            for member in &mut s.members {
                update_text(&mut member.fc);
            }
        }
        FieldClassKind::Variant(v) => {
            for option in &mut v.options {
                update_text(&mut option.fc);
            }
        }
        FieldClassKind::Array(a) => {
            update_text(&mut a.elem);
            if make_text_element(&mut a.elem) {
                trace!("Array of {} UTF-8 bytes is text", a.length);
                a.is_text = true;
            }
        }
        FieldClassKind::Sequence(s) => {
            update_text(&mut s.elem);
            if make_text_element(&mut s.elem) {
                trace!("Sequence \"{}\" of UTF-8 bytes is text", s.length_ref);
                s.is_text = true;
            }
        }
        _ => {}
    }
}

/// A byte-aligned 8-bit UTF-8 integer element makes its container text.
/// Text bytes are decoded as unsigned.
fn make_text_element(elem: &mut FieldClass) -> bool {
    let alignment = elem.alignment;
    let FieldClassKind::Int(int) = &mut elem.kind else {
        return false;
    };

    if int.size != 8 || alignment != 8 || int.encoding != Encoding::Utf8 {
        return false;
    }

    int.is_signed = false;
    true
}
