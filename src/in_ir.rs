use log::{debug, trace};
use rustc_hash::FxHashSet;

use crate::{
    field_class::{FieldClass, FieldClassKind, Meaning},
    field_path::{FieldPath, PathIndex, Scope},
    trace_class::TraceClass,
};

/// Where a field class lives: its path plus the stream and event classes
/// owning the path's root scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Location {
    sc: Option<usize>,
    ec: Option<usize>,
    path: FieldPath,
}

impl Location {
    fn new(path: FieldPath, sc: Option<usize>, ec: Option<usize>) -> Self {
        let scope = path.root();
        let (sc, ec) = if scope.is_trace_scope() {
            (None, None)
        } else if scope.is_stream_scope() {
            (sc, None)
        } else {
            (sc, ec)
        };
        Self { sc, ec, path }
    }
}

/// Decides which field classes make it to the IR.
///
/// Scopes are visited in reverse decoding order, and compound members in
/// reverse order, so that a sequence or variant is always visited before
/// the length or tag field class it depends on.
pub(crate) fn update_in_ir(tc: &mut TraceClass) {
    debug!("Updating IR eligibility");

    let mut dependents = FxHashSet::default();
    for root in tc.pending_roots_mut().into_iter().rev() {
        let mut walker = InIrWalker {
            scope: root.scope,
            sc: root.sc,
            ec: root.ec,
            path: Vec::new(),
            dependents: &mut dependents,
        };
        walker.update(root.fc);
    }
}

struct InIrWalker<'d> {
    scope: Scope,
    sc: Option<usize>,
    ec: Option<usize>,
    path: Vec<PathIndex>,
    dependents: &'d mut FxHashSet<Location>,
}

impl InIrWalker<'_> {
    fn location(&self) -> Location {
        Location::new(FieldPath::new(self.scope, self.path.clone()), self.sc, self.ec)
    }

    fn add_dependent(&mut self, target: Option<&FieldPath>) {
        if let Some(target) = target {
            trace!("{} is needed by {}", target, FieldPath::new(self.scope, self.path.clone()));
            self.dependents
                .insert(Location::new(target.clone(), self.sc, self.ec));
        }
    }

    fn update_child(&mut self, fc: &mut FieldClass, index: PathIndex) -> bool {
        self.path.push(index);
        self.update(fc);
        self.path.pop();
        fc.in_ir
    }

    fn update(&mut self, fc: &mut FieldClass) {
        if let Some(int) = fc.as_int() {
            let is_plain = int.mapped_clock_class.is_none() && fc.meaning == Meaning::None;
            let in_ir = is_plain || self.dependents.contains(&self.location());
            fc.in_ir = in_ir;
            return;
        }

        let meaning = fc.meaning;
        fc.in_ir = match &mut fc.kind {
            FieldClassKind::Struct(s) => {
                let mut in_ir = false;
                for (i, member) in s.members.iter_mut().enumerate().rev() {
                    in_ir |= self.update_child(&mut member.fc, PathIndex::Member(i));
                }
                in_ir
            }
            FieldClassKind::Variant(v) => {
                let mut in_ir = false;
                for (i, option) in v.options.iter_mut().enumerate().rev() {
                    in_ir |= self.update_child(&mut option.fc, PathIndex::Member(i));
                }

                // The tag may select any option at decoding time
                if in_ir {
                    for option in &mut v.options {
                        option.fc.in_ir = true;
                    }
                    self.add_dependent(v.tag_path.as_ref());
                }
                in_ir
            }
            FieldClassKind::Array(a) => {
                let in_ir = self.update_child(&mut a.elem, PathIndex::Element);
                if meaning == Meaning::Uuid {
                    a.elem.in_ir = false;
                    false
                } else {
                    in_ir
                }
            }
            FieldClassKind::Sequence(s) => {
                let in_ir = self.update_child(&mut s.elem, PathIndex::Element);
                if in_ir {
                    self.add_dependent(s.length_path.as_ref());
                }
                in_ir
            }
            _ => true,
        };
    }
}
