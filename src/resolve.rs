use log::{debug, error, trace};

use crate::{
    field_class::{FieldClass, FieldClassKind, VariantRange},
    field_path::{FieldPath, PathIndex, Scope},
    trace_class::TraceClass,
    CtfError, Result,
};

/// An open compound field class and the child currently being visited.
struct Frame<'a> {
    fc: &'a FieldClass,
    index: PathIndex,
}

enum Binding {
    Length(FieldPath),
    Tag {
        path: FieldPath,
        is_signed: bool,
        ranges: Vec<VariantRange>,
    },
}

/// A binding computed for the sequence or variant at `position`.
struct Resolution {
    sc: Option<usize>,
    ec: Option<usize>,
    position: FieldPath,
    binding: Binding,
}

struct ResolveContext<'a> {
    tc: &'a TraceClass,
    sc: Option<usize>,
    ec: Option<usize>,
    root_scope: Scope,
    stack: Vec<Frame<'a>>,
    resolutions: Vec<Resolution>,
}

/// Binds every sequence length and variant tag reference of the parts of
/// `tc` which are not translated yet.
///
/// All bindings are computed before any field class is written, so a
/// failure leaves `tc` untouched.
pub(crate) fn resolve_field_classes(tc: &mut TraceClass) -> Result<()> {
    debug!("Resolving field classes");

    let resolutions = {
        let mut ctx = ResolveContext {
            tc: &*tc,
            sc: None,
            ec: None,
            root_scope: Scope::PacketHeader,
            stack: Vec::new(),
            resolutions: Vec::new(),
        };
        ctx.resolve_trace_class()?;
        ctx.resolutions
    };

    let count = resolutions.len();
    for res in resolutions {
        let fc = tc
            .field_class_at_mut(&res.position, res.sc, res.ec)
            .ok_or_else(|| CtfError::PathLookup(format!("no field class at {}", res.position)))?;
        match (&mut fc.kind, res.binding) {
            (FieldClassKind::Sequence(seq), Binding::Length(path)) => seq.length_path = Some(path),
            (
                FieldClassKind::Variant(var),
                Binding::Tag {
                    path,
                    is_signed,
                    ranges,
                },
            ) => var.bind_tag(path, is_signed, ranges),
            _ => {
                return Err(CtfError::PathLookup(format!(
                    "{} is neither a sequence nor a variant",
                    res.position
                )))
            }
        }
    }

    debug!("Resolved {} field class references", count);
    Ok(())
}

impl<'a> ResolveContext<'a> {
    fn resolve_trace_class(&mut self) -> Result<()> {
        let tc = self.tc;
        if !tc.is_translated() {
            self.resolve_root(Scope::PacketHeader, tc.packet_header())?;
        }

        for (sc_idx, sc) in tc.stream_classes().iter().enumerate() {
            self.sc = Some(sc_idx);
            self.ec = None;
            if !sc.is_translated() {
                self.resolve_root(Scope::PacketContext, sc.packet_context())?;
                self.resolve_root(Scope::EventHeader, sc.event_header())?;
                self.resolve_root(Scope::EventCommonContext, sc.event_common_context())?;
            }

            for (ec_idx, ec) in sc.event_classes().iter().enumerate() {
                if ec.is_translated() {
                    continue;
                }
                self.ec = Some(ec_idx);
                self.resolve_root(Scope::EventSpecificContext, ec.specific_context())?;
                self.resolve_root(Scope::EventPayload, ec.payload())?;
            }
        }

        Ok(())
    }

    fn resolve_root(&mut self, scope: Scope, fc: Option<&'a FieldClass>) -> Result<()> {
        let Some(fc) = fc else {
            return Ok(());
        };

        trace!("Resolving scope {}", scope);
        self.root_scope = scope;
        self.stack.clear();
        self.resolve_fc(fc)
    }

    fn resolve_fc(&mut self, fc: &'a FieldClass) -> Result<()> {
        match &fc.kind {
            FieldClassKind::Sequence(seq) => {
                let (path, target) = self.resolve_ref(&seq.length_ref)?;
                if !target.is_unsigned_int() {
                    let msg = format!(
                        "sequence length \"{}\" resolves to a {} at {}, expecting an unsigned integer",
                        seq.length_ref,
                        target.kind_name(),
                        path
                    );
                    error!("{}", msg);
                    return Err(CtfError::TargetType(msg));
                }
                self.record(Binding::Length(path));
                self.resolve_child(fc, PathIndex::Element)?;
            }
            FieldClassKind::Variant(var) => {
                let (path, target) = self.resolve_ref(&var.tag_ref)?;
                let FieldClassKind::Enum(tag) = &target.kind else {
                    let msg = format!(
                        "variant tag \"{}\" resolves to a {} at {}, expecting an enumeration",
                        var.tag_ref,
                        target.kind_name(),
                        path
                    );
                    error!("{}", msg);
                    return Err(CtfError::TargetType(msg));
                };
                self.record(Binding::Tag {
                    path,
                    is_signed: tag.int.is_signed,
                    ranges: var.tag_ranges(tag),
                });
                for i in 0..var.options.len() {
                    self.resolve_child(fc, PathIndex::Member(i))?;
                }
            }
            FieldClassKind::Struct(s) => {
                for i in 0..s.members.len() {
                    self.resolve_child(fc, PathIndex::Member(i))?;
                }
            }
            FieldClassKind::Array(_) => self.resolve_child(fc, PathIndex::Element)?,
            _ => {}
        }

        Ok(())
    }

    fn resolve_child(&mut self, fc: &'a FieldClass, index: PathIndex) -> Result<()> {
        self.stack.push(Frame { fc, index });
        let res = self.resolve_fc(fc.child(index));
        self.stack.pop();
        res
    }

    fn record(&mut self, binding: Binding) {
        self.resolutions.push(Resolution {
            sc: self.sc,
            ec: self.ec,
            position: self.current_path(),
            binding,
        });
    }

    /// Path of the field class being resolved.
    fn current_path(&self) -> FieldPath {
        FieldPath::new(
            self.root_scope,
            self.stack.iter().map(|frame| frame.index).collect(),
        )
    }

    fn resolve_ref(&self, path_str: &str) -> Result<(FieldPath, &'a FieldClass)> {
        let tokens = tokenize(path_str)?;

        let resolved = match Scope::from_absolute_tokens(&tokens) {
            Some(scope) => {
                let rest = &tokens[scope.absolute_prefix().len()..];
                self.resolve_absolute(path_str, scope, rest)?
            }
            None => self.resolve_relative(path_str, &tokens)?,
        };

        self.validate_target(path_str, &resolved.0)?;
        trace!("Resolved \"{}\" to {}", path_str, resolved.0);
        Ok(resolved)
    }

    fn resolve_absolute(
        &self,
        path_str: &str,
        scope: Scope,
        tokens: &[&str],
    ) -> Result<(FieldPath, &'a FieldClass)> {
        if scope > self.root_scope {
            let msg = format!(
                "\"{}\" refers to {}, which is decoded after {}",
                path_str, scope, self.root_scope
            );
            error!("{}", msg);
            return Err(CtfError::PathOrdering(msg));
        }

        let tc = self.tc;
        let frozen = match scope {
            Scope::PacketHeader => tc.is_translated(),
            Scope::PacketContext | Scope::EventHeader | Scope::EventCommonContext => self
                .sc
                .and_then(|i| tc.stream_classes().get(i))
                .is_some_and(|sc| sc.is_translated()),
            Scope::EventSpecificContext | Scope::EventPayload => false,
        };
        let root = tc.scope_field_class(scope, self.sc, self.ec).ok_or_else(|| {
            let msg = format!("root field class of {} is not available", scope);
            error!("Cannot resolve \"{}\": {}", path_str, msg);
            CtfError::PathLookup(msg)
        })?;

        let (indexes, target) = descend(root, tokens, None).ok_or_else(|| {
            let msg = format!("\"{}\" not found in {}", path_str, scope);
            error!("{}", msg);
            CtfError::PathLookup(msg)
        })?;

        if frozen && !is_settled_target(scope, target) {
            let msg = format!(
                "\"{}\" refers to {}, which is already translated",
                path_str, scope
            );
            error!("{}", msg);
            return Err(CtfError::Frozen(msg));
        }

        Ok((FieldPath::new(scope, indexes), target))
    }

    /// Tries every open compound field class, innermost first.
    fn resolve_relative(&self, path_str: &str, tokens: &[&str]) -> Result<(FieldPath, &'a FieldClass)> {
        for level in (0..self.stack.len()).rev() {
            let frame = &self.stack[level];
            trace!(
                "Trying \"{}\" from level {} (child index {})",
                path_str,
                level,
                frame.index
            );

            if let Some((tail, target)) = descend(frame.fc, tokens, Some(frame.index)) {
                let indexes = self.stack[..level]
                    .iter()
                    .map(|frame| frame.index)
                    .chain(tail)
                    .collect();
                return Ok((FieldPath::new(self.root_scope, indexes), target));
            }
        }

        let msg = format!(
            "relative path \"{}\" not found from {}",
            path_str,
            self.current_path()
        );
        error!("{}", msg);
        Err(CtfError::PathLookup(msg))
    }

    /// A target must be decoded strictly before the field referring to it.
    fn validate_target(&self, path_str: &str, target: &FieldPath) -> Result<()> {
        let position = self.current_path();
        let reject = |reason: &str| {
            let msg = format!(
                "\"{}\" resolves to {} from {}: {}",
                path_str, target, position, reason
            );
            error!("{}", msg);
            Err(CtfError::PathOrdering(msg))
        };

        if target.is_empty() {
            return reject("target is a scope root");
        }

        if target.root() > position.root() {
            return reject("target scope is decoded after the current scope");
        }

        if target.root() == position.root() {
            let Some(lca) = target.lca_index(&position) else {
                return reject("target is an ancestor or a descendant of the current field");
            };

            match (target.indexes()[lca], position.indexes()[lca]) {
                (PathIndex::Member(t), PathIndex::Member(p)) if t < p => {}
                _ => return reject("target is not decoded before the current field"),
            }
        }

        Ok(())
    }
}

fn tokenize(path_str: &str) -> Result<Vec<&str>> {
    let tokens: Vec<&str> = path_str.split('.').collect();
    if tokens.iter().any(|token| token.is_empty()) {
        let msg = format!("empty token in \"{}\"", path_str);
        error!("{}", msg);
        return Err(CtfError::PathSyntax(msg));
    }
    Ok(tokens)
}

/// Whether a field class of a translated scope can take one more
/// referrer: its value is already stored and, outside the header scopes,
/// it already has an IR location.
fn is_settled_target(scope: Scope, target: &FieldClass) -> bool {
    target.as_int().is_some_and(|int| int.storing_index().is_some())
        && (scope.is_header() || target.in_ir())
}

/// Follows `tokens` down from `fc`.
///
/// Arrays and sequences are crossed without consuming a token. When
/// `bound` is set, the first named child must not come after it.
fn descend<'a>(
    fc: &'a FieldClass,
    tokens: &[&str],
    bound: Option<PathIndex>,
) -> Option<(Vec<PathIndex>, &'a FieldClass)> {
    let mut fc = fc;
    let mut indexes = Vec::new();
    let mut rest = tokens;
    let mut first_level_done = false;

    while let Some((name, tail)) = rest.split_first() {
        if matches!(fc.kind, FieldClassKind::Array(_) | FieldClassKind::Sequence(_)) {
            indexes.push(PathIndex::Element);
            fc = fc.child(PathIndex::Element);
            continue;
        }

        let index = fc.child_index_by_orig_name(name)?;
        if !first_level_done {
            match bound {
                Some(PathIndex::Member(b)) if index > b => return None,
                Some(PathIndex::Element) => return None,
                _ => {}
            }
            first_level_done = true;
        }

        indexes.push(PathIndex::Member(index));
        fc = fc.child(PathIndex::Member(index));
        rest = tail;
    }

    Some((indexes, fc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_class::{EnumMapping, EnumRange, IntFieldClass};
    use crate::trace_class::{EventClass, StreamClass};
    use PathIndex::{Element, Member};

    fn trace_class_with_payload(payload: FieldClass) -> Result<TraceClass> {
        trace_class_with(None, payload)
    }

    fn trace_class_with(packet_context: Option<FieldClass>, payload: FieldClass) -> Result<TraceClass> {
        let mut sc = StreamClass::new(0);
        if let Some(pc) = packet_context {
            sc = sc.with_packet_context(pc);
        }
        let sc = sc.with_event_class(EventClass::new(0, "event").with_payload(payload))?;
        TraceClass::new().with_stream_class(sc)
    }

    fn payload(tc: &TraceClass) -> &FieldClass {
        tc.stream_classes()[0].event_classes()[0]
            .payload()
            .expect("payload")
    }

    fn tag_enum() -> FieldClass {
        FieldClass::enumeration(
            IntFieldClass::new(8, false),
            vec![
                EnumMapping::new("a", vec![EnumRange::unsigned(0, 0)]),
                EnumMapping::new("b", vec![EnumRange::unsigned(1, 1)]),
            ],
        )
    }

    #[test]
    fn test_relative_earlier_sibling() -> Result<()> {
        let mut tc = trace_class_with_payload(FieldClass::structure([
            ("_len", FieldClass::int(8, false)),
            ("msg", FieldClass::sequence("_len", FieldClass::int(8, false))),
        ]))?;
        resolve_field_classes(&mut tc)?;

        let seq = payload(&tc).child(Member(1)).as_sequence().expect("sequence");
        assert_eq!(
            seq.length_path(),
            Some(&FieldPath::new(Scope::EventPayload, vec![Member(0)]))
        );
        Ok(())
    }

    #[test]
    fn test_absolute_path() -> Result<()> {
        let mut tc = trace_class_with(
            Some(FieldClass::structure([
                ("packet_size", FieldClass::int(64, false)),
                ("count", FieldClass::int(16, false)),
            ])),
            FieldClass::structure([(
                "values",
                FieldClass::sequence("stream.packet.context.count", FieldClass::float(64)),
            )]),
        )?;
        resolve_field_classes(&mut tc)?;

        let seq = payload(&tc).child(Member(0)).as_sequence().expect("sequence");
        let path = seq.length_path().expect("length path");
        assert_eq!(*path, FieldPath::new(Scope::PacketContext, vec![Member(1)]));
        assert!(tc.field_class_at(path, Some(0), Some(0)).is_some());
        Ok(())
    }

    #[test]
    fn test_variant_tag() -> Result<()> {
        let mut tc = trace_class_with_payload(FieldClass::structure([
            ("tag", tag_enum()),
            (
                "v",
                FieldClass::variant("tag", [("a", FieldClass::string()), ("b", FieldClass::int(32, true))]),
            ),
        ]))?;
        resolve_field_classes(&mut tc)?;

        let var = payload(&tc).child(Member(1)).as_variant().expect("variant");
        assert_eq!(
            var.tag_path(),
            Some(&FieldPath::new(Scope::EventPayload, vec![Member(0)]))
        );
        assert_eq!(var.option_index_for_tag(1), Some(1));
        assert_eq!(var.option_index_for_tag(7), None);
        Ok(())
    }

    #[test]
    fn test_outer_ancestor_fallthrough() -> Result<()> {
        let inner = FieldClass::structure([
            ("x", FieldClass::int(8, false)),
            ("seq", FieldClass::sequence("n", FieldClass::int(8, false))),
        ]);
        let mut tc = trace_class_with_payload(FieldClass::structure([
            ("n", FieldClass::int(8, false)),
            ("items", FieldClass::array(4, inner)),
        ]))?;
        resolve_field_classes(&mut tc)?;

        let seq = payload(&tc)
            .descendant(&[Member(1), Element, Member(1)])
            .and_then(|fc| fc.as_sequence())
            .expect("sequence");
        assert_eq!(
            seq.length_path(),
            Some(&FieldPath::new(Scope::EventPayload, vec![Member(0)]))
        );
        Ok(())
    }

    #[test]
    fn test_path_into_nested_struct() -> Result<()> {
        let mut tc = trace_class_with_payload(FieldClass::structure([
            (
                "hdr",
                FieldClass::structure([("len", FieldClass::int(8, false))]),
            ),
            ("data", FieldClass::sequence("hdr.len", FieldClass::int(8, false))),
        ]))?;
        resolve_field_classes(&mut tc)?;

        let seq = payload(&tc).child(Member(1)).as_sequence().expect("sequence");
        assert_eq!(
            seq.length_path(),
            Some(&FieldPath::new(Scope::EventPayload, vec![Member(0), Member(0)]))
        );
        Ok(())
    }

    #[test]
    fn test_tag_in_later_sibling_is_rejected() -> Result<()> {
        let mut tc = trace_class_with_payload(FieldClass::structure([
            (
                "v",
                FieldClass::variant("event.fields.later.tag", [("a", FieldClass::string())]),
            ),
            ("later", FieldClass::structure([("tag", tag_enum())])),
        ]))?;
        assert!(matches!(
            resolve_field_classes(&mut tc),
            Err(CtfError::PathOrdering(_))
        ));

        // Nothing was bound
        assert!(payload(&tc).child(Member(0)).as_variant().expect("variant").tag_path().is_none());
        Ok(())
    }

    #[test]
    fn test_relative_later_sibling_not_found() -> Result<()> {
        let mut tc = trace_class_with_payload(FieldClass::structure([
            ("msg", FieldClass::sequence("len", FieldClass::int(8, false))),
            ("len", FieldClass::int(8, false)),
        ]))?;
        assert!(matches!(
            resolve_field_classes(&mut tc),
            Err(CtfError::PathLookup(_))
        ));
        Ok(())
    }

    #[test]
    fn test_later_scope_is_rejected() -> Result<()> {
        let mut tc = trace_class_with(
            Some(FieldClass::structure([(
                "seq",
                FieldClass::sequence("event.fields.len", FieldClass::int(8, false)),
            )])),
            FieldClass::structure([("len", FieldClass::int(8, false))]),
        )?;
        assert!(matches!(
            resolve_field_classes(&mut tc),
            Err(CtfError::PathOrdering(_))
        ));
        Ok(())
    }

    #[test]
    fn test_empty_token() -> Result<()> {
        for path in ["a..b", ".len", "len.", ""] {
            let mut tc = trace_class_with_payload(FieldClass::structure([
                ("len", FieldClass::int(8, false)),
                ("seq", FieldClass::sequence(path, FieldClass::int(8, false))),
            ]))?;
            assert!(matches!(
                resolve_field_classes(&mut tc),
                Err(CtfError::PathSyntax(_))
            ));
        }
        Ok(())
    }

    #[test]
    fn test_tag_must_be_enum() -> Result<()> {
        let mut tc = trace_class_with_payload(FieldClass::structure([
            ("tag", FieldClass::int(8, false)),
            ("v", FieldClass::variant("tag", [("a", FieldClass::string())])),
        ]))?;
        assert!(matches!(
            resolve_field_classes(&mut tc),
            Err(CtfError::TargetType(_))
        ));
        Ok(())
    }

    #[test]
    fn test_length_must_be_unsigned() -> Result<()> {
        let mut tc = trace_class_with_payload(FieldClass::structure([
            ("len", FieldClass::int(8, true)),
            ("seq", FieldClass::sequence("len", FieldClass::int(8, false))),
        ]))?;
        assert!(matches!(
            resolve_field_classes(&mut tc),
            Err(CtfError::TargetType(_))
        ));
        Ok(())
    }

    #[test]
    fn test_unknown_name() -> Result<()> {
        let mut tc = trace_class_with_payload(FieldClass::structure([
            ("len", FieldClass::int(8, false)),
            ("seq", FieldClass::sequence("length", FieldClass::int(8, false))),
        ]))?;
        assert!(matches!(
            resolve_field_classes(&mut tc),
            Err(CtfError::PathLookup(_))
        ));
        Ok(())
    }

    #[test]
    fn test_event_scope_from_packet_header() -> Result<()> {
        let mut tc = TraceClass::new().with_packet_header(FieldClass::structure([(
            "seq",
            FieldClass::sequence("event.fields.len", FieldClass::int(8, false)),
        )]));
        assert!(matches!(
            resolve_field_classes(&mut tc),
            Err(CtfError::PathOrdering(_))
        ));
        Ok(())
    }

    #[test]
    fn test_translated_stream_scope_is_frozen() -> Result<()> {
        let mut tc = trace_class_with(
            Some(FieldClass::structure([("len", FieldClass::int(8, false))])),
            FieldClass::structure(Vec::<(&str, FieldClass)>::new()),
        )?;
        let sc = tc.stream_class_by_id_mut(0).expect("stream class 0");
        sc.advance(crate::Phase::Translated);
        sc.event_classes[0].advance(crate::Phase::Translated);
        sc.add_event_class(EventClass::new(1, "late").with_payload(FieldClass::structure([(
            "seq",
            FieldClass::sequence("stream.packet.context.len", FieldClass::int(8, false)),
        )])))?;

        assert!(matches!(
            resolve_field_classes(&mut tc),
            Err(CtfError::Frozen(_))
        ));
        Ok(())
    }
}
