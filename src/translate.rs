use std::sync::Arc;

use log::{debug, trace};

use crate::{
    clock_class::ClockClass,
    config::DecoderConfig,
    field_class::{FieldClass, FieldClassKind, VariantFieldClass},
    field_path::{FieldPath, PathIndex, Scope},
    ir,
    trace_class::{EventClass, Phase, StreamClass, TraceClass},
    CtfError, Result,
};

/// Creates the IR counterparts of everything not translated yet and marks
/// it translated.
///
/// IR objects are all built before any of them is added to `ir_tc`, so a
/// failure leaves both trace classes as they were.
pub(crate) fn translate_trace_class(
    tc: &mut TraceClass,
    ir_tc: &mut ir::TraceClass,
    config: &DecoderConfig,
) -> Result<()> {
    let new_clock_classes: Vec<_> = tc
        .clock_classes
        .iter()
        .filter(|cc| ir_tc.clock_class_for(cc).is_none())
        .map(|cc| (Arc::clone(cc), Arc::new(clock_class_to_ir(cc, config))))
        .collect();

    let mut new_stream_classes = Vec::new();
    let mut new_event_classes = Vec::new();
    for (sc_idx, sc) in tc.stream_classes.iter().enumerate() {
        if !sc.is_translated() {
            let default_clock_class = match &sc.default_clock_class {
                Some(cc) => Some(find_ir_clock_class(ir_tc, &new_clock_classes, cc)?),
                None => None,
            };
            new_stream_classes.push(stream_class_to_ir(tc, sc_idx, sc, default_clock_class)?);
        } else if ir_tc.stream_class_by_id(sc.id).is_none() {
            return Err(CtfError::IrMismatch(format!(
                "stream class {} is translated but has no IR counterpart",
                sc.id
            )));
        }

        for (ec_idx, ec) in sc.event_classes.iter().enumerate() {
            if !ec.is_translated() {
                new_event_classes.push((sc.id, event_class_to_ir(tc, sc_idx, ec_idx, ec)?));
            }
        }
    }

    debug!(
        "Translating {} clock classes, {} stream classes, {} event classes to IR",
        new_clock_classes.len(),
        new_stream_classes.len(),
        new_event_classes.len()
    );

    if !tc.is_translated() {
        ir_tc.uuid = tc.uuid;
        ir_tc.environment = tc.environment.clone();
    }
    for (origin, cc) in new_clock_classes {
        ir_tc.add_clock_class(origin, cc);
    }
    ir_tc.stream_classes.extend(new_stream_classes);
    for (sc_id, ir_ec) in new_event_classes {
        if let Some(ir_sc) = ir_tc.stream_class_by_id_mut(sc_id) {
            ir_sc.event_classes.push(ir_ec);
        }
    }

    tc.advance(Phase::Translated);
    for sc in &mut tc.stream_classes {
        sc.advance(Phase::Translated);
        for ec in &mut sc.event_classes {
            ec.advance(Phase::Translated);
        }
    }

    Ok(())
}

fn clock_class_to_ir(cc: &ClockClass, config: &DecoderConfig) -> ir::ClockClass {
    let (offset_seconds, offset_cycles) =
        cc.shifted_offset(config.clock_class_offset_s, config.clock_class_offset_ns);

    ir::ClockClass {
        name: cc.name().to_string(),
        description: cc.description().map(str::to_string),
        frequency: cc.frequency(),
        precision: cc.precision(),
        offset_seconds,
        offset_cycles,
        uuid: cc.uuid().copied(),
        origin_is_unix_epoch: config.force_clock_class_origin_unix_epoch || cc.is_absolute(),
    }
}

fn find_ir_clock_class(
    ir_tc: &ir::TraceClass,
    new_clock_classes: &[(Arc<ClockClass>, Arc<ir::ClockClass>)],
    cc: &Arc<ClockClass>,
) -> Result<Arc<ir::ClockClass>> {
    if let Some(ir_cc) = ir_tc.clock_class_for(cc) {
        return Ok(Arc::clone(ir_cc));
    }

    new_clock_classes
        .iter()
        .find(|(origin, _)| Arc::ptr_eq(origin, cc))
        .map(|(_, ir_cc)| Arc::clone(ir_cc))
        .ok_or_else(|| {
            CtfError::ClockClass(format!(
                "clock class \"{}\" does not belong to the trace class",
                cc.name()
            ))
        })
}

fn stream_class_to_ir(
    tc: &TraceClass,
    sc_idx: usize,
    sc: &StreamClass,
    default_clock_class: Option<Arc<ir::ClockClass>>,
) -> Result<ir::StreamClass> {
    let translator = ScopeTranslator {
        tc,
        sc: Some(sc_idx),
        ec: None,
    };

    Ok(ir::StreamClass {
        id: sc.id,
        default_clock_class,
        packet_context: translator.scope_to_ir(sc.packet_context())?,
        event_common_context: translator.scope_to_ir(sc.event_common_context())?,
        supports_packets: true,
        packets_have_beginning_default_clock_snapshot: sc.packets_have_ts_begin,
        packets_have_end_default_clock_snapshot: sc.packets_have_ts_end,
        supports_discarded_events: sc.has_discarded_events,
        discarded_events_have_default_clock_snapshots: sc.discarded_events_have_default_cs,
        supports_discarded_packets: sc.has_discarded_packets,
        discarded_packets_have_default_clock_snapshots: sc.discarded_packets_have_default_cs,
        event_classes: Vec::new(),
    })
}

fn event_class_to_ir(
    tc: &TraceClass,
    sc_idx: usize,
    ec_idx: usize,
    ec: &EventClass,
) -> Result<ir::EventClass> {
    let translator = ScopeTranslator {
        tc,
        sc: Some(sc_idx),
        ec: Some(ec_idx),
    };

    Ok(ir::EventClass {
        id: ec.id,
        name: ec.name.clone(),
        log_level: ec.log_level,
        emf_uri: ec.emf_uri.clone(),
        specific_context: translator.scope_to_ir(ec.specific_context())?,
        payload: translator.scope_to_ir(ec.payload())?,
    })
}

struct ScopeTranslator<'a> {
    tc: &'a TraceClass,
    sc: Option<usize>,
    ec: Option<usize>,
}

impl ScopeTranslator<'_> {
    /// A scope makes it to the IR if one of its immediate members does, or
    /// if it has no member at all.
    fn scope_to_ir(&self, fc: Option<&FieldClass>) -> Result<Option<ir::FieldClass>> {
        let Some(fc) = fc else {
            return Ok(None);
        };

        let keep = match fc.as_struct() {
            Some(s) => s.members.is_empty() || s.members.iter().any(|m| m.fc.in_ir),
            None => fc.in_ir,
        };
        if !keep {
            return Ok(None);
        }

        self.fc_to_ir(fc).map(Some)
    }

    fn fc_to_ir(&self, fc: &FieldClass) -> Result<ir::FieldClass> {
        let ir_fc = match &fc.kind {
            FieldClassKind::Int(int) => {
                let ir_int = ir::IntegerFieldClass {
                    field_value_range: int.size,
                    preferred_display_base: int.base,
                };
                if int.is_signed {
                    ir::FieldClass::SignedInteger(ir_int)
                } else {
                    ir::FieldClass::UnsignedInteger(ir_int)
                }
            }
            FieldClassKind::Enum(e) => {
                let ir_enum = ir::EnumerationFieldClass {
                    int: ir::IntegerFieldClass {
                        field_value_range: e.int.size,
                        preferred_display_base: e.int.base,
                    },
                    mappings: e.mappings.clone(),
                };
                if e.int.is_signed {
                    ir::FieldClass::SignedEnumeration(ir_enum)
                } else {
                    ir::FieldClass::UnsignedEnumeration(ir_enum)
                }
            }
            FieldClassKind::Float(f) => ir::FieldClass::Real {
                single_precision: f.size == 32,
            },
            FieldClassKind::String(_) => ir::FieldClass::String,
            FieldClassKind::Struct(s) => {
                let mut members = Vec::new();
                for member in s.members.iter().filter(|m| m.fc.in_ir) {
                    members.push(ir::StructureMember {
                        name: member.name.clone(),
                        fc: self.fc_to_ir(&member.fc)?,
                    });
                }
                ir::FieldClass::Structure { members }
            }
            FieldClassKind::Array(a) if a.is_text => ir::FieldClass::String,
            FieldClassKind::Array(a) => ir::FieldClass::StaticArray {
                elem: Box::new(self.fc_to_ir(&a.elem)?),
                length: a.length,
            },
            FieldClassKind::Sequence(s) if s.is_text => ir::FieldClass::String,
            FieldClassKind::Sequence(s) => ir::FieldClass::DynamicArray {
                elem: Box::new(self.fc_to_ir(&s.elem)?),
                length_field_path: match &s.length_path {
                    Some(path) => self.path_to_ir(path)?,
                    None => None,
                },
            },
            FieldClassKind::Variant(v) => self.variant_to_ir(v)?,
        };

        Ok(ir_fc)
    }

    fn variant_to_ir(&self, v: &VariantFieldClass) -> Result<ir::FieldClass> {
        let selector_field_path = match &v.tag_path {
            Some(path) => self.path_to_ir(path)?,
            None => None,
        };

        let mut options = Vec::new();
        for (i, option) in v.options.iter().enumerate().filter(|(_, o)| o.fc.in_ir) {
            let ranges = if selector_field_path.is_some() {
                v.ranges
                    .iter()
                    .filter(|r| r.option_index == i)
                    .map(|r| r.range)
                    .collect()
            } else {
                Vec::new()
            };
            options.push(ir::VariantOption {
                name: option.name.clone(),
                fc: self.fc_to_ir(&option.fc)?,
                ranges,
            });
        }

        Ok(ir::FieldClass::Variant {
            selector_field_path,
            selector_is_signed: v.tag_is_signed,
            options,
        })
    }

    /// IR location of the field class at `path`: member indexes only count
    /// the members which made it to the IR. Header scopes and field classes
    /// left out of the IR have no IR location.
    fn path_to_ir(&self, path: &FieldPath) -> Result<Option<ir::FieldPath>> {
        let scope = match path.root() {
            Scope::PacketHeader | Scope::EventHeader => return Ok(None),
            Scope::PacketContext => ir::FieldPathScope::PacketContext,
            Scope::EventCommonContext => ir::FieldPathScope::EventCommonContext,
            Scope::EventSpecificContext => ir::FieldPathScope::EventSpecificContext,
            Scope::EventPayload => ir::FieldPathScope::EventPayload,
        };

        let lookup_error = || CtfError::PathLookup(format!("no field class at {}", path));
        let mut fc = self
            .tc
            .scope_field_class(path.root(), self.sc, self.ec)
            .ok_or_else(lookup_error)?;

        let mut items = Vec::with_capacity(path.len());
        for index in path.indexes() {
            let child = fc.descendant(&[*index]).ok_or_else(lookup_error)?;
            if !child.in_ir {
                trace!("{} is not in the IR", path);
                return Ok(None);
            }
            let item = match index {
                PathIndex::Element => ir::FieldPathItem::CurrentArrayElement,
                PathIndex::Member(i) => {
                    let in_ir_before = (0..*i)
                        .filter(|j| fc.child(PathIndex::Member(*j)).in_ir)
                        .count();
                    ir::FieldPathItem::Index(in_ir_before)
                }
            };
            items.push(item);
            fc = child;
        }

        trace!("IR location of {}: {:?} {:?}", path, scope, items);
        Ok(Some(ir::FieldPath { scope, items }))
    }
}
