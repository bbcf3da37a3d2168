use std::sync::Arc;

use crate::{
    clock_class::ClockClass,
    field_path::{FieldPath, PathIndex},
};

/// Special role of a well-known header or context field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Meaning {
    #[default]
    None,
    Magic,
    StreamClassId,
    DataStreamId,
    Uuid,
    PacketBeginningTime,
    PacketEndTime,
    DiscardedEventCounterSnapshot,
    DiscardedPacketCounterSnapshot,
    ExpectedPacketTotalSize,
    ExpectedPacketContentSize,
    EventClassId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    Big,
    #[default]
    Little,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DisplayBase {
    Binary = 2,
    Octal = 8,
    #[default]
    Decimal = 10,
    Hexadecimal = 16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    None,
    Utf8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntFieldClass {
    pub(crate) size: u32,
    pub(crate) is_signed: bool,
    pub(crate) byte_order: ByteOrder,
    pub(crate) base: DisplayBase,
    pub(crate) encoding: Encoding,
    pub(crate) mapped_clock_class: Option<Arc<ClockClass>>,
    pub(crate) storing_index: Option<usize>,
}

impl IntFieldClass {
    pub fn new(size: u32, is_signed: bool) -> Self {
        Self {
            size,
            is_signed,
            byte_order: ByteOrder::default(),
            base: DisplayBase::default(),
            encoding: Encoding::default(),
            mapped_clock_class: None,
            storing_index: None,
        }
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_base(mut self, base: DisplayBase) -> Self {
        self.base = base;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_mapped_clock_class(mut self, clock_class: Arc<ClockClass>) -> Self {
        self.mapped_clock_class = Some(clock_class);
        self
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_signed(&self) -> bool {
        self.is_signed
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn base(&self) -> DisplayBase {
        self.base
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn mapped_clock_class(&self) -> Option<&Arc<ClockClass>> {
        self.mapped_clock_class.as_ref()
    }

    /// Slot of this field in the decode-time stored value array, if some
    /// sequence or variant depends on its value.
    pub fn storing_index(&self) -> Option<usize> {
        self.storing_index
    }
}

/// Inclusive range of an enumeration mapping, stored as raw 64-bit values.
///
/// The bounds are reinterpreted as `i64` when the enumeration is signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumRange {
    pub lower: u64,
    pub upper: u64,
}

impl EnumRange {
    pub fn unsigned(lower: u64, upper: u64) -> Self {
        Self { lower, upper }
    }

    pub fn signed(lower: i64, upper: i64) -> Self {
        Self {
            lower: lower as u64,
            upper: upper as u64,
        }
    }

    /// Whether `value` lies within the bounds. `is_signed` selects how both
    /// the bounds and `value` are read; an unsigned read compares the raw
    /// bits.
    pub fn contains(&self, value: u64, is_signed: bool) -> bool {
        if is_signed {
            let value = value as i64;
            (self.lower as i64) <= value && value <= (self.upper as i64)
        } else {
            self.lower <= value && value <= self.upper
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMapping {
    pub(crate) label: String,
    pub(crate) ranges: Vec<EnumRange>,
}

impl EnumMapping {
    pub fn new(label: impl Into<String>, ranges: Vec<EnumRange>) -> Self {
        Self {
            label: label.into(),
            ranges,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn ranges(&self) -> &[EnumRange] {
        &self.ranges
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumFieldClass {
    pub(crate) int: IntFieldClass,
    pub(crate) mappings: Vec<EnumMapping>,
}

impl EnumFieldClass {
    pub fn new(int: IntFieldClass, mappings: Vec<EnumMapping>) -> Self {
        Self { int, mappings }
    }

    pub fn int(&self) -> &IntFieldClass {
        &self.int
    }

    pub fn mappings(&self) -> &[EnumMapping] {
        &self.mappings
    }

    pub fn mapping_by_label(&self, label: &str) -> Option<&EnumMapping> {
        self.mappings.iter().find(|m| m.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatFieldClass {
    pub(crate) size: u32,
    pub(crate) byte_order: ByteOrder,
}

impl FloatFieldClass {
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringFieldClass {
    pub(crate) encoding: Encoding,
}

impl StringFieldClass {
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

/// A structure member or a variant option.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedFieldClass {
    pub(crate) name: String,
    pub(crate) orig_name: String,
    pub(crate) fc: FieldClass,
}

impl NamedFieldClass {
    /// `orig_name` is the identifier as written in the metadata; the
    /// exposed name drops one leading underscore.
    pub fn new(orig_name: impl Into<String>, fc: FieldClass) -> Self {
        let orig_name = orig_name.into();
        let name = orig_name
            .strip_prefix('_')
            .unwrap_or(&orig_name)
            .to_string();
        Self {
            name,
            orig_name,
            fc,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn orig_name(&self) -> &str {
        &self.orig_name
    }

    pub fn field_class(&self) -> &FieldClass {
        &self.fc
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructFieldClass {
    pub(crate) members: Vec<NamedFieldClass>,
}

impl StructFieldClass {
    pub fn members(&self) -> &[NamedFieldClass] {
        &self.members
    }

    pub fn member_by_name(&self, name: &str) -> Option<&NamedFieldClass> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_by_name_mut(&mut self, name: &str) -> Option<&mut NamedFieldClass> {
        self.members.iter_mut().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayFieldClass {
    pub(crate) elem: Box<FieldClass>,
    pub(crate) length: u64,
    pub(crate) is_text: bool,
}

impl ArrayFieldClass {
    pub fn element(&self) -> &FieldClass {
        &self.elem
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn is_text(&self) -> bool {
        self.is_text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceFieldClass {
    pub(crate) elem: Box<FieldClass>,
    pub(crate) length_ref: String,
    pub(crate) length_path: Option<FieldPath>,
    pub(crate) stored_length_index: Option<usize>,
    pub(crate) is_text: bool,
}

impl SequenceFieldClass {
    pub fn element(&self) -> &FieldClass {
        &self.elem
    }

    /// Length reference as written in the metadata.
    pub fn length_ref(&self) -> &str {
        &self.length_ref
    }

    pub fn length_path(&self) -> Option<&FieldPath> {
        self.length_path.as_ref()
    }

    pub fn stored_length_index(&self) -> Option<usize> {
        self.stored_length_index
    }

    pub fn is_text(&self) -> bool {
        self.is_text
    }
}

/// Maps a tag value range to the variant option it selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantRange {
    pub range: EnumRange,
    pub option_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantFieldClass {
    pub(crate) options: Vec<NamedFieldClass>,
    pub(crate) tag_ref: String,
    pub(crate) tag_path: Option<FieldPath>,
    pub(crate) tag_is_signed: bool,
    pub(crate) ranges: Vec<VariantRange>,
    pub(crate) stored_tag_index: Option<usize>,
}

impl VariantFieldClass {
    pub fn options(&self) -> &[NamedFieldClass] {
        &self.options
    }

    /// Tag reference as written in the metadata.
    pub fn tag_ref(&self) -> &str {
        &self.tag_ref
    }

    pub fn tag_path(&self) -> Option<&FieldPath> {
        self.tag_path.as_ref()
    }

    pub fn ranges(&self) -> &[VariantRange] {
        &self.ranges
    }

    pub fn stored_tag_index(&self) -> Option<usize> {
        self.stored_tag_index
    }

    /// Tag value to option table: the ranges of every tag mapping whose
    /// label matches an option's original name.
    pub(crate) fn tag_ranges(&self, tag: &EnumFieldClass) -> Vec<VariantRange> {
        let mut ranges = Vec::new();
        for (option_index, option) in self.options.iter().enumerate() {
            if let Some(mapping) = tag.mapping_by_label(&option.orig_name) {
                ranges.extend(mapping.ranges.iter().map(|range| VariantRange {
                    range: *range,
                    option_index,
                }));
            }
        }
        ranges
    }

    pub(crate) fn bind_tag(&mut self, path: FieldPath, is_signed: bool, ranges: Vec<VariantRange>) {
        self.tag_path = Some(path);
        self.tag_is_signed = is_signed;
        self.ranges = ranges;
    }

    /// Index of the option selected by the tag value `value`.
    pub fn option_index_for_tag(&self, value: u64) -> Option<usize> {
        self.ranges
            .iter()
            .find(|r| r.range.contains(value, self.tag_is_signed))
            .map(|r| r.option_index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldClassKind {
    Int(IntFieldClass),
    Enum(EnumFieldClass),
    Float(FloatFieldClass),
    String(StringFieldClass),
    Struct(StructFieldClass),
    Array(ArrayFieldClass),
    Sequence(SequenceFieldClass),
    Variant(VariantFieldClass),
}

/// A node of the field class tree.
///
/// A parent exclusively owns its children. Sequence lengths and variant
/// tags refer to other nodes through a [`FieldPath`] once resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldClass {
    pub(crate) kind: FieldClassKind,
    pub(crate) alignment: u32,
    pub(crate) in_ir: bool,
    pub(crate) meaning: Meaning,
}

impl FieldClass {
    fn with_kind(kind: FieldClassKind, alignment: u32) -> Self {
        Self {
            kind,
            alignment,
            in_ir: false,
            meaning: Meaning::None,
        }
    }

    pub fn int(size: u32, is_signed: bool) -> Self {
        Self::from(IntFieldClass::new(size, is_signed))
    }

    pub fn enumeration(int: IntFieldClass, mappings: Vec<EnumMapping>) -> Self {
        let alignment = default_bit_alignment(int.size);
        Self::with_kind(
            FieldClassKind::Enum(EnumFieldClass::new(int, mappings)),
            alignment,
        )
    }

    pub fn float(size: u32) -> Self {
        Self::with_kind(
            FieldClassKind::Float(FloatFieldClass {
                size,
                byte_order: ByteOrder::default(),
            }),
            default_bit_alignment(size),
        )
    }

    pub fn string() -> Self {
        Self::with_kind(
            FieldClassKind::String(StringFieldClass {
                encoding: Encoding::Utf8,
            }),
            8,
        )
    }

    pub fn structure<S: Into<String>>(members: impl IntoIterator<Item = (S, FieldClass)>) -> Self {
        Self::with_kind(
            FieldClassKind::Struct(StructFieldClass {
                members: members
                    .into_iter()
                    .map(|(name, fc)| NamedFieldClass::new(name, fc))
                    .collect(),
            }),
            1,
        )
    }

    pub fn array(length: u64, elem: FieldClass) -> Self {
        Self::with_kind(
            FieldClassKind::Array(ArrayFieldClass {
                elem: Box::new(elem),
                length,
                is_text: false,
            }),
            1,
        )
    }

    pub fn sequence(length_ref: impl Into<String>, elem: FieldClass) -> Self {
        Self::with_kind(
            FieldClassKind::Sequence(SequenceFieldClass {
                elem: Box::new(elem),
                length_ref: length_ref.into(),
                length_path: None,
                stored_length_index: None,
                is_text: false,
            }),
            1,
        )
    }

    pub fn variant<S: Into<String>>(
        tag_ref: impl Into<String>,
        options: impl IntoIterator<Item = (S, FieldClass)>,
    ) -> Self {
        Self::with_kind(
            FieldClassKind::Variant(VariantFieldClass {
                options: options
                    .into_iter()
                    .map(|(name, fc)| NamedFieldClass::new(name, fc))
                    .collect(),
                tag_ref: tag_ref.into(),
                tag_path: None,
                tag_is_signed: false,
                ranges: Vec::new(),
                stored_tag_index: None,
            }),
            1,
        )
    }

    /// Overrides the declared alignment, in bits.
    pub fn with_alignment(mut self, alignment: u32) -> Self {
        debug_assert!(alignment.is_power_of_two());
        self.alignment = alignment;
        self
    }

    pub fn kind(&self) -> &FieldClassKind {
        &self.kind
    }

    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    pub fn in_ir(&self) -> bool {
        self.in_ir
    }

    pub fn meaning(&self) -> Meaning {
        self.meaning
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            FieldClassKind::Int(_) => "integer",
            FieldClassKind::Enum(_) => "enumeration",
            FieldClassKind::Float(_) => "floating point number",
            FieldClassKind::String(_) => "string",
            FieldClassKind::Struct(_) => "structure",
            FieldClassKind::Array(_) => "array",
            FieldClassKind::Sequence(_) => "sequence",
            FieldClassKind::Variant(_) => "variant",
        }
    }

    /// Integer properties of an integer or enumeration field class.
    pub fn as_int(&self) -> Option<&IntFieldClass> {
        match &self.kind {
            FieldClassKind::Int(int) => Some(int),
            FieldClassKind::Enum(e) => Some(&e.int),
            _ => None,
        }
    }

    pub(crate) fn as_int_mut(&mut self) -> Option<&mut IntFieldClass> {
        match &mut self.kind {
            FieldClassKind::Int(int) => Some(int),
            FieldClassKind::Enum(e) => Some(&mut e.int),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructFieldClass> {
        match &self.kind {
            FieldClassKind::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn as_struct_mut(&mut self) -> Option<&mut StructFieldClass> {
        match &mut self.kind {
            FieldClassKind::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<&VariantFieldClass> {
        match &self.kind {
            FieldClassKind::Variant(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceFieldClass> {
        match &self.kind {
            FieldClassKind::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayFieldClass> {
        match &self.kind {
            FieldClassKind::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_unsigned_int(&self) -> bool {
        self.as_int().is_some_and(|int| !int.is_signed)
    }

    /// Field class of the direct structure member named `name`.
    pub fn member(&self, name: &str) -> Option<&FieldClass> {
        self.as_struct()?.member_by_name(name).map(|m| &m.fc)
    }

    pub(crate) fn member_mut(&mut self, name: &str) -> Option<&mut FieldClass> {
        self.as_struct_mut()?
            .member_by_name_mut(name)
            .map(|m| &mut m.fc)
    }

    pub fn is_compound(&self) -> bool {
        matches!(
            self.kind,
            FieldClassKind::Struct(_)
                | FieldClassKind::Variant(_)
                | FieldClassKind::Array(_)
                | FieldClassKind::Sequence(_)
        )
    }

    /// Number of immediate children. Arrays and sequences have exactly one,
    /// their element, which is addressed with [`PathIndex::Element`].
    pub fn child_count(&self) -> usize {
        match &self.kind {
            FieldClassKind::Struct(s) => s.members.len(),
            FieldClassKind::Variant(v) => v.options.len(),
            FieldClassKind::Array(_) | FieldClassKind::Sequence(_) => 1,
            _ => 0,
        }
    }

    /// Immediate child at `index`.
    ///
    /// # Panics
    ///
    /// Panics if this field class has no such child. Callers only pass
    /// indexes which were validated against this very field class.
    pub fn child(&self, index: PathIndex) -> &FieldClass {
        match (&self.kind, index) {
            (FieldClassKind::Struct(s), PathIndex::Member(i)) => &s.members[i].fc,
            (FieldClassKind::Variant(v), PathIndex::Member(i)) => &v.options[i].fc,
            (FieldClassKind::Array(a), PathIndex::Element) => &a.elem,
            (FieldClassKind::Sequence(s), PathIndex::Element) => &s.elem,
            _ => panic!(
                "{} field class has no child at index {}",
                self.kind_name(),
                index
            ),
        }
    }

    /// Mutable twin of [`FieldClass::child`].
    pub fn child_mut(&mut self, index: PathIndex) -> &mut FieldClass {
        let kind_name = self.kind_name();
        match (&mut self.kind, index) {
            (FieldClassKind::Struct(s), PathIndex::Member(i)) => &mut s.members[i].fc,
            (FieldClassKind::Variant(v), PathIndex::Member(i)) => &mut v.options[i].fc,
            (FieldClassKind::Array(a), PathIndex::Element) => &mut a.elem,
            (FieldClassKind::Sequence(s), PathIndex::Element) => &mut s.elem,
            _ => panic!(
                "{} field class has no child at index {}",
                kind_name, index
            ),
        }
    }

    /// Index of the member/option exposed as `name`.
    pub fn child_index_by_name(&self, name: &str) -> Option<usize> {
        self.named_children()?.iter().position(|n| n.name == name)
    }

    /// Index of the member/option written as `orig_name` in the metadata.
    pub fn child_index_by_orig_name(&self, orig_name: &str) -> Option<usize> {
        self.named_children()?
            .iter()
            .position(|n| n.orig_name == orig_name)
    }

    fn named_children(&self) -> Option<&[NamedFieldClass]> {
        match &self.kind {
            FieldClassKind::Struct(s) => Some(&s.members),
            FieldClassKind::Variant(v) => Some(&v.options),
            _ => None,
        }
    }

    /// Follows `indexes` down from this field class.
    ///
    /// Returns `None` when the indexes do not match the tree shape.
    pub fn descendant(&self, indexes: &[PathIndex]) -> Option<&FieldClass> {
        let mut fc = self;
        for index in indexes {
            fc = fc.checked_child(*index)?;
        }
        Some(fc)
    }

    pub(crate) fn descendant_mut(&mut self, indexes: &[PathIndex]) -> Option<&mut FieldClass> {
        let mut fc = self;
        for index in indexes {
            if fc.checked_child(*index).is_none() {
                return None;
            }
            fc = fc.child_mut(*index);
        }
        Some(fc)
    }

    fn checked_child(&self, index: PathIndex) -> Option<&FieldClass> {
        match (&self.kind, index) {
            (FieldClassKind::Struct(s), PathIndex::Member(i)) => s.members.get(i).map(|m| &m.fc),
            (FieldClassKind::Variant(v), PathIndex::Member(i)) => v.options.get(i).map(|o| &o.fc),
            (FieldClassKind::Array(a), PathIndex::Element) => Some(&a.elem),
            (FieldClassKind::Sequence(s), PathIndex::Element) => Some(&s.elem),
            _ => None,
        }
    }
}

impl From<IntFieldClass> for FieldClass {
    fn from(int: IntFieldClass) -> Self {
        let alignment = default_bit_alignment(int.size);
        Self::with_kind(FieldClassKind::Int(int), alignment)
    }
}

impl From<EnumFieldClass> for FieldClass {
    fn from(e: EnumFieldClass) -> Self {
        let alignment = default_bit_alignment(e.int.size);
        Self::with_kind(FieldClassKind::Enum(e), alignment)
    }
}

// byte-sized types are byte-aligned, others are bit-packed
fn default_bit_alignment(size: u32) -> u32 {
    if size % 8 == 0 {
        8
    } else {
        1
    }
}
