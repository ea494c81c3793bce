//! Per-property type flags.
//!
//! A [`TypeFlags`] value packs every static fact about one declared
//! property: cardinality, value kind, key membership, veto eligibility,
//! whether a false boolean still renders an element, and whether the
//! property belongs to an OR choice group. Flags are built once at
//! declaration time and never mutated.

use std::fmt;
use std::ops::BitOr;

/// The scalar or structural kind of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `#PCDATA` element content.
    Text,
    /// A sub-bean (non-final element).
    Bean,
    /// Presence/absence element, optionally with literal text.
    Boolean,
    /// Integer text content.
    Int,
    /// Floating-point text content.
    Float,
    /// An XML comment bound as a value.
    Comment,
}

/// Packed capability descriptor for one property.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TypeFlags(u32);

const CARD_MASK: u32 = 0x0f;
const KIND_MASK: u32 = 0xf0;

impl TypeFlags {
    // Cardinality (exactly one of these).
    pub const OPTIONAL: TypeFlags = TypeFlags(0x01);
    pub const MANDATORY: TypeFlags = TypeFlags(0x02);
    pub const OPTIONAL_ARRAY: TypeFlags = TypeFlags(0x03);
    pub const MANDATORY_ARRAY: TypeFlags = TypeFlags(0x04);

    // Value kind (exactly one of these).
    pub const TEXT: TypeFlags = TypeFlags(0x10);
    pub const BEAN: TypeFlags = TypeFlags(0x20);
    pub const BOOLEAN: TypeFlags = TypeFlags(0x30);
    pub const INT: TypeFlags = TypeFlags(0x40);
    pub const FLOAT: TypeFlags = TypeFlags(0x50);
    pub const COMMENT: TypeFlags = TypeFlags(0x60);

    // Independent bits.
    /// Participates in merge/compare equivalence.
    pub const KEY: TypeFlags = TypeFlags(0x0100);
    /// Mutations raise a vetoable change first.
    pub const VETOABLE: TypeFlags = TypeFlags(0x0200);
    /// A false boolean still renders `<name>false</name>`.
    pub const ALWAYS_PRESENT: TypeFlags = TypeFlags(0x0400);
    /// Declared inside an OR choice group.
    pub const CHOICE: TypeFlags = TypeFlags(0x0800);

    pub fn is_array(self) -> bool {
        matches!(self.0 & CARD_MASK, 0x03 | 0x04)
    }

    pub fn is_mandatory(self) -> bool {
        matches!(self.0 & CARD_MASK, 0x02 | 0x04)
    }

    pub fn kind(self) -> ValueKind {
        match self.0 & KIND_MASK {
            0x20 => ValueKind::Bean,
            0x30 => ValueKind::Boolean,
            0x40 => ValueKind::Int,
            0x50 => ValueKind::Float,
            0x60 => ValueKind::Comment,
            _ => ValueKind::Text,
        }
    }

    pub fn is_bean(self) -> bool {
        self.kind() == ValueKind::Bean
    }

    pub fn is_key(self) -> bool {
        self.0 & Self::KEY.0 != 0
    }

    pub fn is_vetoable(self) -> bool {
        self.0 & Self::VETOABLE.0 != 0
    }

    pub fn always_present(self) -> bool {
        self.0 & Self::ALWAYS_PRESENT.0 != 0
    }

    pub fn is_choice(self) -> bool {
        self.0 & Self::CHOICE.0 != 0
    }
}

impl BitOr for TypeFlags {
    type Output = TypeFlags;

    fn bitor(self, rhs: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for TypeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let card = match self.0 & CARD_MASK {
            0x02 => "1",
            0x03 => "0..n",
            0x04 => "1..n",
            _ => "0..1",
        };
        write!(f, "TypeFlags({:?} {card}", self.kind())?;
        if self.is_key() {
            write!(f, " key")?;
        }
        if self.is_vetoable() {
            write!(f, " veto")?;
        }
        if self.is_choice() {
            write!(f, " choice")?;
        }
        write!(f, ")")
    }
}
