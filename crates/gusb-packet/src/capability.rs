//! Protocol capability descriptors (the protocol-array payload).
//!
//! A device answers a product request with a list of 3-byte records, each a
//! category tag and a protocol or data-type number. Consumers only test
//! membership, so the list is kept in canonical string order
//! (`"<tag><value:03>"`, e.g. `A1100`, `D100`, `L001`) rather than arrival
//! order.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Serialize, Serializer};

use crate::error::{DecodeError, Result};

/// Size of one capability record on the wire: tag (1) + value (2).
pub const DESCRIPTOR_SIZE: usize = 3;

/// Category of a capability descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityTag {
    /// `P`: physical protocol id.
    Physical,
    /// `L`: link protocol id.
    Link,
    /// `A`: application protocol id.
    Application,
    /// `D`: data type id.
    DataType,
    /// Any other tag byte.
    Other(u8),
}

impl CapabilityTag {
    pub fn from_byte(tag: u8) -> Self {
        match tag {
            b'P' => Self::Physical,
            b'L' => Self::Link,
            b'A' => Self::Application,
            b'D' => Self::DataType,
            other => Self::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Physical => b'P',
            Self::Link => b'L',
            Self::Application => b'A',
            Self::DataType => b'D',
            Self::Other(tag) => tag,
        }
    }
}

/// One supported protocol or data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityDescriptor {
    pub tag: CapabilityTag,
    pub value: u16,
}

impl CapabilityDescriptor {
    pub fn new(tag: CapabilityTag, value: u16) -> Self {
        Self { tag, value }
    }

    /// Canonical form, `<tag><value>` with the value zero-padded to 3 digits.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", char::from(self.tag.as_byte()), self.value)
    }
}

impl FromStr for CapabilityDescriptor {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DecodeError::InvalidCapability(s.to_string());

        let mut chars = s.chars();
        let tag = chars
            .next()
            .filter(char::is_ascii_alphabetic)
            .ok_or_else(invalid)?;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value = digits.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self::new(
            CapabilityTag::from_byte(tag.to_ascii_uppercase() as u8),
            value,
        ))
    }
}

impl Serialize for CapabilityDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Decode a protocol-array payload into descriptors, in wire order.
pub fn decode_capability_list(payload: &[u8]) -> Result<Vec<CapabilityDescriptor>> {
    if payload.len() % DESCRIPTOR_SIZE != 0 {
        return Err(DecodeError::Misaligned { len: payload.len() });
    }

    let mut out = Vec::with_capacity(payload.len() / DESCRIPTOR_SIZE);
    for mut record in payload.chunks_exact(DESCRIPTOR_SIZE) {
        let tag = CapabilityTag::from_byte(record.get_u8());
        let value = record.get_u16_le();
        out.push(CapabilityDescriptor::new(tag, value));
    }
    Ok(out)
}

/// Encode descriptors into a protocol-array payload.
pub fn encode_capability_list(descriptors: &[CapabilityDescriptor], dst: &mut BytesMut) {
    dst.reserve(descriptors.len() * DESCRIPTOR_SIZE);
    for descriptor in descriptors {
        dst.put_u8(descriptor.tag.as_byte());
        dst.put_u16_le(descriptor.value);
    }
}

/// The capabilities a device reported, deduplicated and in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    descriptors: Vec<CapabilityDescriptor>,
}

impl CapabilitySet {
    /// Build a set from descriptors in any order.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = CapabilityDescriptor>) -> Self {
        let mut descriptors: Vec<_> = descriptors.into_iter().collect();
        descriptors.sort_by_cached_key(CapabilityDescriptor::canonical);
        descriptors.dedup();
        Self { descriptors }
    }

    pub fn contains(&self, tag: CapabilityTag, value: u16) -> bool {
        self.descriptors
            .iter()
            .any(|d| d.tag == tag && d.value == value)
    }

    /// Whether the device speaks application protocol `A<value>`.
    pub fn supports_application(&self, value: u16) -> bool {
        self.contains(CapabilityTag::Application, value)
    }

    /// Whether every descriptor in `required` is present.
    pub fn contains_all(&self, required: &[CapabilityDescriptor]) -> bool {
        required.iter().all(|r| self.contains(r.tag, r.value))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CapabilityDescriptor> {
        self.descriptors.iter()
    }

    pub fn as_slice(&self) -> &[CapabilityDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl FromIterator<CapabilityDescriptor> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = CapabilityDescriptor>>(iter: I) -> Self {
        Self::from_descriptors(iter)
    }
}

impl<'a> IntoIterator for &'a CapabilitySet {
    type Item = &'a CapabilityDescriptor;
    type IntoIter = std::slice::Iter<'a, CapabilityDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}
