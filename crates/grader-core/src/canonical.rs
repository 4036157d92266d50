//! # Canonical Hashing — Tag-Ordered Digest of Signable Values
//!
//! This module defines the canonical codec and the hasher used for every
//! signed payload in the grader stack.
//!
//! ## Hash Input Rules
//!
//! An object's digest is `SHA256` over the concatenated contributions of
//! its attributes, visited in ascending tag order. Equal tags keep their
//! declaration order. The contribution of each value is:
//!
//! | Value | Contribution |
//! |-------|--------------|
//! | null | nothing; the attribute is skipped |
//! | integer | minimal decimal string |
//! | string | UTF-8 bytes |
//! | float | decimal with exactly six fractional digits |
//! | timestamp | decimal Unix seconds, truncated toward zero |
//! | nested object | the raw 32-byte digest of the child |
//! | list | the raw 32-byte digest of the concatenated element contributions |
//!
//! These rules are the wire contract shared with non-Rust clients; every
//! byte is significant. Lists are sequences: element order changes the
//! digest.
//!
//! ## Security Invariant
//!
//! The declaration order of attributes in code never reaches the hash
//! input except as a tie-breaker for identical tags. Adding an attribute
//! with a fresh tag leaves the digest of every payload that leaves it
//! null unchanged.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDateTime, TimeZone};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::digest::ContentDigest;
use crate::error::CanonicalError;
use crate::temporal::TimestampValue;

/// A value that can appear in a signable payload.
#[derive(Debug, Clone, PartialEq)]
pub enum HashValue {
    /// Absent value. Omitted from the hash entirely.
    Null,
    /// Signed integer.
    Int(i64),
    /// UTF-8 string.
    Str(String),
    /// IEEE-754 float, hashed at fixed six-decimal precision.
    Float(f64),
    /// Point in time, hashed as Unix seconds.
    Timestamp(TimestampValue),
    /// Nested structured value, hashed recursively.
    Object(Vec<TaggedValue>),
    /// Ordered list, hashed as a sequence.
    List(Vec<HashValue>),
}

/// One attribute of a structured value: its hash tag and value.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedValue {
    /// Hash tag; attributes are visited in ascending tag order.
    pub tag: Cow<'static, str>,
    /// Attribute value.
    pub value: HashValue,
}

impl TaggedValue {
    /// Pair a tag with anything convertible into a [`HashValue`].
    pub fn new(tag: impl Into<Cow<'static, str>>, value: impl Into<HashValue>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }
}

/// A statically declared hash attribute of `T`.
pub struct HashField<T: ?Sized> {
    /// Stable hash tag. Part of the wire contract.
    pub tag: &'static str,
    /// Accessor producing the attribute value.
    pub value: fn(&T) -> HashValue,
}

/// A payload type with a canonical digest.
///
/// Implementors list their attributes in [`Signable::HASH_FIELDS`]; the
/// position in that table is the declaration index.
pub trait Signable: 'static {
    /// The `(tag, accessor)` table for this type.
    const HASH_FIELDS: &'static [HashField<Self>];

    /// Evaluate every accessor, in declaration order.
    fn tagged_values(&self) -> Vec<TaggedValue> {
        Self::HASH_FIELDS
            .iter()
            .map(|field| TaggedValue {
                tag: Cow::Borrowed(field.tag),
                value: (field.value)(self),
            })
            .collect()
    }

    /// Compute the canonical digest of this value.
    fn hash_object(&self) -> Result<ContentDigest, CanonicalError> {
        hash_tagged(&self.tagged_values())
    }

    /// Canonical digest as lowercase hex, the form used in signing messages.
    fn hash_hex(&self) -> Result<String, CanonicalError> {
        Ok(self.hash_object()?.to_hex())
    }
}

impl HashValue {
    /// Wrap a nested signable value.
    pub fn object<S: Signable>(child: &S) -> Self {
        Self::Object(child.tagged_values())
    }
}

/// Compute the digest of a structured value from its tagged attributes.
pub fn hash_tagged(fields: &[TaggedValue]) -> Result<ContentDigest, CanonicalError> {
    let mut ordered: Vec<&TaggedValue> = fields.iter().collect();
    // Stable sort: identical tags keep declaration order.
    ordered.sort_by(|a, b| a.tag.cmp(&b.tag));

    let mut hasher = Sha256::new();
    for field in ordered {
        if let Some(bytes) = contribution(&field.value)? {
            hasher.update(&bytes);
        }
    }
    Ok(ContentDigest::from_bytes(hasher.finalize().into()))
}

/// Compute the digest of a single value.
///
/// Objects and lists hash to their own digest. Scalars hash their
/// contribution; null hashes the empty input.
pub fn hash_value(value: &HashValue) -> Result<ContentDigest, CanonicalError> {
    match value {
        HashValue::Object(fields) => hash_tagged(fields),
        HashValue::List(items) => hash_list(items),
        scalar => {
            let bytes = contribution(scalar)?.unwrap_or_default();
            Ok(crate::digest::sha256(&bytes))
        }
    }
}

fn hash_list(items: &[HashValue]) -> Result<ContentDigest, CanonicalError> {
    let mut hasher = Sha256::new();
    for item in items {
        match contribution(item)? {
            Some(bytes) => hasher.update(&bytes),
            None => return Err(CanonicalError::UnsupportedType("null".into())),
        }
    }
    Ok(ContentDigest::from_bytes(hasher.finalize().into()))
}

/// The bytes a value feeds into its parent's hasher, or `None` for null.
fn contribution(value: &HashValue) -> Result<Option<Vec<u8>>, CanonicalError> {
    let bytes = match value {
        HashValue::Null => return Ok(None),
        HashValue::Int(i) => i.to_string().into_bytes(),
        HashValue::Str(s) => s.as_bytes().to_vec(),
        HashValue::Float(f) => {
            if !f.is_finite() {
                return Err(CanonicalError::NonFiniteFloat(*f));
            }
            format!("{f:.6}").into_bytes()
        }
        HashValue::Timestamp(ts) => ts.unix_seconds()?.to_string().into_bytes(),
        HashValue::Object(fields) => hash_tagged(fields)?.as_bytes().to_vec(),
        HashValue::List(items) => hash_list(items)?.as_bytes().to_vec(),
    };
    Ok(Some(bytes))
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<i64> for HashValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for HashValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for HashValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for HashValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for HashValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for HashValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&String> for HashValue {
    fn from(v: &String) -> Self {
        Self::Str(v.clone())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for HashValue {
    fn from(v: DateTime<Tz>) -> Self {
        Self::Timestamp(TimestampValue::Zoned(v.fixed_offset()))
    }
}

impl From<NaiveDateTime> for HashValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(TimestampValue::Naive(v))
    }
}

impl From<TimestampValue> for HashValue {
    fn from(v: TimestampValue) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<HashValue>> From<Option<T>> for HashValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<HashValue>> From<Vec<T>> for HashValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// Untyped JSON, for tooling that hashes documents without a model type.
///
/// Object keys become tags. Booleans have no canonical form and are
/// rejected; so are integers outside the `i64` range.
impl TryFrom<&Value> for HashValue {
    type Error = CanonicalError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(_) => Err(CanonicalError::UnsupportedType("bool".into())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if n.is_u64() {
                    Err(CanonicalError::UnsupportedType(format!(
                        "integer out of i64 range: {n}"
                    )))
                } else {
                    n.as_f64()
                        .map(Self::Float)
                        .ok_or_else(|| CanonicalError::UnsupportedType(format!("number {n}")))
                }
            }
            Value::String(s) => Ok(Self::Str(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(HashValue::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok(TaggedValue::new(k.clone(), HashValue::try_from(v)?)))
                .collect::<Result<Vec<_>, CanonicalError>>()
                .map(Self::Object),
        }
    }
}
