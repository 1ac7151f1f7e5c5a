//! Ordered attribute dictionary, stored as an append-only TLV sequence
//! so it can be cloned, shared, and round-tripped through `uref_dup`
//! and the xfer queue (spec §3, §4.1).

use std::collections::HashMap;

/// One attribute value. Mirrors the nine types from spec §3.
#[derive(Clone, Debug, PartialEq)]
pub enum UdictValue {
    Opaque(Vec<u8>),
    String(String),
    Void,
    Bool(bool),
    SmallUnsigned(u8),
    SmallInt(i8),
    Unsigned(u64),
    Int(i64),
    Float(f64),
    /// `(numerator, denominator)`.
    Rational(i64, i64),
}

impl UdictValue {
    fn type_tag(&self) -> u8 {
        match self {
            UdictValue::Opaque(_) => 0,
            UdictValue::String(_) => 1,
            UdictValue::Void => 2,
            UdictValue::Bool(_) => 3,
            UdictValue::SmallUnsigned(_) => 4,
            UdictValue::SmallInt(_) => 5,
            UdictValue::Unsigned(_) => 6,
            UdictValue::Int(_) => 7,
            UdictValue::Float(_) => 8,
            UdictValue::Rational(_, _) => 9,
        }
    }
}

/// Key: `(type tag, name)`. A dictionary may hold at most one value
/// per `(type, name)` pair, matching `udict_inline.h`'s append + mark
/// old-as-deleted model — logically a last-writer-wins map.
type Key = (u8, String);

/// Ordered attribute dictionary.
///
/// The backing representation is a `Vec` of `(name, value)` in
/// insertion order (for `iterate`) plus a `HashMap` index for O(1)
/// lookups; overwriting re-orders the entry to its new (latest)
/// position, mirroring "append + mark old as deleted" without
/// actually leaking tombstones in memory.
#[derive(Clone, Debug, Default)]
pub struct Udict {
    entries: Vec<(String, UdictValue)>,
    index: HashMap<Key, usize>,
}

impl Udict {
    pub fn new() -> Self {
        Udict::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Set (insert or overwrite) a named attribute.
    pub fn set<S: Into<String>>(&mut self, name: S, value: UdictValue) {
        let name = name.into();
        let key = (value.type_tag(), name.clone());
        if let Some(&idx) = self.index.get(&key) {
            self.entries[idx].1 = value;
        } else {
            let idx = self.entries.len();
            self.entries.push((name, value));
            self.index.insert(key, idx);
        }
    }

    /// Get a named attribute matching the given type tag.
    pub fn get(&self, name: &str, type_tag: u8) -> Option<&UdictValue> {
        self.index
            .get(&(type_tag, name.to_string()))
            .map(|&idx| &self.entries[idx].1)
    }

    /// Delete a named attribute of a given type. Returns whether
    /// anything was removed.
    pub fn delete(&mut self, name: &str, type_tag: u8) -> bool {
        let key = (type_tag, name.to_string());
        match self.index.remove(&key) {
            Some(idx) => {
                self.entries.remove(idx);
                // Reindex everything shifted down by the removal.
                for (_, v) in self.index.iter_mut() {
                    if *v > idx {
                        *v -= 1;
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Iterate over every (non-deleted) entry in insertion order,
    /// yielding name and type tag; callers fetch by type afterwards
    /// (spec §3: "iteration yields name+type pairs").
    pub fn iterate(&self) -> impl Iterator<Item = (&str, u8)> {
        self.entries
            .iter()
            .map(|(name, v)| (name.as_str(), v.type_tag()))
    }

    // Typed convenience accessors, matching the `get_T`/`set_T`
    // pattern from spec §3.

    pub fn set_string<S: Into<String>>(&mut self, name: &str, v: S) {
        self.set(name, UdictValue::String(v.into()));
    }
    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(name, UdictValue::String(String::new()).type_tag()) {
            Some(UdictValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn set_bool(&mut self, name: &str, v: bool) {
        self.set(name, UdictValue::Bool(v));
    }
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name, UdictValue::Bool(false).type_tag()) {
            Some(UdictValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn set_unsigned(&mut self, name: &str, v: u64) {
        self.set(name, UdictValue::Unsigned(v));
    }
    pub fn get_unsigned(&self, name: &str) -> Option<u64> {
        match self.get(name, UdictValue::Unsigned(0).type_tag()) {
            Some(UdictValue::Unsigned(u)) => Some(*u),
            _ => None,
        }
    }

    pub fn set_int(&mut self, name: &str, v: i64) {
        self.set(name, UdictValue::Int(v));
    }
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name, UdictValue::Int(0).type_tag()) {
            Some(UdictValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn set_float(&mut self, name: &str, v: f64) {
        self.set(name, UdictValue::Float(v));
    }
    pub fn get_float(&self, name: &str) -> Option<f64> {
        match self.get(name, UdictValue::Float(0.0).type_tag()) {
            Some(UdictValue::Float(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn set_rational(&mut self, name: &str, num: i64, den: i64) {
        self.set(name, UdictValue::Rational(num, den));
    }
    pub fn get_rational(&self, name: &str) -> Option<(i64, i64)> {
        match self.get(name, UdictValue::Rational(0, 1).type_tag()) {
            Some(UdictValue::Rational(n, d)) => Some((*n, *d)),
            _ => None,
        }
    }

    /// Serialize to a length-prefixed TLV byte stream, for the xfer
    /// queue and for round-trip tests (spec §4.1).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for (name, value) in &self.entries {
            let name_bytes = name.as_bytes();
            out.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
            out.extend_from_slice(name_bytes);
            out.push(value.type_tag());
            let payload = encode_value(value);
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&payload);
        }
        out
    }

    /// Inverse of [`Udict::serialize`].
    pub fn deserialize(bytes: &[u8]) -> Option<Udict> {
        let mut d = Udict::new();
        let mut pos = 0usize;
        let count = u32::from_le_bytes(bytes.get(pos..pos + 4)?.try_into().ok()?) as usize;
        pos += 4;
        for _ in 0..count {
            let name_len = u16::from_le_bytes(bytes.get(pos..pos + 2)?.try_into().ok()?) as usize;
            pos += 2;
            let name = String::from_utf8(bytes.get(pos..pos + name_len)?.to_vec()).ok()?;
            pos += name_len;
            let type_tag = *bytes.get(pos)?;
            pos += 1;
            let val_len = u32::from_le_bytes(bytes.get(pos..pos + 4)?.try_into().ok()?) as usize;
            pos += 4;
            let payload = bytes.get(pos..pos + val_len)?;
            pos += val_len;
            let value = decode_value(type_tag, payload)?;
            d.set(name, value);
        }
        Some(d)
    }
}

fn encode_value(v: &UdictValue) -> Vec<u8> {
    match v {
        UdictValue::Opaque(b) => b.clone(),
        UdictValue::String(s) => s.as_bytes().to_vec(),
        UdictValue::Void => Vec::new(),
        UdictValue::Bool(b) => vec![*b as u8],
        UdictValue::SmallUnsigned(u) => vec![*u],
        UdictValue::SmallInt(i) => vec![*i as u8],
        UdictValue::Unsigned(u) => u.to_le_bytes().to_vec(),
        UdictValue::Int(i) => i.to_le_bytes().to_vec(),
        UdictValue::Float(f) => f.to_le_bytes().to_vec(),
        UdictValue::Rational(n, d) => {
            let mut v = n.to_le_bytes().to_vec();
            v.extend_from_slice(&d.to_le_bytes());
            v
        }
    }
}

fn decode_value(type_tag: u8, payload: &[u8]) -> Option<UdictValue> {
    Some(match type_tag {
        0 => UdictValue::Opaque(payload.to_vec()),
        1 => UdictValue::String(String::from_utf8(payload.to_vec()).ok()?),
        2 => UdictValue::Void,
        3 => UdictValue::Bool(*payload.first()? != 0),
        4 => UdictValue::SmallUnsigned(*payload.first()?),
        5 => UdictValue::SmallInt(*payload.first()? as i8),
        6 => UdictValue::Unsigned(u64::from_le_bytes(payload.try_into().ok()?)),
        7 => UdictValue::Int(i64::from_le_bytes(payload.try_into().ok()?)),
        8 => UdictValue::Float(f64::from_le_bytes(payload.try_into().ok()?)),
        9 => {
            let n = i64::from_le_bytes(payload.get(0..8)?.try_into().ok()?);
            let d = i64::from_le_bytes(payload.get(8..16)?.try_into().ok()?);
            UdictValue::Rational(n, d)
        }
        _ => return None,
    })
}
