use std::{fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{diagnostics::EaselError, number::Num};

/// Tag byte leading every canonical encoding.
const TAG_NONE: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_NUM: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_ARRAY: u8 = 4;
const TAG_OBJECT: u8 = 5;

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

pub enum ValueKind {
    None,
    Bool(bool),
    Num(Num),
    Str(String),
    Array(ArrayValue),
    Object(ObjectValue),
    Func(FuncValue),
}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn none() -> Self {
        Self::new(ValueKind::None)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn num(value: Num) -> Self {
        Self::new(ValueKind::Num(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Num(Num::from_i64(value)))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::Str(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(ArrayValue::Items(values)))
    }

    pub fn bytes(bytes: Vec<u8>) -> Self {
        Self::new(ValueKind::Array(ArrayValue::Bytes(bytes)))
    }

    pub fn object(object: ObjectValue) -> Self {
        Self::new(ValueKind::Object(object))
    }

    pub fn func(params: Option<Vec<String>>, callable: FuncCallable) -> Self {
        Self::new(ValueKind::Func(FuncValue { params, callable }))
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::None => "null",
            ValueKind::Bool(_) => "bool",
            ValueKind::Num(_) => "number",
            ValueKind::Str(_) => "string",
            ValueKind::Array(_) => "array",
            ValueKind::Object(_) => "object",
            ValueKind::Func(_) => "func",
        }
    }

    pub fn as_num(&self) -> Option<&Num> {
        match &*self.0 {
            ValueKind::Num(num) => Some(num),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &*self.0 {
            ValueKind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match &*self.0 {
            ValueKind::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match &*self.0 {
            ValueKind::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&FuncValue> {
        match &*self.0 {
            ValueKind::Func(func) => Some(func),
            _ => None,
        }
    }

    /// Deterministic byte encoding used for object keys and hashing.
    /// Functions have no encoding.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, String> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), String> {
        match &*self.0 {
            ValueKind::None => buf.push(TAG_NONE),
            ValueKind::Bool(b) => {
                buf.push(TAG_BOOL);
                buf.push(*b as u8);
            }
            ValueKind::Num(num) => {
                buf.push(TAG_NUM);
                buf.extend_from_slice(num.to_string().as_bytes());
            }
            ValueKind::Str(s) => {
                buf.push(TAG_STRING);
                buf.extend_from_slice(s.as_bytes());
            }
            ValueKind::Array(arr) => {
                buf.push(TAG_ARRAY);
                for idx in 0..arr.len() {
                    arr.at(idx).encode_into(buf)?;
                }
            }
            ValueKind::Object(obj) => {
                buf.push(TAG_OBJECT);
                // Entries sorted by key encoding, so equal objects encode
                // identically regardless of insertion order.
                let mut entries: Vec<_> = obj.entries.iter().collect();
                entries.sort_by(|(a, _), (b, _)| a.cmp(b));
                for (key_bytes, (_, value)) in entries {
                    buf.extend_from_slice(key_bytes);
                    value.encode_into(buf)?;
                }
            }
            ValueKind::Func(_) => return Err("func is not hashable".into()),
        }
        Ok(())
    }
}

/// Structural equality. Functions never compare equal, not even to
/// themselves.
pub fn deep_equal(x: &Value, y: &Value) -> bool {
    match (&*x.0, &*y.0) {
        (ValueKind::None, ValueKind::None) => true,
        (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
        (ValueKind::Num(a), ValueKind::Num(b)) => a == b,
        (ValueKind::Str(a), ValueKind::Str(b)) => a == b,
        (ValueKind::Array(a), ValueKind::Array(b)) => {
            a.len() == b.len() && (0..a.len()).all(|idx| deep_equal(&a.at(idx), &b.at(idx)))
        }
        (ValueKind::Object(a), ValueKind::Object(b)) => {
            a.len() == b.len()
                && a.entries.iter().all(|(key, (_, value))| {
                    b.entries
                        .get(key)
                        .map(|(_, other)| deep_equal(value, other))
                        .unwrap_or(false)
                })
        }
        _ => false,
    }
}

/// An ordered sequence, either of values or of raw bytes. Byte elements
/// surface to the language as unsigned numbers.
#[derive(Clone)]
pub enum ArrayValue {
    Items(Vec<Value>),
    Bytes(Vec<u8>),
}

impl ArrayValue {
    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Items(items) => items.len(),
            ArrayValue::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, ArrayValue::Bytes(_))
    }

    /// Element at a pre-validated position.
    pub fn at(&self, idx: usize) -> Value {
        match self {
            ArrayValue::Items(items) => items[idx].clone(),
            ArrayValue::Bytes(bytes) => Value::num(Num::from_byte(bytes[idx])),
        }
    }

    /// Signed indexing; negative indices count from the end.
    pub fn get(&self, idx: i64) -> Result<Value, String> {
        let len = self.len() as i64;
        let norm = if idx < 0 { len + idx } else { idx };
        if norm < 0 || norm >= len {
            return Err(format!("index {idx} out of range"));
        }
        Ok(self.at(norm as usize))
    }

    /// Bytes-mode concatenation stays bytes; otherwise byte elements lift
    /// into a generic array.
    pub fn concat(&self, other: &ArrayValue) -> ArrayValue {
        match (self, other) {
            (ArrayValue::Bytes(a), ArrayValue::Bytes(b)) => {
                let mut bytes = Vec::with_capacity(a.len() + b.len());
                bytes.extend_from_slice(a);
                bytes.extend_from_slice(b);
                ArrayValue::Bytes(bytes)
            }
            _ => {
                let mut items = Vec::with_capacity(self.len() + other.len());
                for idx in 0..self.len() {
                    items.push(self.at(idx));
                }
                for idx in 0..other.len() {
                    items.push(other.at(idx));
                }
                ArrayValue::Items(items)
            }
        }
    }
}

/// An insertion-ordered mapping. Each entry stores the canonical encoding
/// of its key (the lookup identity) alongside the original key value.
#[derive(Clone, Default)]
pub struct ObjectValue {
    entries: IndexMap<Vec<u8>, (Value, Value)>,
}

impl ObjectValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserting under an existing key overwrites the value but keeps the
    /// first-seen key value and its position.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), String> {
        let encoded = key.canonical_bytes()?;
        match self.entries.entry(encoded) {
            indexmap::map::Entry::Occupied(mut slot) => {
                slot.get_mut().1 = value;
            }
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert((key, value));
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &Value) -> Result<Value, String> {
        let encoded = key.canonical_bytes()?;
        self.entries
            .get(&encoded)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| "key not found".to_string())
    }

    pub fn get_named(&self, name: &str) -> Option<Value> {
        let encoded = Value::string(name).canonical_bytes().ok()?;
        self.entries.get(&encoded).map(|(_, value)| value.clone())
    }

    /// `(original key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(key, value)| (key, value))
    }
}

pub type FuncCallable = Rc<dyn Fn(&[Value]) -> Result<Value, EaselError>>;

/// A first-class function: declared argument names plus the callable
/// closure. Host functions with no declared argument list are variadic.
#[derive(Clone)]
pub struct FuncValue {
    pub params: Option<Vec<String>>,
    pub callable: FuncCallable,
}

impl FuncValue {
    pub fn call(&self, args: &[Value]) -> Result<Value, EaselError> {
        (self.callable)(args)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::None => write!(f, "none"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Num(num) => write!(f, "{num}"),
            ValueKind::Str(s) => write!(f, "{s}"),
            ValueKind::Array(arr) => {
                write!(f, "[")?;
                for idx in 0..arr.len() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arr.at(idx))?;
                }
                write!(f, "]")
            }
            ValueKind::Object(obj) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in obj.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            ValueKind::Func(_) => write!(f, "function"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Str(s) => write!(f, "\"{s}\""),
            _ => write!(f, "{self}"),
        }
    }
}
