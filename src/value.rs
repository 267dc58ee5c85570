// the object model every hint works on
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// used for interior mutability of shared graph nodes
use parking_lot::RwLock;

// used for asynchronous disposal
use futures_util::future::BoxFuture;

use crate::error::BoxError;

pub type TypeName = Arc<str>;

/// Declared type used when a container does not say what it holds.
pub const ANY: &str = "any";

/// A user type plugged into the object model.
///
/// Every capability is opt-in. A custom value that answers none of them can
/// still travel through the engine, but only a registered hint can compare or
/// copy it; otherwise the engine reports it as not supported.
pub trait Custom: fmt::Debug + Send + Sync + 'static {
    fn type_name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
    /// Value-based comparison. `other` may be [`Value::Null`], which lets a
    /// type define its own null contract. Returning `None` means the type is
    /// not value-equatable.
    fn value_eq(&self, _other: &Value) -> Option<bool> {
        None
    }
    /// Must agree with `value_eq`: equal values hash alike.
    fn value_hash(&self) -> Option<u64> {
        None
    }
    fn duplicate(&self) -> Option<Arc<dyn Custom>> {
        None
    }
    fn dispose(&self) -> std::result::Result<(), BoxError> {
        Ok(())
    }
    fn dispose_async(&self) -> Option<BoxFuture<'static, std::result::Result<(), BoxError>>> {
        None
    }
}

// ------------- Value -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Char,
    Byte,
    Int,
    Float,
    Text,
    Enum,
    List,
    Map,
    Object,
    Custom,
}

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Byte(u8),
    Int(i64),
    Float(f64),
    Text(Arc<str>),
    /// An enumeration member: (type name, variant name).
    Enum(TypeName, Arc<str>),
    List(Arc<List>),
    Map(Arc<Map>),
    Object(Arc<Object>),
    Custom(Arc<dyn Custom>),
}

impl Value {
    pub fn text(s: &str) -> Self {
        Value::Text(Arc::from(s))
    }
    pub fn enumeration(type_name: &str, variant: &str) -> Self {
        Value::Enum(Arc::from(type_name), Arc::from(variant))
    }
    /// An untyped list.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(List::from_items(None, items)))
    }
    /// An untyped dictionary; later duplicates of a key replace earlier ones.
    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        let map = Map::new(None, None);
        for (key, value) in entries {
            map.insert(key, value);
        }
        Value::Map(Arc::new(map))
    }
    pub fn custom<C: Custom>(custom: C) -> Self {
        Value::Custom(Arc::new(custom))
    }
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Char(_) => Kind::Char,
            Value::Byte(_) => Kind::Byte,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Text(_) => Kind::Text,
            Value::Enum(..) => Kind::Enum,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Object(_) => Kind::Object,
            Value::Custom(_) => Kind::Custom,
        }
    }
    /// Runtime type name, used for dispatch, error messages and generation.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Byte(_) => "u8",
            Value::Int(_) => "i64",
            Value::Float(_) => "f64",
            Value::Text(_) => "string",
            Value::Enum(type_name, _) => type_name.as_ref(),
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(object) => object.type_name(),
            Value::Custom(custom) => custom.type_name(),
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    /// Stable identity of a shared graph node. Leaves and custom wrappers have
    /// none, since they cannot take part in a reference cycle.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::List(list) => Some(Arc::as_ptr(list) as usize),
            Value::Map(map) => Some(Arc::as_ptr(map) as usize),
            Value::Object(object) => Some(Arc::as_ptr(object) as usize),
            _ => None,
        }
    }
    pub fn same_reference(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Custom(a), Value::Custom(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
    /// Values whose incidental overlap between two graphs says nothing.
    pub fn is_low_entropy(&self) -> bool {
        match self {
            Value::Bool(_) | Value::Char(_) | Value::Byte(_) | Value::Enum(..) => true,
            Value::List(list) => list.is_empty(),
            Value::Map(map) => map.is_empty(),
            _ => false,
        }
    }
    /// Snapshot of (declared type, child) pairs. Leaves have no children.
    pub fn children(&self) -> Vec<(TypeName, Value)> {
        match self {
            Value::List(list) => {
                let declared = list.element().cloned().unwrap_or_else(|| TypeName::from(ANY));
                list.items().into_iter().map(|item| (declared.clone(), item)).collect()
            }
            Value::Map(map) => {
                let key_type = map.key_type().cloned().unwrap_or_else(|| TypeName::from(ANY));
                let value_type = map.value_type().cloned().unwrap_or_else(|| TypeName::from(ANY));
                let mut children = Vec::with_capacity(map.len() * 2);
                for (key, value) in map.entries() {
                    children.push((key_type.clone(), key));
                    children.push((value_type.clone(), value));
                }
                children
            }
            Value::Object(object) => object
                .members()
                .iter()
                .zip(object.values())
                .map(|(member, value)| (member.declared().clone(), value))
                .collect(),
            _ => Vec::new(),
        }
    }
    pub fn as_list(&self) -> Option<&Arc<List>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }
    pub fn as_map(&self) -> Option<&Arc<Map>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
    pub fn as_object(&self) -> Option<&Arc<Object>> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
    pub fn as_custom(&self) -> Option<&Arc<dyn Custom>> {
        match self {
            Value::Custom(custom) => Some(custom),
            _ => None,
        }
    }
}

// Native equality: leaves by value, graph nodes and customs by reference.
// Floats compare by bit pattern so that equality stays reflexive for NaN.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Enum(t, v), Value::Enum(u, w)) => t == u && v == w,
            _ => self.same_reference(other),
        }
    }
}
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Char(c) => c.hash(state),
            Value::Byte(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(x) => x.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Enum(type_name, variant) => {
                type_name.hash(state);
                variant.hash(state);
            }
            Value::Custom(custom) => (Arc::as_ptr(custom) as *const () as usize).hash(state),
            _ => self.identity().hash(state),
        }
    }
}

// Shallow on purpose: graphs may be cyclic.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Byte(b) => write!(f, "{b}u8"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Enum(type_name, variant) => write!(f, "{type_name}::{variant}"),
            Value::List(list) => write!(f, "list[{}]@{:p}", list.len(), Arc::as_ptr(list)),
            Value::Map(map) => write!(f, "map{{{}}}@{:p}", map.len(), Arc::as_ptr(map)),
            Value::Object(object) => write!(f, "{}@{:p}", object.type_name(), Arc::as_ptr(object)),
            Value::Custom(custom) => write!(f, "{custom:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}
impl From<char> for Value {
    fn from(c: char) -> Self { Value::Char(c) }
}
impl From<u8> for Value {
    fn from(b: u8) -> Self { Value::Byte(b) }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self { Value::Int(i64::from(i)) }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Int(i) }
}
impl From<f64> for Value {
    fn from(x: f64) -> Self { Value::Float(x) }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::text(s) }
}
impl From<String> for Value {
    fn from(s: String) -> Self { Value::Text(Arc::from(s)) }
}
impl From<Arc<List>> for Value {
    fn from(list: Arc<List>) -> Self { Value::List(list) }
}
impl From<Arc<Map>> for Value {
    fn from(map: Arc<Map>) -> Self { Value::Map(map) }
}
impl From<Arc<Object>> for Value {
    fn from(object: Arc<Object>) -> Self { Value::Object(object) }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}

// JSON arrays become untyped lists, JSON objects become maps keyed by string.
impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::text(s),
            serde_json::Value::Array(items) => Value::list(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(fields) => {
                let map = Map::new(Some(TypeName::from("string")), None);
                for (key, value) in fields {
                    map.insert(Value::text(key), Value::from(value));
                }
                Value::Map(Arc::new(map))
            }
        }
    }
}
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self { Value::from(&json) }
}

// ------------- List -------------
#[derive(Debug)]
pub struct List {
    element: Option<TypeName>,
    items: RwLock<Vec<Value>>,
}
impl List {
    pub fn new(element: Option<TypeName>) -> Self {
        Self::from_items(element, Vec::new())
    }
    pub fn from_items(element: Option<TypeName>, items: Vec<Value>) -> Self {
        Self {
            element,
            items: RwLock::new(items),
        }
    }
    pub fn element(&self) -> Option<&TypeName> {
        self.element.as_ref()
    }
    pub fn len(&self) -> usize {
        self.items.read().len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }
    pub fn push(&self, item: Value) {
        self.items.write().push(item);
    }
    pub fn set(&self, index: usize, item: Value) -> bool {
        match self.items.write().get_mut(index) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }
    /// Snapshot of the items; no lock is held once this returns.
    pub fn items(&self) -> Vec<Value> {
        self.items.read().clone()
    }
}

// ------------- Map -------------
/// Insertion-ordered dictionary. Keys are matched by native equality.
#[derive(Debug)]
pub struct Map {
    key_type: Option<TypeName>,
    value_type: Option<TypeName>,
    entries: RwLock<Vec<(Value, Value)>>,
}
impl Map {
    pub fn new(key_type: Option<TypeName>, value_type: Option<TypeName>) -> Self {
        Self {
            key_type,
            value_type,
            entries: RwLock::new(Vec::new()),
        }
    }
    pub fn key_type(&self) -> Option<&TypeName> {
        self.key_type.as_ref()
    }
    pub fn value_type(&self) -> Option<&TypeName> {
        self.value_type.as_ref()
    }
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
    pub fn insert(&self, key: Value, value: Value) -> Option<Value> {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                entries.push((key, value));
                None
            }
        }
    }
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries
            .read()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
    /// Snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.entries.read().clone()
    }
}

// ------------- Object -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    name: Arc<str>,
    declared: TypeName,
    writable: bool,
}
impl Member {
    pub fn new(name: &str, declared: &str, writable: bool) -> Self {
        Self {
            name: Arc::from(name),
            declared: Arc::from(declared),
            writable,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn declared(&self) -> &TypeName {
        &self.declared
    }
    /// Whether code outside the type may assign this member.
    pub fn writable(&self) -> bool {
        self.writable
    }
}

/// A composite value: a fixed schema of members with mutable values.
#[derive(Debug)]
pub struct Object {
    type_name: TypeName,
    members: Arc<[Member]>,
    values: RwLock<Vec<Value>>,
}
impl Object {
    pub fn build(type_name: &str) -> ObjectBuilder {
        ObjectBuilder {
            type_name: Arc::from(type_name),
            members: Vec::new(),
            values: Vec::new(),
        }
    }
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
    pub fn members(&self) -> &[Member] {
        &self.members
    }
    fn position(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name() == name)
    }
    pub fn get(&self, name: &str) -> Option<Value> {
        let index = self.position(name)?;
        self.get_at(index)
    }
    pub fn get_at(&self, index: usize) -> Option<Value> {
        self.values.read().get(index).cloned()
    }
    /// Assigns a member regardless of writability; returns false for unknown names.
    pub fn set(&self, name: &str, value: Value) -> bool {
        match self.position(name) {
            Some(index) => self.set_at(index, value),
            None => false,
        }
    }
    pub fn set_at(&self, index: usize, value: Value) -> bool {
        match self.values.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
    /// Snapshot of the member values in schema order.
    pub fn values(&self) -> Vec<Value> {
        self.values.read().clone()
    }
    /// Same type and schema, every member null.
    pub fn shell(&self) -> Object {
        Object {
            type_name: self.type_name.clone(),
            members: Arc::clone(&self.members),
            values: RwLock::new(vec![Value::Null; self.members.len()]),
        }
    }
}

pub struct ObjectBuilder {
    type_name: TypeName,
    members: Vec<Member>,
    values: Vec<Value>,
}
impl ObjectBuilder {
    pub fn field(mut self, name: &str, declared: &str, value: impl Into<Value>) -> Self {
        self.members.push(Member::new(name, declared, true));
        self.values.push(value.into());
        self
    }
    pub fn readonly(mut self, name: &str, declared: &str, value: impl Into<Value>) -> Self {
        self.members.push(Member::new(name, declared, false));
        self.values.push(value.into());
        self
    }
    pub fn finish(self) -> Arc<Object> {
        Arc::new(Object {
            type_name: self.type_name,
            members: Arc::from(self.members),
            values: RwLock::new(self.values),
        })
    }
}
