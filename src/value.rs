//! Value Module
//!
//! The capability surface a proxy can wrap: values, the [`Target`] trait,
//! and a dispatch-table target for building targets out of closures.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Error as _, Serialize, Serializer};

use crate::error::CacheError;
use crate::output::OutputSink;

// == Value ==
/// A value passed to or returned from a target.
///
/// `Object` values are callable themselves; proxies wrap them so calls made
/// on them are cached as well.
#[derive(Clone)]
pub enum Value {
    Data(serde_json::Value),
    Object(Arc<dyn Target>),
}

impl Value {
    /// Wraps a target as an object value.
    pub fn object(target: impl Target + 'static) -> Self {
        Value::Object(Arc::new(target))
    }

    /// Returns the plain data, or None for objects.
    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(data) => Some(data),
            Value::Object(_) => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Data(data) => f.debug_tuple("Data").field(data).finish(),
            Value::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl PartialEq for Value {
    /// Objects compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Data(data) => data.serialize(serializer),
            Value::Object(_) => Err(S::Error::custom("object values cannot be serialized")),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(data: serde_json::Value) -> Self {
        Value::Data(data)
    }
}

macro_rules! data_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Data(serde_json::Value::from(v))
            }
        })*
    };
}

data_from!(bool, i32, i64, u32, u64, f64, String, &str);

// == Target Trait ==
/// Anything a proxy can wrap: named operations plus named fields.
pub trait Target: Send + Sync {
    /// Calls `operation` with positional `args`, writing any output to `sink`.
    fn call(&self, operation: &str, args: &[Value], sink: &mut OutputSink)
        -> anyhow::Result<Value>;

    /// Reads a field. Returns None if the target has no such field.
    fn field(&self, name: &str) -> Option<Value>;
}

type Operation = Box<dyn Fn(&[Value], &mut OutputSink) -> anyhow::Result<Value> + Send + Sync>;

// == Dispatch Target ==
/// A target defined by a table of operation closures and field values.
pub struct DispatchTarget {
    operations: HashMap<String, Operation>,
    fields: HashMap<String, Value>,
}

impl DispatchTarget {
    pub fn builder() -> DispatchTargetBuilder {
        DispatchTargetBuilder::default()
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }
}

impl Target for DispatchTarget {
    fn call(
        &self,
        operation: &str,
        args: &[Value],
        sink: &mut OutputSink,
    ) -> anyhow::Result<Value> {
        let op = self
            .operations
            .get(operation)
            .ok_or_else(|| CacheError::UnknownOperation(operation.to_string()))?;
        op(args, sink)
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }
}

/// Builder for [`DispatchTarget`].
#[derive(Default)]
pub struct DispatchTargetBuilder {
    operations: HashMap<String, Operation>,
    fields: HashMap<String, Value>,
}

impl DispatchTargetBuilder {
    /// Registers an operation. A later registration under the same name wins.
    pub fn operation<F>(mut self, name: impl Into<String>, op: F) -> Self
    where
        F: Fn(&[Value], &mut OutputSink) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.operations.insert(name.into(), Box::new(op));
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> DispatchTarget {
        DispatchTarget {
            operations: self.operations,
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn greeter() -> DispatchTarget {
        DispatchTarget::builder()
            .operation("greet", |args, sink| {
                let name = args
                    .first()
                    .and_then(Value::as_data)
                    .and_then(|v| v.as_str())
                    .unwrap_or("world");
                sink.emit(&format!("Hello, {}!", name))?;
                Ok(Value::from(name.len() as u64))
            })
            .field("language", "en")
            .build()
    }

    #[test]
    fn test_dispatch_calls_registered_operation() {
        let target = greeter();
        let mut sink = OutputSink::buffer();

        let value = target.call("greet", &["Ada".into()], &mut sink).unwrap();

        assert_eq!(value, Value::from(3u64));
        assert_eq!(sink.contents(), "Hello, Ada!");
        assert!(target.has_operation("greet"));
    }

    #[test]
    fn test_dispatch_unknown_operation() {
        let target = greeter();
        let mut sink = OutputSink::buffer();

        let err = target.call("wave", &[], &mut sink).unwrap_err();
        let err = CacheError::from_target(err);
        assert!(matches!(err, CacheError::UnknownOperation(name) if name == "wave"));
    }

    #[test]
    fn test_dispatch_fields() {
        let target = greeter();
        assert_eq!(target.field("language"), Some(Value::Data(json!("en"))));
        assert!(target.field("missing").is_none());
    }

    #[test]
    fn test_object_values_do_not_serialize() {
        let data = vec![Value::from(1), Value::from("x")];
        assert_eq!(serde_json::to_string(&data).unwrap(), r#"[1,"x"]"#);

        let with_object = vec![Value::object(greeter())];
        assert!(serde_json::to_string(&with_object).is_err());
    }

    #[test]
    fn test_object_equality_is_identity() {
        let shared: Arc<dyn Target> = Arc::new(greeter());
        let a = Value::Object(shared.clone());
        let b = Value::Object(shared);
        let c = Value::object(greeter());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
