use bstr::{BStr, BString, ByteSlice};

/// Values produced by parsing.
///
/// Leaves turn matched input into values through [`ParseValue::from_bytes`], composite nodes
/// collect the values of their children through [`ParseValue::list`].
pub trait ParseValue: Sized {
    fn null() -> Self;
    fn from_bytes(bytes: &[u8]) -> Self;
    fn list(items: Vec<Self>) -> Self;
    /// Returns the items of a list value, or the value itself if it is not a list.
    fn try_into_list(self) -> Result<Vec<Self>, Self>;
}

/// Dynamically typed parse result, the default [`ParseValue`].
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Bytes(BString),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn as_bytes(&self) -> Option<&BStr> {
        match self {
            Value::Bytes(b) => Some(b.as_bstr()),
            _ => None,
        }
    }
    /// The bytes as a string slice, if they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes()?.to_str().ok()
    }
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

impl ParseValue for Value {
    fn null() -> Self {
        Value::Null
    }
    fn from_bytes(bytes: &[u8]) -> Self {
        Value::Bytes(BString::from(bytes))
    }
    fn list(items: Vec<Self>) -> Self {
        Value::List(items)
    }
    fn try_into_list(self) -> Result<Vec<Self>, Self> {
        match self {
            Value::List(l) => Ok(l),
            other => Err(other),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Bytes(value.into())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

#[test]
fn test_value_conversions() {
    let v = Value::from(vec!["a", "b"]);
    assert_eq!(
        v,
        Value::List(vec![Value::from_bytes(b"a"), Value::from_bytes(b"b")])
    );
    assert_eq!(v.as_list().map(<[_]>::len), Some(2));
    assert_eq!(v.as_list().unwrap()[1].as_str(), Some("b"));
    assert_eq!(Value::from(-2).as_int(), Some(-2));
    assert!(Value::null().is_null());
    assert_eq!(Value::from(true).try_into_list(), Err(Value::Bool(true)));
    assert_eq!(Value::from_bytes(b"\xFF").as_str(), None);
}
