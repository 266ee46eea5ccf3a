use crate::key::{Key, RawKey};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

///
/// Value
///
/// One id or index component. Only order-encodable kinds exist here, so
/// every `Value` has a canonical byte encoding.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}u"),
            Self::Float(v) => write!(f, "{v}f"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => {
                write!(f, "0x")?;
                v.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
            }
        }
    }
}

macro_rules! value_from {
    ($variant:ident, $target:ty, $($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(v: $source) -> Self {
                    Self::$variant(<$target>::from(v))
                }
            }
        )+
    };
}

value_from!(Bool, bool, bool);
value_from!(Int, i64, i8, i16, i32, i64);
value_from!(Uint, u64, u8, u16, u32, u64);
value_from!(Float, f64, f32, f64);
value_from!(Text, String, String, &str);
value_from!(Bytes, Vec<u8>, Vec<u8>, &[u8]);

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<&RawKey> for Value {
    fn from(v: &RawKey) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl<M> From<&Key<M>> for Value {
    fn from(v: &Key<M>) -> Self {
        Self::from(v.raw())
    }
}

///
/// IntoValues
///
/// Anything that can stand for an ordered list of components: a scalar,
/// a tuple of scalars, an explicit `Vec<Value>`, or `()` for "no components".
///

pub trait IntoValues {
    fn into_values(self) -> Vec<Value>;
}

impl IntoValues for () {
    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

impl IntoValues for Vec<Value> {
    fn into_values(self) -> Vec<Value> {
        self
    }
}

impl IntoValues for &[Value] {
    fn into_values(self) -> Vec<Value> {
        self.to_vec()
    }
}

macro_rules! scalar_into_values {
    ($($source:ty),+ $(,)?) => {
        $(
            impl IntoValues for $source {
                fn into_values(self) -> Vec<Value> {
                    vec![Value::from(self)]
                }
            }
        )+
    };
}

scalar_into_values!(
    Value, bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String, &String, &str, Vec<u8>,
    &[u8], &RawKey
);

impl<M> IntoValues for &Key<M> {
    fn into_values(self) -> Vec<Value> {
        vec![Value::from(self)]
    }
}

macro_rules! tuple_into_values {
    ($($name:ident),+) => {
        impl<$($name: Into<Value>),+> IntoValues for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

tuple_into_values!(A);
tuple_into_values!(A, B);
tuple_into_values!(A, B, C);
tuple_into_values!(A, B, C, D);
