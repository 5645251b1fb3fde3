//! Normalized handler return values.

use serde::Serialize;
use serde_json::Value;

use crate::results::ActionResult;

/// What a handler, error handler or no-match handler produced.
///
/// `Null` and `Undefined` mirror "returned nothing" in its two flavors and
/// map to the controller's configured status codes.
#[derive(Debug)]
pub enum Reply {
    Null,
    Undefined,
    Json(Value),
    Text(String),
    Result(ActionResult),
}

impl Reply {
    /// Serialize any value. Scalars become text, `null` becomes `Null`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Reply::from)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Undefined
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Reply::Null)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Reply::Null,
            Value::String(text) => Reply::Text(text),
            Value::Bool(b) => Reply::Text(b.to_string()),
            Value::Number(n) => Reply::Text(n.to_string()),
            other => Reply::Json(other),
        }
    }
}

impl From<ActionResult> for Reply {
    fn from(result: ActionResult) -> Self {
        Reply::Result(result)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

macro_rules! reply_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Reply {
                fn from(value: $ty) -> Self {
                    Reply::Text(value.to_string())
                }
            }
        )*
    };
}

reply_from_display!(bool, i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64);
