//! Method-channel plumbing: the value type, call/result types, the standard
//! codec, and the (channel, method) dispatch table.

pub mod codec;
pub mod dispatch;
pub mod value;

pub use dispatch::{Handler, MethodDispatcher};
pub use value::EncodableValue;

/// One invocation received from the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub channel: String,
    pub method: String,
    pub arguments: EncodableValue,
}

impl MethodCall {
    pub fn new(
        channel: impl Into<String>,
        method: impl Into<String>,
        arguments: EncodableValue,
    ) -> Self {
        Self {
            channel: channel.into(),
            method: method.into(),
            arguments,
        }
    }
}

/// The reply to a method call; exactly one is produced per call.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResult {
    Success(EncodableValue),
    Error {
        code: String,
        message: String,
        details: EncodableValue,
    },
    NotImplemented,
}

impl MethodResult {
    pub fn success(value: impl Into<EncodableValue>) -> Self {
        MethodResult::Success(value.into())
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        MethodResult::Error {
            code: code.into(),
            message: message.into(),
            details: EncodableValue::Null,
        }
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, MethodResult::NotImplemented)
    }
}

impl From<crate::error::BridgeError> for MethodResult {
    fn from(err: crate::error::BridgeError) -> Self {
        MethodResult::error(err.code(), err.to_string())
    }
}
