use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
};

use log::{debug, error, warn};

use super::{codec, EncodableValue, MethodCall, MethodResult};
use crate::error::{BAD_MESSAGE, UNEXPECTED_ERROR};

pub type Handler = Box<dyn Fn(&MethodCall) -> MethodResult + Send + Sync + 'static>;

/// Routes a call to the handler registered for its (channel, method) pair.
///
/// Calls on unknown channels or for unknown methods resolve to
/// [`MethodResult::NotImplemented`]. Every call yields exactly one result.
#[derive(Default)]
pub struct MethodDispatcher {
    channels: HashMap<String, HashMap<String, Handler>>,
}

impl MethodDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` on `channel`, replacing any previous one.
    pub fn register<F>(&mut self, channel: &str, method: &str, handler: F) -> &mut Self
    where
        F: Fn(&MethodCall) -> MethodResult + Send + Sync + 'static,
    {
        self.channels
            .entry(channel.to_owned())
            .or_default()
            .insert(method.to_owned(), Box::new(handler));
        self
    }

    /// Channel names with at least one registered method, sorted.
    pub fn channels(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn handles(&self, channel: &str, method: &str) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|methods| methods.contains_key(method))
    }

    pub fn dispatch(&self, call: &MethodCall) -> MethodResult {
        let Some(handler) = self
            .channels
            .get(&call.channel)
            .and_then(|methods| methods.get(&call.method))
        else {
            debug!(
                "[Dispatch] No handler for '{}' on '{}'",
                call.method, call.channel
            );
            return MethodResult::NotImplemented;
        };

        debug!("[Dispatch] '{}' on '{}'", call.method, call.channel);
        // Calls arrive from a C callback; a panic must not unwind into the engine.
        match panic::catch_unwind(AssertUnwindSafe(|| handler(call))) {
            Ok(result) => result,
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    "[Dispatch] Handler for '{}' on '{}' panicked: {}",
                    call.method, call.channel, reason
                );
                MethodResult::error(UNEXPECTED_ERROR, reason)
            }
        }
    }

    /// Decodes an encoded method call received on `channel`, dispatches it and
    /// returns the encoded reply. Undecodable messages get an error envelope.
    pub fn handle_message(&self, channel: &str, message: &[u8]) -> Vec<u8> {
        match codec::decode_method_call(message) {
            Ok((method, arguments)) => {
                let call = MethodCall::new(channel, method, arguments);
                codec::encode_result(&self.dispatch(&call))
            }
            Err(e) => {
                warn!("[Dispatch] Undecodable message on '{}': {}", channel, e);
                codec::encode_error_envelope(BAD_MESSAGE, Some(&e.to_string()), &EncodableValue::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(channel: &str, method: &str) -> MethodCall {
        MethodCall::new(channel, method, EncodableValue::Null)
    }

    #[test]
    fn routes_by_channel_and_method() {
        let mut dispatcher = MethodDispatcher::new();
        dispatcher
            .register("a", "ping", |_| MethodResult::success("a-pong"))
            .register("b", "ping", |_| MethodResult::success("b-pong"));

        assert_eq!(
            dispatcher.dispatch(&call("a", "ping")),
            MethodResult::success("a-pong")
        );
        assert_eq!(
            dispatcher.dispatch(&call("b", "ping")),
            MethodResult::success("b-pong")
        );
        assert_eq!(dispatcher.channels(), ["a", "b"]);
    }

    #[test]
    fn unknown_method_or_channel_is_not_implemented() {
        let mut dispatcher = MethodDispatcher::new();
        dispatcher.register("a", "ping", |_| MethodResult::success(true));

        assert!(dispatcher.dispatch(&call("a", "pong")).is_not_implemented());
        assert!(dispatcher.dispatch(&call("c", "ping")).is_not_implemented());
        assert!(!dispatcher.handles("a", "pong"));
        assert!(dispatcher.handles("a", "ping"));
    }

    #[test]
    fn panicking_handler_becomes_error_result() {
        let mut dispatcher = MethodDispatcher::new();
        dispatcher.register("a", "boom", |_| panic!("native call blew up"));

        match dispatcher.dispatch(&call("a", "boom")) {
            MethodResult::Error { code, message, .. } => {
                assert_eq!(code, UNEXPECTED_ERROR);
                assert_eq!(message, "native call blew up");
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn handle_message_round_trips_through_the_codec() {
        let mut dispatcher = MethodDispatcher::new();
        dispatcher.register("a", "echo", |call| MethodResult::Success(call.arguments.clone()));

        let request = codec::encode_method_call("echo", &EncodableValue::from("hello"));
        let reply = dispatcher.handle_message("a", &request);
        assert_eq!(
            codec::decode_envelope(&reply).unwrap(),
            MethodResult::success("hello")
        );

        let unknown = codec::encode_method_call("nope", &EncodableValue::Null);
        assert!(dispatcher.handle_message("a", &unknown).is_empty());
    }

    #[test]
    fn garbage_message_gets_bad_message_error() {
        let dispatcher = MethodDispatcher::new();
        let reply = dispatcher.handle_message("a", &[0xff, 0x01]);
        match codec::decode_envelope(&reply).unwrap() {
            MethodResult::Error { code, .. } => assert_eq!(code, BAD_MESSAGE),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn deeply_nested_arguments_get_bad_message_error() {
        let mut dispatcher = MethodDispatcher::new();
        dispatcher.register("a", "getFormData", |_| MethodResult::success("[]"));

        let mut request = codec::encode_method_call("getFormData", &EncodableValue::Null);
        request.pop();
        for _ in 0..50_000 {
            request.extend_from_slice(&[12, 1]);
        }
        request.push(0);

        match codec::decode_envelope(&dispatcher.handle_message("a", &request)).unwrap() {
            MethodResult::Error { code, message, .. } => {
                assert_eq!(code, BAD_MESSAGE);
                assert!(message.contains("nested"), "message was {:?}", message);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }
}
