//! Connects the dispatch table to the engine messenger.
//!
//! One callback is installed per channel. Every incoming message gets exactly
//! one response, sent before the callback returns.

use std::{
    ffi::{c_void, CString},
    ptr, slice,
    sync::Arc,
};

use anyhow::{Context, Result};
use log::{debug, error, info};

use super::{
    flutter_api::{FlutterDesktopMessage, FlutterDesktopMessengerRef},
    flutter_windows_dll::FlutterDll,
};
use crate::method_channel::MethodDispatcher;

/// State handed to the engine as `user_data` for one channel.
pub struct ChannelBinding {
    channel: String,
    channel_c: CString,
    dispatcher: Arc<MethodDispatcher>,
    dll: Arc<FlutterDll>,
}

/// Owns the installed callbacks; dropping it detaches them.
pub struct ChannelHost {
    messenger: FlutterDesktopMessengerRef,
    bindings: Vec<Box<ChannelBinding>>,
}

impl ChannelHost {
    pub fn install(
        dll: &Arc<FlutterDll>,
        messenger: FlutterDesktopMessengerRef,
        dispatcher: Arc<MethodDispatcher>,
    ) -> Result<Self> {
        // Built first so an early return detaches what is already installed.
        let mut host = Self {
            messenger,
            bindings: Vec::new(),
        };
        for (channel, channel_c) in c_channel_names(&dispatcher)? {
            let binding = Box::new(ChannelBinding {
                channel,
                channel_c,
                dispatcher: Arc::clone(&dispatcher),
                dll: Arc::clone(dll),
            });
            let user_data = &*binding as *const ChannelBinding as *mut c_void;
            unsafe {
                (dll.FlutterDesktopMessengerSetCallback)(
                    messenger,
                    binding.channel_c.as_ptr(),
                    Some(on_channel_message),
                    user_data,
                )
            };
            info!("[Messenger] Listening on '{}'", binding.channel);
            host.bindings.push(binding);
        }
        Ok(host)
    }
}

/// Every channel name as a C string, checked before any callback is installed.
fn c_channel_names(dispatcher: &MethodDispatcher) -> Result<Vec<(String, CString)>> {
    dispatcher
        .channels()
        .into_iter()
        .map(|channel| {
            let c = CString::new(channel)
                .with_context(|| format!("channel name {:?}", channel))?;
            Ok((channel.to_string(), c))
        })
        .collect()
}

impl Drop for ChannelHost {
    fn drop(&mut self) {
        for binding in &self.bindings {
            unsafe {
                (binding.dll.FlutterDesktopMessengerSetCallback)(
                    self.messenger,
                    binding.channel_c.as_ptr(),
                    None,
                    ptr::null_mut(),
                )
            };
            debug!("[Messenger] Detached '{}'", binding.channel);
        }
    }
}

unsafe extern "C" fn on_channel_message(
    messenger: FlutterDesktopMessengerRef,
    message: *const FlutterDesktopMessage,
    user_data: *mut c_void,
) {
    if message.is_null() || user_data.is_null() {
        error!("[Messenger] Callback invoked with null message or user_data");
        return;
    }
    let binding = unsafe { &*(user_data as *const ChannelBinding) };
    let message = unsafe { &*message };

    let bytes: &[u8] = if message.message.is_null() || message.message_size == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(message.message, message.message_size) }
    };
    debug!(
        "[Messenger] {} bytes on '{}'",
        message.message_size, binding.channel
    );

    let reply = binding.dispatcher.handle_message(&binding.channel, bytes);

    if message.response_handle.is_null() {
        debug!("[Messenger] No response expected on '{}'", binding.channel);
        return;
    }
    let data = if reply.is_empty() { ptr::null() } else { reply.as_ptr() };
    unsafe {
        (binding.dll.FlutterDesktopMessengerSendResponse)(
            messenger,
            message.response_handle,
            data,
            reply.len(),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method_channel::MethodResult;

    #[test]
    fn channel_names_are_checked_up_front() {
        let mut dispatcher = MethodDispatcher::new();
        dispatcher
            .register("app/form_handler", "getFormData", |_| MethodResult::NotImplemented)
            .register("app/system_info", "getProcessorInfo", |_| MethodResult::NotImplemented);
        let names = c_channel_names(&dispatcher).unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].0, "app/form_handler");
        assert_eq!(names[1].1.as_bytes(), b"app/system_info");

        dispatcher.register("app/bad\0name", "x", |_| MethodResult::NotImplemented);
        assert!(c_channel_names(&dispatcher).is_err());
    }
}
