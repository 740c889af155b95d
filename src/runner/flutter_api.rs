//! The slice of the `flutter_windows.h` / `flutter_messenger.h` C API the runner uses.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};

macro_rules! opaque_ref {
    ($name:ident, $reference:ident) => {
        #[repr(C)]
        pub struct $name {
            _private: [u8; 0],
        }
        pub type $reference = *mut $name;
    };
}

opaque_ref!(FlutterDesktopEngine, FlutterDesktopEngineRef);
opaque_ref!(FlutterDesktopViewController, FlutterDesktopViewControllerRef);
opaque_ref!(FlutterDesktopView, FlutterDesktopViewRef);
opaque_ref!(FlutterDesktopMessenger, FlutterDesktopMessengerRef);

#[repr(C)]
pub struct FlutterDesktopMessageResponseHandle {
    _private: [u8; 0],
}

pub type HWND = *mut c_void;
pub type UINT = u32;
pub type WPARAM = usize;
pub type LPARAM = isize;
pub type LRESULT = isize;

#[repr(C)]
pub struct FlutterDesktopEngineProperties {
    pub assets_path: *const u16,
    pub icu_data_path: *const u16,
    pub aot_library_path: *const u16,
    pub dart_entrypoint: *const c_char,
    pub dart_entrypoint_argc: c_int,
    pub dart_entrypoint_argv: *mut *const c_char,
    /// `FlutterDesktopGpuPreference`; 0 is the engine default.
    pub gpu_preference: c_int,
    /// `FlutterDesktopUIThreadPolicy`; 0 is the engine default.
    pub ui_thread_policy: c_int,
}

/// A message received on a channel.
#[repr(C)]
pub struct FlutterDesktopMessage {
    pub struct_size: usize,
    pub channel: *const c_char,
    pub message: *const u8,
    pub message_size: usize,
    pub response_handle: *const FlutterDesktopMessageResponseHandle,
}

pub type FlutterDesktopMessageCallback = Option<
    unsafe extern "C" fn(
        messenger: FlutterDesktopMessengerRef,
        message: *const FlutterDesktopMessage,
        user_data: *mut c_void,
    ),
>;
