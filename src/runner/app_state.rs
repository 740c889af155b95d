//! Application state container for the hosted Flutter view.

use std::sync::Arc;

use log::debug;
use windows::Win32::Foundation::HWND;

use super::{
    flutter_api::FlutterDesktopViewControllerRef, flutter_windows_dll::FlutterDll,
    messenger::ChannelHost,
};

/// Holds the long‐lived handles needed to manage the Flutter view.
/// Stored in the top-level window's `GWLP_USERDATA`, dropped on `WM_DESTROY`.
pub struct AppState {
    /// The Flutter view controller; owns the engine.
    pub controller: FlutterDesktopViewControllerRef,
    /// The HWND of the child window where Flutter renders its content.
    pub child_hwnd: HWND,
    pub dll: Arc<FlutterDll>,
    /// Channel callbacks; detached before the controller goes away.
    pub channels: Option<ChannelHost>,
}

impl Drop for AppState {
    fn drop(&mut self) {
        drop(self.channels.take());
        if !self.controller.is_null() {
            debug!("[AppState] Destroying view controller");
            unsafe { (self.dll.FlutterDesktopViewControllerDestroy)(self.controller) };
            self.controller = std::ptr::null_mut();
        }
    }
}
