//! Windows host for the Flutter view.
//!
//! - Initializes COM (STA) for Flutter plugins and Win32 operations
//! - Loads `flutter_windows.dll` and creates the engine and view controller
//! - Installs the `system_info` and `form_handler` channels on the engine messenger
//! - Hosts the Flutter child HWND in a native Win32 parent window
//! - Runs the standard message loop and cleans up on exit

mod app_state;
mod flutter_api;
mod flutter_utils;
mod flutter_windows_dll;
mod messenger;
mod path_utils;
mod win32_utils;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::info;
use windows::Win32::{
    Foundation::HWND,
    System::Com::{CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED},
    UI::WindowsAndMessaging::{SetForegroundWindow, ShowWindow, SW_SHOWNORMAL},
};

use crate::{config::RunnerConfig, handlers};
use app_state::AppState;
use flutter_windows_dll::FlutterDll;
use messenger::ChannelHost;

/// Runs the application until its window closes.
pub fn run(config: &RunnerConfig) -> Result<()> {
    unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
        .ok()
        .context("COM init failed (STA)")?;
    info!("[Runner] COM initialized (STA)");

    let result = host_flutter_view(config);

    unsafe { CoUninitialize() };
    info!("[Runner] Application exiting");
    result
}

fn host_flutter_view(config: &RunnerConfig) -> Result<()> {
    // --- 1) Engine (no Dart VM yet) ---
    let dll = FlutterDll::get_for(None)?;
    let exe_dir = std::env::current_exe()
        .context("Failed to get current exe path")?
        .parent()
        .map(std::path::Path::to_path_buf)
        .ok_or_else(|| anyhow!("Exe has no parent directory"))?;
    let paths = path_utils::flutter_paths_from(&exe_dir)?;
    let engine = flutter_utils::create_flutter_engine(&dll, &paths)?;
    let messenger = unsafe { (dll.FlutterDesktopEngineGetMessenger)(engine) };

    // --- 2) View controller; from here on it owns the engine ---
    let controller = flutter_utils::create_flutter_view_controller(
        &dll,
        engine,
        config.window_width,
        config.window_height,
    )?;
    let mut state = Box::new(AppState {
        controller,
        child_hwnd: HWND::default(),
        dll: Arc::clone(&dll),
        channels: None,
    });
    state.child_hwnd = flutter_utils::get_flutter_view_hwnd(&dll, controller)?;

    // --- 3) Method channels ---
    let dispatcher = Arc::new(handlers::default_dispatcher(config));
    state.channels = Some(ChannelHost::install(&dll, messenger, dispatcher)?);

    // --- 4) Embed the Flutter child HWND into our Win32 window ---
    win32_utils::register_window_class()?;
    let child = state.child_hwnd;
    let parent = win32_utils::create_main_window(state, config)?;
    win32_utils::set_flutter_window_as_child(parent, child);

    // --- 5) Show & focus, then pump messages until WM_QUIT ---
    unsafe {
        let _ = ShowWindow(parent, SW_SHOWNORMAL);
        let _ = SetForegroundWindow(parent);
    }
    info!("[Runner] Main window shown");
    win32_utils::run_message_loop(parent);
    Ok(())
}
