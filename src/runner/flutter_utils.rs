use std::{ffi::c_char, mem, ptr};

use anyhow::{bail, Result};
use log::{error, info};
use windows::Win32::Foundation::HWND;

use super::{
    flutter_api::{
        FlutterDesktopEngineProperties, FlutterDesktopEngineRef, FlutterDesktopViewControllerRef,
    },
    flutter_windows_dll::FlutterDll,
    path_utils::FlutterPaths,
};
use crate::constants;

/// Creates the engine (no Dart VM yet) from the bundled assets.
pub fn create_flutter_engine(dll: &FlutterDll, paths: &FlutterPaths) -> Result<FlutterDesktopEngineRef> {
    let args_ptrs: Vec<*const c_char> = constants::DART_ENTRYPOINT_ARGS
        .iter()
        .map(|arg| arg.as_ptr() as *const c_char)
        .collect();

    let props = FlutterDesktopEngineProperties {
        assets_path: paths.assets.as_ptr(),
        icu_data_path: paths.icu_data.as_ptr(),
        aot_library_path: paths
            .aot_library
            .as_ref()
            .map_or(ptr::null(), |p| p.as_ptr()),
        dart_entrypoint: ptr::null(),
        dart_entrypoint_argc: args_ptrs.len() as i32,
        dart_entrypoint_argv: if args_ptrs.is_empty() {
            ptr::null_mut()
        } else {
            args_ptrs.as_ptr() as *mut *const c_char
        },
        ..unsafe { mem::zeroed() }
    };

    info!("[Flutter Utils] Initializing Flutter engine");
    let engine = unsafe { (dll.FlutterDesktopEngineCreate)(&props) };
    if engine.is_null() {
        error!("[Flutter Utils] Engine creation failed");
        bail!("FlutterDesktopEngineCreate failed");
    }
    info!("[Flutter Utils] Engine created");
    Ok(engine)
}

/// Creates a view controller, which takes ownership of `engine`.
/// On failure the engine is destroyed here.
pub fn create_flutter_view_controller(
    dll: &FlutterDll,
    engine: FlutterDesktopEngineRef,
    width: i32,
    height: i32,
) -> Result<FlutterDesktopViewControllerRef> {
    info!("[Flutter Utils] Creating view controller ({}×{})", width, height);
    let controller = unsafe { (dll.FlutterDesktopViewControllerCreate)(width, height, engine) };
    if controller.is_null() {
        error!("[Flutter Utils] View controller creation failed");
        unsafe { (dll.FlutterDesktopEngineDestroy)(engine) };
        bail!("FlutterDesktopViewControllerCreate failed");
    }
    Ok(controller)
}

/// The HWND Flutter renders into.
pub fn get_flutter_view_hwnd(
    dll: &FlutterDll,
    controller: FlutterDesktopViewControllerRef,
) -> Result<HWND> {
    let view = unsafe { (dll.FlutterDesktopViewControllerGetView)(controller) };
    if view.is_null() {
        bail!("FlutterDesktopViewControllerGetView failed");
    }
    let raw = unsafe { (dll.FlutterDesktopViewGetHWND)(view) };
    if raw.is_null() {
        bail!("FlutterDesktopViewGetHWND failed");
    }
    let hwnd = HWND(raw);
    info!("[Flutter Utils] Flutter child HWND = {:?}", hwnd);
    Ok(hwnd)
}
