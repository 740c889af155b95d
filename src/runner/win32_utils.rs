//! Win32 helper functions for registering/creating the main window,
//! embedding the Flutter child HWND (as a real child window), and
//! running the message loop.
//!
//! ## Handled Messages
//!
//! Every message is first offered to Flutter through
//! `FlutterDesktopViewControllerHandleTopLevelWindowProc`. If Flutter does not
//! consume it:
//!
//! - **WM_NCCREATE**: Capture and store our `AppState` pointer.
//! - **WM_FONTCHANGE**: Ask the engine to reload system fonts.
//! - **WM_SIZE**: Resize the Flutter child to fill our client area.
//! - **WM_ACTIVATE** / **WM_SETFOCUS**: Forward keyboard focus to the Flutter child.
//! - **WM_CLOSE**: Invoke `DestroyWindow`, triggering cleanup.
//! - **WM_DESTROY**: Drop `AppState` and post `WM_QUIT`.
//! - **All others**: `DefWindowProcW`.

use std::ffi::{c_void, OsStr};

use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};
use once_cell::sync::OnceCell;
use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::{GetLastError, HINSTANCE, HWND, LPARAM, LRESULT, RECT, WPARAM},
        Graphics::Gdi::HBRUSH,
        System::LibraryLoader::GetModuleHandleW,
        UI::WindowsAndMessaging::{
            CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect,
            GetMessageW, GetWindowLongPtrW, LoadCursorW, MoveWindow, PostQuitMessage,
            RegisterClassW, SetParent, SetWindowLongPtrW, TranslateMessage, CREATESTRUCTW,
            CS_HREDRAW, CS_VREDRAW, CW_USEDEFAULT, GWLP_USERDATA, GWL_STYLE, IDC_ARROW, MSG,
            WINDOW_EX_STYLE, WM_ACTIVATE, WM_CLOSE, WM_DESTROY, WM_FONTCHANGE, WM_NCCREATE,
            WM_SETFOCUS, WM_SIZE, WNDCLASSW, WS_CHILD, WS_CLIPCHILDREN, WS_OVERLAPPEDWINDOW,
            WS_POPUP, WS_VISIBLE,
        },
    },
};

use super::{app_state::AppState, flutter_api::LRESULT as RawLRESULT, path_utils::to_wide};
use crate::{config::RunnerConfig, constants};

#[link(name = "user32")]
unsafe extern "system" {
    /// Forward keyboard focus to a child HWND.
    fn SetFocus(hWnd: HWND) -> HWND;
}

/// Our window proc.
///
/// # Safety
/// - Must be registered via `WNDCLASSW::lpfnWndProc`.
/// - Assumes `lpCreateParams` in `WM_NCCREATE` is a valid `*mut AppState`.
pub unsafe extern "system" fn wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe {
        if msg == WM_NCCREATE {
            if let Some(cs) = (lparam.0 as *const CREATESTRUCTW).as_ref() {
                debug!("[WndProc] Storing AppState ptr {:?}", cs.lpCreateParams);
                SetWindowLongPtrW(hwnd, GWLP_USERDATA, cs.lpCreateParams as isize);
            } else {
                warn!("[WndProc] CREATESTRUCTW was null");
            }
            return DefWindowProcW(hwnd, msg, wparam, lparam);
        }

        let state_ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *mut AppState;

        // Flutter gets the first look at every top-level message.
        if let Some(state) = state_ptr.as_ref() {
            let mut out: RawLRESULT = 0;
            let handled = (state.dll.FlutterDesktopViewControllerHandleTopLevelWindowProc)(
                state.controller,
                hwnd.0,
                msg,
                wparam.0,
                lparam.0,
                &mut out,
            );
            if handled {
                return LRESULT(out);
            }
        }

        match msg {
            WM_FONTCHANGE => {
                if let Some(state) = state_ptr.as_ref() {
                    let engine = (state.dll.FlutterDesktopViewControllerGetEngine)(state.controller);
                    (state.dll.FlutterDesktopEngineReloadSystemFonts)(engine);
                    debug!("[WndProc] System fonts reloaded");
                }
                DefWindowProcW(hwnd, msg, wparam, lparam)
            }

            WM_SIZE => {
                if let Some(state) = state_ptr.as_ref() {
                    resize_child_to_client(hwnd, state.child_hwnd);
                }
                LRESULT(0)
            }

            WM_ACTIVATE | WM_SETFOCUS => {
                if let Some(state) = state_ptr.as_ref() {
                    SetFocus(state.child_hwnd);
                }
                LRESULT(0)
            }

            WM_CLOSE => {
                info!("[WndProc] WM_CLOSE → DestroyWindow");
                if let Err(e) = DestroyWindow(hwnd) {
                    error!("[WndProc] DestroyWindow failed: {:?}", e);
                }
                LRESULT(0)
            }

            WM_DESTROY => {
                info!("[WndProc] WM_DESTROY");
                if !state_ptr.is_null() {
                    SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
                    drop(Box::from_raw(state_ptr));
                }
                PostQuitMessage(0);
                LRESULT(0)
            }

            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}

fn resize_child_to_client(parent: HWND, child: HWND) {
    let mut rc = RECT::default();
    if unsafe { GetClientRect(parent, &mut rc) }.is_ok() {
        let w = rc.right - rc.left;
        let h = rc.bottom - rc.top;
        debug!("[Win32 Utils] Resizing child {:?} to {}×{}", child, w, h);
        if let Err(e) = unsafe { MoveWindow(child, 0, 0, w, h, true) } {
            warn!("[Win32 Utils] MoveWindow failed: {:?}", e);
        }
    }
}

static WINDOW_CLASS: OnceCell<u16> = OnceCell::new();

/// Registers our window class (once). Must be called before `create_main_window`.
pub fn register_window_class() -> Result<()> {
    WINDOW_CLASS.get_or_try_init(|| unsafe {
        let hinst = GetModuleHandleW(PCWSTR::null()).context("GetModuleHandleW failed")?;
        let wc = WNDCLASSW {
            hInstance: hinst.into(),
            lpszClassName: constants::WINDOW_CLASS_NAME,
            lpfnWndProc: Some(wnd_proc),
            style: CS_HREDRAW | CS_VREDRAW,
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            hbrBackground: HBRUSH::default(),
            ..Default::default()
        };
        let atom = RegisterClassW(&wc);
        if atom == 0 {
            bail!("RegisterClassW failed: {:?}", GetLastError());
        }
        info!("[Win32 Utils] Window class registered");
        Ok(atom)
    })?;
    Ok(())
}

/// Creates the main parent window. The window takes ownership of `state` and
/// drops it on `WM_DESTROY`; if creation fails it is dropped here.
pub fn create_main_window(state: Box<AppState>, config: &RunnerConfig) -> Result<HWND> {
    info!("[Win32 Utils] Creating main window");
    let title = to_wide(OsStr::new(&config.window_title));
    let state_ptr = Box::into_raw(state);

    let created = unsafe {
        let hinst: HINSTANCE = GetModuleHandleW(PCWSTR::null())
            .context("GetModuleHandleW failed")?
            .into();
        CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            constants::WINDOW_CLASS_NAME,
            PCWSTR(title.as_ptr()),
            WS_OVERLAPPEDWINDOW | WS_VISIBLE | WS_CLIPCHILDREN,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            config.window_width,
            config.window_height,
            None,
            None,
            Some(hinst),
            Some(state_ptr as *const c_void),
        )
    };

    match created {
        Ok(hwnd) => {
            info!("[Win32 Utils] Main window created: {:?}", hwnd);
            Ok(hwnd)
        }
        Err(e) => {
            error!("[Win32 Utils] CreateWindowExW failed: {:?}", e);
            unsafe { drop(Box::from_raw(state_ptr)) };
            Err(e).context("Could not create main window")
        }
    }
}

/// Embeds the Flutter `child` into `parent`: strips WS_POPUP, adds WS_CHILD,
/// re-parents and resizes it to fill the client area.
pub fn set_flutter_window_as_child(parent: HWND, child: HWND) {
    info!("[Win32 Utils] Embedding Flutter HWND {:?} into {:?}", child, parent);

    let old = unsafe { GetWindowLongPtrW(child, GWL_STYLE) };
    let new = (old & !(WS_POPUP.0 as isize | WS_OVERLAPPEDWINDOW.0 as isize))
        | WS_CHILD.0 as isize
        | WS_VISIBLE.0 as isize;
    unsafe { SetWindowLongPtrW(child, GWL_STYLE, new) };
    debug!("[Win32 Utils] Child style {:#x} → {:#x}", old, new);

    if let Err(e) = unsafe { SetParent(child, Some(parent)) } {
        warn!("[Win32 Utils] SetParent error: {:?}", e);
    }

    resize_child_to_client(parent, child);
}

/// Runs the Win32 message loop until `WM_QUIT`, then drops any leftover `AppState`.
pub fn run_message_loop(parent: HWND) {
    info!("[Win32 Utils] Entering message loop");
    let mut msg = MSG::default();
    unsafe {
        // GetMessageW returns -1 on error, 0 on WM_QUIT.
        while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    info!("[Win32 Utils] Exited message loop");

    let ptr = unsafe { GetWindowLongPtrW(parent, GWLP_USERDATA) as *mut AppState };
    if !ptr.is_null() {
        debug!("[Win32 Utils] Cleaning up AppState after loop");
        unsafe {
            SetWindowLongPtrW(parent, GWLP_USERDATA, 0);
            drop(Box::from_raw(ptr));
        }
    }
}
