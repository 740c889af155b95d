use anyhow::{anyhow, Context, Result};
use libloading::{Library, Symbol};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    ffi::{c_char, c_int, c_void},
    path::{Path, PathBuf},
    sync::Arc,
};

use super::flutter_api as f;

const FLUTTER_WINDOWS_DLL: &str = "flutter_windows.dll";

/// `flutter_windows.dll`, loaded at runtime, with the entry points the runner calls.
#[allow(non_snake_case)]
#[derive(Debug)]
pub struct FlutterDll {
    _lib: &'static Library,

    pub FlutterDesktopEngineCreate: Symbol<
        'static,
        unsafe extern "C" fn(*const f::FlutterDesktopEngineProperties) -> f::FlutterDesktopEngineRef,
    >,
    pub FlutterDesktopEngineDestroy:
        Symbol<'static, unsafe extern "C" fn(f::FlutterDesktopEngineRef) -> bool>,
    pub FlutterDesktopEngineGetMessenger: Symbol<
        'static,
        unsafe extern "C" fn(f::FlutterDesktopEngineRef) -> f::FlutterDesktopMessengerRef,
    >,
    pub FlutterDesktopEngineReloadSystemFonts:
        Symbol<'static, unsafe extern "C" fn(f::FlutterDesktopEngineRef)>,
    pub FlutterDesktopMessengerSetCallback: Symbol<
        'static,
        unsafe extern "C" fn(
            f::FlutterDesktopMessengerRef,
            *const c_char,
            f::FlutterDesktopMessageCallback,
            *mut c_void,
        ),
    >,
    pub FlutterDesktopMessengerSendResponse: Symbol<
        'static,
        unsafe extern "C" fn(
            f::FlutterDesktopMessengerRef,
            *const f::FlutterDesktopMessageResponseHandle,
            *const u8,
            usize,
        ),
    >,
    pub FlutterDesktopViewControllerCreate: Symbol<
        'static,
        unsafe extern "C" fn(
            c_int,
            c_int,
            f::FlutterDesktopEngineRef,
        ) -> f::FlutterDesktopViewControllerRef,
    >,
    pub FlutterDesktopViewControllerDestroy:
        Symbol<'static, unsafe extern "C" fn(f::FlutterDesktopViewControllerRef)>,
    pub FlutterDesktopViewControllerGetEngine: Symbol<
        'static,
        unsafe extern "C" fn(f::FlutterDesktopViewControllerRef) -> f::FlutterDesktopEngineRef,
    >,
    pub FlutterDesktopViewControllerGetView: Symbol<
        'static,
        unsafe extern "C" fn(f::FlutterDesktopViewControllerRef) -> f::FlutterDesktopViewRef,
    >,
    pub FlutterDesktopViewControllerHandleTopLevelWindowProc: Symbol<
        'static,
        unsafe extern "C" fn(
            f::FlutterDesktopViewControllerRef,
            f::HWND,
            f::UINT,
            f::WPARAM,
            f::LPARAM,
            *mut f::LRESULT,
        ) -> bool,
    >,
    pub FlutterDesktopViewGetHWND:
        Symbol<'static, unsafe extern "C" fn(f::FlutterDesktopViewRef) -> f::HWND>,
}

// The engine API is only called from the platform thread; the table itself is immutable.
unsafe impl Send for FlutterDll {}
unsafe impl Sync for FlutterDll {}

static DLL_CACHE: Lazy<Mutex<HashMap<PathBuf, Arc<FlutterDll>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn symbol<T>(lib: &'static Library, name: &str) -> Result<Symbol<'static, T>> {
    unsafe { lib.get::<T>(name.as_bytes()) }.with_context(|| format!("Missing symbol: {}", name))
}

fn exe_directory() -> Result<PathBuf> {
    std::env::current_exe()
        .context("Failed to get current exe path")?
        .parent()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("Exe has no parent directory"))
}

impl FlutterDll {
    /// Loads `flutter_windows.dll` from `dir`, or from the executable's directory.
    ///
    /// The library stays loaded for the life of the process.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let dll_dir = match dir {
            Some(d) => d.to_path_buf(),
            None => exe_directory()?,
        };

        let dll_path = dll_dir.join(FLUTTER_WINDOWS_DLL);
        let lib = unsafe { Library::new(&dll_path) }
            .with_context(|| format!("Failed to load {}", dll_path.display()))?;

        let lib_static: &'static Library = Box::leak(Box::new(lib));

        Ok(FlutterDll {
            _lib: lib_static,
            FlutterDesktopEngineCreate: symbol(lib_static, "FlutterDesktopEngineCreate")?,
            FlutterDesktopEngineDestroy: symbol(lib_static, "FlutterDesktopEngineDestroy")?,
            FlutterDesktopEngineGetMessenger: symbol(
                lib_static,
                "FlutterDesktopEngineGetMessenger",
            )?,
            FlutterDesktopEngineReloadSystemFonts: symbol(
                lib_static,
                "FlutterDesktopEngineReloadSystemFonts",
            )?,
            FlutterDesktopMessengerSetCallback: symbol(
                lib_static,
                "FlutterDesktopMessengerSetCallback",
            )?,
            FlutterDesktopMessengerSendResponse: symbol(
                lib_static,
                "FlutterDesktopMessengerSendResponse",
            )?,
            FlutterDesktopViewControllerCreate: symbol(
                lib_static,
                "FlutterDesktopViewControllerCreate",
            )?,
            FlutterDesktopViewControllerDestroy: symbol(
                lib_static,
                "FlutterDesktopViewControllerDestroy",
            )?,
            FlutterDesktopViewControllerGetEngine: symbol(
                lib_static,
                "FlutterDesktopViewControllerGetEngine",
            )?,
            FlutterDesktopViewControllerGetView: symbol(
                lib_static,
                "FlutterDesktopViewControllerGetView",
            )?,
            FlutterDesktopViewControllerHandleTopLevelWindowProc: symbol(
                lib_static,
                "FlutterDesktopViewControllerHandleTopLevelWindowProc",
            )?,
            FlutterDesktopViewGetHWND: symbol(lib_static, "FlutterDesktopViewGetHWND")?,
        })
    }

    /// Cached per directory, so reopening a window reuses the same library.
    pub fn get_for(dir: Option<&Path>) -> Result<Arc<Self>> {
        let key = match dir {
            Some(d) => d.to_path_buf(),
            None => exe_directory()?,
        };

        let mut cache = DLL_CACHE.lock();
        if let Some(existing) = cache.get(&key) {
            return Ok(existing.clone());
        }

        let dll = Arc::new(FlutterDll::load(Some(&key))?);
        cache.insert(key, dll.clone());
        Ok(dll)
    }
}
