//! Runtime loading of the native form component.
//!
//! A library name is tried in order in:
//! 1. the process working directory,
//! 2. the directory of the running executable.
//!
//! The first successful load wins. The returned module owns the library and
//! unloads it when dropped, so a module obtained for one call is released on
//! every exit path of that call.

use std::{
    env,
    ffi::c_char,
    io,
    path::{Path, PathBuf},
};

use libloading::{Library, Symbol};
use log::{debug, info, warn};

use crate::{
    constants::{GET_FORM_DATA_SYMBOL, SAVE_FORM_DATA_SYMBOL},
    error::BridgeError,
    owned_string::{free_task_memory, StringDeallocator},
};

/// `SaveFormData(name, fullName, location, dateOfBirth) -> owned UTF-8 string`
pub type SaveFormDataFn = unsafe extern "C" fn(
    name: *const c_char,
    full_name: *const c_char,
    location: *const c_char,
    date_of_birth: *const c_char,
) -> *mut c_char;

/// `GetFormData() -> owned UTF-8 string`
pub type GetFormDataFn = unsafe extern "C" fn() -> *mut c_char;

/// Entry points the form bridge needs from a loaded module.
///
/// The function pointers handed out are only valid while the module is alive.
pub trait FormModule {
    fn save_form_data(&self) -> Result<SaveFormDataFn, BridgeError>;
    fn get_form_data(&self) -> Result<GetFormDataFn, BridgeError>;
    /// Deallocator matching the allocator the module returns strings from.
    fn string_deallocator(&self) -> StringDeallocator;
}

/// Something that can produce a [`FormModule`] for a library name.
pub trait ModuleLoader {
    fn load(&self, library: &str) -> Result<Box<dyn FormModule>, BridgeError>;
}

/// A dynamically loaded library.
#[derive(Debug)]
pub struct NativeModule {
    lib: Library,
    path: PathBuf,
}

impl NativeModule {
    pub fn open(path: &Path) -> Result<Self, libloading::Error> {
        let lib = unsafe { Library::new(path)? };
        Ok(Self {
            lib,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves `name` as a value of type `T`, usually a function pointer.
    ///
    /// The caller picks `T`; it must match the symbol's real signature.
    pub fn entry_point<T>(&self, name: &str) -> Result<Symbol<'_, T>, BridgeError> {
        unsafe { self.lib.get::<T>(name.as_bytes()) }.map_err(|e| {
            warn!(
                "[NativeModule] Missing symbol {} in {}: {}",
                name,
                self.path.display(),
                e
            );
            BridgeError::EntryPointNotFound {
                symbol: name.to_owned(),
            }
        })
    }
}

impl FormModule for NativeModule {
    fn save_form_data(&self) -> Result<SaveFormDataFn, BridgeError> {
        Ok(*self.entry_point::<SaveFormDataFn>(SAVE_FORM_DATA_SYMBOL)?)
    }

    fn get_form_data(&self) -> Result<GetFormDataFn, BridgeError> {
        Ok(*self.entry_point::<GetFormDataFn>(GET_FORM_DATA_SYMBOL)?)
    }

    fn string_deallocator(&self) -> StringDeallocator {
        free_task_memory
    }
}

impl Drop for NativeModule {
    fn drop(&mut self) {
        debug!("[NativeModule] Unloading {}", self.path.display());
    }
}

/// Where the loader looks for a library, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchLocation {
    WorkingDirectory,
    ExecutableDirectory,
    Directory(PathBuf),
}

impl SearchLocation {
    fn resolve(&self) -> Option<PathBuf> {
        match self {
            SearchLocation::WorkingDirectory => env::current_dir().ok(),
            SearchLocation::ExecutableDirectory => env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
            SearchLocation::Directory(dir) => Some(dir.clone()),
        }
    }
}

/// Loads libraries from disk via `libloading`.
#[derive(Debug, Clone)]
pub struct LibraryLoader {
    locations: Vec<SearchLocation>,
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self {
            locations: vec![
                SearchLocation::WorkingDirectory,
                SearchLocation::ExecutableDirectory,
            ],
        }
    }
}

impl LibraryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locations(locations: Vec<SearchLocation>) -> Self {
        Self { locations }
    }

    /// Candidate paths for `library`, in search order, without duplicates.
    /// An absolute name is used as is.
    pub fn candidates(&self, library: &str) -> Vec<PathBuf> {
        let name = Path::new(library);
        if name.is_absolute() {
            return vec![name.to_path_buf()];
        }
        let mut out: Vec<PathBuf> = Vec::with_capacity(self.locations.len());
        for location in &self.locations {
            match location.resolve() {
                Some(dir) => {
                    let candidate = dir.join(name);
                    if !out.contains(&candidate) {
                        out.push(candidate);
                    }
                }
                None => debug!("[NativeModule] Search location {:?} unavailable", location),
            }
        }
        out
    }
}

impl ModuleLoader for LibraryLoader {
    fn load(&self, library: &str) -> Result<Box<dyn FormModule>, BridgeError> {
        let attempted = self.candidates(library);
        let mut last_error: Option<libloading::Error> = None;

        for path in &attempted {
            match NativeModule::open(path) {
                Ok(module) => {
                    info!("[NativeModule] Loaded {}", path.display());
                    return Ok(Box::new(module));
                }
                Err(e) => {
                    debug!("[NativeModule] {} not loadable: {}", path.display(), e);
                    last_error = Some(e);
                }
            }
        }

        let (os_error, detail) = match &last_error {
            Some(e) => (os_error_code(e), e.to_string()),
            None => (None, "no search location available".to_string()),
        };
        warn!(
            "[NativeModule] Could not load {} from {:?} (os error {:?})",
            library, attempted, os_error
        );
        Err(BridgeError::ModuleLoad {
            library: library.to_owned(),
            attempted,
            os_error,
            detail,
        })
    }
}

/// OS error code behind a load failure, when the platform reports one.
fn os_error_code(err: &libloading::Error) -> Option<i32> {
    std::error::Error::source(err)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .and_then(io::Error::raw_os_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!(
            "flutter_form_runner_{}_{}",
            tag,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn candidates_follow_search_order_and_skip_duplicates() {
        let a = PathBuf::from("first");
        let b = PathBuf::from("second");
        let loader = LibraryLoader::with_locations(vec![
            SearchLocation::Directory(a.clone()),
            SearchLocation::Directory(b.clone()),
            SearchLocation::Directory(a.clone()),
        ]);
        assert_eq!(
            loader.candidates("CSharpFormSaver.dll"),
            vec![a.join("CSharpFormSaver.dll"), b.join("CSharpFormSaver.dll")]
        );
    }

    #[test]
    fn default_loader_searches_cwd_then_exe_dir() {
        let loader = LibraryLoader::new();
        let candidates = loader.candidates("x.dll");
        let cwd = env::current_dir().unwrap().join("x.dll");
        assert_eq!(candidates.first(), Some(&cwd));
        let exe_dir = env::current_exe().unwrap().parent().unwrap().join("x.dll");
        assert!(candidates.contains(&exe_dir));
    }

    #[test]
    fn absolute_name_is_the_only_candidate() {
        let abs = scratch_dir("abs").join("lib.dll");
        let loader = LibraryLoader::new();
        assert_eq!(loader.candidates(abs.to_str().unwrap()), vec![abs]);
    }

    #[test]
    fn missing_library_reports_every_attempt() {
        let first = scratch_dir("missing_a");
        let second = scratch_dir("missing_b");
        let loader = LibraryLoader::with_locations(vec![
            SearchLocation::Directory(first.clone()),
            SearchLocation::Directory(second.clone()),
        ]);

        let err = match loader.load("NoSuchFormSaver.dll") {
            Ok(_) => panic!("library should not load"),
            Err(e) => e,
        };
        match &err {
            BridgeError::ModuleLoad {
                library, attempted, ..
            } => {
                assert_eq!(library, "NoSuchFormSaver.dll");
                assert_eq!(
                    attempted,
                    &vec![
                        first.join("NoSuchFormSaver.dll"),
                        second.join("NoSuchFormSaver.dll")
                    ]
                );
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.code(), crate::error::DLL_ERROR);
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn missing_library_carries_windows_error_code() {
        let loader =
            LibraryLoader::with_locations(vec![SearchLocation::Directory(scratch_dir("win"))]);
        match loader.load("NoSuchFormSaver.dll") {
            Err(BridgeError::ModuleLoad { os_error, .. }) => {
                // ERROR_MOD_NOT_FOUND
                assert_eq!(os_error, Some(126));
            }
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("library should not load"),
        }
    }

    #[test]
    fn no_locations_is_a_load_error() {
        let loader = LibraryLoader::with_locations(vec![]);
        match loader.load("relative.dll") {
            Err(BridgeError::ModuleLoad {
                attempted, detail, ..
            }) => {
                assert!(attempted.is_empty());
                assert_eq!(detail, "no search location available");
            }
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("library should not load"),
        }
    }

    #[cfg(target_os = "windows")]
    const SYSTEM_LIBRARY: &str = "kernel32.dll";
    #[cfg(target_os = "windows")]
    const SYSTEM_EXPORT: &str = "GetTickCount";

    #[cfg(target_os = "linux")]
    const SYSTEM_LIBRARY: &str = "libc.so.6";
    #[cfg(target_os = "linux")]
    const SYSTEM_EXPORT: &str = "strlen";

    /// Hands out an OS library that is always present but is not a form component.
    #[cfg(any(target_os = "windows", target_os = "linux"))]
    struct SystemLibraryLoader;

    #[cfg(any(target_os = "windows", target_os = "linux"))]
    impl ModuleLoader for SystemLibraryLoader {
        fn load(&self, library: &str) -> Result<Box<dyn FormModule>, BridgeError> {
            NativeModule::open(Path::new(library))
                .map(|module| Box::new(module) as Box<dyn FormModule>)
                .map_err(|e| BridgeError::ModuleLoad {
                    library: library.to_owned(),
                    attempted: vec![PathBuf::from(library)],
                    os_error: None,
                    detail: e.to_string(),
                })
        }
    }

    #[cfg(any(target_os = "windows", target_os = "linux"))]
    #[test]
    fn real_library_without_form_exports_is_entry_point_not_found() {
        let module = NativeModule::open(Path::new(SYSTEM_LIBRARY)).unwrap();
        assert_eq!(module.path(), Path::new(SYSTEM_LIBRARY));

        let err = module.save_form_data().map(|_| ()).unwrap_err();
        assert_eq!(
            err,
            BridgeError::EntryPointNotFound {
                symbol: "SaveFormData".into()
            }
        );
        assert_eq!(err.code(), crate::error::FUNCTION_NOT_FOUND);

        match module.get_form_data() {
            Err(BridgeError::EntryPointNotFound { symbol }) => assert_eq!(symbol, "GetFormData"),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("{} should not export GetFormData", SYSTEM_LIBRARY),
        }
    }

    #[cfg(any(target_os = "windows", target_os = "linux"))]
    #[test]
    fn real_library_resolves_its_own_exports() {
        let module = NativeModule::open(Path::new(SYSTEM_LIBRARY)).unwrap();
        assert!(module.entry_point::<unsafe extern "C" fn()>(SYSTEM_EXPORT).is_ok());
    }

    #[cfg(any(target_os = "windows", target_os = "linux"))]
    #[test]
    fn bridge_over_real_library_reports_missing_symbol_not_load_failure() {
        let bridge = crate::form_bridge::FormBridge::new(SystemLibraryLoader, SYSTEM_LIBRARY);
        match bridge.load_forms() {
            Err(err) => {
                assert_eq!(err.code(), crate::error::FUNCTION_NOT_FOUND);
                assert_ne!(err.code(), crate::error::DLL_ERROR);
            }
            Ok(reply) => panic!("unexpected reply {:?}", reply),
        }
    }
}
