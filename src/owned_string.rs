//! Strings handed across the boundary by the native module.
//!
//! The module allocates the reply, the runner copies it and must then give
//! the allocation back to the allocator it came from, exactly once.

use std::{
    ffi::{c_char, c_void, CStr},
    fmt,
    ptr::NonNull,
};

/// Releases one allocation made by the native module.
pub type StringDeallocator = unsafe fn(*mut c_void);

/// A NUL-terminated string owned by this side, released on drop.
pub struct OwnedNativeString {
    ptr: NonNull<c_char>,
    dealloc: StringDeallocator,
}

impl OwnedNativeString {
    /// Takes ownership of `ptr`. Returns `None` for a null pointer.
    ///
    /// # Safety
    /// `ptr` must be null or point to a NUL-terminated string that `dealloc`
    /// can release, and nobody else may release it afterwards.
    pub unsafe fn from_raw(ptr: *mut c_char, dealloc: StringDeallocator) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, dealloc })
    }

    pub fn as_c_str(&self) -> &CStr {
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
    }

    /// Copies the contents out, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> String {
        self.as_c_str().to_string_lossy().into_owned()
    }
}

impl Drop for OwnedNativeString {
    fn drop(&mut self) {
        unsafe { (self.dealloc)(self.ptr.as_ptr().cast()) };
    }
}

impl fmt::Debug for OwnedNativeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnedNativeString")
            .field(&self.as_c_str())
            .finish()
    }
}

/// Frees memory from the COM task allocator, which is what
/// `Marshal.StringToCoTaskMemUTF8` uses on Windows.
///
/// # Safety
/// `ptr` must come from `CoTaskMemAlloc` and not be freed twice.
#[cfg(target_os = "windows")]
pub unsafe fn free_task_memory(ptr: *mut c_void) {
    unsafe { windows::Win32::System::Com::CoTaskMemFree(Some(ptr as *const c_void)) };
}

#[cfg(not(target_os = "windows"))]
unsafe extern "C" {
    fn free(ptr: *mut c_void);
}

/// Outside Windows the .NET task allocator is the C heap.
///
/// # Safety
/// `ptr` must come from `malloc` and not be freed twice.
#[cfg(not(target_os = "windows"))]
pub unsafe fn free_task_memory(ptr: *mut c_void) {
    unsafe { free(ptr) };
}
