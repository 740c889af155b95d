//! Processor / OS description for the `getProcessorInfo` method.
//!
//! Best effort only: anything that cannot be read degrades to a placeholder,
//! the caller always gets a string.

use crate::constants::UNKNOWN_PROCESSOR;

/// OS facts the reader needs.
pub trait SystemInfoSource {
    /// Processor brand string, if readable.
    fn processor_name(&self) -> Option<String>;
    /// `(major, minor)` OS version, if readable.
    fn os_version(&self) -> Option<(u32, u32)>;
}

/// Reads from the running host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSystemInfo;

impl SystemInfoSource for HostSystemInfo {
    fn processor_name(&self) -> Option<String> {
        #[cfg(target_os = "windows")]
        {
            win32::read_processor_name()
        }
        #[cfg(not(target_os = "windows"))]
        {
            None
        }
    }

    fn os_version(&self) -> Option<(u32, u32)> {
        #[cfg(target_os = "windows")]
        {
            win32::read_os_version()
        }
        #[cfg(not(target_os = "windows"))]
        {
            None
        }
    }
}

/// `"<processor> on Windows <major>.<minor>"`
pub fn describe(source: &dyn SystemInfoSource) -> String {
    let processor = source
        .processor_name()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_PROCESSOR.to_string());
    // A failed version query leaves the version fields zeroed.
    let (major, minor) = source.os_version().unwrap_or((0, 0));
    format!("{} on Windows {}.{}", processor, major, minor)
}

#[cfg(target_os = "windows")]
mod win32 {
    use std::{ffi::OsStr, os::windows::ffi::OsStrExt};

    use log::debug;
    use windows::{
        core::PCWSTR,
        Win32::System::{
            Registry::{RegGetValueW, HKEY_LOCAL_MACHINE, REG_VALUE_TYPE, RRF_RT_REG_SZ},
            SystemInformation::{GetVersionExW, OSVERSIONINFOW},
        },
    };

    use crate::constants::{PROCESSOR_NAME_CAPACITY, PROCESSOR_REGISTRY_KEY, PROCESSOR_REGISTRY_VALUE};

    fn to_wide(s: &str) -> Vec<u16> {
        OsStr::new(s).encode_wide().chain(Some(0)).collect()
    }

    /// Reads `ProcessorNameString` into a fixed buffer; a value that does not
    /// fit is treated as unreadable.
    pub(super) fn read_processor_name() -> Option<String> {
        let key_path = to_wide(PROCESSOR_REGISTRY_KEY);
        let value_name = to_wide(PROCESSOR_REGISTRY_VALUE);

        let mut buf = [0u16; PROCESSOR_NAME_CAPACITY];
        let mut size = std::mem::size_of_val(&buf) as u32;
        let mut value_type = REG_VALUE_TYPE::default();
        // RRF_RT_REG_SZ rejects other value types and guarantees a terminator.
        let status = unsafe {
            RegGetValueW(
                HKEY_LOCAL_MACHINE,
                PCWSTR(key_path.as_ptr()),
                PCWSTR(value_name.as_ptr()),
                RRF_RT_REG_SZ,
                Some(&mut value_type),
                Some(buf.as_mut_ptr().cast()),
                Some(&mut size),
            )
        };
        if let Err(e) = status.ok() {
            debug!("[SystemInfo] RegGetValueW failed: {:?}", e);
            return None;
        }

        let units = (size as usize / 2).min(buf.len());
        let len = buf[..units].iter().position(|&c| c == 0).unwrap_or(units);
        Some(String::from_utf16_lossy(&buf[..len]))
    }

    pub(super) fn read_os_version() -> Option<(u32, u32)> {
        let mut info = OSVERSIONINFOW {
            dwOSVersionInfoSize: std::mem::size_of::<OSVERSIONINFOW>() as u32,
            ..Default::default()
        };
        if let Err(e) = unsafe { GetVersionExW(&mut info) } {
            debug!("[SystemInfo] GetVersionExW failed: {:?}", e);
            return None;
        }
        Some((info.dwMajorVersion, info.dwMinorVersion))
    }
}
