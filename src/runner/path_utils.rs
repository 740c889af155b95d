//! Flutter bundle layout beside the executable:
//!
//! ```text
//! <exe_dir>/data/flutter_assets/
//! <exe_dir>/data/icudtl.dat
//! <exe_dir>/data/app.so        (release builds only)
//! ```
//!
//! Paths are returned as null-terminated UTF-16, ready for the engine properties.

use std::{
    ffi::OsStr,
    os::windows::ffi::OsStrExt,
    path::Path,
};

use anyhow::{bail, Result};
use log::{debug, info};

pub struct FlutterPaths {
    pub assets: Vec<u16>,
    pub icu_data: Vec<u16>,
    /// `None` when no AOT snapshot is bundled (debug builds run JIT).
    pub aot_library: Option<Vec<u16>>,
}

pub fn to_wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

pub fn flutter_paths_from(root_dir: &Path) -> Result<FlutterPaths> {
    let data_dir = root_dir.join("data");
    let assets_dir = data_dir.join("flutter_assets");
    let icu_file = data_dir.join("icudtl.dat");
    let aot_lib = data_dir.join("app.so");

    if !assets_dir.is_dir() {
        bail!("Missing `flutter_assets` at `{}`", assets_dir.display());
    }
    if !icu_file.is_file() {
        bail!("Missing `icudtl.dat` at `{}`", icu_file.display());
    }

    let aot_library = if aot_lib.is_file() {
        Some(to_wide(aot_lib.as_os_str()))
    } else {
        info!("[Path Utils] No AOT library at `{}`, running JIT", aot_lib.display());
        None
    };

    debug!(
        "[Path Utils] assets=`{}`, icu=`{}`",
        assets_dir.display(),
        icu_file.display()
    );

    Ok(FlutterPaths {
        assets: to_wide(assets_dir.as_os_str()),
        icu_data: to_wide(icu_file.as_os_str()),
        aot_library,
    })
}
