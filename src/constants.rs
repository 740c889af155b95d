#[cfg(target_os = "windows")]
use windows::core::{w, PCWSTR};

/// The Win32 window class name used to register and create the main window.
#[cfg(target_os = "windows")]
pub const WINDOW_CLASS_NAME: PCWSTR = w!("FLUTTER_FORM_RUNNER_WINDOW");

/// Default width (in pixels) for the main application window.
pub const DEFAULT_WINDOW_WIDTH: i32 = 1280;

/// Default height (in pixels) for the main application window.
pub const DEFAULT_WINDOW_HEIGHT: i32 = 720;

/// Title text for the main application window.
pub const DEFAULT_WINDOW_TITLE: &str = "my_app";

/// Prefix shared by both method channels.
pub const DEFAULT_CHANNEL_PREFIX: &str = "com.example.my_app";

pub const SYSTEM_INFO_CHANNEL: &str = "system_info";
pub const FORM_HANDLER_CHANNEL: &str = "form_handler";

pub const METHOD_GET_PROCESSOR_INFO: &str = "getProcessorInfo";
pub const METHOD_SAVE_FORM_DATA: &str = "saveFormData";
pub const METHOD_GET_FORM_DATA: &str = "getFormData";

/// Base name of the C# form component; the platform prefix/suffix is added at runtime.
pub const FORM_LIBRARY_STEM: &str = "CSharpFormSaver";

pub const SAVE_FORM_DATA_SYMBOL: &str = "SaveFormData";
pub const GET_FORM_DATA_SYMBOL: &str = "GetFormData";

/// Registry location of the processor brand string.
pub const PROCESSOR_REGISTRY_KEY: &str = r"HARDWARE\DESCRIPTION\System\CentralProcessor\0";
pub const PROCESSOR_REGISTRY_VALUE: &str = "ProcessorNameString";

/// Capacity (in UTF-16 code units, including the terminator) of the processor name buffer.
pub const PROCESSOR_NAME_CAPACITY: usize = 64;

pub const UNKNOWN_PROCESSOR: &str = "Unknown Processor";

/// Returned by `getFormData` when the module hands back no string at all.
pub const EMPTY_FORM_LIST: &str = "[]";

/// Optional JSON configuration file looked up beside the executable.
pub const CONFIG_FILE_NAME: &str = "runner_config.json";

pub const ENV_FORM_LIBRARY: &str = "FORM_RUNNER_LIBRARY";
pub const ENV_CHANNEL_PREFIX: &str = "FORM_RUNNER_CHANNEL_PREFIX";

/// Default `env_logger` filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "debug";

/// arguments passed to the Dart entrypoint.
/// b"--verbose-logging\0", as example var
pub const DART_ENTRYPOINT_ARGS: &[&[u8]] = &[];
