//! Error taxonomy for the native form bridge.

use std::path::PathBuf;

pub const DLL_ERROR: &str = "DLL_ERROR";
pub const FUNCTION_NOT_FOUND: &str = "FUNCTION_NOT_FOUND";
pub const INVALID_ARGS: &str = "INVALID_ARGS";
pub const CALL_ERROR: &str = "CALL_ERROR";
pub const UNEXPECTED_ERROR: &str = "UNEXPECTED_ERROR";
pub const BAD_MESSAGE: &str = "BAD_MESSAGE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The library could not be loaded from any search location.
    ModuleLoad {
        library: String,
        attempted: Vec<PathBuf>,
        /// OS error code of the last attempt, when the platform reports one.
        os_error: Option<i32>,
        detail: String,
    },
    /// The library loaded but does not export the requested symbol.
    EntryPointNotFound { symbol: String },
    /// The argument bag does not have the shape the method needs.
    InvalidArguments(String),
    /// The native call produced no result.
    CallError { symbol: String },
}

impl BridgeError {
    /// Channel error code reported to the UI layer.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::ModuleLoad { .. } => DLL_ERROR,
            BridgeError::EntryPointNotFound { .. } => FUNCTION_NOT_FOUND,
            BridgeError::InvalidArguments(_) => INVALID_ARGS,
            BridgeError::CallError { .. } => CALL_ERROR,
        }
    }
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::ModuleLoad {
                library,
                os_error: Some(code),
                ..
            } => write!(f, "Failed to load {} (error code {})", library, code),
            BridgeError::ModuleLoad {
                library, detail, ..
            } => write!(f, "Failed to load {}: {}", library, detail),
            BridgeError::EntryPointNotFound { symbol } => {
                write!(f, "Entry point {} not found in native module", symbol)
            }
            BridgeError::InvalidArguments(reason) => write!(f, "Invalid arguments: {}", reason),
            BridgeError::CallError { symbol } => write!(f, "{} returned no result", symbol),
        }
    }
}

impl std::error::Error for BridgeError {}
