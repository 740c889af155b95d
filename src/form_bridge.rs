//! Forwards form save/load calls to the native form component.
//!
//! Each call loads the module, resolves one entry point, invokes it and copies
//! the returned string before giving it back to the module's allocator. The
//! module is dropped (unloaded) before the call returns, whatever the outcome.

use std::ffi::{c_char, CString};

use log::{info, warn};
use serde::Deserialize;

use crate::{
    constants::{EMPTY_FORM_LIST, GET_FORM_DATA_SYMBOL, SAVE_FORM_DATA_SYMBOL},
    error::BridgeError,
    method_channel::EncodableValue,
    native_module::{FormModule, ModuleLoader},
    owned_string::OwnedNativeString,
};

/// One submitted form. Missing or non-string fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormRecord {
    pub name: String,
    pub full_name: String,
    pub location: String,
    pub date_of_birth: String,
}

impl FormRecord {
    /// Extracts the four fields from an argument map.
    ///
    /// Only a non-map argument is an error; absent fields become empty.
    pub fn from_arguments(arguments: &EncodableValue) -> Result<Self, BridgeError> {
        if arguments.as_map().is_none() {
            return Err(BridgeError::InvalidArguments(
                "expected a map of form fields".to_string(),
            ));
        }
        let field = |key: &str| {
            arguments
                .lookup(key)
                .and_then(EncodableValue::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Ok(Self {
            name: field("name"),
            full_name: field("fullName"),
            location: field("location"),
            date_of_birth: field("dateOfBirth"),
        })
    }

    fn to_c_strings(&self) -> Result<[CString; 4], BridgeError> {
        let c = |field: &str, value: &str| {
            CString::new(value).map_err(|_| {
                BridgeError::InvalidArguments(format!("{} contains a NUL character", field))
            })
        };
        Ok([
            c("name", &self.name)?,
            c("fullName", &self.full_name)?,
            c("location", &self.location)?,
            c("dateOfBirth", &self.date_of_birth)?,
        ])
    }
}

/// The JSON reply shape of the form component. Only used for logging.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct OperationResponse {
    success: bool,
    message: Option<String>,
    error: Option<String>,
    data: Option<Vec<serde_json::Value>>,
}

pub struct FormBridge<L> {
    loader: L,
    library: String,
}

impl<L: ModuleLoader> FormBridge<L> {
    pub fn new(loader: L, library: impl Into<String>) -> Self {
        Self {
            loader,
            library: library.into(),
        }
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    /// Calls `SaveFormData` and returns its JSON reply.
    pub fn save_form(&self, record: &FormRecord) -> Result<String, BridgeError> {
        let [name, full_name, location, date_of_birth] = record.to_c_strings()?;
        info!("[FormBridge] Saving form for '{}'", record.name);

        self.call(SAVE_FORM_DATA_SYMBOL, |module| {
            let save = module.save_form_data()?;
            Ok(unsafe {
                save(
                    name.as_ptr(),
                    full_name.as_ptr(),
                    location.as_ptr(),
                    date_of_birth.as_ptr(),
                )
            })
        })?
        .ok_or_else(|| BridgeError::CallError {
            symbol: SAVE_FORM_DATA_SYMBOL.to_string(),
        })
    }

    /// Calls `GetFormData` and returns its JSON reply; no reply means no records.
    pub fn load_forms(&self) -> Result<String, BridgeError> {
        let reply = self.call(GET_FORM_DATA_SYMBOL, |module| {
            let get = module.get_form_data()?;
            Ok(unsafe { get() })
        })?;
        Ok(reply.unwrap_or_else(|| {
            info!("[FormBridge] {} returned nothing", GET_FORM_DATA_SYMBOL);
            EMPTY_FORM_LIST.to_string()
        }))
    }

    /// Loads the module, runs `invoke`, and takes ownership of the returned
    /// string. `Ok(None)` means the entry point returned null.
    fn call<F>(&self, symbol: &str, invoke: F) -> Result<Option<String>, BridgeError>
    where
        F: FnOnce(&dyn FormModule) -> Result<*mut c_char, BridgeError>,
    {
        let module = self.loader.load(&self.library)?;
        let raw = invoke(module.as_ref())?;
        let reply = unsafe { OwnedNativeString::from_raw(raw, module.string_deallocator()) };
        let text = reply.map(|owned| owned.to_string_lossy());
        if let Some(text) = &text {
            log_reply(symbol, text);
        }
        Ok(text)
    }
}

fn log_reply(symbol: &str, text: &str) {
    match serde_json::from_str::<OperationResponse>(text) {
        Ok(reply) if reply.success => info!(
            "[FormBridge] {} succeeded: {} ({} records)",
            symbol,
            reply.message.as_deref().unwrap_or(""),
            reply.data.as_ref().map_or(0, Vec::len)
        ),
        Ok(reply) => warn!(
            "[FormBridge] {} reported failure: {}",
            symbol,
            reply.error.as_deref().unwrap_or("no error text")
        ),
        Err(e) => warn!("[FormBridge] {} reply is not an operation response: {}", symbol, e),
    }
}
