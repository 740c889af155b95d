//! The two channels exposed to the UI layer.
//!
//! - `<prefix>/system_info`: `getProcessorInfo`
//! - `<prefix>/form_handler`: `saveFormData`, `getFormData`

use std::sync::Arc;

use crate::{
    config::RunnerConfig,
    constants::{METHOD_GET_FORM_DATA, METHOD_GET_PROCESSOR_INFO, METHOD_SAVE_FORM_DATA},
    form_bridge::{FormBridge, FormRecord},
    method_channel::{MethodDispatcher, MethodResult},
    native_module::{LibraryLoader, ModuleLoader},
    system_info::{self, HostSystemInfo, SystemInfoSource},
};

/// Dispatcher wired to the host OS and the on-disk form component.
pub fn default_dispatcher(config: &RunnerConfig) -> MethodDispatcher {
    build_dispatcher(
        config,
        HostSystemInfo,
        FormBridge::new(LibraryLoader::new(), config.form_library.clone()),
    )
}

pub fn build_dispatcher<S, L>(
    config: &RunnerConfig,
    system_info_source: S,
    bridge: FormBridge<L>,
) -> MethodDispatcher
where
    S: SystemInfoSource + Send + Sync + 'static,
    L: ModuleLoader + Send + Sync + 'static,
{
    let mut dispatcher = MethodDispatcher::new();
    register_system_info(&mut dispatcher, &config.system_info_channel(), system_info_source);
    register_form_handler(&mut dispatcher, &config.form_handler_channel(), bridge);
    dispatcher
}

fn register_system_info<S>(dispatcher: &mut MethodDispatcher, channel: &str, source: S)
where
    S: SystemInfoSource + Send + Sync + 'static,
{
    dispatcher.register(channel, METHOD_GET_PROCESSOR_INFO, move |_| {
        MethodResult::success(system_info::describe(&source))
    });
}

fn register_form_handler<L>(dispatcher: &mut MethodDispatcher, channel: &str, bridge: FormBridge<L>)
where
    L: ModuleLoader + Send + Sync + 'static,
{
    let bridge = Arc::new(bridge);

    let save_bridge = Arc::clone(&bridge);
    dispatcher.register(channel, METHOD_SAVE_FORM_DATA, move |call| {
        FormRecord::from_arguments(&call.arguments)
            .and_then(|record| save_bridge.save_form(&record))
            .map_or_else(MethodResult::from, MethodResult::success)
    });

    dispatcher.register(channel, METHOD_GET_FORM_DATA, move |_| {
        bridge
            .load_forms()
            .map_or_else(MethodResult::from, MethodResult::success)
    });
}
