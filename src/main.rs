#![cfg_attr(all(target_os = "windows", not(debug_assertions)), windows_subsystem = "windows")] // Console in debug, none in release

fn main() {
    if let Err(e) = flutter_form_runner::run() {
        log::error!("[Runner] {:#}", e);
        eprintln!("flutter_form_runner: {:#}", e);
        std::process::exit(1);
    }
}
