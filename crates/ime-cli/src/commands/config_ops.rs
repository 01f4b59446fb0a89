use std::fs;
use std::process;

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            process::exit(1);
        })
    };
}

pub fn settings_export() {
    print!("{}", ime_core::settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(
        ime_core::settings::parse_settings_toml(&content),
        "Error: {}"
    );
    println!(
        "OK: dispatch.ui_thread_name={:?}, dispatch.ime_thread_name={:?}, \
         reads.cached_fallback_on_ui_thread={}, accent.combine_dead_keys={}",
        s.dispatch.ui_thread_name,
        s.dispatch.ime_thread_name,
        s.reads.cached_fallback_on_ui_thread,
        s.accent.combine_dead_keys
    );
}
