use std::fs;
use std::path::Path;
use std::process;

use crate::script::{load_script, run_script, Report};

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            process::exit(1);
        })
    };
}

/// Install custom settings before the bridge reads them.
pub fn load_settings(file: Option<&str>) {
    if let Some(file) = file {
        let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
        die!(ime_core::settings::init_custom(content), "Error: {}");
    }
}

pub fn run(script_file: &str, json: bool) {
    let script = die!(load_script(Path::new(script_file)), "Error: {}");
    let report = die!(
        run_script(script, ime_core::settings::settings()),
        "Error running {script_file}: {}"
    );
    if json {
        let out = die!(serde_json::to_string_pretty(&report), "Error: {}");
        println!("{out}");
    } else {
        print_report(&report);
    }
}

fn print_report(report: &Report) {
    println!("--- steps ---");
    for (i, step) in report.steps.iter().enumerate() {
        println!("{i:>3}  {:<42} {}", step.op, step.outcome);
    }

    println!("--- editor calls ---");
    for call in &report.calls {
        match serde_json::to_string(call) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    println!("--- selection updates ---");
    for update in &report.selections {
        match update.composition {
            Some(comp) => println!("sel{} comp{}", update.selection, comp),
            None => println!("sel{}", update.selection),
        }
    }

    println!("--- final state ---");
    match &report.final_state {
        Some(state) => println!("{state}"),
        None => println!("(none)"),
    }
}
