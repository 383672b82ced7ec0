use std::process;

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            process::exit(1);
        })
    };
}

pub mod config_ops;
pub mod predict_ops;
pub mod simulate_ops;

fn load_settings(file: Option<&str>) -> scan_core::settings::Settings {
    match file {
        Some(path) => {
            let content = die!(std::fs::read_to_string(path), "Error reading {path}: {}");
            die!(
                scan_core::settings::parse_settings_toml(&content),
                "Error: {}"
            )
        }
        None => scan_core::settings::Settings::default(),
    }
}
