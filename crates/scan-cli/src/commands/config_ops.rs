use std::fs;
use std::process;

pub fn settings_export() {
    print!("{}", scan_core::settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(
        scan_core::settings::parse_settings_toml(&content),
        "Error: {}"
    );
    let keys: usize = s.keyboard.rows.iter().map(Vec::len).sum();
    println!(
        "OK: scan.dwell_ms={}, scan.repeat_scan_count={}, keyboard={} rows/{} keys, keyboards={}, actions={}",
        s.scan.dwell_ms,
        s.scan.repeat_scan_count,
        s.keyboard.rows.len(),
        keys,
        1 + s.keyboards.len(),
        s.actions.column.len()
    );
}
