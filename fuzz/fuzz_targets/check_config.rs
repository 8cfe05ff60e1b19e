#![no_main]

use libfuzzer_sys::fuzz_target;
use perfdelta::check::{CheckConfig, MethodRegistry};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing and validation report errors, never panic
        if let Ok(config) = CheckConfig::from_toml_str(input) {
            let _ = config.validate(&MethodRegistry::builtin());
        }
    }
});
