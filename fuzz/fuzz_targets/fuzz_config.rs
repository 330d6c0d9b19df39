//! Fuzz target for TOML configuration parsing.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use mb_core::config::EngineConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = EngineConfig::from_toml(text, Path::new("fuzz.toml")) {
        let _ = config.validate();
        let _ = config.engine_settings();
    }
});
