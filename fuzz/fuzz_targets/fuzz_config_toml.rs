//! Fuzz target for bridge configuration loading.
//!
//! Arbitrary TOML must either load and validate or be rejected with an
//! error; accepted configs must survive a write/read cycle.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nb_config::{validate_config, BridgeConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = BridgeConfig::from_toml_str(s) {
        let _ = validate_config(&config);
        if let Ok(written) = config.to_toml_string() {
            assert!(BridgeConfig::from_toml_str(&written).is_ok());
        }
    }
});
