#![no_main]

use dockscan_core::config::DockscanConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(toml_str) = std::str::from_utf8(data) {
        if let Ok(config) = DockscanConfig::parse(toml_str) {
            let _ = config.validate();
        }
    }
});
