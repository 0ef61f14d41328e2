#![no_main]

use dockscan_scanner::decode_agent_output;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(result) = decode_agent_output("fuzz:latest", data) {
        assert_eq!(result.image, "fuzz:latest");
    }
});
