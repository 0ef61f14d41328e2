#![no_main]

use dockscan_scanner::parse_host_binds;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|binds: Vec<String>| {
    let mounts = parse_host_binds(&binds);
    assert!(mounts.len() <= binds.len());
    for mount in &mounts {
        assert!(mount.starts_with('/'));
    }
});
