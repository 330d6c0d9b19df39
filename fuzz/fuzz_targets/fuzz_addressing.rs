//! Fuzz target for addressing descriptor parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mb_transport::Addressing;

fuzz_target!(|data: &[u8]| {
    let Ok(descriptor) = std::str::from_utf8(data) else {
        return;
    };
    // Should never panic, only return an error
    if let Ok(addressing) = Addressing::parse(descriptor) {
        let _ = addressing.validate();
        let _ = addressing.to_string();
    }
});
