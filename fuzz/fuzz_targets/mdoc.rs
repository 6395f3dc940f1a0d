#![no_main]

use dc_verifier::presentation::Decoded;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(decoded) = Decoded::from_bytes(data) {
        let _ = decoded.verify_issuer();
    }
});
