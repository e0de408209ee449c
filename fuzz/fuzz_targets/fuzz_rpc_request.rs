//! Fuzz target for JSON-RPC envelope decoding.
//!
//! Every input must produce exactly one well-formed reply.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nb_core::service::dispatch::{decode_request, MethodRegistry};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = decode_request(s);
        let registry: MethodRegistry<()> = MethodRegistry::new();
        let reply = registry.dispatch(&(), s).to_json();
        assert!(serde_json::from_str::<serde_json::Value>(&reply).is_ok());
    }
});
