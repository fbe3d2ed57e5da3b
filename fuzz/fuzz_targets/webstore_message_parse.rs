#![no_main]

use libfuzzer_sys::fuzz_target;
use webstore_protocol::{parse_webstore_message, InstallRequest, WEBSTORE_REQUEST_KINDS};

const FUZZ_MAX_MESSAGE_BYTES: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    match parse_webstore_message(&body, Some(FUZZ_MAX_MESSAGE_BYTES)) {
        Ok(request) => {
            assert!(WEBSTORE_REQUEST_KINDS.contains(&request.kind().as_str()));
        }
        Err(rejection) => {
            assert!(!rejection.reply_error().trim().is_empty());
        }
    }

    if let Some(data) = body.as_object() {
        if let Ok(request) = InstallRequest::from_message_data(data) {
            if let Ok(manifest) = request.parse_manifest() {
                assert!(!manifest.author_label().is_empty());
            }
        }
    }
});
