#![no_main]

use libfuzzer_sys::fuzz_target;
use perfdelta::fitting::{fit_all, select_best};
use perfdelta::profile::{Profile, ProfileDocument};

fuzz_target!(|data: &[u8]| {
    // Arbitrary documents must either fail to parse or fit without panicking
    if let Ok(document) = serde_json::from_slice::<ProfileDocument>(data) {
        let profile = Profile::from(document);
        for observations in profile.resources.values() {
            let _ = select_best(&fit_all(observations));
        }
    }
});
