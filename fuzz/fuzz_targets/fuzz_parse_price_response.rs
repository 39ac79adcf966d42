#![no_main]
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Treat the input as a JSON-RPC response body
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };

    let hour = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).single();
    if let Some(hour) = hour
        && let Ok(price) = barry_price::barry::parse_total_price(body, hour)
    {
        assert!(price.is_finite());
    }
    let _ = barry_price::barry::parse_metering_points(body);
});
