#![no_main]

// Every input byte goes through the injection path of both transport
// variants; each must produce exactly one echo and one record.

use libfuzzer_sys::fuzz_target;
use uartecho_core::{Link, LineSink, OverflowPolicy, Serial, SharedWriter};

fuzz_target!(|data: &[u8]| {
    let policy = if data.first().map_or(false, |b| b & 1 == 1) {
        OverflowPolicy::Reject
    } else {
        OverflowPolicy::Overwrite
    };

    for device in [false, true] {
        let echo = SharedWriter::new(Vec::new());
        let diag = SharedWriter::new(Vec::new());
        let link = if device {
            Link::device(echo.clone())
        } else {
            Link::simulated(echo.clone(), policy)
        };
        let mut serial = Serial::new(link, LineSink::new(diag.clone()));
        serial.init();

        for &b in data {
            serial.inject(b);
        }

        assert_eq!(echo.contents(), data);
        assert_eq!(diag.contents().iter().filter(|&&b| b == b'\n').count(), data.len());
        assert_eq!(serial.handled(), data.len() as u64);
    }
});
