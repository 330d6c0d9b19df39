//! Fuzz target for the subject template formatter.
//!
//! Expansion must never panic, whatever the template or resolver output.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mb_common::{Level, Record};
use mb_format::{BatchDirectives, Template};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let mut warn = Record::new(Level::Warn, "w");
    warn.mark_triggering();
    let records = vec![Record::new(Level::Debug, "d"), warn];

    let template = Template::parse(source);
    let _ = template.render(&BatchDirectives::new(&records, 7));
});
