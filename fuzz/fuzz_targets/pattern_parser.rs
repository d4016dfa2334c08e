#![no_main]

use libfuzzer_sys::fuzz_target;
use deobscope::pattern::{parse_expression, tokenize};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = tokenize(text);
        if let Some(tree) = parse_expression(text) {
            // a printed tree must parse again
            assert!(parse_expression(&tree.to_string()).is_some());
        }
    }
});
