#![no_main]

use libfuzzer_sys::fuzz_target;
use deobscope::pattern::PatternCorpus;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let mut corpus = PatternCorpus::new();
    corpus.load_from_source(&text, None);
    let _ = corpus.compile_all();
});
