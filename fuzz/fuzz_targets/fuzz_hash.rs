#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (&str, &str)| {
    let (key, seed) = input;
    let bucket = flagkit_engine::hash::bucket(key, flagkit_engine::hash::parse_seed(seed));
    assert!((1..=100).contains(&bucket));
});
