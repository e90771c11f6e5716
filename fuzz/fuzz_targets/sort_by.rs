#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Few distinct keys with a tag, so ties are common and stability is observable.
    let mut v: Vec<(u8, u8)> = data.chunks_exact(2).map(|c| (c[0] % 16, c[1])).collect();
    let mut expected = v.clone();

    timsort::sort_by(&mut v, |a, b| a.0.cmp(&b.0));
    expected.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(v, expected);
});
