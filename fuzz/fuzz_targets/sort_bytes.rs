#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&size, rest)) = data.split_first() else {
        return;
    };

    let elem_size = (size % 8) as usize + 1;
    let len = rest.len() - rest.len() % elem_size;
    let mut bytes = rest[..len].to_vec();

    let mut expected: Vec<&[u8]> = rest[..len].chunks_exact(elem_size).collect();
    expected.sort_by_key(|elem| elem[0]);

    timsort::sort_bytes(&mut bytes, elem_size, |a, b| a[0].cmp(&b[0])).unwrap();

    assert_eq!(bytes, expected.concat());
});
