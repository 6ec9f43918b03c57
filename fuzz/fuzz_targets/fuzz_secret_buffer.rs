#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use trlock_core::SecretBuffer;

#[derive(Arbitrary, Debug)]
enum Op {
    Append(Vec<u8>),
    PopLast,
    Clear,
}

#[derive(Arbitrary, Debug)]
struct Input {
    ceiling: u16,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let mut buffer = SecretBuffer::with_ceiling(usize::from(input.ceiling));

    for op in input.ops {
        match op {
            Op::Append(chunk) => {
                let before = buffer.len();
                if buffer.append(&chunk) {
                    assert_eq!(buffer.len(), before + chunk.len());
                } else {
                    assert_eq!(buffer.len(), before);
                }
            }
            Op::PopLast => {
                buffer.pop_last();
            }
            Op::Clear => {
                buffer.clear();
                assert!(buffer.is_empty());
            }
        }
        assert!(buffer.len() <= buffer.ceiling());
        assert_eq!(buffer.concat().len(), buffer.len());
    }
});
