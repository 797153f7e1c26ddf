#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use std::num::NonZeroUsize;
use timetail_core::registry::{lookup, register};
use timetail_core::{ScanOptions, StopPolicy, TailError, scan};

// First byte picks the chunk size; the rest is the file. Any input must end
// in lines or a typed error, never a panic, and exhaustive output must not
// depend on the chunk size.
fuzz_target!(|data: &[u8]| {
    let Some((&first, content)) = data.split_first() else {
        return;
    };
    let chunk = NonZeroUsize::new(usize::from(first) + 1).unwrap_or(NonZeroUsize::MIN);

    let table = register();
    for name in ["nginx", "iso8601"] {
        let Ok(spec) = lookup(&table, name) else {
            return;
        };

        let options = ScanOptions {
            chunk_size: chunk,
            mem_ceiling: usize::MAX,
            stop_policy: StopPolicy::Exhaustive,
        };
        let small = scan(&mut Cursor::new(content), spec, options);
        let whole = scan(
            &mut Cursor::new(content),
            spec,
            ScanOptions {
                chunk_size: NonZeroUsize::new(content.len().max(1)).unwrap_or(NonZeroUsize::MIN),
                ..options
            },
        );

        match (small, whole) {
            (Ok(a), Ok(b)) => assert_eq!(a.lines, b.lines),
            (Err(TailError::MalformedTimestamp { .. }), Err(TailError::MalformedTimestamp { .. })) => {}
            (a, b) => panic!("chunking changed the outcome: {a:?} vs {b:?}"),
        }
    }
});
