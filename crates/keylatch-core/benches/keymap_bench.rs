//! Criterion benchmarks for key map operations.
//!
//! Membership tests run on every keystroke in both the hook and the raw input
//! path, so they should stay in the low-nanosecond range.
//!
//! Run with:
//! ```bash
//! cargo bench --package keylatch-core --bench keymap_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keylatch_core::keymap::{lookup_name, KeyMap, SharedKeyMap};

// ── Representative codes ──────────────────────────────────────────────────────

const BENCH_CODES: &[u32] = &[
    0x41,  // 'A'
    0x0D,  // VK_RETURN
    0x10,  // VK_SHIFT
    0xA3,  // VK_RCONTROL
    0x1E,  // scancode 'A'
    0x1D,  // scancode control
    0x141, // wraps to 0x41
    0xFF,
];

fn bench_keymap_is_set(c: &mut Criterion) {
    let map: KeyMap = [0x41u8, 0x10, 0x1d].into_iter().collect();

    c.bench_function("keymap_is_set_all_codes", |b| {
        b.iter(|| {
            for &code in BENCH_CODES {
                black_box(map.is_set(black_box(code)));
            }
        })
    });
}

fn bench_keymap_set_clear(c: &mut Criterion) {
    c.bench_function("keymap_set_then_clear", |b| {
        let mut map = KeyMap::new();
        b.iter(|| {
            for &code in BENCH_CODES {
                map.set(black_box(code));
                map.clear(black_box(code));
            }
        })
    });
}

fn bench_shared_keymap_is_set(c: &mut Criterion) {
    let shared = SharedKeyMap::new();
    shared.set(0x41u8);
    shared.set(0xA3u8);

    c.bench_function("shared_keymap_is_set_all_codes", |b| {
        b.iter(|| {
            for &code in BENCH_CODES {
                black_box(shared.is_set(black_box(code)));
            }
        })
    });
}

fn bench_name_lookup(c: &mut Criterion) {
    c.bench_function("lookup_name_oem_clear", |b| {
        b.iter(|| black_box(lookup_name(black_box("oem_clear"))))
    });
}

criterion_group!(
    benches,
    bench_keymap_is_set,
    bench_keymap_set_clear,
    bench_shared_keymap_is_set,
    bench_name_lookup
);
criterion_main!(benches);
