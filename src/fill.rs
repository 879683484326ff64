//! A growable byte buffer used to simulate a request's heap footprint.
//!
//! Ported from `original_source/memory/fill.go`: growth writes a
//! deterministic repeating pattern (`byte(i % 1024)`) rather than zeroing,
//! so the pages are actually touched and not just reserved, and shrinking
//! truncates without reallocating. A running process can hold many of
//! these concurrently (one per in-flight request), so `Fill` stays cheap
//! until `Add`/`Set` is actually called.

use std::sync::Mutex;

const CHUNK_LEN: usize = 1024;
const GC_HINT_THRESHOLD: usize = 50 * 1024 * 1024;

fn chunk() -> &'static [u8; CHUNK_LEN] {
    static CHUNK: once_cell::sync::Lazy<[u8; CHUNK_LEN]> = once_cell::sync::Lazy::new(|| {
        let mut c = [0u8; CHUNK_LEN];
        for (i, b) in c.iter_mut().enumerate() {
            *b = i as u8;
        }
        c
    });
    &CHUNK
}

#[derive(Default)]
pub struct Fill {
    buf: Mutex<Vec<u8>>,
}

impl Fill {
    pub fn new() -> Self {
        Self { buf: Mutex::new(Vec::new()) }
    }

    /// Grows or shrinks the buffer to exactly `size` bytes, touching any
    /// newly added pages with the repeating pattern.
    pub fn set(&self, size: usize) {
        let mut buf = self.buf.lock().expect("fill mutex poisoned");
        let before = buf.len();
        resize(&mut buf, size);
        hint_gc_if_crossed(&mut buf, before);
    }

    /// Applies a signed delta (in bytes) to the current size, clamped at 0.
    pub fn add(&self, delta_bytes: i64) {
        let mut buf = self.buf.lock().expect("fill mutex poisoned");
        let before = buf.len();
        let target = (before as i64 + delta_bytes).max(0) as usize;
        resize(&mut buf, target);
        hint_gc_if_crossed(&mut buf, before);
    }

    pub fn size(&self) -> usize {
        self.buf.lock().expect("fill mutex poisoned").len()
    }

    pub fn capacity(&self) -> usize {
        self.buf.lock().expect("fill mutex poisoned").capacity()
    }
}

/// Opportunistically releases the `Vec`'s excess capacity once a resize
/// has crossed the 50 MiB threshold in either direction (spec §4.3). This
/// is a hint, not a contract: `shrink_to_fit` may or may not actually
/// give memory back to the OS depending on the allocator, same as the
/// source's own `debug.FreeOSMemory()` call is advisory.
fn hint_gc_if_crossed(buf: &mut Vec<u8>, before: usize) {
    let after = buf.len();
    if before >= GC_HINT_THRESHOLD || after >= GC_HINT_THRESHOLD {
        buf.shrink_to_fit();
    }
}

fn resize(buf: &mut Vec<u8>, size: usize) {
    if size <= buf.len() {
        buf.truncate(size);
        return;
    }
    let chunk = chunk();
    let mut i = buf.len();
    buf.reserve(size - buf.len());
    while i < size {
        buf.push(chunk[i % CHUNK_LEN]);
        i += 1;
    }
}
