//! Random ASCII string / trace token generation.
//!
//! Ported from `original_source/random/string.go`: same alphabet, same
//! thread-local-RNG-per-caller spirit (the original used a single
//! package-global `rand.Source`; per the "mutable global RNGs" design
//! note in the spec this crate prefers `rand::thread_rng()`, which is
//! already thread-local and avoids the contention a shared source would
//! introduce under a multi-threaded runtime).

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const TRACE_TOKEN_LEN: usize = 3;

/// Generates a random ASCII string of `size` bytes drawn from `LETTERS`.
pub fn random_string(size: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..size)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}

/// Appends a fresh trace token to an incoming trace id, per spec §4.5:
/// `incoming + "." + token`, or just `token` if there was no incoming id.
pub fn next_trace_id(incoming: Option<&str>) -> String {
    let token = random_string(TRACE_TOKEN_LEN);
    match incoming {
        Some(id) if !id.is_empty() => format!("{id}.{token}"),
        _ => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_string_has_requested_length() {
        assert_eq!(random_string(16).len(), 16);
        assert_eq!(random_string(0).len(), 0);
    }

    #[test]
    fn random_string_uses_only_the_allowed_alphabet() {
        let s = random_string(256);
        assert!(s.bytes().all(|b| LETTERS.contains(&b)));
    }

    #[test]
    fn trace_id_without_incoming_is_just_the_token() {
        let id = next_trace_id(None);
        assert_eq!(id.len(), TRACE_TOKEN_LEN);
    }

    #[test]
    fn trace_id_with_incoming_appends_dotted_token() {
        let id = next_trace_id(Some("abc"));
        assert_eq!(id.len(), "abc".len() + 1 + TRACE_TOKEN_LEN);
        assert!(id.starts_with("abc."));
    }
}
