use rand::{distributions::Uniform, Rng};

pub const DEFAULT_CODE_LENGTH: usize = 16;

/// Random human-facing identifier made of uppercase Latin letters.
///
/// Uniqueness is not checked here; the `code` columns are indexed but not unique.
pub fn generate_code(length: usize) -> String {
    let letters = Uniform::new_inclusive(b'A', b'Z');
    rand::thread_rng()
        .sample_iter(letters)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn new_code() -> String {
    generate_code(DEFAULT_CODE_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_has_requested_length_and_alphabet() {
        for length in [0, 1, 8, 16, 25] {
            let code = generate_code(length);
            assert_eq!(code.len(), length);
            assert!(code.chars().all(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn default_code_is_sixteen_letters() {
        let code = new_code();
        assert_eq!(code.len(), 16);
        assert!(code.bytes().all(|b| b.is_ascii_uppercase()));
    }

    #[test]
    fn consecutive_codes_differ() {
        assert_ne!(generate_code(16), generate_code(16));
    }
}
