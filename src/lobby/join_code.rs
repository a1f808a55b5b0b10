//! Six-character room join codes

use rand::Rng;

pub const JOIN_CODE_LEN: usize = 6;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random code drawn from `[A-Z0-9]`
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid(code: &str) -> bool {
    code.len() == JOIN_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Trim and uppercase user input. `None` if it can't be a join code.
pub fn normalize(input: &str) -> Option<String> {
    let code = input.trim().to_ascii_uppercase();
    is_valid(&code).then_some(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn generated_codes_are_six_uppercase_alphanumerics() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let code = generate(&mut rng);
            assert_eq!(code.len(), JOIN_CODE_LEN);
            assert!(is_valid(&code), "bad code {code}");
        }
    }

    #[test]
    fn normalize_uppercases_and_rejects_garbage() {
        assert_eq!(normalize(" ab12cd ").as_deref(), Some("AB12CD"));
        assert_eq!(normalize("ABC"), None);
        assert_eq!(normalize("ABCD-1"), None);
        assert_eq!(normalize("ÄBCDE1"), None);
    }
}
