use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{ProvisionError, Result};

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
// '@', '/', '"' and spaces are rejected by database master password rules.
const SPECIALS: &[u8] = b"#$[]{}?";

const MIN_LETTERS: usize = 4;
const MIN_DIGITS: usize = 1;
const MIN_SPECIALS: usize = 1;

pub const DEFAULT_PASSWORD_LENGTH: usize = 36;
pub const MIN_PASSWORD_LENGTH: usize = MIN_LETTERS + MIN_DIGITS + MIN_SPECIALS;

/// Generate a password from the OS random source with at least four
/// letters, one digit and one special character, shuffled.
pub fn generate_secure_password(length: usize) -> Result<String> {
    if length < MIN_PASSWORD_LENGTH {
        return Err(ProvisionError::invalid(
            "MasterUserPassword",
            format!("length must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }

    let mut rng = OsRng;
    let all: Vec<u8> = [LETTERS, DIGITS, SPECIALS].concat();
    let mut pick = |set: &[u8]| set[rng.gen_range(0..set.len())];

    let mut password = Vec::with_capacity(length);
    password.extend((0..MIN_LETTERS).map(|_| pick(LETTERS)));
    password.extend((0..MIN_DIGITS).map(|_| pick(DIGITS)));
    password.extend((0..MIN_SPECIALS).map(|_| pick(SPECIALS)));
    while password.len() < length {
        password.push(pick(all.as_slice()));
    }

    password.shuffle(&mut OsRng);
    Ok(password.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meets_character_class_minimums() {
        for _ in 0..20 {
            let pw = generate_secure_password(DEFAULT_PASSWORD_LENGTH).unwrap();
            assert_eq!(pw.len(), DEFAULT_PASSWORD_LENGTH);
            assert!(pw.bytes().filter(|b| LETTERS.contains(b)).count() >= MIN_LETTERS);
            assert!(pw.bytes().any(|b| DIGITS.contains(&b)));
            assert!(pw.bytes().any(|b| SPECIALS.contains(&b)));
            assert!(!pw.contains('@'));
        }
    }

    #[test]
    fn rejects_short_lengths() {
        assert!(generate_secure_password(MIN_PASSWORD_LENGTH - 1).is_err());
        assert_eq!(
            generate_secure_password(MIN_PASSWORD_LENGTH).unwrap().len(),
            MIN_PASSWORD_LENGTH
        );
    }

    #[test]
    fn passwords_differ() {
        let a = generate_secure_password(24).unwrap();
        let b = generate_secure_password(24).unwrap();
        assert_ne!(a, b);
    }
}
