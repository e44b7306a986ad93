use rand::rngs::OsRng;
use rand::RngCore;

const CHAR_MIN: u8 = 32;
const CHAR_MAX: u8 = 122;

/// `length` printable characters in `[32, 122]` drawn from the OS CSPRNG.
/// Used as a throwaway local-account password during domain operations.
pub fn random_password(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    let span = CHAR_MAX - CHAR_MIN + 1;
    bytes.iter().map(|b| char::from(b % span + CHAR_MIN)).collect()
}
