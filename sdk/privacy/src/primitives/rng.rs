//! CSPRNG helpers backed by the operating system.

use rand::{RngCore, rngs::OsRng};

/// Fill a fixed-size array from the OS CSPRNG
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// 32 fresh random bytes
pub fn random_bytes32() -> [u8; 32] {
    random_array()
}
