//! Random names for tunnels and generated hostnames

use rand::{rngs::OsRng, Rng, RngCore};

/// Length of every generated label
pub const LABEL_LEN: usize = 10;

/// Size of the tunnel secret handed to the control plane
pub const SECRET_LEN: usize = 32;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Source of short labels used for tunnel names and `auto` hostnames
///
/// Labels are not checked for uniqueness; a collision surfaces as a name
/// conflict from the control plane.
pub trait LabelGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniformly random lowercase labels
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomLabels;

impl LabelGenerator for RandomLabels {
    fn generate(&self) -> String {
        random_label()
    }
}

/// `LABEL_LEN` characters drawn from `a-z`
pub fn random_label() -> String {
    let mut rng = rand::thread_rng();
    (0..LABEL_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Fresh secret from the operating system's CSPRNG
pub fn generate_secret() -> [u8; SECRET_LEN] {
    let mut secret = [0u8; SECRET_LEN];
    OsRng.fill_bytes(&mut secret);
    secret
}
