// apps/bookshop/src/services/claim_code.rs

//! Claim codes: short random tokens a customer reads out at the pickup counter.

use rand_core::{OsRng, RngCore};

use crate::config::MIN_CLAIM_CODE_LENGTH;

/// Uppercase letters and digits without the look-alikes `I`, `L`, `O`, `0` and `1`.
pub const CLAIM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Supplies candidate claim codes. Uniqueness is checked against the store by the caller.
pub trait ClaimCodeSource: Send + Sync {
  fn next_code(&self) -> String;
}

/// Codes drawn from the operating system's CSPRNG.
#[derive(Debug, Clone)]
pub struct RandomClaimCodes {
  length: usize,
}

impl RandomClaimCodes {
  pub fn new(length: usize) -> Self {
    Self {
      length: length.max(MIN_CLAIM_CODE_LENGTH),
    }
  }
}

impl ClaimCodeSource for RandomClaimCodes {
  fn next_code(&self) -> String {
    generate_with(&mut OsRng, self.length)
  }
}

/// Draws `length` symbols uniformly from [`CLAIM_CODE_ALPHABET`].
pub fn generate_with<R: RngCore + ?Sized>(rng: &mut R, length: usize) -> String {
  let n = CLAIM_CODE_ALPHABET.len();
  // Largest multiple of the alphabet size that fits in a byte; higher bytes are redrawn.
  let limit = (256 / n) * n;
  let mut code = String::with_capacity(length);
  let mut buf = [0u8; 32];
  while code.len() < length {
    rng.fill_bytes(&mut buf);
    for &b in buf.iter() {
      if (b as usize) < limit {
        code.push(CLAIM_CODE_ALPHABET[b as usize % n] as char);
        if code.len() == length {
          break;
        }
      }
    }
  }
  code
}

/// Canonical form of a code typed at the counter; `None` if nothing is left.
pub fn normalize(raw: &str) -> Option<String> {
  let code: String = raw
    .chars()
    .filter(|c| !c.is_whitespace() && *c != '-')
    .map(|c| c.to_ascii_uppercase())
    .collect();
  if code.is_empty() {
    None
  } else {
    Some(code)
  }
}

/// First characters of a code, for logs.
pub fn log_prefix(code: &str) -> &str {
  match code.char_indices().nth(3) {
    Some((idx, _)) => &code[..idx],
    None => code,
  }
}
