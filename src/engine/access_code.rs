// src/engine/access_code.rs

use std::collections::HashSet;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

use crate::error::AppError;

/// Uppercase letters and digits without the easily confused O/0 and I/1.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

static ACCESS_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-HJ-NP-Z2-9]{6,12}$").expect("access code pattern is valid"));

/// Generates `count` codes of `length` characters, distinct within the batch.
pub fn generate_access_codes<R: Rng + ?Sized>(count: usize, length: usize, rng: &mut R) -> Vec<String> {
    let mut seen = HashSet::with_capacity(count);
    let mut codes = Vec::with_capacity(count);

    while codes.len() < count {
        let code: String = (0..length)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        if seen.insert(code.clone()) {
            codes.push(code);
        }
    }

    codes
}

/// Canonical form of a code typed by a participant.
///
/// Case is ignored, as are spaces and dashes used for grouping.
pub fn normalize_access_code(raw: &str) -> Result<String, AppError> {
    let code: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !ACCESS_CODE_RE.is_match(&code) {
        return Err(AppError::BadRequest("Malformed access code".to_string()));
    }

    Ok(code)
}
