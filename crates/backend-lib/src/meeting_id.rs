// ============================
// crates/backend-lib/src/meeting_id.rs
// ============================
//! Human-shareable meeting ids such as `abc-defg-hij`.
use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const SEGMENT_LENGTHS: [usize; 3] = [3, 4, 3];

static MEETING_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{3}-[a-z]{4}-[a-z]{3}$").unwrap());

/// Generate a random meeting id: three lowercase segments of 3, 4 and 3
/// letters joined by hyphens.
pub fn generate_meeting_id() -> String {
    let mut rng = rand::rng();
    SEGMENT_LENGTHS
        .iter()
        .map(|&len| {
            (0..len)
                .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Whether `candidate` has the shape produced by [`generate_meeting_id`]
pub fn is_meeting_id(candidate: &str) -> bool {
    MEETING_ID_REGEX.is_match(candidate)
}
