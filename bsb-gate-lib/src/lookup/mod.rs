//! Routing code lookup.
//!
//! The admission pipeline never depends on this module; it is the downstream
//! collaborator the service dispatches admitted requests to.

mod record;
mod table;

pub use record::{BsbFlags, BsbRecord};
pub use table::StaticLookup;

/// Keyed read from a routing code to its record.
pub trait Lookup: Send + Sync {
    /// `code` may contain separators; implementations normalize it first.
    fn lookup(&self, code: &str) -> Option<BsbRecord>;
}

/// Strip everything except ASCII digits
pub fn normalize(code: &str) -> String {
    code.chars().filter(char::is_ascii_digit).collect()
}

/// `123456` or `123-456`, nothing else
pub fn is_valid_format(code: &str) -> bool {
    let bytes = code.as_bytes();
    let digits = |b: &[u8]| b.iter().all(u8::is_ascii_digit);
    match bytes.len() {
        6 => digits(bytes),
        7 => bytes[3] == b'-' && digits(&bytes[..3]) && digits(&bytes[4..]),
        _ => false,
    }
}
