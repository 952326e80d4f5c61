use serde::Serialize;

/// Clearing channels a branch participates in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BsbFlags {
    pub paper: bool,
    pub electronic: bool,
    pub high_value: bool,
}

impl BsbFlags {
    /// Parse the positional `PEH` marker; any other character clears that flag.
    pub fn parse(marker: &str) -> Self {
        let at = |i: usize, c: u8| marker.as_bytes().get(i) == Some(&c);
        Self { paper: at(0, b'P'), electronic: at(1, b'E'), high_value: at(2, b'H') }
    }
}

/// A branch record as served by the lookup endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BsbRecord {
    pub bsb: String,
    pub mnemonic: String,
    pub bank_name: Option<String>,
    pub branch: String,
    pub address: String,
    pub suburb: String,
    pub state: String,
    pub postcode: String,
    pub flags: BsbFlags,
}
