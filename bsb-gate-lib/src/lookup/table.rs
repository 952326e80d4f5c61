use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use ahash::AHashMap;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use crate::error::{GateError, Result};
use crate::lookup::{normalize, BsbFlags, BsbRecord, Lookup};

/// `[mnemonic, branch, address, suburb, state, postcode, flags]`
#[derive(Debug, Clone, Deserialize)]
struct Entry(String, String, String, String, String, String, String);

/// In-memory lookup table loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    entries: AHashMap<String, Entry>,
    // File order; the first matching prefix names the bank
    banks: Vec<(String, String)>,
}

impl StaticLookup {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a `{"123-456": [...]}` table. Keys are normalized to digits.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Entry> = serde_json::from_str(json)
            .map_err(|e| GateError::Lookup(format!("invalid lookup table: {e}")))?;
        let entries = raw.into_iter().map(|(k, v)| (normalize(&k), v)).collect();
        Ok(Self { entries, banks: Vec::new() })
    }

    pub fn try_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&data)
    }

    /// Load a table file, falling back to an empty table when it is missing or invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_from_path(path) {
            Ok(table) => {
                info!(path = %path.display(), entries = table.len(), "Loaded lookup table");
                table
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Lookup table unavailable, serving empty table");
                Self::empty()
            }
        }
    }

    /// Attach a `{"prefix": "bank name"}` list
    pub fn with_banks_json_str(mut self, json: &str) -> Result<Self> {
        self.banks = parse_banks(json)?;
        Ok(self)
    }

    /// Attach a bank list file; a missing or invalid file leaves bank names unset.
    pub fn with_banks_path(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let banks = fs::read_to_string(path)
            .map_err(GateError::from)
            .and_then(|data| parse_banks(&data));
        match banks {
            Ok(banks) => {
                info!(path = %path.display(), banks = banks.len(), "Loaded bank list");
                self.banks = banks;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Bank list unavailable"),
        }
        self
    }

    pub fn bank_name(&self, bsb: &str) -> Option<&str> {
        self.banks
            .iter()
            .find(|(prefix, _)| bsb.starts_with(prefix.as_str()))
            .map(|(_, name)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `{"prefix": "bank name"}` entries in document order
struct BankList(Vec<(String, String)>);

impl<'de> Deserialize<'de> for BankList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct BankListVisitor;

        impl<'de> Visitor<'de> for BankListVisitor {
            type Value = BankList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of prefix to bank name")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<BankList, A::Error> {
                let mut banks = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((prefix, name)) = map.next_entry::<String, String>()? {
                    banks.push((prefix, name));
                }
                Ok(BankList(banks))
            }
        }

        deserializer.deserialize_map(BankListVisitor)
    }
}

fn parse_banks(json: &str) -> Result<Vec<(String, String)>> {
    let BankList(raw) = serde_json::from_str(json)
        .map_err(|e| GateError::Lookup(format!("invalid bank list: {e}")))?;
    Ok(raw
        .into_iter()
        .map(|(prefix, name)| (normalize(&prefix), name))
        .filter(|(prefix, _)| !prefix.is_empty())
        .collect())
}

impl Lookup for StaticLookup {
    fn lookup(&self, code: &str) -> Option<BsbRecord> {
        let bsb = normalize(code);
        let Entry(mnemonic, branch, address, suburb, state, postcode, flags) =
            self.entries.get(&bsb)?;
        Some(BsbRecord {
            bank_name: self.bank_name(&bsb).map(str::to_string),
            mnemonic: mnemonic.clone(),
            branch: branch.clone(),
            address: address.clone(),
            suburb: suburb.clone(),
            state: state.clone(),
            postcode: postcode.clone(),
            flags: BsbFlags::parse(flags),
            bsb,
        })
    }
}
