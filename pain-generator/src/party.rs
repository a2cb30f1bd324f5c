use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, error, info, warn};
use serde::Deserialize;

use crate::error::GenError;

/// An account holder that can act as debtor or creditor.
///
/// Two parties are the same account when their `account_id` (IBAN) strings are equal.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Party {
    name: String,
    #[serde(rename = "iban")]
    account_id: String,
}

/// How [`PartyDirectory`] treats lines it cannot turn into a [`Party`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParsePolicy {
    /// Skip the line, log it and count it in [`PartyDirectory::skipped`]
    #[default]
    Lenient,
    /// Abort loading with [`GenError::MalformedRecord`]
    Strict,
}

/// The read-only pool of parties transactions are drawn from.
#[derive(Debug, Default)]
pub struct PartyDirectory {
    parties: Vec<Party>,
    skipped: usize,
}

impl Party {
    #[must_use]
    pub fn new(name: impl Into<String>, account_id: impl Into<String>) -> Self {
        Party {
            name: name.into(),
            account_id: account_id.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_account_id(&mut self, account_id: impl Into<String>) {
        self.account_id = account_id.into();
    }

    /// The ISO country prefix of the IBAN, `"XX"` when the IBAN is too short to carry one
    #[must_use]
    pub fn country_code(&self) -> &str {
        self.account_id.get(..2).unwrap_or("XX")
    }
}

/// Maps an IBAN country prefix to the currency accounts there are usually held in.
/// Unknown countries fall back to EUR.
#[must_use]
pub fn currency_for_country(country_code: &str) -> &'static str {
    match country_code {
        "GB" => "GBP",
        "CH" => "CHF",
        "SE" => "SEK",
        "DK" => "DKK",
        "NO" => "NOK",
        "PL" => "PLN",
        "CZ" => "CZK",
        "HU" => "HUF",
        _ => "EUR",
    }
}

impl PartyDirectory {
    #[must_use]
    pub fn from_parties(parties: Vec<Party>) -> Self {
        PartyDirectory { parties, skipped: 0 }
    }

    /// Loads `name,iban` lines from the file at `path`.
    ///
    /// A file that cannot be opened is not an error here: it is logged and an empty
    /// directory is returned, which the generator later rejects.
    ///
    /// # Errors
    /// Only with [`ParsePolicy::Strict`], when a line is malformed or unreadable
    pub fn from_path(path: impl AsRef<Path>, policy: ParsePolicy) -> Result<Self, GenError> {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => {
                let directory = Self::from_reader(file, policy)?;
                info!(
                    "Loaded {} parties from {}",
                    directory.len(),
                    path.display()
                );
                Ok(directory)
            }
            Err(e) => {
                error!("Cannot open parties file {}: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    /// Loads `name,iban` lines from any reader. Blank lines are ignored, quoted names may
    /// contain commas.
    ///
    /// Every line is tokenized on its own, so an unbalanced quote only spoils the line it
    /// sits on.
    ///
    /// # Errors
    /// Only with [`ParsePolicy::Strict`], when a line is malformed or unreadable
    pub fn from_reader(reader: impl io::Read, policy: ParsePolicy) -> Result<Self, GenError> {
        let builder = line_reader_builder();
        let mut directory = PartyDirectory::default();

        for (index, line) in BufReader::new(reader).split(b'\n').enumerate() {
            let line_number = index as u64 + 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    if policy == ParsePolicy::Strict {
                        return Err(e.into());
                    }
                    warn!("Stopping at unreadable party line {}: {}", line_number, e);
                    directory.skipped += 1;
                    break;
                }
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match parse_line(&builder, &line) {
                Some(party) => directory.parties.push(party),
                None if policy == ParsePolicy::Strict => {
                    return Err(GenError::MalformedRecord { line: line_number });
                }
                None => {
                    warn!("Skipping malformed party record on line {}", line_number);
                    directory.skipped += 1;
                }
            }
        }

        debug!(
            "Parsed {} parties, skipped {} records",
            directory.parties.len(),
            directory.skipped
        );
        Ok(directory)
    }

    #[must_use]
    pub fn parties(&self) -> &[Party] {
        &self.parties
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parties.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }

    /// Number of records dropped while loading under [`ParsePolicy::Lenient`]
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Number of different account ids in the pool
    #[must_use]
    pub fn distinct_accounts(&self) -> usize {
        self.parties
            .iter()
            .map(Party::account_id)
            .collect::<HashSet<_>>()
            .len()
    }
}

fn line_reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).flexible(true).trim(Trim::All);
    builder
}

fn parse_line(builder: &ReaderBuilder, line: &[u8]) -> Option<Party> {
    let mut reader = builder.from_reader(line);
    let mut records = reader.records();
    let record = records.next()?.ok()?;
    // a lone line yielding two records means a stray record terminator such as `\r`
    if records.next().is_some() {
        return None;
    }
    parse_record(&record)
}

fn parse_record(record: &StringRecord) -> Option<Party> {
    if record.len() != 2 || record.get(1).unwrap_or_default().is_empty() {
        return None;
    }
    record.deserialize(None).ok()
}
