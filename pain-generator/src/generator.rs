use std::convert::TryFrom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::error::GenError;
use crate::party::{currency_for_country, Party, PartyDirectory};
use crate::render::{render_pain001, EscapePolicy};
use crate::sampler::{AmountSampler, SamplerConfig};
use crate::timestamp::{format_utc_iso, Clock, SystemClock};
use crate::transaction::{Amount, Transaction};

/// Creditor draws attempted by rejection before falling back to a draw over the
/// accounts that differ from the debtor's
pub const MAX_CREDITOR_ATTEMPTS: usize = 64;

/// Where the `Ccy` of the instructed amount comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrencySource {
    /// The same ISO 4217 code on every transaction
    Fixed(String),
    /// Derived from the country prefix of the debtor's IBAN
    DebtorCountry,
}

impl Default for CurrencySource {
    fn default() -> Self {
        CurrencySource::Fixed("EUR".to_string())
    }
}

impl CurrencySource {
    #[must_use]
    pub fn currency_for(&self, debtor: &Party) -> String {
        match self {
            CurrencySource::Fixed(code) => code.clone(),
            CurrencySource::DebtorCountry => {
                currency_for_country(debtor.country_code()).to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeneratorConfig {
    pub sampler: SamplerConfig,
    pub currency: CurrencySource,
    pub escape: EscapePolicy,
    /// Seed for the amount and party draws, `None` seeds from OS entropy
    pub seed: Option<u64>,
}

/// Draws debtor/creditor pairs and amounts from a party pool and renders them as
/// pain.001 documents.
///
/// The generator borrows the pool for its whole lifetime. All methods take `&self`, so one
/// generator can be shared between threads: the sampler sits behind a mutex and the
/// identifier counter is a single atomic.
#[derive(Debug)]
pub struct TransactionGenerator<'a, C = SystemClock> {
    parties: &'a [Party],
    sampler: Mutex<AmountSampler>,
    counter: AtomicU64,
    currency: CurrencySource,
    escape: EscapePolicy,
    clock: C,
}

impl<'a> TransactionGenerator<'a, SystemClock> {
    /// # Errors
    /// Errors when the directory holds fewer than 2 distinct account ids, or when the
    /// sampler configuration is invalid
    pub fn new(directory: &'a PartyDirectory, config: GeneratorConfig) -> Result<Self, GenError> {
        Self::with_clock(directory, config, SystemClock)
    }
}

impl<'a, C: Clock> TransactionGenerator<'a, C> {
    /// # Errors
    /// Errors when the directory holds fewer than 2 distinct account ids, or when the
    /// sampler configuration is invalid
    pub fn with_clock(
        directory: &'a PartyDirectory,
        config: GeneratorConfig,
        clock: C,
    ) -> Result<Self, GenError> {
        let distinct = directory.distinct_accounts();
        if distinct < 2 {
            return Err(GenError::InsufficientParties { distinct });
        }

        let sampler = match config.seed {
            Some(seed) => AmountSampler::with_seed(config.sampler, seed)?,
            None => AmountSampler::new(config.sampler)?,
        };
        info!(
            "Transaction generator ready with {} parties ({} distinct accounts)",
            directory.len(),
            distinct
        );

        Ok(TransactionGenerator {
            parties: directory.parties(),
            sampler: Mutex::new(sampler),
            counter: AtomicU64::new(0),
            currency: config.currency,
            escape: config.escape,
            clock,
        })
    }

    /// Resolves every field of the next transaction without rendering it.
    ///
    /// # Errors
    /// Errors when the sampled amount cannot be represented as an [`Amount`]
    pub fn next_transaction(&self) -> Result<Transaction<'a>, GenError> {
        let parties = self.parties;
        let (debtor, creditor, raw_amount) = {
            let mut sampler = self.lock_sampler();
            let debtor = &parties[sampler.uniform_int(0, parties.len() - 1)];
            let creditor = Self::pick_creditor(parties, &mut sampler, debtor)?;
            (debtor, creditor, sampler.sample())
        };
        let amount = Amount::try_from(raw_amount)?;

        let sequence = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let created_at = format_utc_iso(&self.clock.now_utc());
        let currency = self.currency.currency_for(debtor);
        debug!(
            "Transaction {}: {} -> {} {} {}",
            sequence,
            debtor.account_id(),
            creditor.account_id(),
            amount,
            currency
        );

        Ok(Transaction::new(
            sequence, created_at, debtor, creditor, amount, currency,
        ))
    }

    /// Generates one transaction rendered as a pain.001.001.03 document.
    ///
    /// # Errors
    /// See [`TransactionGenerator::next_transaction`]
    pub fn generate_one(&self) -> Result<String, GenError> {
        let transaction = self.next_transaction()?;
        Ok(render_pain001(&transaction, self.escape))
    }

    /// Generates `n` independent documents in call order. `n == 0` yields an empty batch.
    ///
    /// # Errors
    /// See [`TransactionGenerator::next_transaction`]
    pub fn generate_batch(&self, n: usize) -> Result<Vec<String>, GenError> {
        (0..n).map(|_| self.generate_one()).collect()
    }

    /// Number of transactions generated so far
    #[must_use]
    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Reseeds the shared sampler. The identifier counter is not reset.
    pub fn reseed(&self, seed: u64) {
        self.lock_sampler().reseed(seed);
    }

    #[must_use]
    pub fn parties(&self) -> &'a [Party] {
        self.parties
    }

    fn pick_creditor(
        parties: &'a [Party],
        sampler: &mut AmountSampler,
        debtor: &Party,
    ) -> Result<&'a Party, GenError> {
        let last = parties.len() - 1;
        for _ in 0..MAX_CREDITOR_ATTEMPTS {
            let candidate = &parties[sampler.uniform_int(0, last)];
            if candidate.account_id() != debtor.account_id() {
                return Ok(candidate);
            }
        }

        // uniform over the remaining accounts, same distribution the rejection loop converges to
        let candidates: Vec<&'a Party> = parties
            .iter()
            .filter(|p| p.account_id() != debtor.account_id())
            .collect();
        if candidates.is_empty() {
            return Err(GenError::InsufficientParties { distinct: 1 });
        }
        Ok(candidates[sampler.uniform_int(0, candidates.len() - 1)])
    }

    fn lock_sampler(&self) -> MutexGuard<'_, AmountSampler> {
        self.sampler.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::thread;

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())
    }

    fn seeded(seed: u64) -> GeneratorConfig {
        GeneratorConfig {
            seed: Some(seed),
            ..GeneratorConfig::default()
        }
    }

    fn pool() -> PartyDirectory {
        PartyDirectory::from_parties(vec![
            Party::new("Alice", "DE89370400440532013000"),
            Party::new("Alice (savings)", "DE89370400440532013000"),
            Party::new("Bob", "GB29NWBK60161331926819"),
            Party::new("Carol", "CH9300762011623852957"),
        ])
    }

    #[test]
    fn test_rejects_degenerate_pools() {
        let empty = PartyDirectory::default();
        assert!(matches!(
            TransactionGenerator::new(&empty, GeneratorConfig::default()),
            Err(GenError::InsufficientParties { distinct: 0 })
        ));

        let single = PartyDirectory::from_parties(vec![Party::new("Alice", "IBAN1")]);
        assert!(matches!(
            TransactionGenerator::new(&single, GeneratorConfig::default()),
            Err(GenError::InsufficientParties { distinct: 1 })
        ));

        let duplicates = PartyDirectory::from_parties(vec![
            Party::new("Alice", "IBAN1"),
            Party::new("Also Alice", "IBAN1"),
        ]);
        assert!(matches!(
            TransactionGenerator::new(&duplicates, GeneratorConfig::default()),
            Err(GenError::InsufficientParties { distinct: 1 })
        ));
    }

    #[test]
    fn test_invalid_sampler_config_is_rejected() {
        let directory = pool();
        let mut config = seeded(1);
        config.sampler.outlier_probability = -0.1;
        assert!(matches!(
            TransactionGenerator::new(&directory, config),
            Err(GenError::InvalidSamplerConfig(_))
        ));
    }

    #[test]
    fn test_debtor_never_equals_creditor() {
        let directory = pool();
        let generator = TransactionGenerator::new(&directory, seeded(11)).unwrap();
        for _ in 0..1_000 {
            let tx = generator.next_transaction().unwrap();
            assert_ne!(tx.debtor.account_id(), tx.creditor.account_id());
        }
    }

    #[test]
    fn test_skewed_pool_falls_back_after_rejections() {
        let mut parties = vec![Party::new("Bob", "IBAN2")];
        parties.extend((0..500).map(|i| Party::new(format!("Alice {}", i), "IBAN1")));
        let directory = PartyDirectory::from_parties(parties);
        let generator = TransactionGenerator::new(&directory, seeded(5)).unwrap();
        for _ in 0..200 {
            let tx = generator.next_transaction().unwrap();
            if tx.debtor.account_id() == "IBAN1" {
                assert_eq!(tx.creditor.account_id(), "IBAN2");
            } else {
                assert_eq!(tx.creditor.account_id(), "IBAN1");
            }
        }
    }

    #[test]
    fn test_sequences_strictly_increase() {
        let directory = pool();
        let generator = TransactionGenerator::new(&directory, seeded(2)).unwrap();
        assert_eq!(generator.counter(), 0);
        let sequences: Vec<u64> = (0..50)
            .map(|_| generator.next_transaction().unwrap().sequence)
            .collect();
        assert_eq!(sequences, (1..=50).collect::<Vec<_>>());
        assert_eq!(generator.counter(), 50);
    }

    #[test]
    fn test_empty_batch() {
        let directory = pool();
        let generator = TransactionGenerator::new(&directory, seeded(2)).unwrap();
        assert!(generator.generate_batch(0).unwrap().is_empty());
        assert_eq!(generator.counter(), 0);
    }

    #[test]
    fn test_batch_preserves_call_order() {
        let directory = pool();
        let generator = TransactionGenerator::new(&directory, seeded(3)).unwrap();
        let batch = generator.generate_batch(5).unwrap();
        assert_eq!(batch.len(), 5);
        for (i, xml) in batch.iter().enumerate() {
            let n = i + 1;
            assert!(xml.contains(&format!("<MsgId>MSG-{}</MsgId>", n)));
            assert!(xml.contains(&format!("<PmtInfId>PmtInf-{}</PmtInfId>", n)));
            assert!(xml.contains(&format!("<EndToEndId>E2E-{}</EndToEndId>", n)));
        }
    }

    #[test]
    fn test_same_seed_same_output() {
        let directory = pool();
        let a = TransactionGenerator::with_clock(&directory, seeded(99), fixed_clock()).unwrap();
        let b = TransactionGenerator::with_clock(&directory, seeded(99), fixed_clock()).unwrap();
        assert_eq!(a.generate_batch(20).unwrap(), b.generate_batch(20).unwrap());
    }

    #[test]
    fn test_reseed_replays_draws_with_fresh_ids() {
        let directory = pool();
        let generator =
            TransactionGenerator::with_clock(&directory, seeded(8), fixed_clock()).unwrap();
        let first = generator.next_transaction().unwrap();
        generator.reseed(8);
        let second = generator.next_transaction().unwrap();
        assert_eq!(first.debtor, second.debtor);
        assert_eq!(first.creditor, second.creditor);
        assert_eq!(first.amount, second.amount);
        assert_eq!(second.sequence, first.sequence + 1);
    }

    #[test]
    fn test_currency_sources() {
        let directory = pool();
        let generator = TransactionGenerator::new(&directory, seeded(4)).unwrap();
        for _ in 0..20 {
            assert_eq!(generator.next_transaction().unwrap().currency, "EUR");
        }

        let config = GeneratorConfig {
            currency: CurrencySource::DebtorCountry,
            ..seeded(4)
        };
        let generator = TransactionGenerator::new(&directory, config).unwrap();
        for _ in 0..50 {
            let tx = generator.next_transaction().unwrap();
            let expected = match tx.debtor.country_code() {
                "GB" => "GBP",
                "CH" => "CHF",
                _ => "EUR",
            };
            assert_eq!(tx.currency, expected);
        }
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let directory = pool();
        let generator = TransactionGenerator::new(&directory, seeded(6)).unwrap();
        let sequences: Vec<u64> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        (0..100)
                            .map(|_| generator.next_transaction().unwrap().sequence)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        let unique: HashSet<u64> = sequences.iter().copied().collect();
        assert_eq!(unique.len(), 400);
        assert_eq!(unique, (1..=400).collect::<HashSet<u64>>());
        assert_eq!(generator.counter(), 400);
    }
}
