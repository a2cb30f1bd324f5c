use std::error::Error;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::info;

use pain_generator::emitter::{EmitterConfig, PeriodicEmitter, StopSignal};
use pain_generator::generator::{CurrencySource, GeneratorConfig, TransactionGenerator};
use pain_generator::party::{ParsePolicy, PartyDirectory};
use pain_generator::render::EscapePolicy;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// The `name,iban` file to draw parties from
    #[clap(env = "PARTIES_FILE", default_value = "parties.txt")]
    pub(crate) parties_file: String,
    /// Transactions per batch
    #[clap(short = 'n', long, env = "BATCH_SIZE", default_value_t = 2)]
    pub(crate) count: usize,
    /// Keep emitting a batch every N milliseconds instead of generating a single batch
    #[clap(long, env = "GENERATION_INTERVAL_MS")]
    pub(crate) interval_ms: Option<u64>,
    /// Stop streaming after this many batches
    #[clap(long, env = "MAX_BATCHES")]
    pub(crate) max_batches: Option<u64>,
    /// Stop streaming after this many seconds
    #[clap(long)]
    pub(crate) run_for_secs: Option<u64>,
    /// Seed for reproducible output
    #[clap(long, env = "GENERATOR_SEED")]
    pub(crate) seed: Option<u64>,
    /// Fail on malformed party lines instead of skipping them
    #[clap(long)]
    pub(crate) strict: bool,
    /// Write party names into the XML without escaping
    #[clap(long)]
    pub(crate) raw_names: bool,
    /// Currency code used for every transaction
    #[clap(long, env = "CURRENCY", default_value = "EUR")]
    pub(crate) currency: String,
    /// Take the currency from the debtor's IBAN country, overriding --currency
    #[clap(long)]
    pub(crate) currency_from_debtor: bool,
}

impl Cli {
    fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            currency: if self.currency_from_debtor {
                CurrencySource::DebtorCountry
            } else {
                CurrencySource::Fixed(self.currency.clone())
            },
            escape: if self.raw_names {
                EscapePolicy::Raw
            } else {
                EscapePolicy::Escape
            },
            seed: self.seed,
            ..GeneratorConfig::default()
        }
    }
}

fn print_batch(batch: &[String], first_index: u64) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for (i, xml) in (first_index..).zip(batch) {
        writeln!(out, "---- Transaction {} ----", i)?;
        writeln!(out, "{}", xml)?;
    }
    out.flush()
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let policy = if cli.strict {
        ParsePolicy::Strict
    } else {
        ParsePolicy::Lenient
    };
    let directory = PartyDirectory::from_path(&cli.parties_file, policy)?;
    let generator = TransactionGenerator::new(&directory, cli.generator_config())?;

    let interval_ms = match cli.interval_ms {
        Some(interval_ms) => interval_ms,
        None => {
            let batch = generator.generate_batch(cli.count)?;
            print_batch(&batch, 1)?;
            return Ok(());
        }
    };

    let emitter = PeriodicEmitter::new(
        generator,
        EmitterConfig {
            batch_size: cli.count,
            period: Duration::from_millis(interval_ms),
            max_batches: cli.max_batches,
            ..EmitterConfig::default()
        },
    );
    let stop = StopSignal::new();

    let summary = thread::scope(|s| {
        let worker = s.spawn(|| {
            let mut printed = 0;
            let res = emitter.run(&stop, |batch| {
                print_batch(batch, printed + 1)?;
                printed += batch.len() as u64;
                Ok::<(), io::Error>(())
            });
            // wakes the run-time watchdog when max_batches ends the run first
            stop.stop();
            res
        });
        if let Some(secs) = cli.run_for_secs {
            if !stop.wait_timeout(Duration::from_secs(secs)) {
                info!("Run time of {}s elapsed, stopping", secs);
                stop.stop();
            }
        }
        worker.join()
    });

    let summary = match summary {
        Ok(result) => result?,
        Err(_) => return Err("emitter thread panicked".into()),
    };
    info!(
        "Generated {} transactions in {} batches ({} callback failures)",
        summary.transactions, summary.batches, summary.callback_failures
    );

    Ok(())
}
