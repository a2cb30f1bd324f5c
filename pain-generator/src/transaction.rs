use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::GenError;
use crate::party::Party;

pub const NUM_DECIMAL_PLACES: u32 = 2;

/// A non-negative monetary amount held at exactly two decimal places.
///
/// Conversion rounds half away from zero, so `CtrlSum` and `InstdAmt` always read `x.yz`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(Decimal);

/// One fully resolved credit transfer, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction<'a> {
    /// Value of the generation counter this transaction was assigned
    pub sequence: u64,
    pub message_id: String,
    pub payment_info_id: String,
    pub end_to_end_id: String,
    /// `YYYY-MM-DDTHH:MM:SSZ`
    pub created_at: String,
    pub debtor: &'a Party,
    pub creditor: &'a Party,
    pub amount: Amount,
    pub currency: String,
}

impl TryFrom<Decimal> for Amount {
    type Error = GenError;
    fn try_from(decimal: Decimal) -> Result<Self, Self::Error> {
        if decimal >= Decimal::ZERO {
            let mut rounded = decimal
                .round_dp_with_strategy(NUM_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
            rounded.rescale(NUM_DECIMAL_PLACES);
            Ok(Amount(rounded))
        } else {
            Err(GenError::InvalidAmount)
        }
    }
}

impl TryFrom<f64> for Amount {
    type Error = GenError;
    /// Goes through the shortest decimal representation of `value`, so `1.005` is
    /// treated as the literal it was written as rather than `1.00499999...`
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(GenError::InvalidAmount);
        }
        let decimal = Decimal::from_str(&value.to_string()).map_err(|_| GenError::InvalidAmount)?;
        Amount::try_from(decimal)
    }
}

impl Amount {
    #[must_use]
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<'a> Transaction<'a> {
    /// Builds a transaction whose identifiers are all derived from `sequence`
    #[must_use]
    pub fn new(
        sequence: u64,
        created_at: String,
        debtor: &'a Party,
        creditor: &'a Party,
        amount: Amount,
        currency: String,
    ) -> Self {
        Transaction {
            sequence,
            message_id: format!("MSG-{}", sequence),
            payment_info_id: format!("PmtInf-{}", sequence),
            end_to_end_id: format!("E2E-{}", sequence),
            created_at,
            debtor,
            creditor,
            amount,
            currency,
        }
    }
}
