use chrono::NaiveDate;

/// Contract violations the ledger refuses to paper over.
///
/// Missing market data is *not* an error (positions are force-closed
/// instead). These variants indicate a bug in the calling strategy or driver
/// and carry the offending identifier and simulated date so the bad input
/// row can be located.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// A negative entry price would have produced shares.
    InvalidPrice {
        id: String,
        date: Option<NaiveDate>,
        price: f64,
    },
    /// An identifier had to be dropped while it still held shares.
    OrphanedShares {
        id: String,
        date: Option<NaiveDate>,
        shares: u64,
    },
    /// A never-before-seen identifier was sized without an execution price.
    MissingExecutionPrice {
        id: String,
        symbol: String,
        date: Option<NaiveDate>,
    },
    /// Basket legs, prices and sizes disagree.
    LegMismatch {
        id: String,
        date: Option<NaiveDate>,
        reason: String,
    },
    /// An operation that needs a simulated date ran before any price update.
    PricesNotUpdated { operation: &'static str },
    /// Price updates must move strictly forward in time.
    NonMonotonicDate { date: NaiveDate, last: NaiveDate },
}

impl LedgerError {
    /// Attach the simulated date if the error does not carry one yet.
    pub fn on(mut self, when: NaiveDate) -> Self {
        match &mut self {
            Self::InvalidPrice { date, .. }
            | Self::OrphanedShares { date, .. }
            | Self::MissingExecutionPrice { date, .. }
            | Self::LegMismatch { date, .. } => {
                date.get_or_insert(when);
            }
            Self::PricesNotUpdated { .. } | Self::NonMonotonicDate { .. } => {}
        }
        self
    }

    /// The offending identifier, when the error concerns one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::InvalidPrice { id, .. }
            | Self::OrphanedShares { id, .. }
            | Self::MissingExecutionPrice { id, .. }
            | Self::LegMismatch { id, .. } => Some(id),
            Self::PricesNotUpdated { .. } | Self::NonMonotonicDate { .. } => None,
        }
    }
}

struct DateTag(Option<NaiveDate>);

impl std::fmt::Display for DateTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(d) => write!(f, "on {d}"),
            None => write!(f, "(no simulated date)"),
        }
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPrice { id, date, price } => write!(
                f,
                "ledger invariant: invalid entry price {price} for '{id}' {}",
                DateTag(*date)
            ),
            Self::OrphanedShares { id, date, shares } => write!(
                f,
                "ledger invariant: '{id}' dropped {} with {shares} shares outstanding",
                DateTag(*date)
            ),
            Self::MissingExecutionPrice { id, symbol, date } => write!(
                f,
                "ledger invariant: '{id}' sized {} without an execution price for '{symbol}'",
                DateTag(*date)
            ),
            Self::LegMismatch { id, date, reason } => write!(
                f,
                "ledger invariant: basket '{id}' {}: {reason}",
                DateTag(*date)
            ),
            Self::PricesNotUpdated { operation } => write!(
                f,
                "ledger invariant: {operation} called before any price update"
            ),
            Self::NonMonotonicDate { date, last } => write!(
                f,
                "ledger invariant: price update for {date} is not after {last}"
            ),
        }
    }
}

impl std::error::Error for LedgerError {}
