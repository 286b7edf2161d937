pub mod ledger;
pub mod notifier;
pub mod push;
pub mod threshold;

pub use ledger::{LedgerError, LedgerOutcome, StockEdit, StockLedger};
pub use notifier::{user_channel, NotificationDispatcher, PushChannel, PushMessage};
pub use push::PushHub;
pub use threshold::{StockLevel, ThresholdMonitor};
