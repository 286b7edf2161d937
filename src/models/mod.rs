pub mod user;
pub mod product;
pub mod category;
pub mod supplier;
pub mod stock;
pub mod notification;
pub mod report;

pub use user::{User, CreateUser};
pub use product::{Product, NewProduct, ProductChanges, ProductDisplay};
pub use category::CategoryDisplay;
pub use supplier::Supplier;
pub use stock::{
    Stock, StockSettings, StockEntry, StockExit,
    MovementKind, NewMovement, LedgerFact,
    StockDisplay, MovementDisplay, ChangeLogRow,
};
pub use notification::Notification;
pub use report::{shares, CountRow, Share};
