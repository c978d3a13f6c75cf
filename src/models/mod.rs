pub mod customer;
pub mod date_range;
pub mod interaction;
pub mod tables;
pub mod transaction;

pub use customer::*;
pub use date_range::*;
pub use interaction::*;
pub use transaction::*;
