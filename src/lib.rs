//! Trip expense splitting: folds a trip's expenses into balances and
//! settles them with as few transfers as the greedy matcher finds.
pub mod balance;
pub mod error;
pub mod schemas;
pub mod server;
pub mod settings;
pub mod settlement;
pub mod store;
pub mod summary;
