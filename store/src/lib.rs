//! Chain storage abstraction.
//!
//! The blockchain processor consumes a [`ChainStore`]: block and transaction
//! CRUD plus a unit-of-work surface (`begin` / `commit` / `rollback` /
//! `end`) bracketing every mutating chain operation. Backends are expected
//! to treat internal failures as fatal (panic): a half-written chain store
//! is unrecoverable and the caller's top level turns the panic into an
//! operator-visible shutdown.
//!
//! [`MemoryChainStore`] is the reference backend used by tests and dev
//! setups; a durable backend plugs in at the same trait.

pub mod chain_store;
pub mod memory;

pub use chain_store::ChainStore;
pub use memory::MemoryChainStore;
