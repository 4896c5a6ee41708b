//! The derived-table contract.
//!
//! Derived tables are projections of chain state (balances, aliases, ...).
//! The blockchain processor owns a registration list and drives every table
//! through the same lifecycle: `rollback` when blocks are popped off,
//! `trim` when history below the rollback horizon is compacted, and
//! `truncate` on a full rescan. Registration order is rollback/trim order.

pub trait DerivedTable: Send + Sync {
    /// Table name, for logs.
    fn name(&self) -> &'static str;

    /// Undo every change recorded above `height`.
    fn rollback(&self, height: u32);

    /// Discard undo history at or below `height`; rollback below it becomes
    /// impossible.
    fn trim(&self, height: u32);

    /// Reset the table to empty.
    fn truncate(&self);
}
