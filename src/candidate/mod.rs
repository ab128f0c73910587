//! Near-miss bookkeeping for searches that come up empty.

pub(crate) mod closest;

pub use closest::NearMiss;
