use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Acquire a read guard on a cache table, recovering from poisoning.
///
/// Cache contents are replaceable by the next fetch, so a panic in another
/// writer never takes the table down with it.
pub(crate) fn read<'a, T>(
    lock: &'a RwLock<T>,
    table: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read()
        .unwrap_or_else(|poisoned| recover(poisoned, table, op, "rwlock.read"))
}

pub(crate) fn write<'a, T>(
    lock: &'a RwLock<T>,
    table: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(|poisoned| recover(poisoned, table, op, "rwlock.write"))
}

fn recover<G>(
    poisoned: PoisonError<G>,
    table: &'static str,
    op: &'static str,
    lock_kind: &'static str,
) -> G {
    warn!(
        op,
        table,
        lock_kind,
        result = "poisoned_recovered",
        "Recovered from poisoned entity table lock"
    );
    poisoned.into_inner()
}
