use std::fmt::Display;

use tracing::warn;

/// A map that only offers per-entry operations, like a BPF hash map.
pub(crate) trait EntryMap {
    type Key;
    type Error: Display;

    /// Every entry present at some point during the walk
    fn entries(&self) -> Result<Vec<(Self::Key, u64)>, Self::Error>;

    /// Removing an absent key is not an error
    fn remove(&mut self, key: &Self::Key) -> Result<(), Self::Error>;
}

/// Read every entry, then delete the keys that were read.
///
/// Writers are not stopped in between: an overwrite of a key already read is
/// lost, a key first written after the read stays for the next drain. Keys
/// that fail to delete are returned anyway and read again next time.
pub(crate) fn drain_entries<M: EntryMap>(map: &mut M, name: &str) -> Result<Vec<(M::Key, u64)>, M::Error> {
    let entries = map.entries()?;
    let mut failed = 0;
    for (k, _) in &entries {
        if let Err(e) = map.remove(k) {
            if failed == 0 {
                warn!("{}: unable to delete drained entry: {}", name, e);
            }
            failed += 1;
        }
    }
    if failed > 0 {
        warn!("{}: {} of {} drained entries left in the map", name, failed, entries.len());
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use super::*;

    /// Writes in `racing` land right after `entries` returns, the way the
    /// kernel keeps writing while we walk the map.
    #[derive(Default)]
    struct RacyMap {
        entries: BTreeMap<u32, u64>,
        racing: RefCell<Vec<(u32, u64)>>,
        undeletable: Option<u32>,
        pending: RefCell<Vec<(u32, u64)>>,
    }

    impl RacyMap {
        fn apply_pending(&mut self) {
            for (k, v) in self.pending.get_mut().drain(..) {
                self.entries.insert(k, v);
            }
        }
    }

    impl EntryMap for RacyMap {
        type Key = u32;
        type Error = String;

        fn entries(&self) -> Result<Vec<(u32, u64)>, String> {
            let read = self.entries.iter().map(|(k, v)| (*k, *v)).collect();
            self.pending.borrow_mut().extend(self.racing.borrow_mut().drain(..));
            Ok(read)
        }

        fn remove(&mut self, key: &u32) -> Result<(), String> {
            self.apply_pending();
            if self.undeletable == Some(*key) {
                return Err(format!("EPERM deleting {key}"));
            }
            self.entries.remove(key);
            Ok(())
        }
    }

    #[test]
    fn test_overwrite_after_read_is_lost() {
        let mut map = RacyMap::default();
        map.entries.insert(1, 10);
        map.racing.borrow_mut().push((1, 15));

        assert_eq!(drain_entries(&mut map, "test").unwrap(), vec![(1, 10)]);
        assert!(map.entries.is_empty());
        assert!(drain_entries(&mut map, "test").unwrap().is_empty());
    }

    #[test]
    fn test_key_created_after_read_survives() {
        let mut map = RacyMap::default();
        map.entries.insert(1, 10);
        map.racing.borrow_mut().push((2, 7));

        assert_eq!(drain_entries(&mut map, "test").unwrap(), vec![(1, 10)]);
        assert_eq!(map.entries.get(&2), Some(&7));
        assert_eq!(drain_entries(&mut map, "test").unwrap(), vec![(2, 7)]);
    }

    #[test]
    fn test_failed_delete_still_returns_entries() {
        let mut map = RacyMap {
            undeletable: Some(1),
            ..Default::default()
        };
        map.entries.insert(1, 10);
        map.entries.insert(2, 20);

        assert_eq!(drain_entries(&mut map, "test").unwrap(), vec![(1, 10), (2, 20)]);
        assert_eq!(map.entries.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_read_failure() {
        struct Gone;
        impl EntryMap for Gone {
            type Key = u32;
            type Error = &'static str;
            fn entries(&self) -> Result<Vec<(u32, u64)>, &'static str> {
                Err("map fd closed")
            }
            fn remove(&mut self, _key: &u32) -> Result<(), &'static str> {
                Ok(())
            }
        }
        assert_eq!(drain_entries(&mut Gone, "test").unwrap_err(), "map fd closed");
    }
}
