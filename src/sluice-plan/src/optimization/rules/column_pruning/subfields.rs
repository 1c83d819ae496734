use std::{hash::Hash, sync::Arc};

use indexmap::{IndexMap, IndexSet};
use sluice_schema::{dtype::DataType, field::{Field, FieldUid}};

/// Parts of a nested field that are read: named keys of a map, or inner
/// columns of a bag. Keys keep the order they were first required in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeySet<K: Hash + Eq> {
    All,
    Only(IndexSet<K>),
}

impl<K: Hash + Eq + Clone> KeySet<K> {
    pub fn insert(&mut self, key: K) -> bool {
        match self {
            Self::All => false,
            Self::Only(keys) => keys.insert(key),
        }
    }

    pub fn set_all(&mut self) -> bool {
        let changed = !matches!(self, Self::All);
        *self = Self::All;
        changed
    }

    pub fn merge(&mut self, other: &Self) -> bool {
        match other {
            Self::All => self.set_all(),
            Self::Only(keys) => keys
                .iter()
                .fold(false, |changed, k| self.insert(k.clone()) | changed),
        }
    }

    pub fn keys(&self) -> Option<&IndexSet<K>> {
        match self {
            Self::All => None,
            Self::Only(keys) => Some(keys),
        }
    }
}

/// Sub-field requirement per field identity. A missing entry means the field
/// was never read at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubfieldTracker<K: Hash + Eq> {
    entries: IndexMap<FieldUid, KeySet<K>>,
}

impl<K: Hash + Eq> Default for SubfieldTracker<K> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq + Clone> SubfieldTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(&mut self, uid: FieldUid, key: K) -> bool {
        match self.entries.get_mut(&uid) {
            Some(keys) => keys.insert(key),
            None => {
                self.entries
                    .insert(uid, KeySet::Only(IndexSet::from_iter([key])));
                true
            }
        }
    }

    pub fn require_all(&mut self, uid: FieldUid) -> bool {
        match self.entries.get_mut(&uid) {
            Some(keys) => keys.set_all(),
            None => {
                self.entries.insert(uid, KeySet::All);
                true
            }
        }
    }

    pub fn merge(&mut self, uid: FieldUid, keys: &KeySet<K>) -> bool {
        match self.entries.get_mut(&uid) {
            Some(existing) => existing.merge(keys),
            None => {
                self.entries.insert(uid, keys.clone());
                true
            }
        }
    }

    pub fn get(&self, uid: FieldUid) -> Option<&KeySet<K>> {
        self.entries.get(&uid)
    }

    /// The keys of `uid` when only some are read.
    pub fn narrowed(&self, uid: FieldUid) -> Option<&IndexSet<K>> {
        self.get(uid)
            .and_then(KeySet::keys)
            .filter(|keys| !keys.is_empty())
    }
}

/// Map keys read per map field.
pub type MapKeyTracker = SubfieldTracker<Arc<str>>;

/// Inner columns, by identity, read per bag field.
pub type BagColumnTracker = SubfieldTracker<FieldUid>;

/// One finding about how a nested field is read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubfieldDemand {
    MapKey(FieldUid, Arc<str>),
    AllKeys(FieldUid),
    BagColumns(FieldUid, Vec<FieldUid>),
    AllColumns(FieldUid),
}

impl SubfieldDemand {
    pub fn uid(&self) -> FieldUid {
        match self {
            Self::MapKey(uid, _)
            | Self::AllKeys(uid)
            | Self::BagColumns(uid, _)
            | Self::AllColumns(uid) => *uid,
        }
    }
}

/// Demands of reading `field` in full: every map below it loses its key
/// narrowing and every bag below it needs all of its columns.
pub fn whole_read_demands(field: &Field) -> Vec<SubfieldDemand> {
    let mut demands = vec![];
    collect_whole_read(field, &mut demands);
    demands
}

fn collect_whole_read(field: &Field, demands: &mut Vec<SubfieldDemand>) {
    match &field.dtype {
        DataType::Map(..) => demands.push(SubfieldDemand::AllKeys(field.uid)),
        DataType::Bag(inner) | DataType::Tuple(inner) => {
            demands.push(SubfieldDemand::AllColumns(field.uid));
            for inner_field in &inner.fields {
                collect_whole_read(inner_field, demands);
            }
        }
        _ => {}
    }
}

/// Demands of forwarding `field` unchanged: its own sub-fields must all be
/// available, but nested fields keep whatever narrowing their consumers allow.
pub fn forward_demands(field: &Field) -> Vec<SubfieldDemand> {
    match &field.dtype {
        DataType::Map(..) => vec![SubfieldDemand::AllKeys(field.uid)],
        DataType::Bag(..) | DataType::Tuple(..) => vec![SubfieldDemand::AllColumns(field.uid)],
        _ => vec![],
    }
}

/// Both sub-field lattices of one pruning run.
#[derive(Clone, Debug, Default)]
pub struct SubfieldTrackers {
    pub map_keys: MapKeyTracker,
    pub bag_columns: BagColumnTracker,
    /// When false, map demands are dropped and every map reads all keys.
    pub track_map_keys: bool,
}

impl SubfieldTrackers {
    pub fn new(track_map_keys: bool) -> Self {
        Self {
            track_map_keys,
            ..Default::default()
        }
    }

    /// Records a demand. Returns whether either tracker changed.
    pub fn apply(&mut self, demand: &SubfieldDemand) -> bool {
        match demand {
            SubfieldDemand::MapKey(uid, key) if self.track_map_keys => {
                self.map_keys.require(*uid, key.clone())
            }
            SubfieldDemand::AllKeys(uid) if self.track_map_keys => self.map_keys.require_all(*uid),
            SubfieldDemand::MapKey(..) | SubfieldDemand::AllKeys(..) => false,
            SubfieldDemand::BagColumns(uid, columns) => {
                let keys = KeySet::Only(columns.iter().copied().collect());
                self.bag_columns.merge(*uid, &keys)
            }
            SubfieldDemand::AllColumns(uid) => self.bag_columns.require_all(*uid),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sluice_schema::schema::Schema;

    use super::*;

    fn key(k: &str) -> Arc<str> {
        Arc::from(k)
    }

    #[test]
    fn keys_keep_discovery_order() {
        let mut tracker = MapKeyTracker::new();
        assert!(tracker.require(FieldUid(1), key("key2")));
        assert!(tracker.require(FieldUid(1), key("key1")));
        assert!(!tracker.require(FieldUid(1), key("key2")));
        let keys = tracker.narrowed(FieldUid(1)).map(|k| k.iter().cloned().collect::<Vec<_>>());
        assert_eq!(keys, Some(vec![key("key2"), key("key1")]));
    }

    #[test]
    fn whole_read_collapses_for_good() {
        let mut tracker = MapKeyTracker::new();
        tracker.require(FieldUid(1), key("key1"));
        assert!(tracker.require_all(FieldUid(1)));
        assert!(!tracker.require(FieldUid(1), key("key3")));
        assert_eq!(tracker.get(FieldUid(1)), Some(&KeySet::All));
        assert_eq!(tracker.narrowed(FieldUid(1)), None);
        assert_eq!(tracker.narrowed(FieldUid(2)), None);
    }

    #[test]
    fn disabled_map_tracking_ignores_map_demands() {
        let mut trackers = SubfieldTrackers::new(false);
        assert!(!trackers.apply(&SubfieldDemand::MapKey(FieldUid(1), key("k"))));
        assert!(trackers.apply(&SubfieldDemand::BagColumns(FieldUid(2), vec![FieldUid(3)])));
        assert!(!trackers.apply(&SubfieldDemand::BagColumns(FieldUid(2), vec![FieldUid(3)])));
        assert!(trackers.map_keys.get(FieldUid(1)).is_none());
    }

    #[test]
    fn whole_read_recurses_into_bags() {
        let inner = Schema::new(vec![
            Field::new("m", DataType::Map(Box::new(DataType::Int32)), FieldUid(5)),
            Field::new("x", DataType::Int32, FieldUid(6)),
        ]);
        let bag = Field::new("b", DataType::Bag(Arc::new(inner)), FieldUid(4));
        assert_eq!(
            whole_read_demands(&bag),
            vec![
                SubfieldDemand::AllColumns(FieldUid(4)),
                SubfieldDemand::AllKeys(FieldUid(5))
            ]
        );
        assert_eq!(forward_demands(&bag), vec![SubfieldDemand::AllColumns(FieldUid(4))]);
    }
}
