//! Grouping of decoded difficulties into beatmap sets

use std::collections::HashMap;

use crate::beatmap::BeatmapDifficulty;

use super::Catalog;

struct PendingSet {
    set_id: i32,
    difficulties: Vec<BeatmapDifficulty>,
}

/// Group difficulties into sets and add them to the catalog.
///
/// Difficulties with a positive set id are grouped by id in first-seen
/// order. The rest are grouped among themselves by normalized title, artist
/// and creator; they never join a set that has an id.
pub fn group_into_catalog(difficulties: Vec<BeatmapDifficulty>, catalog: &mut Catalog) {
    let mut sets: Vec<PendingSet> = Vec::new();
    let mut by_set_id: HashMap<i32, usize> = HashMap::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut orphans = Vec::new();

    for diff in difficulties {
        if diff.set_id <= 0 {
            orphans.push(diff);
            continue;
        }

        let index = *by_set_id.entry(diff.set_id).or_insert_with(|| {
            sets.push(PendingSet {
                set_id: diff.set_id,
                difficulties: Vec::new(),
            });
            sets.len() - 1
        });
        sets[index].difficulties.push(diff);
    }

    let orphan_count = orphans.len();
    for diff in orphans {
        let key = diff.grouping_key();
        match by_key.get(&key) {
            Some(&index) => sets[index].difficulties.push(diff),
            None => {
                by_key.insert(key, sets.len());
                sets.push(PendingSet {
                    set_id: diff.set_id,
                    difficulties: vec![diff],
                });
            }
        }
    }

    let set_count = sets.len();
    for set in sets {
        let folder = set
            .difficulties
            .first()
            .map(|d| d.folder.clone())
            .unwrap_or_default();
        catalog.add_set(set.set_id, folder, set.difficulties);
    }

    tracing::debug!(
        "Grouped into {} sets ({} difficulties without set id)",
        set_count,
        orphan_count
    );
}
