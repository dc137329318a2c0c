// Duplicate grouping and keeper selection.
// Within a cluster the keeper is the largest file; equal sizes fall back to
// the lexicographically smallest path. Output is sorted by path so results do
// not depend on worker completion order.

use std::cmp::Ordering;

use crate::core::cluster::cluster;
use crate::core::record::AudioRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub keep: AudioRecord,
    /// Everything else in the cluster, sorted by path
    pub duplicates: Vec<AudioRecord>,
}

impl DuplicateGroup {
    pub fn is_singleton(&self) -> bool {
        self.duplicates.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.duplicates.len() + 1
    }
}

/// Byte-wise order of the full path string. `Path`'s own `Ord` compares
/// component by component, which puts `a/x` before `a-b/x`.
fn path_order(a: &AudioRecord, b: &AudioRecord) -> Ordering {
    a.path
        .as_os_str()
        .as_encoded_bytes()
        .cmp(b.path.as_os_str().as_encoded_bytes())
}

/// Keeper ordering: larger size first, then smaller path.
fn keeper_order(a: &AudioRecord, b: &AudioRecord) -> Ordering {
    b.size.cmp(&a.size).then_with(|| path_order(a, b))
}

/// Cluster `records` and split every cluster (singletons included) into its
/// keeper and the duplicates it supersedes. Groups are sorted by keeper path.
pub fn group_duplicates(records: &[AudioRecord], threshold: u32) -> Vec<DuplicateGroup> {
    let mut groups: Vec<DuplicateGroup> = cluster(records, threshold)
        .into_iter()
        .map(|indices| {
            let mut members: Vec<&AudioRecord> = indices.iter().map(|&i| &records[i]).collect();
            members.sort_by(|a, b| keeper_order(a, b));
            let keep = members[0].clone();
            let mut duplicates: Vec<AudioRecord> =
                members[1..].iter().map(|r| (*r).clone()).collect();
            duplicates.sort_by(path_order);
            DuplicateGroup { keep, duplicates }
        })
        .collect();

    groups.sort_by(|a, b| path_order(&a.keep, &b.keep));
    groups
}

/// One record per cluster, sorted by path.
pub fn select_keep(records: &[AudioRecord], threshold: u32) -> Vec<AudioRecord> {
    group_duplicates(records, threshold)
        .into_iter()
        .map(|g| g.keep)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::Fingerprint;

    const X: Fingerprint = Fingerprint(0x0000_0000_ffff_ffff);
    const Y: Fingerprint = Fingerprint(0xffff_ffff_0000_0000);

    fn rec(path: &str, size: u64, fp: Fingerprint) -> AudioRecord {
        AudioRecord::new(path, size, fp)
    }

    #[test]
    fn larger_file_wins_its_cluster() {
        let a = rec("A.mp3", 1000, X);
        let b = rec("B.mp3", 2000, X);
        let c = rec("C.mp3", 1500, Y);
        let keep = select_keep(&[a, b.clone(), c.clone()], 8);
        assert_eq!(keep, vec![b, c]);
    }

    #[test]
    fn equal_sizes_fall_back_to_smallest_path() {
        let records = vec![
            rec("z/song.flac", 500, X),
            rec("a/song.mp3", 500, X),
            rec("m/song.ogg", 500, X),
        ];
        let keep = select_keep(&records, 0);
        assert_eq!(keep.len(), 1);
        assert_eq!(keep[0].path.to_str(), Some("a/song.mp3"));
    }

    #[test]
    fn output_is_independent_of_input_order() {
        let records = vec![
            rec("d.mp3", 10, Y),
            rec("b.mp3", 30, X),
            rec("a.mp3", 30, X),
            rec("c.mp3", 20, Fingerprint(0x1234)),
        ];
        let mut reversed = records.clone();
        reversed.reverse();
        let forward = select_keep(&records, 2);
        assert_eq!(forward, select_keep(&reversed, 2));
        let paths: Vec<_> = forward.iter().map(|r| r.path.to_str().unwrap()).collect();
        assert_eq!(paths, vec!["a.mp3", "c.mp3", "d.mp3"]);
    }

    #[test]
    fn groups_list_duplicates_by_path() {
        let records = vec![
            rec("c.wav", 10, X),
            rec("big.wav", 99, X),
            rec("a.wav", 10, X),
            rec("solo.wav", 5, Y),
        ];
        let groups = group_duplicates(&records, 0);
        assert_eq!(groups.len(), 2);

        let dupes = &groups[0];
        assert_eq!(dupes.keep.path.to_str(), Some("big.wav"));
        let names: Vec<_> = dupes
            .duplicates
            .iter()
            .map(|r| r.path.to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.wav", "c.wav"]);
        assert_eq!(dupes.member_count(), 3);

        assert!(groups[1].is_singleton());
        assert_eq!(groups[1].keep.path.to_str(), Some("solo.wav"));
    }

    #[test]
    fn path_ties_compare_whole_strings() {
        // ' ' sorts before '/', so the deluxe folder wins the tie
        let records = vec![
            rec("music/Album/track.mp3", 500, X),
            rec("music/Album (Deluxe)/track.mp3", 500, X),
        ];
        let keep = select_keep(&records, 0);
        assert_eq!(keep[0].path.to_str(), Some("music/Album (Deluxe)/track.mp3"));

        let groups = group_duplicates(&records, 0);
        assert_eq!(
            groups[0].duplicates[0].path.to_str(),
            Some("music/Album/track.mp3")
        );
    }

    #[test]
    fn keepers_are_listed_in_string_order() {
        let records = vec![rec("x/a/1.mp3", 10, X), rec("x/a-b/2.mp3", 10, Y)];
        let paths: Vec<_> = select_keep(&records, 0)
            .iter()
            .map(|r| r.path.to_str().unwrap().to_string())
            .collect();
        assert_eq!(paths, vec!["x/a-b/2.mp3", "x/a/1.mp3"]);
    }

    #[test]
    fn empty_input_keeps_nothing() {
        assert!(select_keep(&[], 8).is_empty());
    }
}
