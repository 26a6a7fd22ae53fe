use std::ops::Range;

use bio::data_structures::interval_tree::IntervalTree;
use chrono::{DateTime, Utc};

/// 半開区間 `[start, end)` が重なるかどうか
pub fn overlaps<T: PartialOrd>(a: &Range<T>, b: &Range<T>) -> bool {
    a.start < a.end && b.start < b.end && a.start < b.end && b.start < a.end
}

/// 予約対象ごとの占有時間帯
pub struct Occupancy<K> {
    tree: IntervalTree<DateTime<Utc>, (K, Range<DateTime<Utc>>)>,
}

impl<K> Occupancy<K> {
    /// 空の区間は無視する
    pub fn new<T: IntoIterator<Item = (Range<DateTime<Utc>>, K)>>(bookings: T) -> Self {
        let mut tree = IntervalTree::new();
        for (time, key) in bookings {
            if time.start < time.end {
                tree.insert(time.clone(), (key, time));
            }
        }
        Self { tree }
    }

    /// `time` と重なる区間のキー
    pub fn conflicts<'a>(&'a self, time: &'a Range<DateTime<Utc>>) -> impl Iterator<Item = &'a K> {
        (time.start < time.end)
            .then(|| self.tree.find(time.clone()))
            .into_iter()
            .flatten()
            .map(|entry| entry.data())
            .filter(move |(_, booked)| overlaps(booked, time))
            .map(|(key, _)| key)
    }

    pub fn is_free(&self, time: &Range<DateTime<Utc>>) -> bool {
        self.conflicts(time).next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_overlaps_half_open() {
        assert!(overlaps(&(1..5), &(4..8)));
        assert!(overlaps(&(1..9), &(3..4)));
        assert!(!overlaps(&(1..5), &(5..8)));
        assert!(!overlaps(&(5..8), &(1..5)));
        assert!(!overlaps(&(3..3), &(1..5)));
    }

    #[test]
    fn test_occupancy_conflicts() {
        let occupancy = Occupancy::new(vec![(at(8)..at(10), 1), (at(12)..at(14), 2)]);
        let hits = occupancy.conflicts(&(at(9)..at(13))).copied().collect::<Vec<_>>();
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&1) && hits.contains(&2));
        assert!(occupancy.is_free(&(at(10)..at(12))));
        assert!(!occupancy.is_free(&(at(13)..at(15))));
    }

    #[test]
    fn test_occupancy_empty_query() {
        let occupancy = Occupancy::new(vec![(at(8)..at(10), 1)]);
        assert!(occupancy.is_free(&(at(9)..at(9))));
    }
}
