//! Sorted set container
//!
//! Members live in a map (member -> score) and in an ordered index of
//! `(score, member)` pairs. Ordering is score ascending, then member bytes
//! lexicographically, which makes every range query deterministic.

use super::value::{parse_f64, zset_member_cost};
use bytes::Bytes;
use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

/// One side of a score range (`1.5`, `(1.5`, `-inf`, `+inf`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBound {
    pub value: f64,
    pub exclusive: bool,
}

impl ScoreBound {
    pub fn inclusive(value: f64) -> Self {
        ScoreBound {
            value,
            exclusive: false,
        }
    }

    pub fn exclusive(value: f64) -> Self {
        ScoreBound {
            value,
            exclusive: true,
        }
    }

    /// Parse a bound in ZRANGEBYSCORE syntax
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(raw).ok()?;
        let (exclusive, number) = match text.strip_prefix('(') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let value = parse_score(number.as_bytes())?;
        Some(ScoreBound { value, exclusive })
    }

    fn admits_as_min(&self, score: f64) -> bool {
        if self.exclusive {
            score > self.value
        } else {
            score >= self.value
        }
    }

    fn admits_as_max(&self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }
}

/// Parse a score, accepting `inf`, `+inf` and `-inf`. NaN is rejected.
pub fn parse_score(raw: &[u8]) -> Option<f64> {
    parse_f64(raw)
}

/// Format a score the way replies and the log expect it
pub fn format_score(score: f64) -> Bytes {
    if score == f64::INFINITY {
        Bytes::from_static(b"inf")
    } else if score == f64::NEG_INFINITY {
        Bytes::from_static(b"-inf")
    } else {
        Bytes::from(score.to_string())
    }
}

/// Score-ordered set of unique members
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSet {
    scores: HashMap<Bytes, f64>,
    index: BTreeSet<(OrderedFloat<f64>, Bytes)>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Insert or update a member. Returns the previous score, if any.
    pub fn insert(&mut self, member: Bytes, score: f64) -> Option<f64> {
        // -0.0 and 0.0 must land on the same index slot
        let score = if score == 0.0 { 0.0 } else { score };
        match self.scores.insert(member.clone(), score) {
            Some(old) => {
                if old != score {
                    self.index.remove(&(OrderedFloat(old), member.clone()));
                    self.index.insert((OrderedFloat(score), member));
                }
                Some(old)
            }
            None => {
                self.index.insert((OrderedFloat(score), member));
                None
            }
        }
    }

    /// Remove a member, returning its score
    pub fn remove(&mut self, member: &[u8]) -> Option<f64> {
        let (member, score) = self.scores.remove_entry(member)?;
        self.index.remove(&(OrderedFloat(score), member));
        Some(score)
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Zero-based position of a member in ascending order
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        let key = (OrderedFloat(score), Bytes::copy_from_slice(member));
        Some(self.index.range(..key).count())
    }

    /// Zero-based position of a member in descending order
    pub fn rev_rank(&self, member: &[u8]) -> Option<usize> {
        self.rank(member).map(|r| self.len() - 1 - r)
    }

    /// Members between two already normalised positions (inclusive)
    pub fn range_by_rank(&self, start: usize, stop: usize, reverse: bool) -> Vec<(Bytes, f64)> {
        if start > stop || start >= self.len() {
            return Vec::new();
        }
        let take = stop.min(self.len() - 1) - start + 1;
        let pick = |(score, member): &(OrderedFloat<f64>, Bytes)| (member.clone(), score.0);
        if reverse {
            self.index.iter().rev().skip(start).take(take).map(pick).collect()
        } else {
            self.index.iter().skip(start).take(take).map(pick).collect()
        }
    }

    /// Members whose score lies within `[min, max]`, honouring exclusivity
    pub fn range_by_score(
        &self,
        min: ScoreBound,
        max: ScoreBound,
        offset: usize,
        limit: Option<usize>,
    ) -> Vec<(Bytes, f64)> {
        let lower = Bound::Included((OrderedFloat(min.value), Bytes::new()));
        let iter = self
            .index
            .range((lower, Bound::Unbounded))
            .skip_while(|(score, _)| !min.admits_as_min(score.0))
            .take_while(|(score, _)| max.admits_as_max(score.0))
            .skip(offset)
            .map(|(score, member)| (member.clone(), score.0));

        match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    /// Count members within a score range
    pub fn count_in_range(&self, min: ScoreBound, max: ScoreBound) -> usize {
        let lower = Bound::Included((OrderedFloat(min.value), Bytes::new()));
        self.index
            .range((lower, Bound::Unbounded))
            .skip_while(|(score, _)| !min.admits_as_min(score.0))
            .take_while(|(score, _)| max.admits_as_max(score.0))
            .count()
    }

    /// Iterate members in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, f64)> {
        self.index.iter().map(|(score, member)| (member, score.0))
    }

    pub fn memory_usage(&self) -> usize {
        self.scores.keys().map(|m| zset_member_cost(m)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(items: &[(Bytes, f64)]) -> Vec<Bytes> {
        items.iter().map(|(m, _)| m.clone()).collect()
    }

    fn names(list: &[&'static str]) -> Vec<Bytes> {
        list.iter().map(|s| Bytes::from_static(s.as_bytes())).collect()
    }

    #[test]
    fn test_ties_break_on_member_bytes() {
        let mut zset = SortedSet::new();
        zset.insert(Bytes::from("c"), 1.0);
        zset.insert(Bytes::from("a"), 1.0);
        zset.insert(Bytes::from("b"), 0.5);
        zset.insert(Bytes::from("aa"), 1.0);

        let all = zset.range_by_rank(0, 10, false);
        assert_eq!(members(&all), names(&["b", "a", "aa", "c"]));
        assert_eq!(zset.rank(b"aa"), Some(2));
        assert_eq!(zset.rev_rank(b"aa"), Some(1));
    }

    #[test]
    fn test_update_moves_member() {
        let mut zset = SortedSet::new();
        zset.insert(Bytes::from("x"), 1.0);
        zset.insert(Bytes::from("y"), 2.0);
        assert_eq!(zset.insert(Bytes::from("x"), 3.0), Some(1.0));

        let all = zset.range_by_rank(0, 1, false);
        assert_eq!(members(&all), names(&["y", "x"]));
        assert_eq!(zset.len(), 2);
    }

    #[test]
    fn test_range_by_score_bounds() {
        let mut zset = SortedSet::new();
        for (m, s) in [("a", 1.0), ("b", 2.0), ("c", 2.0), ("d", 3.0)] {
            zset.insert(Bytes::from(m), s);
        }

        let inclusive = zset.range_by_score(ScoreBound::inclusive(2.0), ScoreBound::inclusive(3.0), 0, None);
        assert_eq!(members(&inclusive), names(&["b", "c", "d"]));

        let exclusive = zset.range_by_score(ScoreBound::exclusive(1.0), ScoreBound::exclusive(3.0), 0, None);
        assert_eq!(members(&exclusive), names(&["b", "c"]));

        let limited = zset.range_by_score(
            ScoreBound::inclusive(f64::NEG_INFINITY),
            ScoreBound::inclusive(f64::INFINITY),
            1,
            Some(2),
        );
        assert_eq!(members(&limited), names(&["b", "c"]));

        assert_eq!(zset.count_in_range(ScoreBound::exclusive(1.0), ScoreBound::inclusive(2.0)), 2);
    }

    #[test]
    fn test_parse_bounds() {
        assert_eq!(ScoreBound::parse(b"(1.5"), Some(ScoreBound::exclusive(1.5)));
        assert_eq!(ScoreBound::parse(b"-inf"), Some(ScoreBound::inclusive(f64::NEG_INFINITY)));
        assert_eq!(ScoreBound::parse(b"+inf"), Some(ScoreBound::inclusive(f64::INFINITY)));
        assert_eq!(ScoreBound::parse(b"abc"), None);
        assert_eq!(parse_score(b"nan"), None);
    }

    #[test]
    fn test_remove() {
        let mut zset = SortedSet::new();
        zset.insert(Bytes::from("a"), 1.0);
        assert_eq!(zset.remove(b"a"), Some(1.0));
        assert_eq!(zset.remove(b"a"), None);
        assert!(zset.is_empty());
        assert_eq!(zset.iter().count(), 0);
    }
}
