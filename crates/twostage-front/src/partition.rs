//! Projection of node classifications onto text.
//!
//! A [`TextPartition`] keeps a complete partition of `[0, usize::MAX)` into
//! categorized ranges, keyed by range start. Marks only ever raise the
//! category of a range, so the order of marks of different priority does
//! not matter.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt::Debug;
use std::ops::Range;

use twostage_syntax::{Span, Stage, SyntaxNode};

/// A category text ranges can be marked with.
pub trait PartitionCategory: Copy + Eq + Debug {
    /// Category of text nobody marked.
    const DEFAULT: Self;
    /// Answer to a query that straddles different categories.
    const CONFLICT: Self;

    /// Marks replace categories of strictly lower priority.
    fn priority(self) -> u8;
}

impl PartitionCategory for Stage {
    const DEFAULT: Self = Stage::Default;
    const CONFLICT: Self = Stage::Conflict;

    fn priority(self) -> u8 {
        match self {
            Stage::Default => 0,
            Stage::GeneratedOnly => 1,
            Stage::GenerationTimeOnly => 2,
            Stage::Conflict => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextPartition<C> {
    /// start -> (end, category). Ranges are disjoint, adjacent and cover
    /// `[0, usize::MAX)`; neighbours never share a category.
    ranges: BTreeMap<usize, (usize, C)>,
}

impl<C: PartitionCategory> Default for TextPartition<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PartitionCategory> TextPartition<C> {
    pub fn new() -> Self {
        Self {
            ranges: BTreeMap::from([(0, (usize::MAX, C::DEFAULT))]),
        }
    }

    /// The stored range containing `offset`.
    fn containing(&self, offset: usize) -> (usize, usize, C) {
        let (&start, &(end, category)) = self
            .ranges
            .range(..=offset)
            .next_back()
            .unwrap_or_else(|| panic!("partition does not cover offset {offset}"));
        (start, end, category)
    }

    fn split_at(&mut self, offset: usize) {
        if offset == usize::MAX {
            return;
        }
        let (start, end, category) = self.containing(offset);
        if start == offset {
            return;
        }
        self.ranges.insert(start, (offset, category));
        self.ranges.insert(offset, (end, category));
    }

    /// Merges neighbours of equal category around the boundaries in
    /// `[from, to]`.
    fn coalesce(&mut self, from: usize, to: usize) {
        let boundaries: Vec<usize> = self.ranges.range(from..=to).map(|(&start, _)| start).collect();
        for boundary in boundaries {
            let Some(&(end, category)) = self.ranges.get(&boundary) else {
                continue;
            };
            let Some((&previous, &(previous_end, previous_category))) =
                self.ranges.range(..boundary).next_back()
            else {
                continue;
            };
            if previous_end == boundary && previous_category == category {
                self.ranges.remove(&boundary);
                self.ranges.insert(previous, (end, category));
            }
        }
    }

    /// Raises every part of `range` whose category has lower priority than
    /// `category`.
    pub fn mark(&mut self, range: Range<usize>, category: C) {
        if range.is_empty() {
            return;
        }
        self.split_at(range.start);
        self.split_at(range.end);
        for (_, (_, current)) in self.ranges.range_mut(range.start..range.end) {
            if category.priority() > current.priority() {
                *current = category;
            }
        }
        self.coalesce(range.start, range.end);
    }

    /// Category of the range containing `range`, or the conflict category
    /// when `range` spans several.
    pub fn classify(&self, range: Range<usize>) -> C {
        let (_, end, category) = self.containing(range.start);
        if range.end <= end {
            category
        } else {
            C::CONFLICT
        }
    }

    /// Marked ranges in order, skipping unmarked text.
    pub fn enumerate_ranges(&self) -> Ranges<'_, C> {
        Ranges {
            inner: self.ranges.iter(),
            pending: None,
        }
    }

    /// Every range, unmarked text included, clipped to `[0, limit)`.
    pub fn covering(&self, limit: usize) -> Vec<(Range<usize>, C)> {
        self.ranges
            .range(..limit)
            .map(|(&start, &(end, category))| (start..end.min(limit), category))
            .collect()
    }
}

/// Iterator returned by [`TextPartition::enumerate_ranges`].
pub struct Ranges<'a, C> {
    inner: btree_map::Iter<'a, usize, (usize, C)>,
    pending: Option<(Range<usize>, C)>,
}

impl<C: PartitionCategory> Iterator for Ranges<'_, C> {
    type Item = (Range<usize>, C);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some((&start, &(end, category))) = self.inner.next() else {
                return self.pending.take();
            };
            if category == C::DEFAULT {
                if let Some(done) = self.pending.take() {
                    return Some(done);
                }
                continue;
            }
            match self.pending.take() {
                Some((range, current)) if current == category && range.end == start => {
                    self.pending = Some((range.start..end, category));
                }
                Some(done) => {
                    self.pending = Some((start..end, category));
                    return Some(done);
                }
                None => self.pending = Some((start..end, category)),
            }
        }
    }
}

/// Marks the text of every classified node of `tree` with its stage.
///
/// A node owns the parts of its span not covered by child nodes (keywords,
/// punctuation, tokens), so marks never overlap and nested code keeps its
/// own stage. `Default` nodes and synthesized nodes are left unmarked.
pub fn project_stages(tree: &SyntaxNode) -> TextPartition<Stage> {
    let mut partition = TextPartition::new();
    for node in tree.descendants() {
        let Some(stage) = node.stage().filter(|stage| stage.is_determinate()) else {
            continue;
        };
        for segment in own_segments(&node) {
            partition.mark(segment, stage);
        }
    }
    partition
}

fn own_segments(node: &SyntaxNode) -> Vec<Range<usize>> {
    let span = node.span();
    if span.is_empty() {
        return Vec::new();
    }
    let mut children: Vec<Span> = node
        .child_nodes()
        .map(SyntaxNode::span)
        .filter(|child| !child.is_empty())
        .collect();
    children.sort();

    let mut segments = Vec::new();
    let mut cursor = span.start;
    for child in children {
        if child.start > cursor {
            segments.push(cursor..child.start);
        }
        cursor = cursor.max(child.end);
    }
    if cursor < span.end {
        segments.push(cursor..span.end);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::classified;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    enum Color {
        None,
        Low,
        High,
        Mixed,
    }

    impl PartitionCategory for Color {
        const DEFAULT: Self = Color::None;
        const CONFLICT: Self = Color::Mixed;

        fn priority(self) -> u8 {
            match self {
                Color::None => 0,
                Color::Low => 1,
                Color::High => 2,
                Color::Mixed => 3,
            }
        }
    }

    #[test]
    fn test_lower_priority_mark_fills_only_the_gap() {
        let mut partition = TextPartition::new();
        partition.mark(0..10, Color::High);
        partition.mark(5..15, Color::Low);
        assert_eq!(
            partition.covering(20),
            vec![
                (0..10, Color::High),
                (10..15, Color::Low),
                (15..20, Color::None),
            ]
        );
        let marked: Vec<_> = partition.enumerate_ranges().collect();
        assert_eq!(marked, vec![(0..10, Color::High), (10..15, Color::Low)]);
    }

    #[test]
    fn test_classify() {
        let mut partition = TextPartition::new();
        partition.mark(0..10, Color::High);
        partition.mark(5..15, Color::Low);
        assert_eq!(partition.classify(2..8), Color::High);
        assert_eq!(partition.classify(10..15), Color::Low);
        assert_eq!(partition.classify(8..12), Color::Mixed);
        assert_eq!(partition.classify(40..50), Color::None);
    }

    #[test]
    fn test_marks_complete_partition() {
        let marks = [
            (3..9, Color::Low),
            (0..4, Color::High),
            (7..7, Color::High),
            (12..30, Color::Low),
            (8..13, Color::High),
            (29..31, Color::Low),
            (2..6, Color::Low),
        ];
        let mut partition = TextPartition::new();
        for (range, color) in marks {
            partition.mark(range, color);
        }
        let ranges = partition.covering(40);
        assert_eq!(ranges.first().map(|(range, _)| range.start), Some(0));
        assert_eq!(ranges.last().map(|(range, _)| range.end), Some(40));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].0.end, pair[1].0.start);
            assert_ne!(pair[0].1, pair[1].1);
        }
        assert_eq!(
            ranges,
            vec![
                (0..4, Color::High),
                (4..8, Color::Low),
                (8..13, Color::High),
                (13..31, Color::Low),
                (31..40, Color::None),
            ]
        );
    }

    #[test]
    fn test_random_marks_complete_partition() {
        const LIMIT: usize = 40;
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = |bound: usize| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as usize % bound
        };
        let colors = [Color::None, Color::Low, Color::High, Color::Mixed];

        for _ in 0..200 {
            let mut partition = TextPartition::new();
            let mut expected = [Color::None; LIMIT];
            for _ in 0..next(12) {
                let a = next(LIMIT + 1);
                let b = next(LIMIT + 1);
                let color = colors[next(colors.len())];
                partition.mark(a.min(b)..a.max(b), color);
                for slot in &mut expected[a.min(b)..a.max(b)] {
                    if color.priority() > slot.priority() {
                        *slot = color;
                    }
                }
            }

            let ranges = partition.covering(LIMIT);
            assert_eq!(ranges.first().map(|(range, _)| range.start), Some(0));
            assert_eq!(ranges.last().map(|(range, _)| range.end), Some(LIMIT));
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].0.end, pair[1].0.start);
                assert_ne!(pair[0].1, pair[1].1);
            }
            for (range, color) in &ranges {
                assert!(expected[range.clone()].iter().all(|slot| slot == color));
            }

            let marked: Vec<_> = partition.enumerate_ranges().collect();
            assert!(marked.iter().all(|(range, color)| {
                !range.is_empty() && *color != Color::None
            }));
            for pair in marked.windows(2) {
                assert!(pair[0].0.end <= pair[1].0.start);
            }
        }
    }

    #[test]
    fn test_equal_or_lower_mark_is_noop() {
        let mut partition = TextPartition::new();
        partition.mark(4..8, Color::High);
        let before = partition.clone();
        partition.mark(4..8, Color::High);
        partition.mark(4..8, Color::Low);
        assert_eq!(partition, before);
    }

    #[test]
    fn test_enumeration_is_restartable() {
        let mut partition = TextPartition::new();
        partition.mark(1..2, Color::Low);
        partition.mark(5..6, Color::Low);
        let first: Vec<_> = partition.enumerate_ranges().collect();
        let second: Vec<_> = partition.enumerate_ranges().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_project_stages() {
        let source = "template T(int n) { Console.WriteLine(n); }";
        let (_, result) = classified(source);
        let partition = project_stages(&result.tree);
        let text = |range: Range<usize>| &source[range];
        let marked: Vec<_> = partition
            .enumerate_ranges()
            .map(|(range, stage)| (text(range), stage))
            .collect();
        assert!(marked.contains(&("int n", Stage::GenerationTimeOnly)), "{marked:?}");
        assert!(marked.contains(&("n", Stage::GenerationTimeOnly)), "{marked:?}");
        assert!(
            marked.contains(&("Console.WriteLine(", Stage::GeneratedOnly)),
            "{marked:?}"
        );
    }
}
