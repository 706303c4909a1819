use crate::syntax::Point;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A single text replacement: bytes `start_byte..old_end_byte` of the
/// previous buffer became `start_byte..new_end_byte` of the next one.
///
/// Points are informational; reuse decisions only look at byte offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Edit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
    pub start_point: Point,
    pub old_end_point: Point,
    pub new_end_point: Point,
}

impl Edit {
    #[must_use]
    pub const fn new(start_byte: usize, old_end_byte: usize, new_end_byte: usize) -> Self {
        Self {
            start_byte,
            old_end_byte,
            new_end_byte,
            start_point: Point::new(0, 0),
            old_end_point: Point::new(0, 0),
            new_end_point: Point::new(0, 0),
        }
    }

    /// Fills in the row/column points from the buffers before and after.
    #[must_use]
    pub fn with_points(mut self, old: &[u8], new: &[u8]) -> Self {
        self.start_point = Point::of_offset(old, self.start_byte);
        self.old_end_point = Point::of_offset(old, self.old_end_byte);
        self.new_end_point = Point::of_offset(new, self.new_end_byte);
        self
    }

    /// Smallest single edit turning `old` into `new`, or `None` if they are
    /// equal.
    #[must_use]
    pub fn between(old: &[u8], new: &[u8]) -> Option<Self> {
        if old == new {
            return None;
        }
        let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
        let limit = old.len().min(new.len()) - prefix;
        let suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(limit)
            .take_while(|(a, b)| a == b)
            .count();
        Some(Self::new(prefix, old.len() - suffix, new.len() - suffix).with_points(old, new))
    }

    /// Replaces `start..end` of `buffer` with `text`, returning the edit and
    /// the new buffer. Out-of-range offsets are clamped.
    #[must_use]
    pub fn splice(buffer: &[u8], start: usize, end: usize, text: &[u8]) -> (Self, Vec<u8>) {
        let start = start.min(buffer.len());
        let end = end.clamp(start, buffer.len());
        let mut next = Vec::with_capacity(buffer.len() - (end - start) + text.len());
        next.extend_from_slice(&buffer[..start]);
        next.extend_from_slice(text);
        next.extend_from_slice(&buffer[end..]);
        let edit = Self::new(start, end, start + text.len()).with_points(buffer, &next);
        (edit, next)
    }

    /// Net change in buffer length.
    #[must_use]
    pub fn delta(&self) -> isize {
        isize::try_from(self.new_end_byte).unwrap_or(isize::MAX)
            - isize::try_from(self.old_end_byte).unwrap_or(isize::MAX)
    }
}

/// A changed region: `old` in the original buffer, `new` in the final one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    old: (usize, usize),
    new: (usize, usize),
}

impl Segment {
    fn delta(&self) -> i64 {
        span(self.new) - span(self.old)
    }
}

fn span((start, end): (usize, usize)) -> i64 {
    i64::try_from(end.saturating_sub(start)).unwrap_or(i64::MAX)
}

fn offset(position: usize, delta: i64) -> usize {
    let position = i64::try_from(position).unwrap_or(i64::MAX);
    usize::try_from(position.saturating_add(delta)).unwrap_or(0)
}

/// A sequence of edits composed into one mapping from the original buffer
/// to the final one.
///
/// Each edit is expressed against the buffer produced by the edits before
/// it. Changed regions that touch are merged, so the map stays a sorted
/// list of disjoint segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditMap {
    segments: Vec<Segment>,
}

impl EditMap {
    #[must_use]
    pub fn new(edits: &[Edit]) -> Self {
        let mut map = Self::default();
        for edit in edits {
            map.apply(edit);
        }
        map
    }

    pub fn apply(&mut self, edit: &Edit) {
        let start = edit.start_byte;
        let old_end = edit.old_end_byte.max(start);
        let new_end = edit.new_end_byte.max(start);
        let delta = span((start, new_end)) - span((start, old_end));

        let first = self.segments.partition_point(|segment| segment.new.1 < start);
        let last = self.segments.partition_point(|segment| segment.new.0 <= old_end);
        let last = last.max(first);
        let before = self.delta_before(first);
        let through = self.delta_before(last);

        let (low, old_low) = match self.segments.get(first) {
            Some(segment) if first < last && segment.new.0 <= start => (segment.new.0, segment.old.0),
            _ => (start, offset(start, -before)),
        };
        let (high, old_high) = match last.checked_sub(1).and_then(|index| self.segments.get(index)) {
            Some(segment) if first < last && segment.new.1 >= old_end => {
                (segment.new.1, segment.old.1)
            }
            _ => (old_end, offset(old_end, -through)),
        };

        let merged = Segment {
            old: (old_low, old_high.max(old_low)),
            new: (low, offset(high, delta).max(low)),
        };
        for segment in &mut self.segments[last..] {
            segment.new = (offset(segment.new.0, delta), offset(segment.new.1, delta));
        }
        self.segments.splice(first..last, [merged]);
    }

    fn delta_before(&self, index: usize) -> i64 {
        self.segments[..index.min(self.segments.len())]
            .iter()
            .map(Segment::delta)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Net change in buffer length.
    #[must_use]
    pub fn delta(&self) -> i64 {
        self.delta_before(self.segments.len())
    }

    /// `true` if an edit touches the original range `start..end`. An
    /// insertion exactly at `start` counts; one exactly at `end` does not.
    #[must_use]
    pub fn touches(&self, start: usize, end: usize) -> bool {
        let index = self.segments.partition_point(|segment| segment.old.1 < start);
        self.segments
            .get(index)
            .is_some_and(|segment| segment.old.0 < end)
    }

    /// Maps an original offset to the final buffer. Offsets inside a
    /// changed region map into its replacement.
    #[must_use]
    pub fn to_new(&self, position: usize) -> usize {
        let index = self.segments.partition_point(|segment| segment.old.1 <= position);
        let before = self.delta_before(index);
        match self.segments.get(index) {
            Some(segment) if segment.old.0 <= position => {
                let within = position - segment.old.0;
                segment.new.0 + within.min(segment.new.1 - segment.new.0)
            }
            _ => offset(position, before),
        }
    }
}
