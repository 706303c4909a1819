#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte offset or length in a source buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TextSize(u32);

/// Half-open byte range `start..end`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TextRange {
    start: TextSize,
    end: TextSize,
}

/// Zero-based row and byte column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl TextSize {
    #[must_use]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    /// Converts a buffer index, saturating at `u32::MAX`.
    #[must_use]
    pub fn of(offset: usize) -> Self {
        Self(u32::try_from(offset).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn to_usize(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl From<u32> for TextSize {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::ops::Add<Self> for TextSize {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign<Self> for TextSize {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::ops::Sub<Self> for TextSize {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for TextSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TextRange {
    #[must_use]
    pub const fn new(start: TextSize, end: TextSize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn at(start: TextSize, len: TextSize) -> Self {
        Self::new(start, TextSize(start.0 + len.0))
    }

    #[must_use]
    pub const fn empty(offset: TextSize) -> Self {
        Self::new(offset, offset)
    }

    #[must_use]
    pub const fn start(self) -> TextSize {
        self.start
    }

    #[must_use]
    pub const fn end(self) -> TextSize {
        self.end
    }

    #[must_use]
    pub const fn len(self) -> TextSize {
        TextSize(self.end.0 - self.start.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    #[must_use]
    pub const fn contains(self, offset: TextSize) -> bool {
        offset.0 >= self.start.0 && offset.0 < self.end.0
    }

    #[must_use]
    pub const fn contains_range(self, other: Self) -> bool {
        other.start.0 >= self.start.0 && other.end.0 <= self.end.0
    }

    /// Smallest range covering both.
    #[must_use]
    pub fn cover(self, other: Self) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }

    #[must_use]
    pub fn intersect(self, other: Self) -> Option<Self> {
        let start = self.start.0.max(other.start.0);
        let end = self.end.0.min(other.end.0);

        if start < end {
            Some(Self::new(TextSize(start), TextSize(end)))
        } else {
            None
        }
    }

    /// The byte range as a `usize` range for slicing.
    #[must_use]
    pub const fn as_usize_range(self) -> std::ops::Range<usize> {
        self.start.0 as usize..self.end.0 as usize
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.0, self.end.0)
    }
}

impl Point {
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Computes the point of `offset` by counting newlines in `source`.
    #[must_use]
    pub fn of_offset(source: &[u8], offset: usize) -> Self {
        let offset = offset.min(source.len());
        let prefix = &source[..offset];
        let row = memchr::memchr_iter(b'\n', prefix).count();
        let line_start = memchr::memrchr(b'\n', prefix).map_or(0, |nl| nl + 1);
        Self {
            row: u32::try_from(row).unwrap_or(u32::MAX),
            column: u32::try_from(offset - line_start).unwrap_or(u32::MAX),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row + 1, self.column + 1)
    }
}

#[cfg(feature = "diagnostics")]
impl From<TextRange> for miette::SourceSpan {
    fn from(range: TextRange) -> Self {
        use miette::SourceOffset;
        Self::new(
            SourceOffset::from(range.start().to_usize()),
            range.len().to_usize(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_size_of_saturates() {
        assert_eq!(TextSize::of(42).get(), 42);
        assert_eq!(TextSize::of(usize::MAX).get(), u32::MAX);
    }

    #[test]
    fn test_text_size_sub_saturates() {
        assert_eq!(TextSize::new(3) - TextSize::new(5), TextSize::zero());
    }

    #[test]
    fn test_text_range_cover_and_intersect() {
        let a = TextRange::new(TextSize::new(2), TextSize::new(6));
        let b = TextRange::new(TextSize::new(4), TextSize::new(9));
        assert_eq!(a.cover(b), TextRange::new(TextSize::new(2), TextSize::new(9)));
        assert_eq!(
            a.intersect(b),
            Some(TextRange::new(TextSize::new(4), TextSize::new(6)))
        );
        assert_eq!(a.intersect(TextRange::empty(TextSize::new(6))), None);
    }

    #[test]
    fn test_text_range_contains() {
        let range = TextRange::at(TextSize::new(10), TextSize::new(5));
        assert!(range.contains(TextSize::new(10)));
        assert!(!range.contains(TextSize::new(15)));
        assert!(range.contains_range(TextRange::new(TextSize::new(11), TextSize::new(15))));
        assert_eq!(range.to_string(), "10..15");
    }

    #[test]
    fn test_point_of_offset() {
        let source = b"ab\ncde\n\nf";
        assert_eq!(Point::of_offset(source, 0), Point::new(0, 0));
        assert_eq!(Point::of_offset(source, 4), Point::new(1, 1));
        assert_eq!(Point::of_offset(source, 7), Point::new(2, 0));
        assert_eq!(Point::of_offset(source, 8), Point::new(3, 0));
        assert_eq!(Point::of_offset(source, 100), Point::new(3, 1));
    }
}
