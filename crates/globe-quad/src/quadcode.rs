//! Quadcode decoding and encoding.

use std::fmt;
use std::str::FromStr;

use crate::error::{QuadError, QuadResult};

/// Deepest level a quadcode may address (tile axes must fit in `u32`).
pub const MAX_DEPTH: usize = 31;

/// Integer coordinates of a tile in the quadtree.
///
/// `x` grows eastwards and `y` southwards, both in `0..2^lod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileCoord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Level of detail (quadtree depth).
    pub lod: u32,
}

impl TileCoord {
    /// The single tile at level 0.
    pub const ROOT: Self = Self { x: 0, y: 0, lod: 0 };

    /// Create a new tile coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32, lod: u32) -> Self {
        Self { x, y, lod }
    }

    /// Number of tiles along each axis at this level.
    #[must_use]
    pub fn tiles_per_axis(&self) -> u64 {
        1u64 << self.lod
    }

    /// The tile one level up containing this one, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.lod == 0 {
            return None;
        }
        Some(Self::new(self.x >> 1, self.y >> 1, self.lod - 1))
    }

    /// The four tiles one level down, in quadcode digit order.
    #[must_use]
    pub fn children(&self) -> [Self; 4] {
        let (x, y, lod) = (self.x << 1, self.y << 1, self.lod + 1);
        [
            Self::new(x, y, lod),
            Self::new(x + 1, y, lod),
            Self::new(x, y + 1, lod),
            Self::new(x + 1, y + 1, lod),
        ]
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.lod, self.x, self.y)
    }
}

/// Decode a quadcode into tile coordinates.
///
/// Each character picks a quadrant of its parent, most significant level
/// first:
/// - `0`: top-left
/// - `1`: top-right (sets the x bit)
/// - `2`: bottom-left (sets the y bit)
/// - `3`: bottom-right (sets both)
///
/// The empty string is the root tile at level 0.
///
/// # Errors
///
/// Returns an error if the quadcode contains characters other than `0`-`3`
/// or is deeper than [`MAX_DEPTH`].
pub fn decode(quadcode: &str) -> QuadResult<TileCoord> {
    let depth = quadcode.len();
    if depth > MAX_DEPTH {
        return Err(QuadError::TooDeep {
            depth,
            max: MAX_DEPTH,
        });
    }

    let mut x = 0u32;
    let mut y = 0u32;
    for (position, digit) in quadcode.chars().enumerate() {
        x <<= 1;
        y <<= 1;
        match digit {
            '0' => {}
            '1' => x |= 1,
            '2' => y |= 1,
            '3' => {
                x |= 1;
                y |= 1;
            }
            found => return Err(QuadError::InvalidDigit { position, found }),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    Ok(TileCoord::new(x, y, depth as u32))
}

/// Encode tile coordinates as a quadcode.
///
/// # Errors
///
/// Returns an error if the level is deeper than [`MAX_DEPTH`] or the tile
/// lies outside the grid for its level.
pub fn encode(coord: TileCoord) -> QuadResult<String> {
    let depth = coord.lod as usize;
    if depth > MAX_DEPTH {
        return Err(QuadError::TooDeep {
            depth,
            max: MAX_DEPTH,
        });
    }
    let size = coord.tiles_per_axis();
    if u64::from(coord.x) >= size || u64::from(coord.y) >= size {
        return Err(QuadError::OutOfRange {
            x: coord.x,
            y: coord.y,
            lod: coord.lod,
        });
    }

    let mut quadcode = String::with_capacity(depth);
    for level in (0..coord.lod).rev() {
        let mask = 1u32 << level;
        let mut digit = b'0';
        if coord.x & mask != 0 {
            digit += 1;
        }
        if coord.y & mask != 0 {
            digit += 2;
        }
        quadcode.push(digit as char);
    }
    Ok(quadcode)
}

/// A validated quadcode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Quadcode(String);

impl Quadcode {
    /// The root quadcode (empty path).
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Validate and wrap a quadcode string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid quadcode.
    pub fn parse(quadcode: impl Into<String>) -> QuadResult<Self> {
        let quadcode = quadcode.into();
        decode(&quadcode)?;
        Ok(Self(quadcode))
    }

    /// The quadcode as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Level of detail addressed by this quadcode.
    #[must_use]
    pub fn lod(&self) -> usize {
        self.0.len()
    }

    /// Tile coordinates for this quadcode.
    #[must_use]
    pub fn coord(&self) -> TileCoord {
        // Validated on construction.
        decode(&self.0).unwrap_or_default()
    }
}

impl FromStr for Quadcode {
    type Err = QuadError;

    fn from_str(s: &str) -> QuadResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<TileCoord> for Quadcode {
    type Error = QuadError;

    fn try_from(coord: TileCoord) -> QuadResult<Self> {
        encode(coord).map(Self)
    }
}

impl fmt::Display for Quadcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Quadcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_root() {
        assert_eq!(decode("").unwrap(), TileCoord::new(0, 0, 0));
    }

    #[test]
    fn test_decode_level1() {
        assert_eq!(decode("0").unwrap(), TileCoord::new(0, 0, 1));
        assert_eq!(decode("1").unwrap(), TileCoord::new(1, 0, 1));
        assert_eq!(decode("2").unwrap(), TileCoord::new(0, 1, 1));
        assert_eq!(decode("3").unwrap(), TileCoord::new(1, 1, 1));
    }

    #[test]
    fn test_decode_level2() {
        // "1" selects the top-right quadrant, then "2" its bottom-left child.
        assert_eq!(decode("12").unwrap(), TileCoord::new(2, 1, 2));
    }

    #[test]
    fn test_decode_known_tile() {
        // Bing's documented example: quadkey "213" is tile (3, 5) at level 3.
        assert_eq!(decode("213").unwrap(), TileCoord::new(3, 5, 3));
    }

    #[test]
    fn test_decode_invalid_digit() {
        let err = decode("0142").unwrap_err();
        assert_eq!(
            err,
            QuadError::InvalidDigit {
                position: 2,
                found: '4'
            }
        );
    }

    #[test]
    fn test_decode_too_deep() {
        let deep = "0".repeat(MAX_DEPTH + 1);
        assert!(matches!(decode(&deep), Err(QuadError::TooDeep { .. })));
        assert!(decode(&"3".repeat(MAX_DEPTH)).is_ok());
    }

    #[test]
    fn test_encode_out_of_range() {
        let err = encode(TileCoord::new(4, 0, 2)).unwrap_err();
        assert_eq!(err, QuadError::OutOfRange { x: 4, y: 0, lod: 2 });
    }

    #[test]
    fn test_encode_root() {
        assert_eq!(encode(TileCoord::ROOT).unwrap(), "");
    }

    #[test]
    fn test_edge_siblings_are_adjacent() {
        for (a, b) in [("120", "121"), ("122", "123"), ("120", "122"), ("121", "123")] {
            let a = decode(a).unwrap();
            let b = decode(b).unwrap();
            assert_eq!(a.lod, b.lod);
            let dx = a.x.abs_diff(b.x);
            let dy = a.y.abs_diff(b.y);
            assert_eq!(dx + dy, 1, "{a} and {b} should share an edge");
        }
    }

    #[test]
    fn test_parent_and_children() {
        let tile = decode("213").unwrap();
        let parent = tile.parent().unwrap();
        assert_eq!(parent, decode("21").unwrap());
        assert!(parent.children().contains(&tile));
        assert_eq!(TileCoord::ROOT.parent(), None);
    }

    #[test]
    fn test_quadcode_newtype() {
        let q: Quadcode = "0123".parse().unwrap();
        assert_eq!(q.lod(), 4);
        assert_eq!(q.coord(), decode("0123").unwrap());
        assert_eq!(q.to_string(), "0123");
        assert!("01x".parse::<Quadcode>().is_err());
        assert_eq!(Quadcode::root().coord(), TileCoord::ROOT);
    }

    proptest! {
        #[test]
        fn prop_children_follow_digit_order(code in "[0-3]{0,20}") {
            let tile = decode(&code).unwrap();
            for (digit, child) in ['0', '1', '2', '3'].into_iter().zip(tile.children()) {
                let child_code = format!("{code}{digit}");
                prop_assert_eq!(decode(&child_code).unwrap(), child);
            }
        }

        #[test]
        fn prop_siblings_share_parent(code in "[0-3]{0,18}", a in 0u8..4, b in 0u8..4) {
            let qa = format!("{code}{}", char::from(b'0' + a));
            let qb = format!("{code}{}", char::from(b'0' + b));
            let ta = decode(&qa).unwrap();
            let tb = decode(&qb).unwrap();
            prop_assert_eq!(ta.lod, tb.lod);
            prop_assert_eq!(ta.parent(), tb.parent());
            prop_assert!(ta.x.abs_diff(tb.x) <= 1 && ta.y.abs_diff(tb.y) <= 1);
        }

        #[test]
        fn prop_encode_inverts_decode(code in "[0-3]{0,31}") {
            let tile = decode(&code).unwrap();
            prop_assert_eq!(encode(tile).unwrap(), code);
        }
    }
}
