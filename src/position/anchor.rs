//! Anchor points on an overlay's bounding box.
//!
//! An anchor names which point of the overlay lands on the coordinate a
//! position formula resolves to. The nine anchors form a 3×3 grid:
//!
//! ```text
//! top-left      top-center      top-right
//! middle-left   middle-center   middle-right
//! bottom-left   bottom-center   bottom-right
//! ```
//!
//! `center` is accepted as an alias for `middle-center` when parsing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Horizontal component of an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Horizontal {
    Left,
    Center,
    Right,
}

/// Vertical component of an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vertical {
    Top,
    Middle,
    Bottom,
}

/// One of the nine anchor points of an overlay's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Anchor {
    pub vertical: Vertical,
    pub horizontal: Horizontal,
}

impl Anchor {
    pub const TOP_LEFT: Anchor = Anchor::new(Vertical::Top, Horizontal::Left);
    pub const TOP_CENTER: Anchor = Anchor::new(Vertical::Top, Horizontal::Center);
    pub const TOP_RIGHT: Anchor = Anchor::new(Vertical::Top, Horizontal::Right);
    pub const MIDDLE_LEFT: Anchor = Anchor::new(Vertical::Middle, Horizontal::Left);
    pub const MIDDLE_CENTER: Anchor = Anchor::new(Vertical::Middle, Horizontal::Center);
    pub const MIDDLE_RIGHT: Anchor = Anchor::new(Vertical::Middle, Horizontal::Right);
    pub const BOTTOM_LEFT: Anchor = Anchor::new(Vertical::Bottom, Horizontal::Left);
    pub const BOTTOM_CENTER: Anchor = Anchor::new(Vertical::Bottom, Horizontal::Center);
    pub const BOTTOM_RIGHT: Anchor = Anchor::new(Vertical::Bottom, Horizontal::Right);

    /// All nine anchors in reading order (row by row).
    pub const ALL: [Anchor; 9] = [
        Self::TOP_LEFT,
        Self::TOP_CENTER,
        Self::TOP_RIGHT,
        Self::MIDDLE_LEFT,
        Self::MIDDLE_CENTER,
        Self::MIDDLE_RIGHT,
        Self::BOTTOM_LEFT,
        Self::BOTTOM_CENTER,
        Self::BOTTOM_RIGHT,
    ];

    pub const fn new(vertical: Vertical, horizontal: Horizontal) -> Self {
        Self {
            vertical,
            horizontal,
        }
    }

    /// Offset of the anchor point from the overlay's top-left corner.
    ///
    /// Subtract it from a resolved point to get the paste coordinate.
    ///
    /// ```
    /// # use infocard::position::Anchor;
    /// assert_eq!(Anchor::BOTTOM_RIGHT.offset(120, 80), (120, 80));
    /// assert_eq!(Anchor::MIDDLE_CENTER.offset(121, 81), (60, 40));
    /// ```
    pub fn offset(self, width: i64, height: i64) -> (i64, i64) {
        let dx = match self.horizontal {
            Horizontal::Left => 0,
            Horizontal::Center => width.div_euclid(2),
            Horizontal::Right => width,
        };
        let dy = match self.vertical {
            Vertical::Top => 0,
            Vertical::Middle => height.div_euclid(2),
            Vertical::Bottom => height,
        };
        (dx, dy)
    }

    pub fn as_str(self) -> &'static str {
        match (self.vertical, self.horizontal) {
            (Vertical::Top, Horizontal::Left) => "top-left",
            (Vertical::Top, Horizontal::Center) => "top-center",
            (Vertical::Top, Horizontal::Right) => "top-right",
            (Vertical::Middle, Horizontal::Left) => "middle-left",
            (Vertical::Middle, Horizontal::Center) => "middle-center",
            (Vertical::Middle, Horizontal::Right) => "middle-right",
            (Vertical::Bottom, Horizontal::Left) => "bottom-left",
            (Vertical::Bottom, Horizontal::Center) => "bottom-center",
            (Vertical::Bottom, Horizontal::Right) => "bottom-right",
        }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::TOP_LEFT
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown anchor '{0}' (expected one of top-left, top-center, top-right, middle-left, middle-center, middle-right, bottom-left, bottom-center, bottom-right)")]
pub struct ParseAnchorError(pub String);

impl FromStr for Anchor {
    type Err = ParseAnchorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized == "center" {
            return Ok(Self::MIDDLE_CENTER);
        }
        Self::ALL
            .into_iter()
            .find(|anchor| anchor.as_str() == normalized)
            .ok_or_else(|| ParseAnchorError(s.to_string()))
    }
}

impl TryFrom<String> for Anchor {
    type Error = ParseAnchorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Anchor> for String {
    fn from(anchor: Anchor) -> Self {
        anchor.as_str().to_string()
    }
}
