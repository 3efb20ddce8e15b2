//! Build formula text from a desired pixel coordinate.
//!
//! Authors usually think "870 px, which is the right edge minus the margin".
//! Given the intent ([`FormulaMode`]) and the concrete value measured on the
//! current canvas, these helpers produce a formula that keeps that intent
//! when the canvas size or margin changes.

use super::registry::Axis;
use std::fmt;
use std::str::FromStr;

/// How a coordinate relates to the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaMode {
    /// A fixed pixel value.
    Absolute,
    /// Relative to the margin from the leading edge.
    Margin,
    /// Relative to the canvas center.
    Center,
    /// Relative to the trailing edge minus the margin.
    Edge,
}

impl FromStr for FormulaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "absolute" | "abs" => Ok(Self::Absolute),
            "margin" => Ok(Self::Margin),
            "center" => Ok(Self::Center),
            "edge" => Ok(Self::Edge),
            other => Err(format!(
                "unknown formula mode '{other}' (expected absolute, margin, center, edge)"
            )),
        }
    }
}

impl fmt::Display for FormulaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absolute => "absolute",
            Self::Margin => "margin",
            Self::Center => "center",
            Self::Edge => "edge",
        })
    }
}

fn signed_suffix(offset: i64) -> String {
    match offset {
        0 => String::new(),
        o if o > 0 => format!(" + {o}"),
        o => format!(" - {}", o.unsigned_abs()),
    }
}

/// Produce formula text that evaluates to `value` on a canvas whose size
/// along `axis` is `canvas_size`.
///
/// ```
/// # use infocard::position::{Axis, FormulaMode, build_formula};
/// assert_eq!(build_formula(FormulaMode::Edge, Axis::X, 870, 900, 30), "canvas_width - MARGIN");
/// assert_eq!(build_formula(FormulaMode::Center, Axis::Y, 560, 1200, 30), "(canvas_height // 2) - 40");
/// ```
pub fn build_formula(
    mode: FormulaMode,
    axis: Axis,
    value: i64,
    canvas_size: i64,
    margin: i64,
) -> String {
    let size_var = match axis {
        Axis::X => "canvas_width",
        Axis::Y => "canvas_height",
    };
    match mode {
        FormulaMode::Absolute => value.to_string(),
        FormulaMode::Margin => format!("MARGIN{}", signed_suffix(value - margin)),
        FormulaMode::Center => {
            let offset = value - canvas_size.div_euclid(2);
            if offset == 0 {
                format!("{size_var} // 2")
            } else {
                format!("({size_var} // 2){}", signed_suffix(offset))
            }
        }
        FormulaMode::Edge => {
            let offset = value - (canvas_size - margin);
            format!("{size_var} - MARGIN{}", signed_suffix(offset))
        }
    }
}
