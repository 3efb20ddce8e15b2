//! Position model: where an overlay goes on a canvas.
//!
//! A position is stored by id as two formulas and an anchor. Resolving it
//! against a canvas and an overlay takes three steps:
//!
//! 1. Evaluate the x and y [`Formula`]s against an [`EvalContext`]
//!    (canvas size, overlay size, margin) to get the anchor point.
//! 2. Ask the [`Anchor`] for its offset inside the overlay's bounding box.
//! 3. Subtract the offset to get the top-left paste coordinate.
//!
//! The module is split into:
//! - **Formula**: restricted arithmetic parser and interpreter
//! - **Anchor**: the 3×3 grid of anchor points
//! - **Registry**: [`PositionRegistry`] of named [`PositionDefinition`]s
//! - **Builder**: formula text from a measured value and an intent

mod anchor;
mod builder;
pub mod formula;
mod registry;

pub use anchor::{Anchor, Horizontal, ParseAnchorError, Vertical};
pub use builder::{FormulaMode, build_formula};
pub use formula::{EvalContext, Formula, FormulaError, evaluate};
pub use registry::{Axis, PositionDefinition, PositionError, PositionRegistry};
