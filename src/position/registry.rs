//! Named position definitions and their resolution to pixel coordinates.

use super::anchor::Anchor;
use super::formula::{EvalContext, Formula, FormulaError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Which formula of a definition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("position '{0}' is not defined")]
    Unknown(String),
    #[error("position '{id}': {axis} formula '{formula}' is invalid: {source}")]
    Formula {
        id: String,
        axis: Axis,
        formula: String,
        source: FormulaError,
    },
}

/// A named placement: one formula per axis plus the anchor that lands on
/// the resolved point.
///
/// Serialized as `{ x = "...", y = "...", anchor = "top-left" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDefinition {
    pub x: String,
    pub y: String,
    #[serde(default)]
    pub anchor: Anchor,
}

impl PositionDefinition {
    pub fn new(x: impl Into<String>, y: impl Into<String>, anchor: Anchor) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            anchor,
        }
    }

    /// Compile both formulas, reporting the first that fails.
    pub fn compile(&self, id: &str) -> Result<(Formula, Formula), PositionError> {
        let compile_axis = |axis: Axis, src: &str| {
            Formula::parse(src).map_err(|source| PositionError::Formula {
                id: id.to_string(),
                axis,
                formula: src.to_string(),
                source,
            })
        };
        Ok((compile_axis(Axis::X, &self.x)?, compile_axis(Axis::Y, &self.y)?))
    }

    /// Resolve the overlay's top-left paste coordinate.
    ///
    /// The formulas give the anchor point; the anchor offset is subtracted
    /// from it. No clamping: the result may lie outside the canvas.
    pub fn place(&self, id: &str, ctx: &EvalContext) -> Result<(i64, i64), PositionError> {
        let (fx, fy) = self.compile(id)?;
        let eval_axis = |axis: Axis, formula: &Formula| {
            formula
                .evaluate(ctx)
                .map_err(|source| PositionError::Formula {
                    id: id.to_string(),
                    axis,
                    formula: formula.source().to_string(),
                    source,
                })
        };
        let (dx, dy) = self.anchor.offset(ctx.overlay_width, ctx.overlay_height);
        let shift = |axis: Axis, formula: &Formula, point: i64, offset: i64| {
            point
                .checked_sub(offset)
                .ok_or_else(|| PositionError::Formula {
                    id: id.to_string(),
                    axis,
                    formula: formula.source().to_string(),
                    source: FormulaError::Overflow,
                })
        };
        let x = shift(Axis::X, &fx, eval_axis(Axis::X, &fx)?, dx)?;
        let y = shift(Axis::Y, &fy, eval_axis(Axis::Y, &fy)?, dy)?;
        Ok((x, y))
    }
}

/// Mapping from position id to definition.
///
/// Ids are strings; dataset cells like `5` refer to the id `"5"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionRegistry {
    positions: BTreeMap<String, PositionDefinition>,
}

impl PositionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&PositionDefinition> {
        self.positions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Insert or replace a definition; returns the previous one.
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        definition: PositionDefinition,
    ) -> Option<PositionDefinition> {
        self.positions.insert(id.into(), definition)
    }

    pub fn remove(&mut self, id: &str) -> Option<PositionDefinition> {
        self.positions.remove(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PositionDefinition> {
        self.positions.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PositionDefinition)> {
        self.positions.iter().map(|(id, def)| (id.as_str(), def))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Resolve `id` to the overlay's top-left paste coordinate.
    pub fn place(&self, id: &str, ctx: &EvalContext) -> Result<(i64, i64), PositionError> {
        self.positions
            .get(id)
            .ok_or_else(|| PositionError::Unknown(id.to_string()))?
            .place(id, ctx)
    }

    /// Compile every formula and collect the failures.
    pub fn validate(&self) -> Vec<PositionError> {
        self.positions
            .iter()
            .filter_map(|(id, def)| def.compile(id).err())
            .collect()
    }
}

impl FromIterator<(String, PositionDefinition)> for PositionRegistry {
    fn from_iter<T: IntoIterator<Item = (String, PositionDefinition)>>(iter: T) -> Self {
        Self {
            positions: iter.into_iter().collect(),
        }
    }
}
