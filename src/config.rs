use std::{fmt, str::FromStr, time::Duration};

use crate::error::{ConfigError, ParseStageError};

pub const DEFAULT_GRID_SIZE: u32 = 32;
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(200);

/// Which of the incremental drawing stages to run
///
/// Each stage builds on the previous one: `Clear` only clears the surface,
/// `Square` draws the unit square once, `Grid` instances it across the grid,
/// and `Cells` alternates two seeded cell-state buffers on a timer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stage {
    Clear,
    Square,
    Grid,
    #[default]
    Cells,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Clear, Stage::Square, Stage::Grid, Stage::Cells];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Clear => "clear",
            Stage::Square => "square",
            Stage::Grid => "grid",
            Stage::Cells => "cells",
        }
    }

    /// Whether the stage uploads the grid descriptor uniform
    pub fn uses_grid(self) -> bool {
        matches!(self, Stage::Grid | Stage::Cells)
    }

    pub fn uses_cell_state(self) -> bool {
        self == Stage::Cells
    }

    /// Whether the stage redraws on a fixed timer
    pub fn is_animated(self) -> bool {
        self == Stage::Cells
    }

    /// Number of instances drawn per frame, or `None` on overflow
    pub fn instance_count(self, grid_size: u32) -> Option<u32> {
        match self {
            Stage::Clear => Some(0),
            Stage::Square => Some(1),
            Stage::Grid | Stage::Cells => grid_size.checked_mul(grid_size),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStageError(s.to_string()))
    }
}

/// Everything needed to start a renderer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridConfig {
    pub stage: Stage,
    /// Cells per side; the grid is always square
    pub grid_size: u32,
    /// Period of the redraw timer for animated stages
    pub update_interval: Duration,
    /// Id of the canvas element to draw on (web only). When unset, the first
    /// `<canvas>` in the document is used.
    pub canvas_id: Option<String>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            stage: Stage::default(),
            grid_size: DEFAULT_GRID_SIZE,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            canvas_id: None,
        }
    }
}

impl GridConfig {
    pub fn for_stage(stage: Stage) -> Self {
        Self {
            stage,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size == 0 {
            return Err(ConfigError::EmptyGrid);
        }
        if self.stage.instance_count(self.grid_size).is_none() {
            return Err(ConfigError::GridTooLarge(self.grid_size));
        }
        if self.stage.uses_cell_state() && self.state_buffer_size() > max_storage_binding_size() {
            return Err(ConfigError::GridTooLarge(self.grid_size));
        }
        if self.stage.is_animated() && self.update_interval.is_zero() {
            return Err(ConfigError::ZeroInterval(self.update_interval));
        }
        Ok(())
    }

    /// Total number of cells in the grid
    pub fn cell_count(&self) -> usize {
        self.grid_size as usize * self.grid_size as usize
    }

    /// Size in bytes of one cell-state buffer
    pub fn state_buffer_size(&self) -> u64 {
        self.cell_count() as u64 * std::mem::size_of::<u32>() as u64
    }

    pub fn instance_count(&self) -> u32 {
        self.stage.instance_count(self.grid_size).unwrap_or(u32::MAX)
    }
}

/// Largest storage binding the renderer's requested device limits allow
pub fn max_storage_binding_size() -> u64 {
    u64::from(wgpu::Limits::downlevel_defaults().max_storage_buffer_binding_size)
}
