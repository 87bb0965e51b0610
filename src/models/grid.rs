use crate::errors::{EngineError, EngineResult};
use crate::models::{PricingInputs, PricingModel};
use rayon::prelude::*;

/// Spot axis spans [0.8 * spot, 1.2 * spot]
pub const SPOT_RANGE: (f64, f64) = (0.8, 1.2);

/// Volatility axis spans [0.5 * vol, 1.5 * vol]
pub const VOL_RANGE: (f64, f64) = (0.5, 1.5);

/// Upper bound on grid_size^2. Two f64 matrices at this size are ~32 MB.
pub const MAX_GRID_CELLS: usize = 2_000_000;

/// Call/put prices over a volatility x spot grid.
///
/// `call_matrix[i][j]` and `put_matrix[i][j]` are priced at `vol_axis[i]`
/// and `spot_axis[j]`. Every cell is filled.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SensitivityGrid {
    pub spot_axis: Vec<f64>,
    pub vol_axis: Vec<f64>,
    pub call_matrix: Vec<Vec<f64>>,
    pub put_matrix: Vec<Vec<f64>>,
}

impl SensitivityGrid {
    /// (rows, columns) = (vol axis length, spot axis length)
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.vol_axis.len(), self.spot_axis.len())
    }
}

/// `n` evenly spaced points from `lo` to `hi` inclusive. The last point is
/// pinned to `hi` so rounding in the step never drops the upper bound.
pub fn linspace(lo: f64, hi: f64, n: usize) -> EngineResult<Vec<f64>> {
    if n < 2 {
        return Err(EngineError::InvalidArgument(format!(
            "axis needs at least 2 points, got {n}"
        )));
    }

    let step = (hi - lo) / (n - 1) as f64;
    let mut axis: Vec<f64> = (0..n).map(|i| lo + i as f64 * step).collect();
    axis[n - 1] = hi;
    Ok(axis)
}

/// Sweep spot and volatility around `base`, holding strike, maturity and
/// rate fixed, and price every combination with `model`.
///
/// Rows run in parallel; cells share no mutable state. Any failing cell
/// fails the whole grid.
pub fn build_grid(
    model: &dyn PricingModel,
    base: &PricingInputs,
    grid_size: usize,
) -> EngineResult<SensitivityGrid> {
    if grid_size < 2 {
        return Err(EngineError::InvalidArgument(format!(
            "grid_size must be at least 2, got {grid_size}"
        )));
    }
    match grid_size.checked_mul(grid_size) {
        Some(cells) if cells <= MAX_GRID_CELLS => {}
        _ => {
            return Err(EngineError::InvalidArgument(format!(
                "grid_size {grid_size} exceeds the {MAX_GRID_CELLS} cell limit"
            )))
        }
    }

    // Reject a zero base vol here instead of building a degenerate axis
    base.validate()?;

    let spot_axis = linspace(base.spot * SPOT_RANGE.0, base.spot * SPOT_RANGE.1, grid_size)?;
    let vol_axis = linspace(
        base.volatility * VOL_RANGE.0,
        base.volatility * VOL_RANGE.1,
        grid_size,
    )?;

    let rows: Vec<(Vec<f64>, Vec<f64>)> = vol_axis
        .par_iter()
        .map(|&vol| -> EngineResult<(Vec<f64>, Vec<f64>)> {
            let mut calls = Vec::with_capacity(spot_axis.len());
            let mut puts = Vec::with_capacity(spot_axis.len());
            for &spot in &spot_axis {
                let res = model.price(&base.with_spot_and_vol(spot, vol))?;
                calls.push(res.call_price);
                puts.push(res.put_price);
            }
            Ok((calls, puts))
        })
        .collect::<EngineResult<_>>()?;

    let (call_matrix, put_matrix): (Vec<Vec<f64>>, Vec<Vec<f64>>) = rows.into_iter().unzip();

    tracing::debug!(
        model = model.name(),
        grid_size,
        spot = base.spot,
        volatility = base.volatility,
        "sensitivity grid built"
    );

    Ok(SensitivityGrid {
        spot_axis,
        vol_axis,
        call_matrix,
        put_matrix,
    })
}
