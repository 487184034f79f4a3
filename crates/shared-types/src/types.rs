use serde::{Deserialize, Serialize};

/// Slack allowed when summing percentages such as `0.7 + 0.3`
const BOUNDS_TOLERANCE: f64 = 1e-9;

/// A caller-specified signature area, normalized to the page's own dimensions.
///
/// `top_pct` is measured from the top edge of the page. All percentages are
/// fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// 1-based page index
    pub page: u32,
    pub left_pct: f64,
    pub top_pct: f64,
    pub width_pct: f64,
    pub height_pct: f64,
}

impl Field {
    /// Check that the field references a real page index and lies within page bounds
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.page < 1 {
            return Err("Field page must be 1 or greater");
        }
        let values = [self.left_pct, self.top_pct, self.width_pct, self.height_pct];
        if values.iter().any(|v| !v.is_finite()) {
            return Err("Field percentages must be finite numbers");
        }
        if values.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err("Field percentages must be between 0 and 1");
        }
        if self.left_pct + self.width_pct > 1.0 + BOUNDS_TOLERANCE {
            return Err("Field extends beyond page right edge");
        }
        if self.top_pct + self.height_pct > 1.0 + BOUNDS_TOLERANCE {
            return Err("Field extends beyond page bottom edge");
        }
        Ok(())
    }
}

/// Page dimensions in PDF points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn letter() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
        }
    }

    pub fn a4() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
        }
    }
}

/// Absolute, aspect-corrected rectangle in PDF points (bottom-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Outcome of a successful signing, returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningResult {
    #[serde(rename = "ok")]
    pub success: bool,
    pub url: String,
    pub original_hash: String,
    pub signed_hash: String,
}
