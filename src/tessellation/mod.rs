//! External tessellation interface.
//!
//! Maps geographic coordinates and polygons to discrete spatial cell
//! identifiers at a given resolution. The tessellation algorithm itself
//! (e.g. an H3 hexagonal grid) is an external collaborator; this module
//! only defines the contract the strategy resolver depends on, enabling
//! mock tessellations in tests.

use thiserror::Error;

/// Opaque spatial cell identifier produced by the tessellation.
pub type CellId = String;

/// Tessellation resolution. The resolver only uses even values in `2..=12`.
pub type Resolution = u8;

/// Lowest resolution the strategy resolver will coarsen to.
pub const RESOLUTION_FLOOR: Resolution = 2;

/// Highest resolution the strategy resolver will refine to.
pub const RESOLUTION_CEILING: Resolution = 12;

/// Errors surfaced by a tessellation implementation.
///
/// Propagated unrecovered by the strategy resolver; there is no retry.
#[derive(Debug, Error)]
pub enum TessellationError {
    /// Resolution outside the implementation's supported range.
    #[error("unsupported tessellation resolution {0}")]
    UnsupportedResolution(Resolution),
    /// Coordinates that cannot be mapped to a cell.
    #[error("invalid coordinates ({lat}, {lon}): {reason}")]
    InvalidCoordinates { lat: f64, lon: f64, reason: String },
    /// A polygon ring the implementation cannot tessellate.
    #[error("invalid polygon ring: {0}")]
    InvalidRing(String),
}

/// Tessellation contract.
///
/// Implementations must be deterministic: identical inputs always produce
/// identical cell identifiers, and `cells_for_polygon` enumerates cells in
/// a stable order. Cache correctness depends on this.
pub trait Tessellation: Send + Sync {
    /// Cell containing the given point at the given resolution.
    fn cell_for_point(
        &self,
        lat: f64,
        lon: f64,
        resolution: Resolution,
    ) -> Result<CellId, TessellationError>;

    /// Cells covering the polygon described by `ring`, a closed sequence
    /// of (lat, lon) vertices, at the given resolution.
    fn cells_for_polygon(
        &self,
        ring: &[(f64, f64)],
        resolution: Resolution,
    ) -> Result<Vec<CellId>, TessellationError>;
}
