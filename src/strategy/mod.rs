//! Strategy resolution.
//!
//! A strategy is the ordered set of composite keys that must be resolved,
//! from cache or network, to satisfy one query. For a point query the
//! strategy is a single cell at a zoom-derived resolution. For a polygon
//! query the resolver searches over discrete resolution levels so the
//! covering cell count lands within configured bounds: it coarsens while
//! the covering is too fine, then refines while it is too coarse. The two
//! loops never interleave.

mod key;

pub use key::CompositeKey;

use crate::tessellation::{
    Resolution, Tessellation, TessellationError, RESOLUTION_CEILING, RESOLUTION_FLOOR,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors from strategy resolution.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Tessellation failure, propagated without retry.
    #[error(transparent)]
    Tessellation(#[from] TessellationError),
    /// Flat polygon coordinate list with an odd number of values.
    #[error("polygon coordinate list has odd length {0}")]
    OddCoordinates(usize),
    /// A region with no coordinates at all.
    #[error("empty query region")]
    EmptyRegion,
}

/// The spatial extent of one query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRegion {
    /// A single map point.
    Point {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lon: f64,
    },
    /// A polygon ring as a flat list of coordinates, consumed pairwise
    /// into (lat, lon) vertices.
    Polygon(Vec<f64>),
}

impl QueryRegion {
    /// The region's coordinates as the comma-joined string carried in the
    /// top-level query's `coordinates` parameter.
    pub fn coordinate_string(&self) -> String {
        match self {
            Self::Point { lat, lon } => format!("{lat},{lon}"),
            Self::Polygon(flat) => flat
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Pair the flat polygon coordinates into (lat, lon) vertices.
    fn ring(flat: &[f64]) -> Result<Vec<(f64, f64)>, StrategyError> {
        if flat.is_empty() {
            return Err(StrategyError::EmptyRegion);
        }
        if flat.len() % 2 != 0 {
            return Err(StrategyError::OddCoordinates(flat.len()));
        }
        Ok(flat.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect())
    }
}

/// Map a viewport zoom level onto a tessellation resolution.
///
/// Monotonic step table: finer resolutions for deeper zooms.
pub fn resolution_for_zoom(zoom: f64) -> Resolution {
    if zoom < 0.3 {
        2
    } else if zoom < 0.5 {
        4
    } else if zoom < 0.6 {
        6
    } else if zoom < 0.7 {
        8
    } else if zoom < 0.9 {
        10
    } else {
        12
    }
}

/// An ordered sequence of composite keys covering one query.
///
/// Computed fresh per data query and immutable afterwards. Key order is
/// the tessellation's own enumeration order, which is deterministic but
/// carries no semantic meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    keys: Vec<CompositeKey>,
    resolution: Resolution,
}

impl Strategy {
    /// The keys to resolve, in order.
    pub fn keys(&self) -> &[CompositeKey] {
        &self.keys
    }

    /// Number of keys in the strategy.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the strategy holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The resolution the search settled on.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// Computes the composite keys covering a query region at an adaptively
/// chosen resolution.
pub struct StrategyResolver {
    tessellation: Arc<dyn Tessellation>,
    min_cells: usize,
    max_cells: usize,
}

impl StrategyResolver {
    /// Create a resolver over the given tessellation with cell-count
    /// bounds for polygon queries.
    pub fn new(tessellation: Arc<dyn Tessellation>, min_cells: usize, max_cells: usize) -> Self {
        Self {
            tessellation,
            min_cells,
            max_cells,
        }
    }

    /// Resolve the ordered composite-key sequence for one query.
    ///
    /// Point regions map to exactly one key at the zoom-derived
    /// resolution. Polygon regions start at the zoom-derived resolution,
    /// coarsen in steps of 2 while the covering exceeds `max_cells` (down
    /// to the floor resolution), then refine in steps of 2 while it falls
    /// short of `min_cells` (up to the ceiling resolution). Coarsening
    /// runs to convergence before refinement is evaluated; a covering
    /// still out of bounds at a limit resolution is returned as-is.
    pub fn resolve(
        &self,
        region: &QueryRegion,
        zoom: f64,
        date: &str,
    ) -> Result<Strategy, StrategyError> {
        let mut resolution = resolution_for_zoom(zoom);

        let cells = match region {
            QueryRegion::Point { lat, lon } => {
                let cell = self.tessellation.cell_for_point(*lat, *lon, resolution)?;
                vec![cell]
            }
            QueryRegion::Polygon(flat) => {
                let ring = QueryRegion::ring(flat)?;
                let mut cells = self.tessellation.cells_for_polygon(&ring, resolution)?;

                while resolution > RESOLUTION_FLOOR && cells.len() > self.max_cells {
                    resolution -= 2;
                    cells = self.tessellation.cells_for_polygon(&ring, resolution)?;
                }
                while resolution < RESOLUTION_CEILING && cells.len() < self.min_cells {
                    resolution += 2;
                    cells = self.tessellation.cells_for_polygon(&ring, resolution)?;
                }
                cells
            }
        };

        debug!(
            cells = cells.len(),
            resolution, date, "strategy resolved"
        );

        let keys = cells
            .into_iter()
            .map(|cell| CompositeKey::new(&cell, date))
            .collect();

        Ok(Strategy { keys, resolution })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tessellation::CellId;
    use std::sync::Mutex;

    /// Tessellation stub whose polygon coverings quadruple per resolution
    /// step, recording the resolution of every call.
    struct StepTessellation {
        cells_at_floor: usize,
        calls: Mutex<Vec<Resolution>>,
    }

    impl StepTessellation {
        fn new(cells_at_floor: usize) -> Self {
            Self {
                cells_at_floor,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn count_at(&self, resolution: Resolution) -> usize {
            let steps = (resolution - RESOLUTION_FLOOR) / 2;
            self.cells_at_floor * 4usize.pow(u32::from(steps))
        }

        fn calls(&self) -> Vec<Resolution> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Tessellation for StepTessellation {
        fn cell_for_point(
            &self,
            _lat: f64,
            _lon: f64,
            resolution: Resolution,
        ) -> Result<CellId, TessellationError> {
            self.calls.lock().unwrap().push(resolution);
            Ok(format!("point-r{resolution}"))
        }

        fn cells_for_polygon(
            &self,
            _ring: &[(f64, f64)],
            resolution: Resolution,
        ) -> Result<Vec<CellId>, TessellationError> {
            self.calls.lock().unwrap().push(resolution);
            Ok((0..self.count_at(resolution))
                .map(|i| format!("r{resolution}c{i}"))
                .collect())
        }
    }

    fn resolver(tessellation: Arc<dyn Tessellation>) -> StrategyResolver {
        StrategyResolver::new(tessellation, 100, 1000)
    }

    fn square() -> QueryRegion {
        QueryRegion::Polygon(vec![39.0, -95.0, 39.0, -94.0, 38.0, -94.0, 38.0, -95.0])
    }

    #[test]
    fn zoom_table_is_monotonic() {
        assert_eq!(resolution_for_zoom(0.0), 2);
        assert_eq!(resolution_for_zoom(0.3), 4);
        assert_eq!(resolution_for_zoom(0.5), 6);
        assert_eq!(resolution_for_zoom(0.6), 8);
        assert_eq!(resolution_for_zoom(0.7), 10);
        assert_eq!(resolution_for_zoom(0.9), 12);
        assert_eq!(resolution_for_zoom(2.0), 12);
    }

    #[test]
    fn point_yields_exactly_one_key() {
        let tess = Arc::new(StepTessellation::new(1));
        let resolver = resolver(tess);
        let region = QueryRegion::Point {
            lat: 39.0977,
            lon: -94.5786,
        };

        let first = resolver.resolve(&region, 0.5, "2023-01-01").unwrap();
        let second = resolver.resolve(&region, 0.5, "2023-01-01").unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first.keys()[0].as_str(), "point-r62023-01-01");
        assert_eq!(first, second);
    }

    #[test]
    fn polygon_within_bounds_keeps_zoom_resolution() {
        // 128 cells at the floor: resolution 2 already satisfies both bounds.
        let tess = Arc::new(StepTessellation::new(128));
        let strategy = resolver(tess.clone())
            .resolve(&square(), 0.0, "2023-01-01")
            .unwrap();

        assert_eq!(strategy.resolution(), 2);
        assert_eq!(strategy.len(), 128);
        assert_eq!(tess.calls(), vec![2]);
    }

    #[test]
    fn oversized_covering_coarsens_until_within_bounds() {
        // 10 cells at the floor => 10, 40, 160, 640, 2560, 10240 cells
        // at resolutions 2, 4, 6, 8, 10, 12. Starting at 12 the resolver
        // must coarsen to 8 (640 cells).
        let tess = Arc::new(StepTessellation::new(10));
        let strategy = resolver(tess.clone())
            .resolve(&square(), 1.0, "2023-01-01")
            .unwrap();

        assert_eq!(strategy.resolution(), 8);
        assert_eq!(strategy.len(), 640);
        assert_eq!(tess.calls(), vec![12, 10, 8]);
    }

    #[test]
    fn undersized_covering_refines_until_within_bounds() {
        // 2 cells at the floor => 2, 8, 32, 128 cells at resolutions
        // 2, 4, 6, 8. Starting at 2 the resolver must refine to 8.
        let tess = Arc::new(StepTessellation::new(2));
        let strategy = resolver(tess.clone())
            .resolve(&square(), 0.0, "2023-01-01")
            .unwrap();

        assert_eq!(strategy.resolution(), 8);
        assert_eq!(strategy.len(), 128);
        assert_eq!(tess.calls(), vec![2, 4, 6, 8]);
    }

    #[test]
    fn coarsening_and_refinement_never_interleave() {
        // Start at 12 with 10240 cells, coarsen down to 8. The recorded
        // call sequence must be strictly decreasing then strictly
        // increasing; a decrease after an increase would mean the loops
        // overlapped.
        let tess = Arc::new(StepTessellation::new(10));
        resolver(tess.clone())
            .resolve(&square(), 2.0, "2023-01-01")
            .unwrap();

        let calls = tess.calls();
        let turning_point = calls
            .windows(2)
            .position(|pair| pair[1] > pair[0])
            .unwrap_or(calls.len() - 1);
        assert!(calls[..=turning_point].windows(2).all(|p| p[1] < p[0]));
        assert!(calls[turning_point..].windows(2).all(|p| p[1] >= p[0]));
    }

    #[test]
    fn coarsening_stops_at_floor() {
        // Even the floor resolution exceeds max_cells; the resolver must
        // stop at the floor rather than search below it.
        let tess = Arc::new(StepTessellation::new(2000));
        let strategy = resolver(tess.clone())
            .resolve(&square(), 1.0, "2023-01-01")
            .unwrap();

        assert_eq!(strategy.resolution(), 2);
        assert_eq!(strategy.len(), 2000);
        assert_eq!(tess.calls(), vec![12, 10, 8, 6, 4, 2]);
    }

    #[test]
    fn refinement_stops_at_ceiling() {
        // Even the ceiling resolution falls short of min_cells; the
        // resolver must stop there and return the finest covering rather
        // than search past the supported range.
        let tess = Arc::new(StepTessellation::new(1));
        let strategy = StrategyResolver::new(tess.clone(), 10_000, usize::MAX)
            .resolve(&square(), 0.0, "2023-01-01")
            .unwrap();

        assert_eq!(strategy.resolution(), RESOLUTION_CEILING);
        assert_eq!(strategy.len(), 1024);
        assert_eq!(tess.calls(), vec![2, 4, 6, 8, 10, 12]);
    }

    #[test]
    fn odd_coordinate_list_is_rejected() {
        let tess = Arc::new(StepTessellation::new(128));
        let result = resolver(tess).resolve(
            &QueryRegion::Polygon(vec![39.0, -95.0, 39.0]),
            0.0,
            "2023-01-01",
        );
        assert!(matches!(result, Err(StrategyError::OddCoordinates(3))));
    }

    #[test]
    fn empty_polygon_is_rejected() {
        let tess = Arc::new(StepTessellation::new(128));
        let result = resolver(tess).resolve(&QueryRegion::Polygon(Vec::new()), 0.0, "2023-01-01");
        assert!(matches!(result, Err(StrategyError::EmptyRegion)));
    }

    #[test]
    fn coordinate_string_joins_flat_list() {
        let region = QueryRegion::Point {
            lat: 39.0977,
            lon: -94.5786,
        };
        assert_eq!(region.coordinate_string(), "39.0977,-94.5786");

        let polygon = QueryRegion::Polygon(vec![1.0, 2.0, 3.5, 4.0]);
        assert_eq!(polygon.coordinate_string(), "1,2,3.5,4");
    }
}
