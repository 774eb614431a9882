use crate::geo::GeoFix;

/// Sink for the walked route
pub trait PathRenderer {
    fn append(&mut self, fix: &GeoFix);
    fn reset_path(&mut self);
}

/// In-memory polyline, drawn by the terminal map
#[derive(Debug, Clone, Default)]
pub struct PolylinePath {
    points: Vec<(f64, f64)>,
}

impl PolylinePath {
    pub fn new() -> Self {
        Self::default()
    }

    /// (longitude, latitude) pairs in arrival order
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// ([min_lon, max_lon], [min_lat, max_lat]) padded so a single point or a
    /// straight segment still yields a drawable area
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let (first, rest) = self.points.split_first()?;
        let mut x = [first.0, first.0];
        let mut y = [first.1, first.1];
        for &(lon, lat) in rest {
            x = [x[0].min(lon), x[1].max(lon)];
            y = [y[0].min(lat), y[1].max(lat)];
        }

        let pad = ((x[1] - x[0]).max(y[1] - y[0]) * 0.1).max(0.0005);
        Some(([x[0] - pad, x[1] + pad], [y[0] - pad, y[1] + pad]))
    }

    /// Consecutive point pairs, one per drawn segment
    pub fn segments(&self) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }
}

impl PathRenderer for PolylinePath {
    fn append(&mut self, fix: &GeoFix) {
        self.points.push((fix.longitude, fix.latitude));
    }

    fn reset_path(&mut self) {
        self.points.clear();
    }
}
