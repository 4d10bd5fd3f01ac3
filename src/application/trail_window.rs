// Fixed-capacity window of the most recent positions
use crate::domain::record::GeoPoint;
use std::collections::VecDeque;

pub const DEFAULT_TRAIL_CAPACITY: usize = 3;

#[derive(Debug, Clone)]
pub struct TrailWindow {
    capacity: usize,
    points: VecDeque<GeoPoint>,
}

impl TrailWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a position, evicting the oldest at capacity. A missing
    /// coordinate does not take a slot.
    pub fn push(&mut self, lat: Option<f64>, lon: Option<f64>) {
        let (Some(lat), Some(lon)) = (lat, lon) else {
            return;
        };
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(GeoPoint { lat, lon });
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<GeoPoint> {
        self.points.iter().copied().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

impl Default for TrailWindow {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIL_CAPACITY)
    }
}
