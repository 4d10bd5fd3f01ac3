// Running means over the revealed prefix of a replay
use crate::domain::record::Record;

/// Sum and count of the non-null readings seen so far for one field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAggregate {
    pub sum: f64,
    pub count: u64,
}

impl RunningAggregate {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Round a mean for display. Ties go to the even neighbour (2.5 -> 2, 3.5 -> 4).
pub fn round_for_display(mean: f64) -> i64 {
    mean.round_ties_even() as i64
}

/// Tracks a running mean per sensor field, O(1) per observed record.
#[derive(Debug, Clone, Default)]
pub struct IncrementalAggregator {
    fields: Vec<(String, RunningAggregate)>,
}

impl IncrementalAggregator {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tracked: Vec<(String, RunningAggregate)> = Vec::new();
        for field in fields {
            let field = field.into();
            if !tracked.iter().any(|(f, _)| *f == field) {
                tracked.push((field, RunningAggregate::default()));
            }
        }
        Self { fields: tracked }
    }

    pub fn observe(&mut self, record: &Record) {
        for (field, aggregate) in &mut self.fields {
            if let Some(value) = record.sensor(field) {
                aggregate.add(value);
            }
        }
    }

    pub fn aggregate(&self, field: &str) -> Option<&RunningAggregate> {
        self.fields.iter().find(|(f, _)| f == field).map(|(_, a)| a)
    }

    pub fn mean(&self, field: &str) -> Option<f64> {
        self.aggregate(field).and_then(RunningAggregate::mean)
    }

    /// Rounded mean per tracked field, in tracking order. `None` means no
    /// reading has been seen for that field.
    pub fn snapshot(&self) -> Vec<(String, Option<i64>)> {
        self.fields
            .iter()
            .map(|(field, aggregate)| (field.clone(), aggregate.mean().map(round_for_display)))
            .collect()
    }

    pub fn reset(&mut self) {
        for (_, aggregate) in &mut self.fields {
            *aggregate = RunningAggregate::default();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(|(_, a)| a.count == 0)
    }
}
