use serde::{Deserialize, Serialize};

/// Time spent at each occupancy level; index = number present.
/// Levels never reached below the highest recorded one hold 0.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupancyHistogram {
    time_at_level: Vec<f64>,
}

impl OccupancyHistogram {
    /// Accumulate `dt` time units at occupancy `level`
    pub fn record(&mut self, level: usize, dt: f64) {
        if self.time_at_level.len() <= level {
            self.time_at_level.resize(level + 1, 0.0);
        }
        self.time_at_level[level] += dt;
    }

    pub fn time_at(&self, level: usize) -> f64 {
        self.time_at_level.get(level).copied().unwrap_or(0.0)
    }

    /// Number of levels represented (highest recorded level + 1)
    pub fn levels(&self) -> usize {
        self.time_at_level.len()
    }

    pub fn total_time(&self) -> f64 {
        self.time_at_level.iter().sum()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.time_at_level
    }
}

/// Raw measurements at one queue during the data-collection phase of a run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueueObservations {
    /// Arrival attempts, including those turned away
    pub arrivals: usize,
    pub drops: usize,
    pub wait_times: Vec<f64>,
    pub service_times: Vec<f64>,
    pub occupancy: OccupancyHistogram,
    /// Customers still present when the run ended
    pub remaining: usize,
}

impl QueueObservations {
    pub fn admitted(&self) -> usize {
        self.arrivals - self.drops
    }
}

/// Raw measurements from a single replication
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Observations {
    pub queues: Vec<QueueObservations>,
    pub system_arrivals: usize,
    /// Entry-to-exit times of customers that left the network
    pub transit_times: Vec<f64>,
    pub system_occupancy: OccupancyHistogram,
}

impl Observations {
    pub fn new(num_queues: usize) -> Self {
        Self {
            queues: vec![QueueObservations::default(); num_queues],
            ..Default::default()
        }
    }
}
