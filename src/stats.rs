use crate::observations::{Observations, OccupancyHistogram, QueueObservations};
use crate::types::{NetworkModel, SimulationDesign};
use serde::{Deserialize, Serialize};

/// One value per replication; `None` where the metric was undefined in that run
pub type Series = Vec<Option<f64>>;

/// Per-replication metrics of one queue
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub name: String,
    pub arrivals: Vec<usize>,
    pub arrival_rate: Series,
    pub p_drop: Series,
    pub p_immediate_service: Series,
    /// Mean waiting time
    pub wq: Series,
    /// Mean service time
    pub ws: Series,
    pub w: Series,
    /// Mean number waiting
    pub lq: Series,
    /// Mean number in service
    pub ls: Series,
    pub l: Series,
    /// Occupancy probabilities, indexed `[level][run]`
    pub occupancy: Vec<Vec<f64>>,
}

/// Per-replication metrics of the network as a whole
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SystemStats {
    pub arrivals: Vec<usize>,
    pub arrival_rate: Series,
    /// Mean time from entering to leaving the network
    pub w: Series,
    pub l: Series,
    /// Occupancy probabilities, indexed `[level][run]`
    pub occupancy: Vec<Vec<f64>>,
}

/// Metrics accumulated across replications, in run order
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Stats {
    pub queues: Vec<QueueStats>,
    pub system: SystemStats,
    pub runs: usize,
}

impl Stats {
    pub fn new(model: &NetworkModel) -> Self {
        Self {
            queues: model
                .queues
                .iter()
                .map(|q| QueueStats {
                    name: q.name.clone(),
                    ..Default::default()
                })
                .collect(),
            system: SystemStats::default(),
            runs: 0,
        }
    }

    /// Reduce one replication's observations and append the results
    pub fn record(&mut self, obs: &Observations, model: &NetworkModel, design: &SimulationDesign) {
        let data = design.data_duration;

        for ((stats, q_obs), spec) in self.queues.iter_mut().zip(&obs.queues).zip(&model.queues) {
            stats.record(q_obs, spec.servers, data, self.runs);
        }

        let system = &mut self.system;
        system.arrivals.push(obs.system_arrivals);
        system.arrival_rate.push(ratio(obs.system_arrivals as f64, data));
        system.w.push(mean(&obs.transit_times));

        let p = probabilities(&obs.system_occupancy, data);
        let l: f64 = p.iter().enumerate().map(|(k, pk)| k as f64 * pk).sum();
        system.l.push(Some(l));
        append_padded(&mut system.occupancy, &p, self.runs);

        self.runs += 1;
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            runs: self.runs,
            queues: self.queues.iter().map(QueueStats::summary).collect(),
            system: self.system.summary(),
        }
    }
}

impl QueueStats {
    fn record(&mut self, obs: &QueueObservations, servers: usize, data: f64, runs_before: usize) {
        let arrivals = obs.arrivals as f64;
        self.arrivals.push(obs.arrivals);
        self.arrival_rate.push(ratio(arrivals, data));
        self.p_drop.push(ratio(obs.drops as f64, arrivals));

        let immediate = obs.wait_times.iter().filter(|&&w| w == 0.0).count();
        self.p_immediate_service
            .push(ratio(immediate as f64, obs.wait_times.len() as f64));

        let wq = mean(&obs.wait_times);
        let ws = mean(&obs.service_times);
        self.wq.push(wq);
        self.ws.push(ws);
        self.w.push(wq.zip(ws).map(|(a, b)| a + b));

        let p = probabilities(&obs.occupancy, data);
        let (mut lq, mut ls) = (0.0, 0.0);
        for (level, pk) in p.iter().enumerate().skip(1) {
            lq += level.saturating_sub(servers) as f64 * pk;
            ls += level.min(servers) as f64 * pk;
        }
        self.lq.push(Some(lq));
        self.ls.push(Some(ls));
        self.l.push(Some(lq + ls));
        append_padded(&mut self.occupancy, &p, runs_before);
    }

    fn summary(&self) -> QueueSummary {
        QueueSummary {
            name: self.name.clone(),
            arrivals: summarize_counts(&self.arrivals),
            arrival_rate: summarize(&self.arrival_rate),
            p_drop: summarize(&self.p_drop),
            p_immediate_service: summarize(&self.p_immediate_service),
            wq: summarize(&self.wq),
            ws: summarize(&self.ws),
            w: summarize(&self.w),
            lq: summarize(&self.lq),
            ls: summarize(&self.ls),
            l: summarize(&self.l),
            occupancy: summarize_levels(&self.occupancy),
        }
    }
}

impl SystemStats {
    fn summary(&self) -> SystemSummary {
        SystemSummary {
            arrivals: summarize_counts(&self.arrivals),
            arrival_rate: summarize(&self.arrival_rate),
            w: summarize(&self.w),
            l: summarize(&self.l),
            occupancy: summarize_levels(&self.occupancy),
        }
    }
}

/// `num / den`, undefined when the denominator is zero
fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

/// Sample mean, undefined for an empty sample
pub fn mean(samples: &[f64]) -> Option<f64> {
    ratio(samples.iter().sum(), samples.len() as f64)
}

fn probabilities(hist: &OccupancyHistogram, data: f64) -> Vec<f64> {
    hist.as_slice().iter().map(|t| t / data).collect()
}

/// Append run `runs_before` of a per-level vector to `[level][run]` rows.
/// Levels new to this run get zeros for earlier runs; levels missing from it get a zero.
fn append_padded(rows: &mut Vec<Vec<f64>>, values: &[f64], runs_before: usize) {
    if rows.len() < values.len() {
        rows.resize(values.len(), vec![0.0; runs_before]);
    }
    for (level, row) in rows.iter_mut().enumerate() {
        row.push(values.get(level).copied().unwrap_or(0.0));
    }
}

/// Cross-replication reduction of one metric
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Summary {
    /// No run produced a value
    Undefined,
    /// Exactly one run produced a value
    Single { value: f64 },
    Replicated {
        mean: f64,
        /// Sample standard deviation (n - 1 denominator)
        sd: f64,
        /// Runs that produced a value
        runs: usize,
        undefined_runs: usize,
    },
}

impl Summary {
    /// Mean of the defined values, or the single value
    pub fn value(&self) -> Option<f64> {
        match self {
            Summary::Undefined => None,
            Summary::Single { value } => Some(*value),
            Summary::Replicated { mean, .. } => Some(*mean),
        }
    }
}

/// Summarize the defined values of a series; undefined runs are counted, not averaged
pub fn summarize(series: &[Option<f64>]) -> Summary {
    let defined: Vec<f64> = series.iter().flatten().copied().collect();
    match defined.len() {
        0 => Summary::Undefined,
        1 => Summary::Single { value: defined[0] },
        n => {
            let mean = defined.iter().sum::<f64>() / n as f64;
            let var = defined.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            Summary::Replicated {
                mean,
                sd: var.sqrt(),
                runs: n,
                undefined_runs: series.len() - n,
            }
        }
    }
}

/// Run-by-run differences `b - a`, undefined where either side is.
/// Runs beyond the shorter series are ignored.
pub fn paired_differences(a: &[Option<f64>], b: &[Option<f64>]) -> Series {
    a.iter().zip(b).map(|(x, y)| x.zip(*y).map(|(x, y)| y - x)).collect()
}

fn summarize_counts(counts: &[usize]) -> Summary {
    let series: Series = counts.iter().map(|&c| Some(c as f64)).collect();
    summarize(&series)
}

fn summarize_levels(rows: &[Vec<f64>]) -> Vec<Summary> {
    rows.iter()
        .map(|row| {
            let series: Series = row.iter().copied().map(Some).collect();
            summarize(&series)
        })
        .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueSummary {
    pub name: String,
    pub arrivals: Summary,
    pub arrival_rate: Summary,
    pub p_drop: Summary,
    pub p_immediate_service: Summary,
    pub wq: Summary,
    pub ws: Summary,
    pub w: Summary,
    pub lq: Summary,
    pub ls: Summary,
    pub l: Summary,
    pub occupancy: Vec<Summary>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemSummary {
    pub arrivals: Summary,
    pub arrival_rate: Summary,
    pub w: Summary,
    pub l: Summary,
    pub occupancy: Vec<Summary>,
}

/// Report-ready reduction of [`Stats`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsSummary {
    pub runs: usize,
    pub queues: Vec<QueueSummary>,
    pub system: SystemSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use crate::types::{Destination, QueueSpec, RoutingPolicy};

    fn model(servers: usize) -> NetworkModel {
        NetworkModel {
            interarrival: Distribution::Exponential { mean: 1.0 },
            arrival_routing: RoutingPolicy::Fixed {
                destination: Destination::Queue(0),
            },
            queues: vec![QueueSpec {
                name: "Q1".to_string(),
                capacity: 0,
                servers,
                service: Distribution::Exponential { mean: 0.5 },
                routing: RoutingPolicy::Fixed {
                    destination: Destination::Exit,
                },
            }],
        }
    }

    fn design(data: f64) -> SimulationDesign {
        SimulationDesign {
            data_duration: data,
            ..Default::default()
        }
    }

    fn observations(levels: &[f64]) -> Observations {
        let mut obs = Observations::new(1);
        let q = &mut obs.queues[0];
        q.arrivals = 4;
        q.drops = 1;
        q.wait_times = vec![0.0, 0.0, 1.0];
        q.service_times = vec![0.5, 1.5];
        for (level, &t) in levels.iter().enumerate() {
            q.occupancy.record(level, t);
            obs.system_occupancy.record(level, t);
        }
        obs.system_arrivals = 4;
        obs.transit_times = vec![1.0, 3.0];
        obs
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.map_or(false, |a| (a - b).abs() < 1e-12)
    }

    #[test]
    fn test_single_run_queue_metrics() {
        let model = model(2);
        let mut stats = Stats::new(&model);
        // 10 time units: 4 empty, 2 at one, 2 at two, 2 at three
        stats.record(&observations(&[4.0, 2.0, 2.0, 2.0]), &model, &design(10.0));

        let q = &stats.queues[0];
        assert_eq!(q.name, "Q1");
        assert_eq!(q.arrivals, vec![4]);
        assert!(close(q.arrival_rate[0], 0.4));
        assert!(close(q.p_drop[0], 0.25));
        assert!(close(q.p_immediate_service[0], 2.0 / 3.0));
        assert!(close(q.wq[0], 1.0 / 3.0));
        assert!(close(q.ws[0], 1.0));
        assert!(close(q.w[0], 4.0 / 3.0));
        // Two servers: only level 3 has anyone waiting
        assert!(close(q.lq[0], 0.2));
        assert!(close(q.ls[0], 0.2 + 0.4 + 0.4));
        assert!(close(q.l[0], 1.2));
        assert_eq!(q.occupancy, vec![vec![0.4], vec![0.2], vec![0.2], vec![0.2]]);
    }

    #[test]
    fn test_system_metrics() {
        let model = model(1);
        let mut stats = Stats::new(&model);
        stats.record(&observations(&[4.0, 2.0, 2.0, 2.0]), &model, &design(10.0));

        assert_eq!(stats.system.arrivals, vec![4]);
        assert!(close(stats.system.arrival_rate[0], 0.4));
        assert!(close(stats.system.w[0], 2.0));
        assert!(close(stats.system.l[0], 0.2 + 0.4 + 0.6));
        assert_eq!(stats.runs, 1);
    }

    #[test]
    fn test_degenerate_metrics_are_undefined() {
        let model = model(1);
        let mut stats = Stats::new(&model);
        let mut obs = Observations::new(1);
        obs.queues[0].occupancy.record(0, 5.0);
        obs.system_occupancy.record(0, 5.0);
        stats.record(&obs, &model, &design(5.0));

        let q = &stats.queues[0];
        assert_eq!(q.arrival_rate[0], Some(0.0));
        assert_eq!(q.p_drop[0], None);
        assert_eq!(q.p_immediate_service[0], None);
        assert_eq!(q.wq[0], None);
        assert_eq!(q.w[0], None);
        assert_eq!(q.l[0], Some(0.0));
        assert_eq!(stats.system.w[0], None);
    }

    #[test]
    fn test_occupancy_rows_are_padded_across_runs() {
        let model = model(1);
        let mut stats = Stats::new(&model);
        stats.record(&observations(&[1.0, 1.0]), &model, &design(2.0));
        stats.record(&observations(&[1.0, 0.0, 0.5, 0.5]), &model, &design(2.0));
        stats.record(&observations(&[2.0]), &model, &design(2.0));

        let rows = &stats.queues[0].occupancy;
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec![0.5, 0.5, 1.0]);
        assert_eq!(rows[1], vec![0.5, 0.0, 0.0]);
        assert_eq!(rows[2], vec![0.0, 0.25, 0.0]);
        assert_eq!(rows[3], vec![0.0, 0.25, 0.0]);
        assert!(rows.iter().all(|row| row.len() == 3));
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(&[]), Summary::Undefined);
        assert_eq!(summarize(&[None, None]), Summary::Undefined);
        assert_eq!(summarize(&[Some(2.5)]), Summary::Single { value: 2.5 });
        assert_eq!(summarize(&[None, Some(2.5)]), Summary::Single { value: 2.5 });

        match summarize(&[Some(1.0), None, Some(2.0), Some(3.0)]) {
            Summary::Replicated {
                mean,
                sd,
                runs,
                undefined_runs,
            } => {
                assert!((mean - 2.0).abs() < 1e-12);
                assert!((sd - 1.0).abs() < 1e-12);
                assert_eq!(runs, 3);
                assert_eq!(undefined_runs, 1);
            }
            other => panic!("unexpected summary {:?}", other),
        }
    }

    #[test]
    fn test_paired_differences() {
        let a = [Some(1.0), None, Some(2.0), Some(0.5)];
        let b = [Some(1.5), Some(3.0), None];
        assert_eq!(paired_differences(&a, &b), vec![Some(0.5), None, None]);
    }

    #[test]
    fn test_summary_value() {
        assert_eq!(Summary::Undefined.value(), None);
        assert_eq!(Summary::Single { value: 1.5 }.value(), Some(1.5));
        assert_eq!(summarize(&[Some(1.0), Some(2.0)]).value(), Some(1.5));
    }

    #[test]
    fn test_stats_summary() {
        let model = model(1);
        let mut stats = Stats::new(&model);
        stats.record(&observations(&[1.0, 1.0]), &model, &design(2.0));
        stats.record(&observations(&[1.5, 0.5]), &model, &design(2.0));

        let summary = stats.summary();
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.queues[0].name, "Q1");
        assert_eq!(summary.queues[0].occupancy.len(), 2);
        assert_eq!(summary.queues[0].occupancy[1].value(), Some(0.375));
        assert_eq!(summary.system.arrivals.value(), Some(4.0));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["queues"][0]["p_drop"]["kind"], "replicated");
        assert_eq!(json["system"]["w"]["mean"], 2.0);
    }

    #[test]
    fn test_undefined_serializes_as_null() {
        let model = model(1);
        let mut stats = Stats::new(&model);
        stats.record(&Observations::new(1), &model, &design(1.0));
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json["queues"][0]["wq"][0].is_null());
        assert_eq!(json["queues"][0]["l"][0], 0.0);
    }
}
