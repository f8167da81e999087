use crate::config::SimulationConfig;
use crate::engine::Engine;
use crate::error::ConfigError;
use crate::observations::Observations;
use crate::rng::{Mt19937, StreamTag};
use crate::routing::Router;
use crate::stats::{Stats, StatsSummary};
use crate::types::{InputEcho, NetworkModel, SimulationDesign};
use crate::variates::{batch_size, VariateStream};

/// Every random source of a network: the arrival process, arrival routing,
/// and each queue's service times and onward routing
#[derive(Clone, Debug)]
pub struct NetworkStreams {
    pub arrivals: VariateStream,
    pub arrival_router: Router,
    pub service: Vec<VariateStream>,
    pub routers: Vec<Router>,
}

impl NetworkStreams {
    pub fn new(model: &NetworkModel) -> Self {
        Self {
            arrivals: VariateStream::new(model.interarrival.clone()),
            arrival_router: Router::new(model.arrival_routing.clone()),
            service: model
                .queues
                .iter()
                .map(|q| VariateStream::new(q.service.clone()))
                .collect(),
            routers: model.queues.iter().map(|q| Router::new(q.routing.clone())).collect(),
        }
    }

    /// Reseed and refill every source for replication `run`.
    ///
    /// Each source gets its own seed key, so changing one part of the network
    /// leaves the draws of every other part unchanged. The refill order is fixed:
    /// arrivals, arrival routing, service of each queue, onward routing of each queue.
    pub fn regenerate(&mut self, model: &NetworkModel, design: &SimulationDesign, run: usize, rng: &mut Mt19937) {
        let total = design.total_duration();
        let seed = design.seed;

        // 1. Arrivals, sized to cover the whole run
        let arrivals = batch_size(total / model.interarrival.mean());
        rng.seed_by_array(&StreamTag::Arrivals.key(seed, run));
        self.arrivals.refill(rng, arrivals);

        // 2. One routing decision per arrival
        if self.arrival_router.is_random() {
            rng.seed_by_array(&StreamTag::ArrivalRouting.key(seed, run));
            self.arrival_router.refill(rng, arrivals);
        }

        // 3. Service times, enough to keep every server busy all run
        let mut service_batches = Vec::with_capacity(model.queues.len());
        for (i, (stream, spec)) in self.service.iter_mut().zip(&model.queues).enumerate() {
            let count = batch_size(total * spec.servers as f64 / spec.service.mean());
            rng.seed_by_array(&StreamTag::Service(i).key(seed, run));
            stream.refill(rng, count);
            service_batches.push(count);
        }

        // 4. One onward routing decision per service completion
        for (i, (router, &count)) in self.routers.iter_mut().zip(&service_batches).enumerate() {
            if router.is_random() {
                rng.seed_by_array(&StreamTag::OnwardRouting(i).key(seed, run));
                router.refill(rng, count);
            }
        }
    }
}

/// Replication driver: runs the design's replications in order and
/// accumulates their statistics
pub struct Simulation {
    pub model: NetworkModel,
    pub design: SimulationDesign,
    /// Per-run statistics of the completed replications
    pub stats: Stats,
    streams: NetworkStreams,
    rng: Mt19937,
    completed_runs: usize,
}

impl Simulation {
    /// Validate the model and design and prepare an empty simulation
    pub fn new(model: NetworkModel, design: SimulationDesign) -> Result<Self, ConfigError> {
        model.validate()?;
        design.validate()?;

        Ok(Self {
            stats: Stats::new(&model),
            streams: NetworkStreams::new(&model),
            rng: Mt19937::new(),
            completed_runs: 0,
            model,
            design,
        })
    }

    /// Build and validate a simulation from its JSON-level configuration
    pub fn from_config(config: &SimulationConfig) -> Result<Self, ConfigError> {
        let (model, design) = config.build()?;
        Self::new(model, design)
    }

    pub fn completed_runs(&self) -> usize {
        self.completed_runs
    }

    pub fn is_finished(&self) -> bool {
        self.completed_runs >= self.design.replications
    }

    /// Run the next replication, record its statistics and return its raw observations.
    /// Returns `None` once every replication has run.
    pub fn run_replication(&mut self) -> Option<Observations> {
        if self.is_finished() {
            return None;
        }
        let run = self.completed_runs;

        self.streams
            .regenerate(&self.model, &self.design, run, &mut self.rng);
        let obs = Engine::new(&self.model, &self.design, &mut self.streams, &mut self.rng).run();
        self.stats.record(&obs, &self.model, &self.design);
        self.completed_runs += 1;

        tracing::debug!(
            run,
            seed = self.design.seed,
            arrivals = obs.system_arrivals,
            drops = obs.queues.iter().map(|q| q.drops).sum::<usize>(),
            exits = obs.transit_times.len(),
            "replication complete"
        );
        Some(obs)
    }

    /// Run every remaining replication
    pub fn run(&mut self) {
        let remaining = self.design.replications - self.completed_runs;
        if remaining > 1 {
            tracing::info!(
                replications = remaining,
                queues = self.model.queues.len(),
                duration = self.design.total_duration(),
                "starting replications"
            );
        }

        while self.run_replication().is_some() {}

        if remaining > 1 {
            tracing::info!(runs = self.completed_runs, "replications finished");
        }
    }

    pub fn summary(&self) -> StatsSummary {
        self.stats.summary()
    }

    pub fn inputs(&self) -> InputEcho {
        self.model.describe(&self.design)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use crate::stats::Summary;
    use crate::types::{Destination, QueueSpec, RoutingPolicy};

    fn queue(name: &str, capacity: usize, service_mean: f64, routing: RoutingPolicy) -> QueueSpec {
        QueueSpec {
            name: name.to_string(),
            capacity,
            servers: 1,
            service: Distribution::Exponential { mean: service_mean },
            routing,
        }
    }

    fn to_exit() -> RoutingPolicy {
        RoutingPolicy::Fixed {
            destination: Destination::Exit,
        }
    }

    fn single_queue(capacity: usize, arrival_mean: f64, service_mean: f64) -> NetworkModel {
        NetworkModel {
            interarrival: Distribution::Exponential { mean: arrival_mean },
            arrival_routing: RoutingPolicy::Fixed {
                destination: Destination::Queue(0),
            },
            queues: vec![queue("Q1", capacity, service_mean, to_exit())],
        }
    }

    fn tandem(second_service_mean: f64) -> NetworkModel {
        NetworkModel {
            interarrival: Distribution::Exponential { mean: 1.0 },
            arrival_routing: RoutingPolicy::Fixed {
                destination: Destination::Queue(0),
            },
            queues: vec![
                queue(
                    "Q1",
                    0,
                    0.6,
                    RoutingPolicy::Fixed {
                        destination: Destination::Queue(1),
                    },
                ),
                queue("Q2", 0, second_service_mean, to_exit()),
            ],
        }
    }

    fn design(replications: usize, data: f64, seed: u64) -> SimulationDesign {
        SimulationDesign {
            replications,
            warmup_duration: 50.0,
            data_duration: data,
            seed,
        }
    }

    fn run(model: NetworkModel, design: SimulationDesign) -> Simulation {
        let mut sim = Simulation::new(model, design).unwrap();
        sim.run();
        sim
    }

    #[test]
    fn test_rejects_invalid_model() {
        let mut model = single_queue(0, 1.0, 0.5);
        model.queues[0].servers = 0;
        assert!(matches!(
            Simulation::new(model, SimulationDesign::default()),
            Err(ConfigError::ZeroServers { .. })
        ));

        let model = single_queue(0, 1.0, 0.5);
        let design = SimulationDesign {
            replications: 0,
            ..Default::default()
        };
        assert!(matches!(Simulation::new(model, design), Err(ConfigError::ZeroReplications)));
    }

    #[test]
    fn test_regenerate_fills_batches() {
        let model = NetworkModel {
            arrival_routing: RoutingPolicy::Probabilistic {
                destinations: vec![Destination::Queue(0), Destination::Exit],
                probs: vec![0.5, 0.5],
            },
            ..single_queue(0, 2.0, 0.5)
        };
        let design = SimulationDesign {
            data_duration: 100.0,
            ..Default::default()
        };
        let mut streams = NetworkStreams::new(&model);
        let mut rng = Mt19937::new();
        streams.regenerate(&model, &design, 0, &mut rng);

        // 50 expected arrivals, 200 expected completions for one busy server
        assert_eq!(streams.arrivals.buffered(), batch_size(50.0));
        assert_eq!(streams.service[0].buffered(), batch_size(200.0));
        assert!(streams.arrival_router.is_random());
        assert!(!streams.routers[0].is_random());
    }

    #[test]
    fn test_regenerate_is_keyed_by_run() {
        let model = single_queue(0, 1.0, 0.5);
        let design = SimulationDesign::default();
        let mut rng = Mt19937::new();

        let mut first = NetworkStreams::new(&model);
        first.regenerate(&model, &design, 3, &mut rng);
        // Unrelated generator use in between does not matter after reseeding
        rng.next_word();
        let mut again = NetworkStreams::new(&model);
        again.regenerate(&model, &design, 3, &mut rng);
        let mut other = NetworkStreams::new(&model);
        other.regenerate(&model, &design, 4, &mut rng);

        let a = first.arrivals.draw(&mut rng);
        assert_eq!(a, again.arrivals.draw(&mut rng));
        assert_ne!(a, other.arrivals.draw(&mut rng));
    }

    #[test]
    fn test_reproducible() {
        let a = run(single_queue(0, 1.0, 0.7), design(3, 500.0, 17));
        let b = run(single_queue(0, 1.0, 0.7), design(3, 500.0, 17));
        assert_eq!(
            serde_json::to_value(&a.stats).unwrap(),
            serde_json::to_value(&b.stats).unwrap()
        );

        let c = run(single_queue(0, 1.0, 0.7), design(3, 500.0, 18));
        assert_ne!(a.stats.queues[0].wq, c.stats.queues[0].wq);
    }

    #[test]
    fn test_replications_are_independent() {
        let sim = run(single_queue(0, 1.0, 0.7), design(4, 500.0, 1));
        assert_eq!(sim.completed_runs(), 4);
        assert_eq!(sim.stats.runs, 4);
        let wq = &sim.stats.queues[0].wq;
        assert_eq!(wq.len(), 4);
        assert_ne!(wq[0], wq[1]);

        match &sim.summary().queues[0].wq {
            Summary::Replicated { runs, undefined_runs, sd, .. } => {
                assert_eq!(*runs, 4);
                assert_eq!(*undefined_runs, 0);
                assert!(*sd > 0.0);
            }
            other => panic!("unexpected summary {:?}", other),
        }
    }

    #[test]
    fn test_run_is_idempotent_once_finished() {
        let mut sim = run(single_queue(0, 1.0, 0.5), design(2, 100.0, 0));
        assert!(sim.is_finished());
        assert!(sim.run_replication().is_none());
        sim.run();
        assert_eq!(sim.stats.runs, 2);
    }

    #[test]
    fn test_common_random_numbers_across_configurations() {
        // Changing the second queue must not perturb anything upstream of it
        let a = run(tandem(0.5), design(3, 1000.0, 99));
        let b = run(tandem(0.8), design(3, 1000.0, 99));

        let (qa, qb) = (&a.stats.queues[0], &b.stats.queues[0]);
        assert_eq!(qa.arrivals, qb.arrivals);
        assert_eq!(qa.wq, qb.wq);
        assert_eq!(qa.ws, qb.ws);
        assert_eq!(qa.occupancy, qb.occupancy);
        assert_eq!(a.stats.system.arrivals, b.stats.system.arrivals);

        assert_ne!(a.stats.queues[1].ws, b.stats.queues[1].ws);
    }

    #[test]
    fn test_end_to_end_single_queue() {
        let model = single_queue(0, 1.0, 0.5);
        let design = SimulationDesign {
            replications: 1,
            warmup_duration: 0.0,
            data_duration: 20_000.0,
            seed: 12345,
        };
        let sim = run(model, design);
        let q = &sim.stats.queues[0];

        assert_eq!(q.p_drop[0], Some(0.0));
        let rate = q.arrival_rate[0].unwrap();
        assert!((rate - 1.0).abs() < 0.05, "arrival rate {}", rate);
        let ws = q.ws[0].unwrap();
        assert!((ws - 0.5).abs() < 0.03, "mean service {}", ws);

        // Occupancy probabilities cover the whole data phase
        let total: f64 = q.occupancy.iter().map(|row| row[0]).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_littles_law_across_replications() {
        let sim = run(single_queue(0, 1.0, 0.6), design(5, 5000.0, 7));
        let summary = sim.summary();
        let q = &summary.queues[0];

        let lambda = q.arrival_rate.value().unwrap();
        let w = q.w.value().unwrap();
        let l = q.l.value().unwrap();
        assert!((l - lambda * w).abs() < 0.05 * l, "L {} vs lambda W {}", l, lambda * w);
        // M/M/1 with rho = 0.6: L = 1.5
        assert!((l - 1.5).abs() < 0.3);

        let system = &summary.system;
        assert!((system.l.value().unwrap() - l).abs() < 1e-9);
    }

    #[test]
    fn test_blocking_single_place() {
        // M/M/1/1 with rho = 4: blocking probability rho / (1 + rho) = 0.8
        let sim = run(single_queue(1, 1.0, 4.0), design(1, 20_000.0, 3));
        let p_drop = sim.stats.queues[0].p_drop[0].unwrap();
        assert!(p_drop > 0.75 && p_drop < 0.85, "p_drop {}", p_drop);
        assert_eq!(sim.stats.queues[0].occupancy.len(), 2);
        assert_eq!(sim.stats.queues[0].lq[0], Some(0.0));
    }

    #[test]
    fn test_from_default_config() {
        let mut sim = Simulation::from_config(&SimulationConfig::default()).unwrap();
        sim.run();
        assert_eq!(sim.completed_runs(), 1);
        let l = sim.stats.queues[0].l[0].unwrap();
        // M/M/1 with rho = 0.5 over 1000 time units
        assert!(l > 0.5 && l < 1.6, "L {}", l);
    }

    #[test]
    fn test_inputs_echo() {
        let sim = Simulation::new(single_queue(3, 1.0, 0.5), design(2, 10.0, 0)).unwrap();
        let inputs = sim.inputs();
        assert_eq!(inputs.arrival_routing, "Q1");
        assert_eq!(inputs.queues[0].capacity, "3");
        assert_eq!(inputs.queues[0].routing, "exit");
        assert_eq!(inputs.design.replications, 2);
    }
}
