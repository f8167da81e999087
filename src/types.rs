use crate::distribution::Distribution;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Where a customer goes next: a queue (by index) or out of the network
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Queue(usize),
    Exit,
}

/// Routing rule applied on arrival to the network or on leaving a queue
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingPolicy {
    Fixed {
        destination: Destination,
    },
    /// Independent random choice, `probs[i]` for `destinations[i]`
    Probabilistic {
        destinations: Vec<Destination>,
        probs: Vec<f64>,
    },
    /// Shortest current occupancy wins; ties go to the earliest listed queue.
    /// Exit is not a valid choice here.
    JoinShortestQueue {
        destinations: Vec<usize>,
    },
}

impl RoutingPolicy {
    /// Human-readable description using the queue names
    pub fn description(&self, names: &[String]) -> String {
        let name = |d: &Destination| match d {
            Destination::Exit => "exit".to_string(),
            Destination::Queue(i) => names.get(*i).cloned().unwrap_or_else(|| format!("#{}", i)),
        };

        match self {
            RoutingPolicy::Fixed { destination } => name(destination),
            RoutingPolicy::Probabilistic { destinations, probs } => {
                let dests: Vec<String> = destinations.iter().map(name).collect();
                let probs: Vec<String> = probs.iter().map(|p| p.to_string()).collect();
                format!("{} (with probabilities {})", dests.join(", "), probs.join(", "))
            }
            RoutingPolicy::JoinShortestQueue { destinations } => {
                let dests: Vec<String> = destinations
                    .iter()
                    .map(|&i| name(&Destination::Queue(i)))
                    .collect();
                format!("{} (join shortest queue)", dests.join(", "))
            }
        }
    }

    fn validate(&self, context: &str, queues: usize) -> Result<(), ConfigError> {
        let check_index = |index: usize| {
            if index < queues {
                Ok(())
            } else {
                Err(ConfigError::DestinationOutOfRange {
                    context: context.to_string(),
                    index,
                    queues,
                })
            }
        };
        let check = |d: &Destination| match d {
            Destination::Queue(i) => check_index(*i),
            Destination::Exit => Ok(()),
        };

        match self {
            RoutingPolicy::Fixed { destination } => check(destination),
            RoutingPolicy::Probabilistic { destinations, probs } => {
                if destinations.is_empty() {
                    return Err(ConfigError::EmptyRouting {
                        context: context.to_string(),
                    });
                }
                destinations.iter().try_for_each(check)?;
                if probs.len() != destinations.len() {
                    return Err(ConfigError::ProbabilityCount {
                        context: context.to_string(),
                        expected: destinations.len(),
                        actual: probs.len(),
                    });
                }
                check_probabilities(context, probs)
            }
            RoutingPolicy::JoinShortestQueue { destinations } => {
                if destinations.is_empty() {
                    return Err(ConfigError::EmptyRouting {
                        context: context.to_string(),
                    });
                }
                destinations.iter().try_for_each(|&i| check_index(i))
            }
        }
    }
}

/// Probabilities must be in [0, 1] and sum to 1 within 1e-6
pub(crate) fn check_probabilities(context: &str, probs: &[f64]) -> Result<(), ConfigError> {
    let in_range = probs.iter().all(|p| (0.0..=1.0).contains(p));
    let sum: f64 = probs.iter().sum();
    if in_range && (sum - 1.0).abs() < 1e-6 {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbabilities {
            context: context.to_string(),
        })
    }
}

/// Static description of one queue
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueSpec {
    pub name: String,
    /// Maximum occupancy (waiting + in service); 0 means unlimited
    pub capacity: usize,
    pub servers: usize,
    pub service: Distribution,
    pub routing: RoutingPolicy,
}

impl QueueSpec {
    pub fn has_room(&self, occupancy: usize) -> bool {
        self.capacity == 0 || occupancy < self.capacity
    }

    pub fn capacity_label(&self) -> String {
        if self.capacity == 0 {
            "unlimited".to_string()
        } else {
            self.capacity.to_string()
        }
    }
}

/// Topology, arrival process and per-queue behavior of a network.
/// Queue order defines the index space used by routing destinations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkModel {
    pub interarrival: Distribution,
    pub arrival_routing: RoutingPolicy,
    pub queues: Vec<QueueSpec>,
}

impl NetworkModel {
    pub fn queue_names(&self) -> Vec<String> {
        self.queues.iter().map(|q| q.name.clone()).collect()
    }

    /// Check the structural invariants the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queues.is_empty() {
            return Err(ConfigError::NoQueues);
        }

        let n = self.queues.len();
        for (index, queue) in self.queues.iter().enumerate() {
            if queue.name.trim().is_empty() {
                return Err(ConfigError::EmptyQueueName { index: index + 1 });
            }
            if self.queues[..index].iter().any(|q| q.name == queue.name) {
                return Err(ConfigError::DuplicateQueueName {
                    name: queue.name.clone(),
                });
            }
        }

        self.interarrival.validate("inter-arrival times")?;
        self.arrival_routing.validate("initial routing", n)?;

        for queue in &self.queues {
            if queue.servers == 0 {
                return Err(ConfigError::ZeroServers {
                    queue: queue.name.clone(),
                });
            }
            queue
                .service
                .validate(&format!("service times in queue \"{}\"", queue.name))?;
            queue
                .routing
                .validate(&format!("onward routing from queue \"{}\"", queue.name), n)?;
        }
        Ok(())
    }

    /// Input echo for report consumers
    pub fn describe(&self, design: &SimulationDesign) -> InputEcho {
        let names = self.queue_names();
        InputEcho {
            interarrival: self.interarrival.description(),
            arrival_routing: self.arrival_routing.description(&names),
            queues: self
                .queues
                .iter()
                .map(|q| QueueEcho {
                    name: q.name.clone(),
                    capacity: q.capacity_label(),
                    servers: q.servers,
                    service: q.service.description(),
                    routing: q.routing.description(&names),
                })
                .collect(),
            design: design.clone(),
        }
    }
}

/// Replication plan for a simulation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationDesign {
    pub replications: usize,
    /// Initial interval excluded from statistics
    pub warmup_duration: f64,
    /// Interval over which statistics are collected
    pub data_duration: f64,
    pub seed: u64,
}

impl SimulationDesign {
    pub fn total_duration(&self) -> f64 {
        self.warmup_duration + self.data_duration
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replications == 0 {
            return Err(ConfigError::ZeroReplications);
        }
        if !(self.warmup_duration.is_finite() && self.warmup_duration >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                context: "simulation design".to_string(),
                parameter: "warm-up duration",
                value: self.warmup_duration,
                requirement: "a non-negative number",
            });
        }
        if !(self.data_duration.is_finite() && self.data_duration > 0.0) {
            return Err(ConfigError::InvalidParameter {
                context: "simulation design".to_string(),
                parameter: "data-collection duration",
                value: self.data_duration,
                requirement: "a positive number",
            });
        }
        Ok(())
    }
}

impl Default for SimulationDesign {
    fn default() -> Self {
        Self {
            replications: 1,
            warmup_duration: 0.0,
            data_duration: 1000.0,
            seed: 0,
        }
    }
}

/// Human-readable echo of the inputs of a simulation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputEcho {
    pub interarrival: String,
    pub arrival_routing: String,
    pub queues: Vec<QueueEcho>,
    pub design: SimulationDesign,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueEcho {
    pub name: String,
    pub capacity: String,
    pub servers: usize,
    pub service: String,
    pub routing: String,
}
