//! JSON configuration of a network and its simulation design.
//!
//! Parameters are given the way an analyst enters them (rates, interval
//! bounds, queue names) and resolved into a [`NetworkModel`] plus a
//! [`SimulationDesign`] by [`SimulationConfig::build`].

use crate::distribution::Distribution;
use crate::error::ConfigError;
use crate::types::{check_probabilities, Destination, NetworkModel, QueueSpec, RoutingPolicy, SimulationDesign};
use serde::{Deserialize, Serialize};

/// Destination name that sends a customer out of the network
pub const EXIT: &str = "exit";

const UNLIMITED: &str = "unlimited";

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub arrivals: ArrivalsConfig,
    pub queues: Vec<QueueConfig>,
    #[serde(default)]
    pub design: DesignConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalsConfig {
    pub interarrival: DistributionConfig,
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    #[serde(default)]
    pub capacity: CapacityConfig,
    pub servers: usize,
    pub service: DistributionConfig,
    pub routing: RoutingConfig,
}

/// Time distribution in analyst terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistributionConfig {
    Exponential { rate: f64 },
    Deterministic { value: f64 },
    Uniform { min: f64, max: f64 },
    /// Normal, truncated to positive values
    Normal { mean: f64, sd: f64 },
    Lognormal { mean: f64, sd: f64 },
}

/// `"unlimited"` or a positive number of places (waiting + in service)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapacityConfig {
    Places(i64),
    Text(String),
}

impl Default for CapacityConfig {
    fn default() -> Self {
        CapacityConfig::Text(UNLIMITED.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyConfig {
    JoinShortestQueue,
    Random,
}

/// Destinations by name; several destinations need a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<f64>>,
}

impl RoutingConfig {
    pub fn to(destination: &str) -> Self {
        Self {
            to: vec![destination.to_string()],
            policy: None,
            probabilities: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignConfig {
    pub replications: usize,
    /// Warm-up duration, excluded from statistics
    pub warmup: f64,
    /// Data-collection duration
    pub duration: f64,
    pub seed: u64,
}

impl Default for DesignConfig {
    fn default() -> Self {
        let design = SimulationDesign::default();
        Self {
            replications: design.replications,
            warmup: design.warmup_duration,
            duration: design.data_duration,
            seed: design.seed,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            arrivals: ArrivalsConfig {
                interarrival: DistributionConfig::Exponential { rate: 1.0 },
                routing: RoutingConfig::to("Q1"),
            },
            queues: vec![QueueConfig {
                name: "Q1".to_string(),
                capacity: CapacityConfig::default(),
                servers: 1,
                service: DistributionConfig::Exponential { rate: 2.0 },
                routing: RoutingConfig::to(EXIT),
            }],
            design: DesignConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check every field and resolve queue names into the model the engine runs
    pub fn build(&self) -> Result<(NetworkModel, SimulationDesign), ConfigError> {
        // 1. Queue names: present, distinct, not the exit
        if self.queues.is_empty() {
            return Err(ConfigError::NoQueues);
        }
        let mut names: Vec<String> = Vec::with_capacity(self.queues.len());
        for (index, queue) in self.queues.iter().enumerate() {
            let name = queue.name.trim();
            if name.is_empty() {
                return Err(ConfigError::EmptyQueueName { index: index + 1 });
            }
            if name.eq_ignore_ascii_case(EXIT) {
                return Err(ConfigError::ReservedQueueName { name: name.to_string() });
            }
            if names.iter().any(|n| n == name) {
                return Err(ConfigError::DuplicateQueueName { name: name.to_string() });
            }
            names.push(name.to_string());
        }

        // 2. Arrival process
        let interarrival = self.arrivals.interarrival.build("inter-arrival times")?;
        let arrival_routing = self.arrivals.routing.build("initial routing", &names)?;

        // 3. Queues
        let mut queues = Vec::with_capacity(self.queues.len());
        for (queue, name) in self.queues.iter().zip(&names) {
            if queue.servers == 0 {
                return Err(ConfigError::ZeroServers { queue: name.clone() });
            }
            queues.push(QueueSpec {
                name: name.clone(),
                capacity: queue.capacity.build(name)?,
                servers: queue.servers,
                service: queue
                    .service
                    .build(&format!("service times in queue \"{}\"", name))?,
                routing: queue
                    .routing
                    .build(&format!("onward routing from queue \"{}\"", name), &names)?,
            });
        }

        let model = NetworkModel {
            interarrival,
            arrival_routing,
            queues,
        };
        model.validate()?;

        // 4. Design
        let design = SimulationDesign {
            replications: self.design.replications,
            warmup_duration: self.design.warmup,
            data_duration: self.design.duration,
            seed: self.design.seed,
        };
        design.validate()?;

        Ok((model, design))
    }
}

impl DistributionConfig {
    /// Convert to mean/sd form, rejecting parameters the conversion cannot take
    pub fn build(&self, context: &str) -> Result<Distribution, ConfigError> {
        let invalid = |parameter: &'static str, value: f64, requirement: &'static str| {
            Err(ConfigError::InvalidParameter {
                context: context.to_string(),
                parameter,
                value,
                requirement,
            })
        };

        let distribution = match *self {
            DistributionConfig::Exponential { rate } => {
                if !(rate.is_finite() && rate > 0.0) {
                    return invalid("rate", rate, "a positive number");
                }
                Distribution::Exponential { mean: 1.0 / rate }
            }
            DistributionConfig::Deterministic { value } => Distribution::Deterministic { value },
            DistributionConfig::Uniform { min, max } => {
                if !(min.is_finite() && min >= 0.0) {
                    return invalid("minimum", min, "a non-negative number");
                }
                if !(max.is_finite() && max > 0.0) {
                    return invalid("maximum", max, "a positive number");
                }
                if max < min {
                    return invalid("maximum", max, "at least the minimum");
                }
                Distribution::Uniform {
                    mean: (min + max) / 2.0,
                    sd: (max - min) / 12f64.sqrt(),
                }
            }
            DistributionConfig::Normal { mean, sd } => Distribution::TruncatedNormal { mean, sd },
            DistributionConfig::Lognormal { mean, sd } => Distribution::Lognormal { mean, sd },
        };
        distribution.validate(context)?;
        Ok(distribution)
    }
}

impl CapacityConfig {
    /// Places at the queue; 0 means unlimited
    fn build(&self, queue: &str) -> Result<usize, ConfigError> {
        let invalid = |value: String| ConfigError::InvalidCapacity {
            queue: queue.to_string(),
            value,
        };
        match self {
            CapacityConfig::Places(n) if *n >= 1 => usize::try_from(*n).map_err(|_| invalid(n.to_string())),
            CapacityConfig::Places(n) => Err(invalid(n.to_string())),
            CapacityConfig::Text(text) if text.trim().eq_ignore_ascii_case(UNLIMITED) => Ok(0),
            CapacityConfig::Text(text) => Err(invalid(text.clone())),
        }
    }
}

impl RoutingConfig {
    /// Resolve destination names against `names` and pick the policy
    pub fn build(&self, context: &str, names: &[String]) -> Result<RoutingPolicy, ConfigError> {
        let destinations = self
            .to
            .iter()
            .map(|name| resolve(context, name, names))
            .collect::<Result<Vec<_>, _>>()?;

        match destinations.as_slice() {
            [] => Err(ConfigError::EmptyRouting {
                context: context.to_string(),
            }),
            [destination] => Ok(RoutingPolicy::Fixed {
                destination: *destination,
            }),
            _ => match self.policy {
                None => Err(ConfigError::MissingPolicy {
                    context: context.to_string(),
                }),
                Some(PolicyConfig::JoinShortestQueue) => {
                    let queues = destinations
                        .iter()
                        .map(|d| match d {
                            Destination::Queue(i) => Ok(*i),
                            Destination::Exit => Err(ConfigError::ExitInJoinShortestQueue {
                                context: context.to_string(),
                            }),
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(RoutingPolicy::JoinShortestQueue { destinations: queues })
                }
                Some(PolicyConfig::Random) => {
                    let probs = self.probabilities.clone().unwrap_or_default();
                    if probs.len() != destinations.len() {
                        return Err(ConfigError::ProbabilityCount {
                            context: context.to_string(),
                            expected: destinations.len(),
                            actual: probs.len(),
                        });
                    }
                    check_probabilities(context, &probs)?;
                    Ok(RoutingPolicy::Probabilistic { destinations, probs })
                }
            },
        }
    }
}

fn resolve(context: &str, name: &str, names: &[String]) -> Result<Destination, ConfigError> {
    let name = name.trim();
    if name.eq_ignore_ascii_case(EXIT) {
        return Ok(Destination::Exit);
    }
    names
        .iter()
        .position(|n| n == name)
        .map(Destination::Queue)
        .ok_or_else(|| ConfigError::UnknownDestination {
            context: context.to_string(),
            name: name.to_string(),
        })
}
