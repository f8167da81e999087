//! Configuration errors.
//!
//! Every way a network or design can be malformed is rejected before the
//! first replication starts; the simulation itself has no failure paths.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("The network needs at least one queue")]
    NoQueues,

    #[error("The name of queue {index} has not been specified")]
    EmptyQueueName { index: usize },

    #[error("The queues need to be given distinct names (\"{name}\" is repeated)")]
    DuplicateQueueName { name: String },

    #[error("\"{name}\" is reserved for the system exit and cannot name a queue")]
    ReservedQueueName { name: String },

    #[error("For the {context}, the destination \"{name}\" is not the name of a queue")]
    UnknownDestination { context: String, name: String },

    #[error("For the {context}, queue index {index} is out of range for {queues} queue(s)")]
    DestinationOutOfRange {
        context: String,
        index: usize,
        queues: usize,
    },

    #[error("For the {context}, no destination has been specified")]
    EmptyRouting { context: String },

    #[error("For the {context}, several destinations need a routing policy")]
    MissingPolicy { context: String },

    #[error("For the {context}, the join-shortest-queue rule cannot choose the exit")]
    ExitInJoinShortestQueue { context: String },

    #[error("For the {context}, there should be {expected} probabilities, found {actual}")]
    ProbabilityCount {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("For the {context}, the probability distribution should be a list of non-negative numbers adding up to 1")]
    InvalidProbabilities { context: String },

    #[error("For the {context}, the {parameter} ({value}) must be {requirement}")]
    InvalidParameter {
        context: String,
        parameter: &'static str,
        value: f64,
        requirement: &'static str,
    },

    #[error("The number of servers at queue \"{queue}\" should be a positive integer")]
    ZeroServers { queue: String },

    #[error("The capacity of queue \"{queue}\" should be a positive integer or \"unlimited\", got \"{value}\"")]
    InvalidCapacity { queue: String, value: String },

    #[error("The number of runs should be a positive integer")]
    ZeroReplications,
}
