use crate::distribution::Distribution;
use crate::types::{Destination, RoutingPolicy};
use crate::variates::VariateStream;
use rand::RngCore;

/// Read access to current queue occupancies, as seen by routing decisions
pub trait Occupancy {
    fn occupancy(&self, queue: usize) -> usize;
}

impl Occupancy for [usize] {
    fn occupancy(&self, queue: usize) -> usize {
        self[queue]
    }
}

/// Runtime form of a [`RoutingPolicy`].
///
/// A probabilistic policy owns a stream of routing decisions: a finite-discrete
/// distribution over positions in its destination list.
#[derive(Clone, Debug)]
pub struct Router {
    policy: RoutingPolicy,
    decisions: Option<VariateStream>,
}

impl Router {
    pub fn new(policy: RoutingPolicy) -> Self {
        let decisions = match &policy {
            RoutingPolicy::Probabilistic { destinations, probs } => {
                Some(VariateStream::new(Distribution::FiniteDiscrete {
                    values: (0..destinations.len()).map(|i| i as f64).collect(),
                    probs: probs.clone(),
                }))
            }
            _ => None,
        };
        Self { policy, decisions }
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// True if decisions consume random draws
    pub fn is_random(&self) -> bool {
        self.decisions.is_some()
    }

    /// Pre-generate `count` decisions; no-op for non-random policies
    pub fn refill<R: RngCore + ?Sized>(&mut self, rng: &mut R, count: usize) {
        if let Some(decisions) = &mut self.decisions {
            decisions.refill(rng, count);
        }
    }

    /// Choose a destination given the current occupancies
    pub fn route<O, R>(&mut self, queues: &O, rng: &mut R) -> Destination
    where
        O: Occupancy + ?Sized,
        R: RngCore + ?Sized,
    {
        match &self.policy {
            RoutingPolicy::Fixed { destination } => *destination,
            RoutingPolicy::Probabilistic { destinations, .. } => {
                let position = match &mut self.decisions {
                    Some(decisions) => decisions.draw(rng) as usize,
                    None => 0,
                };
                destinations[position.min(destinations.len() - 1)]
            }
            RoutingPolicy::JoinShortestQueue { destinations } => {
                let mut candidates = destinations.iter().copied();
                let mut best = match candidates.next() {
                    Some(first) => first,
                    None => return Destination::Exit,
                };
                let mut shortest = queues.occupancy(best);
                for candidate in candidates {
                    // Strict improvement only: earlier listed queues win ties
                    let length = queues.occupancy(candidate);
                    if length < shortest {
                        best = candidate;
                        shortest = length;
                    }
                }
                Destination::Queue(best)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Mt19937;

    #[test]
    fn test_join_shortest_queue_breaks_ties_in_listed_order() {
        let mut router = Router::new(RoutingPolicy::JoinShortestQueue {
            destinations: vec![0, 1, 2],
        });
        let mut rng = Mt19937::new();
        let lengths = [3usize, 1, 1];
        assert_eq!(router.route(&lengths[..], &mut rng), Destination::Queue(1));

        // Priority order, not index order, decides ties
        let mut router = Router::new(RoutingPolicy::JoinShortestQueue {
            destinations: vec![2, 1, 0],
        });
        assert_eq!(router.route(&lengths[..], &mut rng), Destination::Queue(2));

        let all_equal = [2usize, 2, 2];
        assert_eq!(router.route(&all_equal[..], &mut rng), Destination::Queue(2));
    }

    #[test]
    fn test_join_shortest_queue_consumes_no_draws() {
        let mut router = Router::new(RoutingPolicy::JoinShortestQueue {
            destinations: vec![0, 1],
        });
        let mut rng = Mt19937::from_key(&[4]);
        let mut check = Mt19937::from_key(&[4]);
        router.route(&[0usize, 0][..], &mut rng);
        assert!(!router.is_random());
        assert_eq!(rng.next_word(), check.next_word());
    }

    #[test]
    fn test_fixed_routing() {
        let mut router = Router::new(RoutingPolicy::Fixed {
            destination: Destination::Exit,
        });
        let mut rng = Mt19937::new();
        assert_eq!(router.route(&[5usize][..], &mut rng), Destination::Exit);
    }

    #[test]
    fn test_probabilistic_routing_frequencies() {
        let mut router = Router::new(RoutingPolicy::Probabilistic {
            destinations: vec![Destination::Queue(1), Destination::Exit, Destination::Queue(0)],
            probs: vec![0.5, 0.2, 0.3],
        });
        assert!(router.is_random());

        let mut rng = Mt19937::from_key(&[2024]);
        router.refill(&mut rng, 1000);
        let lengths = [0usize, 0];
        let mut counts = [0usize; 3];
        // Runs past the batch into single draws
        for _ in 0..60_000 {
            match router.route(&lengths[..], &mut rng) {
                Destination::Queue(1) => counts[0] += 1,
                Destination::Exit => counts[1] += 1,
                Destination::Queue(_) => counts[2] += 1,
            }
        }
        let freq: Vec<f64> = counts.iter().map(|&c| c as f64 / 60_000.0).collect();
        assert!((freq[0] - 0.5).abs() < 0.01);
        assert!((freq[1] - 0.2).abs() < 0.01);
        assert!((freq[2] - 0.3).abs() < 0.01);
    }

    #[test]
    fn test_probabilistic_routing_uses_batch() {
        let policy = RoutingPolicy::Probabilistic {
            destinations: vec![Destination::Queue(0), Destination::Exit],
            probs: vec![0.5, 0.5],
        };
        let mut a = Router::new(policy.clone());
        let mut b = Router::new(policy);
        let mut rng_a = Mt19937::from_key(&[1, 2, 3, 4]);
        let mut rng_b = Mt19937::from_key(&[1, 2, 3, 4]);
        a.refill(&mut rng_a, 100);
        b.refill(&mut rng_b, 100);

        // Unrelated generator activity does not change buffered decisions
        for _ in 0..10 {
            rng_b.next_word();
        }
        let lengths = [0usize];
        for _ in 0..100 {
            assert_eq!(a.route(&lengths[..], &mut rng_a), b.route(&lengths[..], &mut rng_b));
        }
    }
}
