use crate::observations::Observations;
use crate::rng::Mt19937;
use crate::routing::Occupancy;
use crate::simulation::NetworkStreams;
use crate::types::{Destination, NetworkModel, SimulationDesign};

/// A customer in the network
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Customer {
    pub system_entry_time: f64,
    /// When the customer entered its current queue, reset when service starts
    pub start_time: f64,
    /// Scheduled service completion; `None` while waiting
    pub finish_time: Option<f64>,
}

impl Customer {
    fn new(system_entry_time: f64) -> Self {
        Self {
            system_entry_time,
            start_time: system_entry_time,
            finish_time: None,
        }
    }
}

/// Customers present at one queue, in order of entry.
/// The first `servers` entries are in service.
#[derive(Clone, Debug, Default)]
pub struct QueueState {
    customers: Vec<Customer>,
}

impl QueueState {
    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }
}

impl Occupancy for [QueueState] {
    fn occupancy(&self, queue: usize) -> usize {
        self[queue].len()
    }
}

/// Next event: the boundary of the run, an arrival, or a service completion
#[derive(Clone, Copy, Debug, PartialEq)]
enum Event {
    End,
    Arrival,
    Completion { queue: usize, slot: usize },
}

/// Event loop of a single replication.
///
/// Time advances from 0 to the design's total duration. Each step picks the
/// earliest of the next arrival and every in-service completion (arrivals win
/// exact ties, then lower queue and slot indices), records occupancy over the
/// elapsed interval, and applies the event. Only the part of the run after the
/// warm-up period is recorded.
pub struct Engine<'a> {
    model: &'a NetworkModel,
    design: &'a SimulationDesign,
    streams: &'a mut NetworkStreams,
    rng: &'a mut Mt19937,
    queues: Vec<QueueState>,
    obs: Observations,
    clock: f64,
}

impl<'a> Engine<'a> {
    pub fn new(
        model: &'a NetworkModel,
        design: &'a SimulationDesign,
        streams: &'a mut NetworkStreams,
        rng: &'a mut Mt19937,
    ) -> Self {
        Self {
            model,
            design,
            streams,
            rng,
            queues: vec![QueueState::default(); model.queues.len()],
            obs: Observations::new(model.queues.len()),
            clock: 0.0,
        }
    }

    /// Run to the end of the design's total duration and hand back the observations
    pub fn run(mut self) -> Observations {
        let total = self.design.total_duration();
        let warmup = self.design.warmup_duration;
        let mut next_arrival = self.streams.arrivals.draw(self.rng);

        loop {
            // 1. Find the next event and clamp it to the end of the run
            let (time, event) = self.next_event(next_arrival, total);
            let warm = time > warmup;

            // 2. Record the state over [clock, time), clipped to the data phase
            if warm {
                self.record_occupancy(time - self.clock.max(warmup));
            }

            self.clock = time;

            // 3. Apply the event
            let (customer, destination) = match event {
                Event::End => break,
                Event::Arrival => {
                    let customer = Customer::new(time);
                    let destination = self.streams.arrival_router.route(&self.queues[..], self.rng);
                    next_arrival = time + self.streams.arrivals.draw(self.rng);
                    if warm {
                        self.obs.system_arrivals += 1;
                    }
                    #[cfg(feature = "debug")]
                    tracing::trace!(time, ?destination, "arrival");
                    (customer, destination)
                }
                Event::Completion { queue, slot } => self.complete_service(queue, slot, warm),
            };

            // 4. Send the customer on
            self.dispatch(customer, destination, warm);
        }

        for (state, obs) in self.queues.iter().zip(&mut self.obs.queues) {
            obs.remaining = state.len();
        }
        self.obs
    }

    fn next_event(&self, next_arrival: f64, total: f64) -> (f64, Event) {
        let mut time = next_arrival;
        let mut event = Event::Arrival;

        for (queue, (state, spec)) in self.queues.iter().zip(&self.model.queues).enumerate() {
            for (slot, customer) in state.customers.iter().take(spec.servers).enumerate() {
                if let Some(finish) = customer.finish_time {
                    if finish < time {
                        time = finish;
                        event = Event::Completion { queue, slot };
                    }
                }
            }
        }

        if time >= total {
            (total, Event::End)
        } else {
            (time, event)
        }
    }

    fn record_occupancy(&mut self, dt: f64) {
        let mut in_system = 0;
        for (state, obs) in self.queues.iter().zip(&mut self.obs.queues) {
            obs.occupancy.record(state.len(), dt);
            in_system += state.len();
        }
        self.obs.system_occupancy.record(in_system, dt);
    }

    /// Remove the finishing customer, start the next waiting one, and route the
    /// finished customer onward
    fn complete_service(&mut self, queue: usize, slot: usize, warm: bool) -> (Customer, Destination) {
        let time = self.clock;
        let customer = self.queues[queue].customers.remove(slot);
        if warm {
            self.obs.queues[queue].service_times.push(time - customer.start_time);
        }

        let servers = self.model.queues[queue].servers;
        if self.queues[queue].len() >= servers {
            // The first waiting customer now sits in the freed server position
            let next = &mut self.queues[queue].customers[servers - 1];
            if warm {
                self.obs.queues[queue].wait_times.push(time - next.start_time);
            }
            next.start_time = time;
            next.finish_time = Some(time + self.streams.service[queue].draw(self.rng));
            #[cfg(feature = "debug")]
            tracing::trace!(time, queue, finish = ?next.finish_time, "waiting customer starts service");
        }

        let destination = self.streams.routers[queue].route(&self.queues[..], self.rng);
        #[cfg(feature = "debug")]
        tracing::trace!(time, queue, remaining = self.queues[queue].len(), ?destination, "service completion");
        (customer, destination)
    }

    fn dispatch(&mut self, mut customer: Customer, destination: Destination, warm: bool) {
        let time = self.clock;
        let queue = match destination {
            Destination::Exit => {
                #[cfg(feature = "debug")]
                tracing::trace!(time, transit = time - customer.system_entry_time, "exit");
                if warm {
                    self.obs.transit_times.push(time - customer.system_entry_time);
                }
                return;
            }
            Destination::Queue(queue) => queue,
        };

        let spec = &self.model.queues[queue];
        let occupancy = self.queues[queue].len();
        if spec.has_room(occupancy) {
            customer.start_time = time;
            if occupancy < spec.servers {
                customer.finish_time = Some(time + self.streams.service[queue].draw(self.rng));
                if warm {
                    self.obs.queues[queue].wait_times.push(0.0);
                }
            } else {
                customer.finish_time = None;
            }
            self.queues[queue].customers.push(customer);
        } else {
            #[cfg(feature = "debug")]
            tracing::trace!(time, queue, "customer dropped, no room");
            if warm {
                self.obs.queues[queue].drops += 1;
            }
        }
        if warm {
            self.obs.queues[queue].arrivals += 1;
        }
    }
}
