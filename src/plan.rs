//! A priority queue that stores arbitrary data sorted by time
//!
//! Defines a `Queue<T>` that is intended to store a queue of items of type `T`, sorted by `f64`
//! time, called 'plans'. This queue has methods for adding plans, retrieving the earliest plan
//! in the queue, and inspecting what is still pending. Adding and retrieving a plan are
//! *O*(log(*n*)).
//!
//! The `Engine` stores every pending epidemic event here.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::trace;

/// A priority queue that stores arbitrary data sorted by time
///
/// Items of type `T` are stored in order by `f64` time and called `Plan<T>`. When plans are
/// created they are sequentially assigned a `PlanId` that wraps a `u64`. If two plans are
/// scheduled for the same time then the plan that was added first (i.e., that has the lowest
/// id) is placed earlier. This makes the order in which simultaneous events fire a pure
/// function of the order in which they were scheduled.
pub struct Queue<T> {
    queue: BinaryHeap<Entry<T>>,
    plan_counter: u64,
}

impl<T> Queue<T> {
    /// Create a new empty `Queue<T>`
    #[must_use]
    pub fn new() -> Queue<T> {
        Queue {
            queue: BinaryHeap::new(),
            plan_counter: 0,
        }
    }

    /// Add a plan to the queue at the specified time
    ///
    /// Returns the `PlanId` of the newly-added plan.
    pub fn add_plan(&mut self, time: f64, data: T) -> PlanId {
        let id = self.plan_counter;
        trace!("adding plan {id} at {time}");
        self.queue.push(Entry { time, id, data });
        self.plan_counter += 1;
        PlanId(id)
    }

    /// Retrieve the earliest plan in the queue
    ///
    /// Returns the next plan if it exists or else `None` if the queue is empty
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        self.queue.pop().map(|entry| Plan {
            time: entry.time,
            id: PlanId(entry.id),
            data: entry.data,
        })
    }

    /// Time of the earliest plan without removing it
    #[must_use]
    pub fn next_time(&self) -> Option<f64> {
        self.queue.peek().map(|entry| entry.time)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of plans ever added, including those already retrieved
    #[must_use]
    pub fn plans_added(&self) -> u64 {
        self.plan_counter
    }

    /// Returns the pending plans in the order they would be retrieved, without consuming them
    #[must_use]
    pub fn pending(&self) -> Vec<Plan<&T>> {
        let mut entries: Vec<&Entry<T>> = self.queue.iter().collect();
        // `Entry` ordering is reversed for the max-heap
        entries.sort_by(|a, b| b.cmp(a));
        entries
            .into_iter()
            .map(|entry| Plan {
                time: entry.time,
                id: PlanId(entry.id),
                data: &entry.data,
            })
            .collect()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A time, id, and payload used to order plans in the `Queue<T>`
///
/// `Entry` objects are sorted in increasing order of time and then plan id. The payload does
/// not take part in the ordering.
struct Entry<T> {
    time: f64,
    id: u64,
    data: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Entry objects are ordered in increasing order by time and then plan id. `BinaryHeap` is a
/// max-heap, so both comparisons are reversed.
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        let time_ordering = self.time.total_cmp(&other.time).reverse();
        match time_ordering {
            // Break time ties in order of plan id
            Ordering::Equal => self.id.cmp(&other.id).reverse(),
            _ => time_ordering,
        }
    }
}

/// A unique identifier for a plan added to a `Queue<T>`
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlanId(pub u64);

/// A plan that holds data of type `T` intended to be used at the specified time
#[derive(Debug)]
pub struct Plan<T> {
    pub time: f64,
    pub id: PlanId,
    pub data: T,
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::Queue;

    #[test]
    fn empty_queue() {
        let mut plan_queue = Queue::<()>::new();
        assert!(plan_queue.get_next_plan().is_none());
        assert!(plan_queue.is_empty());
        assert_eq!(plan_queue.next_time(), None);
    }

    #[test]
    fn add_plans() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1.0, 1);
        plan_queue.add_plan(3.0, 3);
        plan_queue.add_plan(2.0, 2);
        assert_eq!(plan_queue.len(), 3);

        let next_plan = plan_queue.get_next_plan().unwrap();
        assert_eq!(next_plan.time, 1.0);
        assert_eq!(next_plan.data, 1);

        let next_plan = plan_queue.get_next_plan().unwrap();
        assert_eq!(next_plan.time, 2.0);
        assert_eq!(next_plan.data, 2);

        let next_plan = plan_queue.get_next_plan().unwrap();
        assert_eq!(next_plan.time, 3.0);
        assert_eq!(next_plan.data, 3);

        assert!(plan_queue.get_next_plan().is_none());
        assert_eq!(plan_queue.plans_added(), 3);
    }

    #[test]
    fn add_plans_at_same_time() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1.0, 1);
        plan_queue.add_plan(1.0, 2);
        plan_queue.add_plan(0.5, 0);
        plan_queue.add_plan(1.0, 3);

        let order: Vec<i32> = std::iter::from_fn(|| plan_queue.get_next_plan())
            .map(|plan| plan.data)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn add_and_get_plans() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(1.0, 1);
        plan_queue.add_plan(2.0, 2);

        let next_plan = plan_queue.get_next_plan().unwrap();
        assert_eq!(next_plan.time, 1.0);
        assert_eq!(next_plan.data, 1);

        plan_queue.add_plan(1.5, 3);
        assert_eq!(plan_queue.next_time(), Some(1.5));

        let next_plan = plan_queue.get_next_plan().unwrap();
        assert_eq!(next_plan.time, 1.5);
        assert_eq!(next_plan.data, 3);

        let next_plan = plan_queue.get_next_plan().unwrap();
        assert_eq!(next_plan.time, 2.0);
        assert_eq!(next_plan.data, 2);

        assert!(plan_queue.get_next_plan().is_none());
    }

    #[test]
    fn pending_matches_retrieval_order() {
        let mut plan_queue = Queue::new();
        plan_queue.add_plan(2.0, 'b');
        plan_queue.add_plan(1.0, 'a');
        plan_queue.add_plan(2.0, 'c');

        let pending: Vec<char> = plan_queue.pending().iter().map(|plan| *plan.data).collect();
        assert_eq!(pending, vec!['a', 'b', 'c']);
        // Inspection does not consume anything.
        assert_eq!(plan_queue.len(), 3);

        let retrieved: Vec<char> = std::iter::from_fn(|| plan_queue.get_next_plan())
            .map(|plan| plan.data)
            .collect();
        assert_eq!(retrieved, pending);
    }
}
