// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Hop-by-hop propagation of deferred invalidations.

use std::collections::{HashSet, VecDeque};

use crate::{CacheKey, Dependent, Error, InstanceCache};

const DEFAULT_MAX_HOPS: usize = 8;

/// A work queue of dependents left over by [`InstanceCache::update_instance`].
///
/// Each call to `update_instance` performs exactly one hop of invalidation and
/// hands the dependents back. Draining the queue refreshes those dependents one
/// hop at a time, pushing whatever they report in turn, until the queue is
/// empty or the hop limit is reached. Dependents are refreshed with
/// `update_only` set, so propagation never warms entries that were cold.
///
/// Every dependent is processed at most once per queue, identified by its cache
/// key so bare and qualified type names count as one. This breaks cycles between
/// entity types that reference each other.
///
/// # Example
///
/// ```no_run
/// # async fn run(cache: instacache::InstanceCache) -> Result<(), instacache::Error> {
/// use instacache::InvalidationQueue;
///
/// let deferred = cache.update_instance("Widget", &7.into(), None, false).await?;
///
/// let mut queue = InvalidationQueue::new();
/// queue.extend(deferred);
/// let report = queue.drain(&cache).await?;
/// assert_eq!(report.remaining, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InvalidationQueue {
    queue: VecDeque<Dependent>,
    seen: HashSet<CacheKey>,
    max_hops: usize,
}

/// What one [`InvalidationQueue::drain`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Dependents refreshed through the cache.
    pub processed: usize,
    /// Hops taken; each hop refreshes every dependent queued by the previous one.
    pub hops: usize,
    /// Dependents still queued because the hop limit was reached.
    pub remaining: usize,
}

impl Default for InvalidationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationQueue {
    /// Creates an empty queue with the default hop limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_hops(DEFAULT_MAX_HOPS)
    }

    /// Creates an empty queue that stops after `max_hops` hops per drain.
    #[must_use]
    pub fn with_max_hops(max_hops: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            seen: HashSet::new(),
            max_hops,
        }
    }

    /// Returns the hop limit.
    #[must_use]
    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Queues one dependent.
    pub fn push(&mut self, dependent: Dependent) {
        self.queue.push_back(dependent);
    }

    /// Returns the number of queued dependents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Refreshes queued dependents hop by hop.
    ///
    /// Stops early when a hop would exceed the limit; the dependents it would
    /// have processed stay queued and are reported as `remaining`.
    ///
    /// # Errors
    ///
    /// Fails on the first dependent whose type does not resolve or whose refresh
    /// fails. That dependent and everything behind it stay queued, followed by
    /// the dependents reported by the ones refreshed earlier in the same hop.
    pub async fn drain(&mut self, cache: &InstanceCache) -> Result<DrainReport, Error> {
        let mut report = DrainReport::default();

        while !self.queue.is_empty() && report.hops < self.max_hops {
            report.hops += 1;
            let mut next = Vec::new();
            let hop = self.run_hop(cache, &mut next, &mut report).await;
            // Dependents found before a failure still belong to the next hop.
            self.queue.extend(next);
            hop?;
        }

        report.remaining = self.queue.len();
        Ok(report)
    }

    /// Refreshes the dependents queued at the start of this hop, collecting what
    /// they report into `next`.
    async fn run_hop(&mut self, cache: &InstanceCache, next: &mut Vec<Dependent>, report: &mut DrainReport) -> Result<(), Error> {
        for _ in 0..self.queue.len() {
            let Some(dependent) = self.queue.front() else { break };
            let key = cache.key_for(&dependent.type_name, &dependent.pk)?;
            if self.seen.contains(&key) {
                self.queue.pop_front();
                continue;
            }

            let found = cache
                .update_instance(&dependent.type_name, &dependent.pk, None, true)
                .await?;
            self.queue.pop_front();
            self.seen.insert(key);
            report.processed += 1;
            next.extend(found);
        }
        Ok(())
    }
}

impl Extend<Dependent> for InvalidationQueue {
    fn extend<I: IntoIterator<Item = Dependent>>(&mut self, iter: I) {
        self.queue.extend(iter);
    }
}

impl FromIterator<Dependent> for InvalidationQueue {
    fn from_iter<I: IntoIterator<Item = Dependent>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dependent(type_name: &str, pk: i64) -> Dependent {
        Dependent {
            type_name: type_name.into(),
            pk: pk.into(),
            immediate: false,
        }
    }

    #[test]
    fn queue_basics() {
        let mut queue = InvalidationQueue::with_max_hops(2);
        assert!(queue.is_empty());
        assert_eq!(queue.max_hops(), 2);

        queue.push(dependent("A", 1));
        queue.extend([dependent("B", 2), dependent("C", 3)]);
        assert_eq!(queue.len(), 3);

        let collected: InvalidationQueue = [dependent("A", 1)].into_iter().collect();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected.max_hops(), DEFAULT_MAX_HOPS);
    }
}
