#![deny(missing_docs)]
//! Strata metrics
//!
//! A thin, cheaply cloneable handle over a [`MetricRegistry`]. Buffers record spilled blocks
//! and bytes on it, table readers record pool loads and positioned reads.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use witchcraft_metrics::{Metric, MetricRegistry};
pub use witchcraft_metrics::{Counter, MetricId};

/// Blocks moved from memory into a spill file.
pub const SPILLED_BLOCKS: &str = "strata.buffer.spill.blocks";
/// Bytes written into spill files.
pub const SPILLED_BYTES: &str = "strata.buffer.spill.bytes";
/// Shared pools read from a table file.
pub const POOL_LOADS: &str = "strata.file.pools.loads";
/// Positioned reads issued against a table file.
pub const FILE_READS: &str = "strata.file.reads";
/// Bytes fetched by positioned reads.
pub const FILE_READ_BYTES: &str = "strata.file.reads.bytes";

/// A shared metric registry with a set of tags applied to every reported metric.
#[derive(Default, Clone)]
pub struct StrataMetrics {
    registry: Arc<MetricRegistry>,
    tags: Arc<Tags>,
}

/// Tags attached to every metric reported through [`StrataMetrics::counters`].
#[derive(Default)]
pub struct Tags(BTreeMap<Cow<'static, str>, Cow<'static, str>>);

impl<K, V> From<&[(K, V)]> for Tags
where
    K: Clone + Into<Cow<'static, str>>,
    V: Clone + Into<Cow<'static, str>>,
{
    fn from(pairs: &[(K, V)]) -> Self {
        Tags(
            pairs
                .iter()
                .map(|(k, v)| (k.clone().into(), v.clone().into()))
                .collect(),
        )
    }
}

impl StrataMetrics {
    /// Wrap an existing registry.
    pub fn new(registry: MetricRegistry, tags: impl Into<Tags>) -> Self {
        Self {
            registry: Arc::new(registry),
            tags: Arc::new(tags.into()),
        }
    }

    /// An empty registry whose counters are reported with `tags`.
    pub fn with_tags(tags: impl Into<Tags>) -> Self {
        Self::new(MetricRegistry::default(), tags)
    }

    /// The counter registered under `id`, created on first use.
    ///
    /// # Panics
    ///
    /// Panics if a metric of another kind is registered under `id`.
    pub fn counter<T>(&self, id: T) -> Arc<Counter>
    where
        T: Into<MetricId>,
    {
        self.registry.counter(id)
    }

    /// Record one block of `bytes` moved into a spill file.
    pub fn record_spill(&self, bytes: usize) {
        self.counter(SPILLED_BLOCKS).inc();
        self.counter(SPILLED_BYTES).add(saturating_i64(bytes));
    }

    /// Record one positioned read of `bytes`.
    pub fn record_read(&self, bytes: usize) {
        self.counter(FILE_READS).inc();
        self.counter(FILE_READ_BYTES).add(saturating_i64(bytes));
    }

    /// Record a shared pool being loaded from a table file.
    pub fn record_pool_load(&self) {
        self.counter(POOL_LOADS).inc();
    }

    /// Every counter in the registry with its current count, tagged with the registry's tags.
    ///
    /// Tag values are reported verbatim, sanitize them before exposing the result externally.
    pub fn counters(&self) -> Vec<(MetricId, i64)> {
        self.registry
            .metrics()
            .iter()
            .filter_map(|(id, metric)| match metric {
                Metric::Counter(counter) => Some((self.tagged(id), counter.count())),
                _ => None,
            })
            .collect()
    }

    fn tagged(&self, id: &MetricId) -> MetricId {
        self.tags
            .0
            .iter()
            .fold(id.clone(), |id, (key, value)| id.with_tag(key.clone(), value.clone()))
    }
}

fn saturating_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use crate::{
        FILE_READ_BYTES, MetricId, POOL_LOADS, SPILLED_BLOCKS, SPILLED_BYTES, StrataMetrics,
    };

    #[test]
    fn clones_share_a_registry() {
        let metrics = StrataMetrics::with_tags([("table", "t1")].as_slice());
        let clone = metrics.clone();
        clone.record_spill(10);
        clone.record_spill(6);
        assert_eq!(metrics.counter(SPILLED_BLOCKS).count(), 2);
        assert_eq!(metrics.counter(SPILLED_BYTES).count(), 16);
        assert_eq!(metrics.counter(POOL_LOADS).count(), 0);
    }

    #[test]
    fn counters_carry_tags() {
        let metrics = StrataMetrics::with_tags([("table", "t1")].as_slice());
        metrics.record_read(4);
        metrics.record_pool_load();

        let counters = metrics.counters();
        assert_eq!(counters.len(), 3);
        let read_bytes = MetricId::new(FILE_READ_BYTES).with_tag("table", "t1");
        let (_, count) = counters.iter().find(|(id, _)| *id == read_bytes).unwrap();
        assert_eq!(*count, 4);
    }
}
