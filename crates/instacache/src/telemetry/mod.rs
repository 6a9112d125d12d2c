// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Telemetry for instance cache operations.
//!
//! Every engine operation ends in one or more activity records. Each record
//! becomes a `tracing` event when logging is enabled for the cache and feeds the
//! OpenTelemetry instruments when the `metrics` feature is enabled and a meter
//! provider was supplied.

use std::time::Duration;

#[cfg(any(feature = "metrics", test))]
use opentelemetry::KeyValue;
use thread_aware::{Arc, PerCore};
use tracing::Level;

pub(crate) mod attributes;
pub(crate) mod ext;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

/// Static name identifying one cache in telemetry.
pub(crate) type CacheName = &'static str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    GetInstances,
    UpdateInstance,
    Delete,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetInstances => "instance.get_many",
            Self::UpdateInstance => "instance.update",
            Self::Delete => "instance.delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Absent,
    Written,
    Unchanged,
    Skipped,
    Deleted,
    Invalidated,
    Deferred,
    Ok,
    Fallback,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Absent => "cache.absent",
            Self::Written => "cache.written",
            Self::Unchanged => "cache.unchanged",
            Self::Skipped => "cache.skipped",
            Self::Deleted => "cache.deleted",
            Self::Invalidated => "cache.invalidated",
            Self::Deferred => "cache.deferred",
            Self::Ok => "cache.ok",
            Self::Fallback => "cache.fallback",
            Self::Error => "cache.error",
        }
    }

    pub fn level(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::Absent | Self::Unchanged | Self::Skipped | Self::Deferred | Self::Ok => Level::DEBUG,
            Self::Written | Self::Deleted | Self::Invalidated => Level::INFO,
            Self::Fallback => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }
}

/// Records cache activity as logs and metrics.
#[derive(Clone, Debug)]
pub(crate) struct CacheTelemetry {
    inner: Arc<CacheTelemetryInner, PerCore>,
}

#[derive(Clone, Debug)]
struct CacheTelemetryInner {
    logging_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<metrics::Instruments>,
}

impl CacheTelemetry {
    /// Creates a collector that only logs, or does nothing when `logging_enabled` is false.
    pub fn new(logging_enabled: bool) -> Self {
        Self {
            inner: Arc::from_unaware(CacheTelemetryInner {
                logging_enabled,
                #[cfg(any(feature = "metrics", test))]
                instruments: None,
            }),
        }
    }

    /// Creates a collector that also feeds `instruments`, if any.
    #[cfg(any(feature = "metrics", test))]
    pub fn with_instruments(logging_enabled: bool, instruments: Option<metrics::Instruments>) -> Self {
        Self {
            inner: Arc::from_unaware(CacheTelemetryInner {
                logging_enabled,
                instruments,
            }),
        }
    }

    /// Records `count` occurrences of an activity.
    ///
    /// A zero count is dropped without logging.
    pub fn record(&self, cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, count: u64, duration: Option<Duration>) {
        if count == 0 {
            return;
        }

        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.inner.instruments {
            let attrs = [
                KeyValue::new(attributes::CACHE_NAME, cache_name),
                KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()),
                KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()),
            ];
            instruments.events.add(count, &attrs);
            if let Some(duration) = duration {
                instruments.durations.record(duration.as_secs_f64(), &attrs);
            }
        }

        if self.inner.logging_enabled {
            Self::emit(cache_name, operation, activity, count, duration);
        }
    }

    /// Records how many distinct instances one bulk read asked for.
    #[cfg_attr(
        not(any(feature = "metrics", test)),
        expect(unused_variables, reason = "batch sizes only feed metrics")
    )]
    pub fn record_batch_size(&self, cache_name: CacheName, size: u64) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.inner.instruments {
            instruments
                .batch_sizes
                .record(size, &[KeyValue::new(attributes::CACHE_NAME, cache_name)]);
        }
    }

    fn emit(cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, count: u64, duration: Option<Duration>) {
        let op = operation.as_str();
        let act = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // Field names must match the constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = act,
                    cache.count = count,
                    cache.duration_ns = ?duration_ns,
                    "cache.event"
                )
            };
        }

        let level = activity.level();
        if level == Level::ERROR {
            emit_event!(error);
        } else if level == Level::WARN {
            emit_event!(warn);
        } else if level == Level::INFO {
            emit_event!(info);
        } else {
            emit_event!(debug);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::testing::{LogCapture, MetricTester};

    #[test]
    fn operation_labels() {
        assert_eq!(CacheOperation::GetInstances.as_str(), "instance.get_many");
        assert_eq!(CacheOperation::UpdateInstance.as_str(), "instance.update");
        assert_eq!(CacheOperation::Delete.as_str(), "instance.delete");
    }

    #[test]
    fn activity_levels() {
        assert_eq!(CacheActivity::Hit.level(), Level::DEBUG);
        assert_eq!(CacheActivity::Unchanged.level(), Level::DEBUG);
        assert_eq!(CacheActivity::Written.level(), Level::INFO);
        assert_eq!(CacheActivity::Invalidated.level(), Level::INFO);
        assert_eq!(CacheActivity::Fallback.level(), Level::WARN);
        assert_eq!(CacheActivity::Error.level(), Level::ERROR);
    }

    #[test]
    fn metrics_record_emits_attributes() {
        let tester = MetricTester::new();
        let instruments = metrics::Instruments::from_provider(tester.meter_provider());
        let telemetry = CacheTelemetry::with_instruments(false, Some(instruments));

        telemetry.record(
            "widgets",
            CacheOperation::GetInstances,
            CacheActivity::Hit,
            3,
            Some(Duration::from_millis(5)),
        );
        telemetry.record_batch_size("widgets", 4);

        tester.assert_attributes_contain(&[
            KeyValue::new(attributes::CACHE_NAME, "widgets"),
            KeyValue::new(attributes::CACHE_OPERATION_NAME, CacheOperation::GetInstances.as_str()),
            KeyValue::new(attributes::CACHE_ACTIVITY_NAME, CacheActivity::Hit.as_str()),
        ]);
    }

    #[test]
    fn logs_contain_all_fields() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::emit(
            "widgets",
            CacheOperation::UpdateInstance,
            CacheActivity::Error,
            1,
            Some(Duration::from_nanos(12345)),
        );

        capture.assert_contains(attributes::CACHE_NAME);
        capture.assert_contains(attributes::CACHE_OPERATION_NAME);
        capture.assert_contains(attributes::CACHE_ACTIVITY_NAME);
        capture.assert_contains(attributes::CACHE_COUNT_NAME);
        capture.assert_contains(attributes::CACHE_DURATION_NAME);
        capture.assert_contains(attributes::CACHE_EVENT_NAME);
        capture.assert_contains("widgets");
        capture.assert_contains(CacheOperation::UpdateInstance.as_str());
        capture.assert_contains(CacheActivity::Error.as_str());
        capture.assert_contains("ERROR");
    }

    #[test]
    fn logs_use_activity_level() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        CacheTelemetry::emit("c", CacheOperation::Delete, CacheActivity::Fallback, 1, None);
        capture.assert_contains("WARN");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        CacheTelemetry::emit("c", CacheOperation::Delete, CacheActivity::Deleted, 1, None);
        capture.assert_contains("INFO");
    }

    #[test]
    fn disabled_telemetry_emits_nothing() {
        let telemetry = CacheTelemetry::new(false);
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        telemetry.record("c", CacheOperation::GetInstances, CacheActivity::Miss, 2, None);
        telemetry.record_batch_size("c", 2);

        assert!(capture.output().is_empty());
    }

    #[test]
    fn zero_counts_are_dropped() {
        let telemetry = CacheTelemetry::new(true);
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        telemetry.record("c", CacheOperation::GetInstances, CacheActivity::Absent, 0, None);

        assert!(capture.output().is_empty());
    }
}
