// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use opentelemetry::InstrumentationScope;
use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider};

const SCOPE_NAME: &str = "instacache";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

/// The OpenTelemetry instruments one instance cache reports to.
#[derive(Debug, Clone)]
pub(crate) struct Instruments {
    pub events: Counter<u64>,
    pub durations: Histogram<f64>,
    pub batch_sizes: Histogram<u64>,
}

impl Instruments {
    pub fn from_provider(provider: &dyn MeterProvider) -> Self {
        let scope = InstrumentationScope::builder(SCOPE_NAME)
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(SCHEMA_URL)
            .build();
        Self::from_meter(&provider.meter_with_scope(scope))
    }

    pub fn from_meter(meter: &Meter) -> Self {
        Self {
            events: meter
                .u64_counter("cache.event.count")
                .with_description("Instance cache events")
                .with_unit("{event}")
                .build(),
            durations: meter
                .f64_histogram("cache.operation.duration")
                .with_description("Instance cache operation duration")
                .with_unit("s")
                .build(),
            batch_sizes: meter
                .u64_histogram("cache.batch.size")
                .with_description("Distinct instances requested per bulk read")
                .with_unit("{instance}")
                .build(),
        }
    }
}
