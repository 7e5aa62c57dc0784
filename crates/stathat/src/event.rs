use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MetricKind {
    #[display("count")]
    Count,
    #[display("measure")]
    Measure,
}

/// A counter increment; counts are summed over time by the metrics service.
#[derive(Debug, Clone, PartialEq)]
pub struct CountEvent {
    pub name: String,
    pub key: String,
    pub n: i64,
}

/// An instantaneous measurement; measures are averaged over time.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureEvent {
    pub name: String,
    pub key: String,
    pub value: f64,
}

/// A single metric on its way to the metrics service.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    Count(CountEvent),
    Measure(MeasureEvent),
}

impl MetricEvent {
    pub fn count(name: impl Into<String>, key: impl Into<String>, n: i64) -> Self {
        MetricEvent::Count(CountEvent {
            name: name.into(),
            key: key.into(),
            n,
        })
    }

    pub fn measure(name: impl Into<String>, key: impl Into<String>, value: f64) -> Self {
        MetricEvent::Measure(MeasureEvent {
            name: name.into(),
            key: key.into(),
            value,
        })
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricEvent::Count(_) => MetricKind::Count,
            MetricEvent::Measure(_) => MetricKind::Measure,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MetricEvent::Count(c) => &c.name,
            MetricEvent::Measure(m) => &m.name,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            MetricEvent::Count(c) => &c.key,
            MetricEvent::Measure(m) => &m.key,
        }
    }
}
