//! Opaque per-signal payload model.
//!
//! The stage never interprets item contents. Each signal kind (traces,
//! metrics, logs) carries its items grouped by resource and then by scope,
//! matching the OTLP shape the real collector batches — but the fields
//! inside an item are opaque blobs here since their structure is out of
//! scope for this crate.

use bytes::Bytes;

/// A single resource-scoped group of items, the smallest unit a split can
/// produce on its own.
#[derive(Debug, Clone, Default)]
pub struct ScopeGroup<T> {
    /// Opaque instrumentation-scope identity (name + version, as the
    /// collector would report it).
    pub scope_id: String,
    pub items: Vec<T>,
}

impl<T> ScopeGroup<T> {
    fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// All the scopes reported under one resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceGroup<T> {
    /// Opaque resource identity (service name, host, etc., as a single key).
    pub resource_id: String,
    pub scopes: Vec<ScopeGroup<T>>,
}

impl<T> ResourceGroup<T> {
    fn item_count(&self) -> usize {
        self.scopes.iter().map(ScopeGroup::item_count).sum()
    }
}

/// A full signal payload: an ordered list of resource groups.
///
/// Ordering is iteration order across resources, then scopes, then items -
/// the order a split must preserve for its prefix.
#[derive(Debug, Clone, Default)]
pub struct Grouped<T> {
    pub resources: Vec<ResourceGroup<T>>,
}

impl<T> Grouped<T> {
    pub fn empty() -> Self {
        Self { resources: Vec::new() }
    }

    pub fn item_count(&self) -> usize {
        self.resources.iter().map(ResourceGroup::item_count).sum()
    }

    /// Move every resource/scope/item from `other` into `self`, preserving
    /// order (other's groups are appended after self's).
    pub fn append(&mut self, mut other: Self) {
        self.resources.append(&mut other.resources);
    }

    /// Remove and return the first `n` items in iteration order, rebuilding
    /// the minimal set of enclosing resource/scope groups to carry them.
    /// `self` retains the remainder under the original groups (with empty
    /// groups dropped).
    pub fn take_prefix(&mut self, n: usize) -> Self
    where
        T: Clone,
    {
        let mut taken = Grouped::empty();
        let mut remaining = n;
        let mut kept_resources = Vec::with_capacity(self.resources.len());

        for mut resource in self.resources.drain(..) {
            if remaining == 0 {
                kept_resources.push(resource);
                continue;
            }

            let mut taken_scopes = Vec::new();
            let mut kept_scopes = Vec::with_capacity(resource.scopes.len());

            for mut scope in resource.scopes.drain(..) {
                if remaining == 0 {
                    kept_scopes.push(scope);
                    continue;
                }

                if scope.items.len() <= remaining {
                    remaining -= scope.items.len();
                    taken_scopes.push(scope);
                } else {
                    let tail = scope.items.split_off(remaining);
                    let head = ScopeGroup {
                        scope_id: scope.scope_id.clone(),
                        items: std::mem::replace(&mut scope.items, tail),
                    };
                    remaining = 0;
                    taken_scopes.push(head);
                    kept_scopes.push(scope);
                }
            }

            if !taken_scopes.is_empty() {
                taken.resources.push(ResourceGroup {
                    resource_id: resource.resource_id.clone(),
                    scopes: taken_scopes,
                });
            }
            if !kept_scopes.is_empty() {
                resource.scopes = kept_scopes;
                kept_resources.push(resource);
            }
        }

        self.resources = kept_resources;
        taken
    }

    /// Serialized byte size, used only when telemetry asks for `detailed`
    /// accounting. A cheap structural estimate stands in for a real OTLP
    /// proto encoder, which is out of scope.
    pub fn encoded_len(&self) -> usize
    where
        T: EncodedSize,
    {
        self.resources
            .iter()
            .map(|r| {
                r.resource_id.len()
                    + r.scopes
                        .iter()
                        .map(|s| s.scope_id.len() + s.items.iter().map(EncodedSize::encoded_size).sum::<usize>())
                        .sum::<usize>()
            })
            .sum()
    }
}

/// Gives an item's contribution to a payload's serialized byte size.
pub trait EncodedSize {
    fn encoded_size(&self) -> usize;
}

/// One span.
#[derive(Debug, Clone)]
pub struct Span {
    pub trace_id: [u8; 16],
    pub span_id: [u8; 8],
    pub name: String,
    pub attributes: Bytes,
}

impl EncodedSize for Span {
    fn encoded_size(&self) -> usize {
        16 + 8 + self.name.len() + self.attributes.len()
    }
}

/// One metric data point.
#[derive(Debug, Clone)]
pub struct DataPoint {
    pub metric_name: String,
    pub timestamp_unix_nano: u64,
    pub value: Bytes,
}

impl EncodedSize for DataPoint {
    fn encoded_size(&self) -> usize {
        self.metric_name.len() + 8 + self.value.len()
    }
}

/// One log record.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp_unix_nano: u64,
    pub severity: u8,
    pub body: Bytes,
}

impl EncodedSize for LogRecord {
    fn encoded_size(&self) -> usize {
        8 + 1 + self.body.len()
    }
}

/// The operations the batch worker needs from a buffered payload,
/// independent of which signal kind it carries.
///
/// Implemented once by `Grouped<T>` rather than per signal kind, so the
/// worker code (`crate::worker::Worker<P>`) is written against a single
/// bound instead of three near-identical concrete types.
pub trait SignalPayload: Send + 'static {
    fn empty() -> Self;
    fn item_count(&self) -> usize;
    fn append(&mut self, other: Self);
    fn take_prefix(&mut self, n: usize) -> Self;
    fn encoded_len(&self) -> usize;
}

macro_rules! impl_signal_payload {
    ($name:ident, $item:ty) => {
        #[derive(Debug, Clone, Default)]
        pub struct $name(pub Grouped<$item>);

        impl SignalPayload for $name {
            fn empty() -> Self {
                $name(Grouped::empty())
            }
            fn item_count(&self) -> usize {
                self.0.item_count()
            }
            fn append(&mut self, other: Self) {
                self.0.append(other.0)
            }
            fn take_prefix(&mut self, n: usize) -> Self {
                $name(self.0.take_prefix(n))
            }
            fn encoded_len(&self) -> usize {
                self.0.encoded_len()
            }
        }
    };
}

impl_signal_payload!(TraceData, Span);
impl_signal_payload!(MetricData, DataPoint);
impl_signal_payload!(LogData, LogRecord);

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(n: usize) -> Grouped<Span> {
        Grouped {
            resources: vec![ResourceGroup {
                resource_id: "svc".into(),
                scopes: vec![ScopeGroup {
                    scope_id: "scope".into(),
                    items: (0..n)
                        .map(|i| Span {
                            trace_id: [i as u8; 16],
                            span_id: [i as u8; 8],
                            name: format!("span-{i}"),
                            attributes: Bytes::new(),
                        })
                        .collect(),
                }],
            }],
        }
    }

    #[test]
    fn take_prefix_splits_in_order_without_duplication() {
        let mut g = spans(5);
        let head = g.take_prefix(3);
        assert_eq!(head.item_count(), 3);
        assert_eq!(g.item_count(), 2);

        let head_names: Vec<_> = head.resources[0].scopes[0]
            .items
            .iter()
            .map(|s| s.name.clone())
            .collect();
        assert_eq!(head_names, vec!["span-0", "span-1", "span-2"]);

        let tail_names: Vec<_> = g.resources[0].scopes[0]
            .items
            .iter()
            .map(|s| s.name.clone())
            .collect();
        assert_eq!(tail_names, vec!["span-3", "span-4"]);
    }

    #[test]
    fn take_prefix_drops_emptied_groups() {
        let mut g = spans(2);
        let head = g.take_prefix(2);
        assert_eq!(head.item_count(), 2);
        assert_eq!(g.item_count(), 0);
        assert!(g.resources.is_empty());
    }

    #[test]
    fn take_prefix_across_multiple_resources_preserves_order() {
        let mut g = Grouped {
            resources: vec![
                ResourceGroup {
                    resource_id: "a".into(),
                    scopes: vec![ScopeGroup {
                        scope_id: "s".into(),
                        items: vec![1, 2],
                    }],
                },
                ResourceGroup {
                    resource_id: "b".into(),
                    scopes: vec![ScopeGroup {
                        scope_id: "s".into(),
                        items: vec![3, 4],
                    }],
                },
            ],
        };

        let head = g.take_prefix(3);
        let head_items: Vec<i32> = head
            .resources
            .iter()
            .flat_map(|r| r.scopes.iter().flat_map(|s| s.items.iter().copied()))
            .collect();
        assert_eq!(head_items, vec![1, 2, 3]);

        let rest_items: Vec<i32> = g
            .resources
            .iter()
            .flat_map(|r| r.scopes.iter().flat_map(|s| s.items.iter().copied()))
            .collect();
        assert_eq!(rest_items, vec![4]);
        assert_eq!(g.resources.len(), 1);
        assert_eq!(g.resources[0].resource_id, "b");
    }

    #[test]
    fn append_is_empty_noop_safe() {
        let mut g = TraceData::empty();
        g.append(TraceData::empty());
        assert_eq!(g.item_count(), 0);
    }

    #[test]
    fn round_trip_preserves_item_stream() {
        let mut g = TraceData(spans(7));
        let mut out = Vec::new();
        loop {
            if g.item_count() == 0 {
                break;
            }
            let chunk = g.take_prefix(3);
            out.extend(chunk.0.resources.into_iter().flat_map(|r| r.scopes.into_iter().flat_map(|s| s.items)));
        }
        assert_eq!(out.len(), 7);
        for (i, span) in out.iter().enumerate() {
            assert_eq!(span.name, format!("span-{i}"));
        }
    }
}
