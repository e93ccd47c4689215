//! Per-tenant payload accumulator (C1 in the component table).
//!
//! One `Adapter<P>` per worker. The worker task is its sole owner, so
//! `add`/`export` never need synchronization.

use crate::signal::SignalPayload;

/// Accumulates items of one signal kind until exported.
///
/// Invariant: `item_count()` equals the sum of item counts of every `add`ed
/// payload since the last export, minus items removed by export.
pub struct Adapter<P: SignalPayload> {
    accumulator: P,
    item_count: usize,
}

impl<P: SignalPayload> Adapter<P> {
    pub fn new() -> Self {
        Self {
            accumulator: P::empty(),
            item_count: 0,
        }
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Append `item`'s contents into the accumulator. A zero-item payload
    /// is a no-op and does not touch the accumulator.
    pub fn add(&mut self, item: P) {
        let n = item.item_count();
        if n == 0 {
            return;
        }
        self.accumulator.append(item);
        self.item_count += n;
    }

    /// Release buffered items.
    ///
    /// If `max_size > 0` and more than `max_size` items are buffered, only
    /// the first `max_size` items (in iteration order) are released and the
    /// remainder stays buffered. Otherwise the entire accumulator is
    /// released and replaced with an empty one.
    pub fn export(&mut self, max_size: usize) -> P {
        if max_size > 0 && self.item_count > max_size {
            let released = self.accumulator.take_prefix(max_size);
            self.item_count -= max_size;
            released
        } else {
            let released = std::mem::replace(&mut self.accumulator, P::empty());
            self.item_count = 0;
            released
        }
    }
}

impl<P: SignalPayload> Default for Adapter<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{Grouped, ResourceGroup, ScopeGroup, TraceData};

    fn trace_data(n: usize) -> TraceData {
        TraceData(Grouped {
            resources: vec![ResourceGroup {
                resource_id: "svc".into(),
                scopes: vec![ScopeGroup {
                    scope_id: "scope".into(),
                    items: (0..n)
                        .map(|i| crate::signal::Span {
                            trace_id: [0; 16],
                            span_id: [0; 8],
                            name: format!("span-{i}"),
                            attributes: bytes::Bytes::new(),
                        })
                        .collect(),
                }],
            }],
        })
    }

    #[test]
    fn empty_add_is_noop() {
        let mut adapter: Adapter<TraceData> = Adapter::new();
        adapter.add(TraceData::empty());
        assert_eq!(adapter.item_count(), 0);
    }

    #[test]
    fn export_without_max_takes_everything() {
        let mut adapter: Adapter<TraceData> = Adapter::new();
        adapter.add(trace_data(10));
        let released = adapter.export(0);
        assert_eq!(released.item_count(), 10);
        assert_eq!(adapter.item_count(), 0);
    }

    #[test]
    fn export_with_max_leaves_residue() {
        let mut adapter: Adapter<TraceData> = Adapter::new();
        adapter.add(trace_data(130));
        let first = adapter.export(50);
        assert_eq!(first.item_count(), 50);
        assert_eq!(adapter.item_count(), 80);

        let second = adapter.export(50);
        assert_eq!(second.item_count(), 50);
        assert_eq!(adapter.item_count(), 30);

        let third = adapter.export(50);
        assert_eq!(third.item_count(), 30);
        assert_eq!(adapter.item_count(), 0);
    }

    #[test]
    fn export_error_does_not_revert_state() {
        // Simulates the caller treating a sink failure as consumed: the
        // adapter has no knowledge of sink outcomes, so once `export`
        // returns, the accumulator has already moved on regardless of
        // what the caller does with the result.
        let mut adapter: Adapter<TraceData> = Adapter::new();
        adapter.add(trace_data(5));
        let _dropped_on_the_floor = adapter.export(0);
        assert_eq!(adapter.item_count(), 0);
    }

    #[test]
    fn running_item_count_matches_adds_minus_exports() {
        let mut adapter: Adapter<TraceData> = Adapter::new();
        adapter.add(trace_data(4));
        adapter.add(trace_data(6));
        assert_eq!(adapter.item_count(), 10);
        let released = adapter.export(7);
        assert_eq!(released.item_count(), 7);
        assert_eq!(adapter.item_count(), 3);
    }
}
