use std::sync::atomic::{AtomicU64, Ordering};

use super::RouteReport;

/// Счётчики хаба, общие для всех узлов одного дерева.
#[derive(Debug, Default)]
pub struct HubStats {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    unroutable: AtomicU64,
    nodes_created: AtomicU64,
    nodes_terminated: AtomicU64,
    subscribes: AtomicU64,
    unsubscribes: AtomicU64,
}

/// Снимок [`HubStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HubStatsSnapshot {
    /// Вызовы `publish`.
    pub published: u64,
    /// Сообщения, помещённые в почтовые ящики подписчиков.
    pub delivered: u64,
    /// Сообщения, отброшенные из-за переполненных ящиков.
    pub dropped: u64,
    /// Рассылки на узлах без единого получателя.
    pub unroutable: u64,
    pub nodes_created: u64,
    pub nodes_terminated: u64,
    /// Подписки, применённые на конечном узле.
    pub subscribes: u64,
    /// Отписки, применённые на конечном узле.
    pub unsubscribes: u64,
}

impl HubStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_route(
        &self,
        report: &RouteReport,
    ) {
        if report.delivered > 0 {
            self.delivered
                .fetch_add(report.delivered as u64, Ordering::Relaxed);
        }
        if report.dropped > 0 {
            self.dropped
                .fetch_add(report.dropped as u64, Ordering::Relaxed);
        }
    }

    pub fn record_unroutable(&self) {
        self.unroutable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_node_created(&self) {
        self.nodes_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_node_terminated(&self) {
        self.nodes_terminated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_subscribe(&self) {
        self.subscribes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unsubscribe(&self) {
        self.unsubscribes.fetch_add(1, Ordering::Relaxed);
    }

    /// Количество живых узлов (включая корень).
    pub fn live_nodes(&self) -> u64 {
        let created = self.nodes_created.load(Ordering::Relaxed);
        let terminated = self.nodes_terminated.load(Ordering::Relaxed);
        created.saturating_sub(terminated)
    }

    pub fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            unroutable: self.unroutable.load(Ordering::Relaxed),
            nodes_created: self.nodes_created.load(Ordering::Relaxed),
            nodes_terminated: self.nodes_terminated.load(Ordering::Relaxed),
            subscribes: self.subscribes.load(Ordering::Relaxed),
            unsubscribes: self.unsubscribes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_route_accumulates() {
        let stats = HubStats::new();
        stats.record_route(&RouteReport {
            delivered: 2,
            forwarded: 1,
            dropped: 1,
            pruned: 0,
        });
        stats.record_route(&RouteReport {
            delivered: 3,
            ..Default::default()
        });

        let snap = stats.snapshot();
        assert_eq!(snap.delivered, 5);
        assert_eq!(snap.dropped, 1);
    }

    #[test]
    fn test_live_nodes() {
        let stats = HubStats::new();
        stats.record_node_created();
        stats.record_node_created();
        stats.record_node_terminated();
        assert_eq!(stats.live_nodes(), 1);
    }
}
