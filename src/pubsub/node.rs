//! Узел канала: единица конкурентности и последовательного изменения.
//!
//! Каждый узел — отдельная задача tokio со своим inbox. Узел обрабатывает
//! входящие конверты строго по одному, поэтому его таблица маршрутизации и
//! карта дочерних узлов не требуют блокировок.
//!
//! Дочерний узел одновременно хранится в карте `children` и зарегистрирован
//! как получатель в таблице родителя. Поэтому одна локальная рассылка
//! достигает и подписчиков узла, и всего поддерева.
//!
//! Узел не удаляется, когда его таблица становится пустой: рекурсивная
//! подписка на подканал может быть ещё в пути, и удаление узла её потеряло
//! бы. Узел покидает дерево только после остановки (внешний `Stop`,
//! закрытие inbox при остановке родителя или паника задачи).

use std::{fmt, sync::Arc};

use rustc_hash::FxHashMap;
use tokio::{
    sync::mpsc::{self, error::SendError},
    task::JoinHandle,
};

use super::{
    acknowledge, child_path, split_channel, Ack, Delivery, Envelope, HubStats, ReplyTo, Routee,
    RouteeId, RouteeKind, RoutingTable, Subscriber,
};

/// Дескриптор узла: отправляющая сторона его inbox.
///
/// Сильные дескрипторы держит только родитель (и хаб для корня). Когда они
/// удалены, inbox закрывается и узел завершается.
pub struct NodeHandle<P> {
    id: RouteeId,
    path: Arc<str>,
    tx: mpsc::UnboundedSender<Envelope<P>>,
}

enum Flow {
    Continue,
    Stop,
}

pub(crate) struct ChannelNode<P> {
    id: RouteeId,
    path: Arc<str>,
    inbox: mpsc::UnboundedReceiver<Envelope<P>>,
    /// Слабая ссылка на собственный inbox: её получают наблюдатели дочерних
    /// узлов, чтобы сообщить о завершении, не продлевая жизнь этого узла.
    weak_self: mpsc::WeakUnboundedSender<Envelope<P>>,
    routees: RoutingTable<P>,
    children: FxHashMap<String, NodeHandle<P>>,
    stats: Arc<HubStats>,
}

////////////////////////////////////////////////////////////////////////////////
// NodeHandle
////////////////////////////////////////////////////////////////////////////////

impl<P> NodeHandle<P> {
    pub fn id(&self) -> RouteeId {
        self.id
    }

    /// Полный путь канала; пустая строка у корня.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Остановлен ли узел.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn send(
        &self,
        envelope: Envelope<P>,
    ) -> Result<(), SendError<Envelope<P>>> {
        self.tx.send(envelope)
    }

    /// Дескриптор без обрабатывающей задачи: конверты копятся в
    /// возвращённом inbox.
    #[cfg(test)]
    pub(crate) fn detached(path: &str) -> (Self, mpsc::UnboundedReceiver<Envelope<P>>) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let handle = Self {
            id: RouteeId::next(),
            path: Arc::from(path),
            tx,
        };
        (handle, inbox)
    }
}

impl<P: Send + 'static> Routee<P> for NodeHandle<P> {
    fn id(&self) -> RouteeId {
        self.id
    }

    fn kind(&self) -> RouteeKind {
        RouteeKind::Node
    }

    fn deliver(
        &self,
        payload: P,
    ) -> Delivery {
        match self.tx.send(Envelope::Deliver(payload)) {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Closed,
        }
    }
}

impl<P> Clone for NodeHandle<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            path: self.path.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<P> fmt::Debug for NodeHandle<P> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// ChannelNode
////////////////////////////////////////////////////////////////////////////////

impl<P: Clone + Send + 'static> ChannelNode<P> {
    /// Создаёт узел и запускает его цикл обработки на текущем рантайме.
    pub(crate) fn spawn(
        path: Arc<str>,
        stats: Arc<HubStats>,
    ) -> (NodeHandle<P>, JoinHandle<()>) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let id = RouteeId::next();
        let node = Self {
            id,
            path: path.clone(),
            inbox,
            weak_self: tx.downgrade(),
            routees: RoutingTable::new(),
            children: FxHashMap::default(),
            stats: stats.clone(),
        };

        stats.record_node_created();
        let join = tokio::spawn(node.run());

        (NodeHandle { id, path, tx }, join)
    }

    async fn run(mut self) {
        tracing::debug!(node = %self.id, channel = %self.display_path(), "Channel node started");

        while let Some(envelope) = self.inbox.recv().await {
            tracing::trace!(
                node = %self.id,
                channel = %self.display_path(),
                kind = envelope.kind(),
                "Handling envelope"
            );
            if let Flow::Stop = self.handle(envelope) {
                break;
            }
        }

        tracing::debug!(
            node = %self.id,
            channel = %self.display_path(),
            children = self.children.len(),
            "Channel node stopped"
        );

        let Self {
            inbox,
            routees,
            children,
            stats,
            ..
        } = self;
        // Узел считается завершённым только после закрытия inbox. Удаление
        // дескрипторов детей закрывает их inbox: они останавливаются
        // каскадом.
        drop(inbox);
        drop(routees);
        drop(children);
        stats.record_node_terminated();
    }

    fn handle(
        &mut self,
        envelope: Envelope<P>,
    ) -> Flow {
        match envelope {
            Envelope::Subscribe {
                receiver,
                channel,
                reply_to,
            } => self.on_subscribe(receiver, channel, reply_to),
            Envelope::Unsubscribe {
                receiver,
                channel,
                reply_to,
            } => self.on_unsubscribe(receiver, channel, reply_to),
            Envelope::Message { payload, channel } => self.on_message(payload, channel),
            Envelope::Deliver(payload) => self.broadcast(payload),
            Envelope::Terminated { child } => self.on_terminated(child),
            Envelope::Stop { channel } => return self.on_stop(channel),
        }
        Flow::Continue
    }

    fn on_subscribe(
        &mut self,
        receiver: Subscriber<P>,
        channel: Option<String>,
        reply_to: Option<ReplyTo>,
    ) {
        let Some(channel) = channel else {
            let id = receiver.id();
            if self.routees.add(Arc::new(receiver)) {
                tracing::debug!(node = %self.id, channel = %self.display_path(), subscriber = %id, "Subscriber added");
            } else {
                tracing::trace!(node = %self.id, subscriber = %id, "Subscriber already present");
            }
            self.stats.record_subscribe();
            acknowledge(reply_to, Ack::Subscribed);
            return;
        };

        let (outer, inner) = split_channel(&channel);
        let child = self.child_or_create(outer);
        let forwarded = Envelope::Subscribe {
            receiver,
            channel: inner.map(str::to_owned),
            reply_to,
        };
        if child.send(forwarded).is_err() {
            // Ответ уже не придёт: reply_to удалён вместе с конвертом.
            tracing::warn!(child = %child.id(), channel = %child.path(), "Child stopped before subscribe could be forwarded");
        }
    }

    fn on_unsubscribe(
        &mut self,
        receiver: RouteeId,
        channel: Option<String>,
        reply_to: Option<ReplyTo>,
    ) {
        let Some(channel) = channel else {
            if self.routees.remove(receiver) {
                tracing::debug!(node = %self.id, channel = %self.display_path(), subscriber = %receiver, "Subscriber removed");
            }
            self.stats.record_unsubscribe();
            acknowledge(reply_to, Ack::Unsubscribed);
            return;
        };

        let (outer, inner) = split_channel(&channel);
        match self.children.get(outer) {
            Some(child) => {
                let forwarded = Envelope::Unsubscribe {
                    receiver,
                    channel: inner.map(str::to_owned),
                    reply_to,
                };
                if let Err(SendError(envelope)) = child.send(forwarded) {
                    // Поддерево уже остановлено: отписываться не от чего.
                    if let Envelope::Unsubscribe { reply_to, .. } = envelope {
                        acknowledge(reply_to, Ack::Unsubscribed);
                    }
                }
            }
            None => {
                // Отписка никогда не создаёт узлы. Несуществующее поддерево
                // означает, что подписки там нет.
                tracing::trace!(node = %self.id, segment = outer, "Unsubscribe from unknown channel");
                acknowledge(reply_to, Ack::Unsubscribed);
            }
        }
    }

    fn on_message(
        &mut self,
        payload: P,
        channel: Option<String>,
    ) {
        let Some(channel) = channel else {
            self.broadcast(payload);
            return;
        };

        let (outer, inner) = split_channel(&channel);
        match self.children.get(outer) {
            Some(child) => {
                let forwarded = Envelope::Message {
                    payload,
                    channel: inner.map(str::to_owned),
                };
                if child.send(forwarded).is_err() {
                    tracing::trace!(child = %child.id(), "Message dropped: child stopped");
                }
            }
            None => {
                tracing::trace!(node = %self.id, segment = outer, "Message dropped: no subscribers below channel");
            }
        }
    }

    /// Локальная рассылка: каждому получателю таблицы, включая дочерние узлы.
    fn broadcast(
        &mut self,
        payload: P,
    ) {
        let report = self.routees.route(&payload);
        self.stats.record_route(&report);

        if report.pruned > 0 {
            tracing::debug!(node = %self.id, pruned = report.pruned, "Removed closed routees");
        }
        // Пустая таблица или только закрытые получатели.
        if report.reached_nobody() {
            self.stats.record_unroutable();
            tracing::debug!(
                target: "chanhub::dead_letters",
                node = %self.id,
                channel = %self.display_path(),
                "No destination for payload"
            );
            return;
        }

        if report.dropped > 0 {
            tracing::warn!(
                node = %self.id,
                channel = %self.display_path(),
                dropped = report.dropped,
                "Subscriber mailboxes full, payload dropped"
            );
        }
    }

    fn on_terminated(
        &mut self,
        child: RouteeId,
    ) {
        self.routees.remove(child);
        // Сегмент мог быть уже пересоздан: удаляем запись только для
        // того самого узла.
        self.children.retain(|_, handle| handle.id() != child);
        tracing::debug!(node = %self.id, child = %child, "Child node terminated");
    }

    fn on_stop(
        &mut self,
        channel: Option<String>,
    ) -> Flow {
        let Some(channel) = channel else {
            return Flow::Stop;
        };

        let (outer, inner) = split_channel(&channel);
        let child = match inner {
            // Адресат — сам дочерний узел. Он покидает таблицы родителя до
            // отправки `Stop`, поэтому следующий конверт для этого сегмента
            // уже создаёт новый узел, а не встаёт в очередь за `Stop`.
            None => {
                let Some(child) = self.children.remove(outer) else {
                    return Flow::Continue;
                };
                self.routees.remove(child.id());
                tracing::debug!(node = %self.id, child = %child.id(), channel = %child.path(), "Child node detached for stop");
                child
            }
            Some(_) => match self.children.get(outer) {
                Some(child) => child.clone(),
                None => return Flow::Continue,
            },
        };

        let _ = child.send(Envelope::Stop {
            channel: inner.map(str::to_owned),
        });
        Flow::Continue
    }

    /// Возвращает дочерний узел по имени сегмента, создавая его при первом
    /// обращении.
    ///
    /// Создание происходит только внутри последовательного обработчика
    /// родителя, поэтому конкурентные подписки на новый сегмент всегда
    /// получают один и тот же узел.
    fn child_or_create(
        &mut self,
        segment: &str,
    ) -> NodeHandle<P> {
        if let Some(child) = self.children.get(segment) {
            if !child.is_closed() {
                return child.clone();
            }
            // Узел завершился, но `Terminated` ещё в очереди.
            let stale = child.id();
            self.routees.remove(stale);
            self.children.remove(segment);
        }

        let path: Arc<str> = Arc::from(child_path(&self.path, segment));
        let (child, join) = ChannelNode::spawn(path, self.stats.clone());
        self.watch(child.id(), join);

        self.routees.add(Arc::new(child.clone()));
        self.children.insert(segment.to_owned(), child.clone());

        tracing::debug!(parent = %self.id, child = %child.id(), channel = %child.path(), "Child node created");
        child
    }

    /// Регистрирует наблюдение за завершением дочернего узла.
    fn watch(
        &self,
        child: RouteeId,
        join: JoinHandle<()>,
    ) {
        let parent = self.weak_self.clone();
        tokio::spawn(async move {
            if let Err(err) = join.await {
                if err.is_panic() {
                    tracing::error!(child = %child, "Channel node panicked");
                }
            }
            if let Some(parent) = parent.upgrade() {
                let _ = parent.send(Envelope::Terminated { child });
            }
        });
    }

    fn display_path(&self) -> &str {
        if self.path.is_empty() {
            "<root>"
        } else {
            &self.path
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{sync::oneshot, time::timeout};

    use super::*;
    use crate::pubsub::mailbox;

    const WAIT: Duration = Duration::from_millis(500);

    fn spawn_root() -> (NodeHandle<String>, JoinHandle<()>, Arc<HubStats>) {
        let stats = Arc::new(HubStats::new());
        let (root, join) = ChannelNode::spawn(Arc::from(""), stats.clone());
        (root, join, stats)
    }

    async fn subscribe(
        node: &NodeHandle<String>,
        receiver: &Subscriber<String>,
        channel: Option<&str>,
    ) -> Ack {
        let (tx, rx) = oneshot::channel();
        node.send(Envelope::Subscribe {
            receiver: receiver.clone(),
            channel: channel.map(str::to_owned),
            reply_to: Some(tx),
        })
        .unwrap();
        timeout(WAIT, rx).await.expect("timed out").expect("no ack")
    }

    /// Тест проверяет, что подписка на корень подтверждается и сообщение
    /// без канала доставляется подписчику.
    #[tokio::test]
    async fn test_subscribe_root_and_deliver() {
        let (root, _join, stats) = spawn_root();
        let (sub, mut mb) = mailbox(8);

        assert_eq!(subscribe(&root, &sub, None).await, Ack::Subscribed);

        root.send(Envelope::Message {
            payload: "x".to_string(),
            channel: None,
        })
        .unwrap();

        assert_eq!(mb.recv_timeout(WAIT).await.unwrap(), "x");
        assert_eq!(stats.snapshot().delivered, 1);
    }

    /// Тест проверяет ленивое создание: узлы появляются только при подписке,
    /// а повторная подписка на тот же путь их не пересоздаёт.
    #[tokio::test]
    async fn test_children_created_lazily_once() {
        let (root, _join, stats) = spawn_root();
        let (sub, _mb) = mailbox(8);

        assert_eq!(stats.snapshot().nodes_created, 1);
        subscribe(&root, &sub, Some("a/b")).await;
        assert_eq!(stats.snapshot().nodes_created, 3);
        subscribe(&root, &sub, Some("a/b")).await;
        subscribe(&root, &sub, Some("a")).await;
        assert_eq!(stats.snapshot().nodes_created, 3);
    }

    /// Тест проверяет, что отписка от несуществующего поддерева
    /// подтверждается и не создаёт узлов.
    #[tokio::test]
    async fn test_unsubscribe_unknown_creates_nothing() {
        let (root, _join, stats) = spawn_root();
        let (sub, _mb) = mailbox::<String>(8);
        let (tx, rx) = oneshot::channel();

        root.send(Envelope::Unsubscribe {
            receiver: sub.id(),
            channel: Some("nope/deeper".to_string()),
            reply_to: Some(tx),
        })
        .unwrap();

        let ack = timeout(WAIT, rx).await.unwrap().unwrap();
        assert_eq!(ack, Ack::Unsubscribed);
        assert_eq!(stats.snapshot().nodes_created, 1);
    }

    /// Тест проверяет, что рассылка по пустой таблице учитывается как
    /// недоставляемая, а не вызывает ошибку.
    #[tokio::test]
    async fn test_unroutable_payload_is_counted() {
        let (root, _join, stats) = spawn_root();
        root.send(Envelope::Deliver("lost".to_string())).unwrap();

        // Подтверждение подписки приходит после обработки предыдущего
        // конверта.
        let (sub, _mb) = mailbox(1);
        subscribe(&root, &sub, Some("later")).await;
        assert_eq!(stats.snapshot().unroutable, 1);
    }

    /// Тест проверяет, что остановка дочернего узла удаляет его из
    /// родителя, и следующая подписка создаёт сегмент заново.
    #[tokio::test]
    async fn test_stopped_child_is_recreated() {
        let (root, _join, stats) = spawn_root();
        let (sub, mut mb) = mailbox(8);
        subscribe(&root, &sub, Some("a")).await;

        root.send(Envelope::Stop {
            channel: Some("a".to_string()),
        })
        .unwrap();

        // Ждём, пока родитель обработает Terminated.
        timeout(WAIT, async {
            while stats.snapshot().nodes_terminated < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("child did not stop");

        subscribe(&root, &sub, Some("a")).await;
        assert_eq!(stats.snapshot().nodes_created, 3);

        root.send(Envelope::Message {
            payload: "again".to_string(),
            channel: Some("a".to_string()),
        })
        .unwrap();
        assert_eq!(mb.recv_timeout(WAIT).await.unwrap(), "again");
    }

    /// Тест проверяет, что подписка, отправленная сразу за остановкой
    /// узла, попадает в новый узел, а не теряется в очереди старого.
    #[tokio::test]
    async fn test_subscribe_right_after_stop_reaches_new_node() {
        let (root, _join, stats) = spawn_root();
        let (sub, mut mb) = mailbox(8);
        subscribe(&root, &sub, Some("a")).await;

        root.send(Envelope::Stop {
            channel: Some("a".to_string()),
        })
        .unwrap();
        assert_eq!(subscribe(&root, &sub, Some("a")).await, Ack::Subscribed);
        assert_eq!(stats.snapshot().nodes_created, 3);

        root.send(Envelope::Message {
            payload: "kept".to_string(),
            channel: Some("a".to_string()),
        })
        .unwrap();
        assert_eq!(mb.recv_timeout(WAIT).await.unwrap(), "kept");
    }

    /// Тест проверяет, что рассылка, которая нашла только закрытых
    /// получателей, тоже учитывается как недоставляемая.
    #[tokio::test]
    async fn test_only_closed_routees_is_unroutable() {
        let (root, _join, stats) = spawn_root();
        let (sub, mb) = mailbox(8);
        subscribe(&root, &sub, None).await;
        drop(mb);

        root.send(Envelope::Deliver("first".to_string())).unwrap();
        root.send(Envelope::Deliver("second".to_string())).unwrap();

        let (barrier, _barrier_mb) = mailbox(1);
        subscribe(&root, &barrier, Some("later")).await;
        let snap = stats.snapshot();
        assert_eq!(snap.unroutable, 2);
        assert_eq!(snap.delivered, 0);
    }

    /// Тест проверяет каскадную остановку: после остановки корня
    /// завершаются и все дочерние узлы.
    #[tokio::test]
    async fn test_stop_root_cascades() {
        let (root, join, stats) = spawn_root();
        let (sub, _mb) = mailbox(8);
        subscribe(&root, &sub, Some("a/b/c")).await;
        assert_eq!(stats.live_nodes(), 4);

        root.send(Envelope::Stop { channel: None }).unwrap();
        timeout(WAIT, join).await.unwrap().unwrap();

        timeout(WAIT, async {
            while stats.live_nodes() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("children did not stop");
        assert!(root.is_closed());
    }
}
