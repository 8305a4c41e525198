use std::{sync::Arc, time::Duration};

use tokio::{sync::oneshot, task::JoinHandle};

use super::{
    mailbox, root_relative, Ack, ChannelNode, Envelope, HubStats, HubStatsSnapshot, Mailbox,
    NodeHandle, ReplyTo, Subscriber,
};
use crate::{config::HubConfig, AskOp, HubError};

/// Хаб: корневой узел дерева каналов и единственная точка входа.
///
/// Поддерживает:
/// - Подписку и отписку с подтверждением и таймаутом
/// - Публикацию без подтверждения (fire-and-forget)
/// - Остановку поддерева по каналу
/// - Статистику доставки
///
/// Канал `None` или `Some("")` означает корень: публикация в корень доходит
/// до всех подписчиков дерева.
pub struct Hub<P> {
    root: NodeHandle<P>,
    join: Option<JoinHandle<()>>,
    stats: Arc<HubStats>,
    config: HubConfig,
}

impl<P: Clone + Send + 'static> Hub<P> {
    /// Запускает корневой узел на текущем рантайме tokio.
    pub fn start(config: HubConfig) -> Result<Self, HubError> {
        config.validate()?;

        let stats = Arc::new(HubStats::new());
        let (root, join) = ChannelNode::spawn(Arc::from(""), stats.clone());

        tracing::info!(
            root = %root.id(),
            mailbox_capacity = config.mailbox_capacity,
            ask_timeout_ms = config.ask_timeout_ms,
            "Hub started"
        );

        Ok(Self {
            root,
            join: Some(join),
            stats,
            config,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Создаёт подписчика с ёмкостью ящика из конфигурации.
    pub fn mailbox(&self) -> (Subscriber<P>, Mailbox<P>) {
        mailbox(self.config.mailbox_capacity)
    }

    /// Подписывает `subscriber` на `channel` и ждёт подтверждения не дольше
    /// `ask_timeout` из конфигурации.
    ///
    /// Повторная подписка идемпотентна.
    pub async fn subscribe(
        &self,
        subscriber: &Subscriber<P>,
        channel: Option<&str>,
    ) -> Result<Ack, HubError> {
        self.subscribe_with_timeout(subscriber, channel, self.config.ask_timeout())
            .await
    }

    /// Как [`Hub::subscribe`], но с таймаутом вызывающего.
    ///
    /// Таймаут не откатывает уже применённую подписку.
    pub async fn subscribe_with_timeout(
        &self,
        subscriber: &Subscriber<P>,
        channel: Option<&str>,
        timeout: Duration,
    ) -> Result<Ack, HubError> {
        let channel = root_relative(channel);
        self.ask(AskOp::Subscribe, channel, timeout, |reply_to| {
            Envelope::Subscribe {
                receiver: subscriber.clone(),
                channel: channel.map(str::to_owned),
                reply_to: Some(reply_to),
            }
        })
        .await
    }

    /// Отписывает `subscriber` от `channel`.
    ///
    /// Отписка от канала, на котором нет подписки или нет узла, успешна.
    pub async fn unsubscribe(
        &self,
        subscriber: &Subscriber<P>,
        channel: Option<&str>,
    ) -> Result<Ack, HubError> {
        self.unsubscribe_with_timeout(subscriber, channel, self.config.ask_timeout())
            .await
    }

    pub async fn unsubscribe_with_timeout(
        &self,
        subscriber: &Subscriber<P>,
        channel: Option<&str>,
        timeout: Duration,
    ) -> Result<Ack, HubError> {
        let channel = root_relative(channel);
        let receiver = subscriber.id();
        self.ask(AskOp::Unsubscribe, channel, timeout, |reply_to| {
            Envelope::Unsubscribe {
                receiver,
                channel: channel.map(str::to_owned),
                reply_to: Some(reply_to),
            }
        })
        .await
    }

    /// Публикует `payload` в `channel` и во все его подканалы.
    ///
    /// Подтверждения нет; ошибка возможна только после остановки хаба.
    pub fn publish(
        &self,
        payload: P,
        channel: Option<&str>,
    ) -> Result<(), HubError> {
        self.root.send(Envelope::Message {
            payload,
            channel: root_relative(channel).map(str::to_owned),
        })?;
        self.stats.record_publish();
        Ok(())
    }

    /// Останавливает узел `channel` вместе с поддеревом.
    ///
    /// Подписки поддерева теряются; следующая подписка создаст узлы заново.
    /// Корень так остановить нельзя, для этого есть [`Hub::shutdown`].
    pub fn stop_channel(
        &self,
        channel: &str,
    ) -> Result<(), HubError> {
        if channel.is_empty() {
            return Err(HubError::InvalidChannel {
                channel: channel.to_owned(),
                reason: "root node can only be stopped by shutdown",
            });
        }
        self.tell(Envelope::Stop {
            channel: Some(channel.to_owned()),
        })
    }

    /// Отправляет управляющий конверт корневому узлу.
    pub(crate) fn tell(
        &self,
        envelope: Envelope<P>,
    ) -> Result<(), HubError> {
        self.root.send(envelope)?;
        Ok(())
    }

    pub fn stats(&self) -> HubStatsSnapshot {
        self.stats.snapshot()
    }

    /// Количество работающих узлов, включая корень.
    pub fn live_nodes(&self) -> u64 {
        self.stats.live_nodes()
    }

    pub fn is_closed(&self) -> bool {
        self.root.is_closed()
    }

    /// Останавливает корень и ждёт его завершения не дольше
    /// `shutdown_timeout`. Дочерние узлы останавливаются каскадом.
    pub async fn shutdown(mut self) -> Result<(), HubError> {
        let _ = self.tell(Envelope::Stop { channel: None });

        let Some(mut join) = self.join.take() else {
            return Ok(());
        };

        let limit = self.config.shutdown_timeout();
        match tokio::time::timeout(limit, &mut join).await {
            Ok(Ok(())) => {
                tracing::info!(stats = ?self.stats.snapshot(), "Hub stopped");
            }
            Ok(Err(err)) => {
                tracing::error!(error = %err, "Root node task failed");
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "Root node did not stop in time, aborting"
                );
                join.abort();
            }
        }
        Ok(())
    }

    async fn ask<F>(
        &self,
        op: AskOp,
        channel: Option<&str>,
        timeout: Duration,
        build: F,
    ) -> Result<Ack, HubError>
    where
        F: FnOnce(ReplyTo) -> Envelope<P>,
    {
        let (tx, rx) = oneshot::channel();
        self.root.send(build(tx))?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(ack)) => Ok(ack),
            Ok(Err(_)) => Err(HubError::AckDropped {
                op,
                channel: channel.unwrap_or_default().to_owned(),
            }),
            Err(_) => {
                tracing::debug!(%op, channel = channel.unwrap_or_default(), ?timeout, "Acknowledgment timed out");
                Err(HubError::Timeout {
                    op,
                    channel: channel.unwrap_or_default().to_owned(),
                    after: timeout,
                })
            }
        }
    }
}
