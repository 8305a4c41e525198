use std::fmt;

use tokio::sync::oneshot;

use super::{RouteeId, Subscriber};

/// Адрес для ответа исходному вызывающему.
///
/// Передаётся вместе с запросом через все промежуточные узлы, и конечный узел
/// отвечает напрямую, минуя обратный путь.
pub type ReplyTo = oneshot::Sender<Ack>;

/// Подтверждение запроса подписки/отписки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Subscribed,
    Unsubscribed,
}

/// Сообщения протокола, которыми обмениваются вызывающие, хаб и узлы.
///
/// `channel` — остаток пути относительно узла-получателя; `None` означает,
/// что адресат — сам узел. На каждом шаге вниз от канала отрезается первый
/// сегмент.
pub enum Envelope<P> {
    Subscribe {
        receiver: Subscriber<P>,
        channel: Option<String>,
        reply_to: Option<ReplyTo>,
    },
    Unsubscribe {
        receiver: RouteeId,
        channel: Option<String>,
        reply_to: Option<ReplyTo>,
    },
    /// Публикация: конверт с полезной нагрузкой и целевым каналом.
    Message { payload: P, channel: Option<String> },
    /// Голая полезная нагрузка для локальной рассылки по таблице узла.
    Deliver(P),
    /// Дочерний узел остановился.
    Terminated { child: RouteeId },
    /// Внешний сигнал остановки узла по адресу `channel`.
    Stop { channel: Option<String> },
}

impl<P> Envelope<P> {
    /// Короткое имя для логов.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Message { .. } => "message",
            Self::Deliver(_) => "deliver",
            Self::Terminated { .. } => "terminated",
            Self::Stop { .. } => "stop",
        }
    }
}

impl<P> fmt::Debug for Envelope<P> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Subscribe {
                receiver, channel, ..
            } => f
                .debug_struct("Subscribe")
                .field("receiver", &receiver.id())
                .field("channel", channel)
                .finish(),
            Self::Unsubscribe {
                receiver, channel, ..
            } => f
                .debug_struct("Unsubscribe")
                .field("receiver", receiver)
                .field("channel", channel)
                .finish(),
            Self::Message { channel, .. } => f
                .debug_struct("Message")
                .field("channel", channel)
                .finish_non_exhaustive(),
            Self::Deliver(_) => f.write_str("Deliver(..)"),
            Self::Terminated { child } => {
                f.debug_struct("Terminated").field("child", child).finish()
            }
            Self::Stop { channel } => f.debug_struct("Stop").field("channel", channel).finish(),
        }
    }
}

/// Отправляет подтверждение, если вызывающий его ждёт.
///
/// Вызывающий мог уже отказаться от ожидания по таймауту; это не ошибка.
pub(crate) fn acknowledge(
    reply_to: Option<ReplyTo>,
    ack: Ack,
) {
    if let Some(tx) = reply_to {
        if tx.send(ack).is_err() {
            tracing::trace!(?ack, "caller stopped waiting for acknowledgment");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::mailbox;

    /// Тест проверяет, что подтверждение доходит до ожидающего.
    #[tokio::test]
    async fn test_acknowledge_reaches_caller() {
        let (tx, rx) = oneshot::channel();
        acknowledge(Some(tx), Ack::Subscribed);
        assert_eq!(rx.await.unwrap(), Ack::Subscribed);
    }

    /// Тест проверяет, что ответ ушедшему вызывающему не паникует.
    #[test]
    fn test_acknowledge_after_caller_left() {
        let (tx, rx) = oneshot::channel();
        drop(rx);
        acknowledge(Some(tx), Ack::Unsubscribed);
        acknowledge(None, Ack::Unsubscribed);
    }

    #[test]
    fn test_debug_hides_payload() {
        let (sub, _mb) = mailbox::<String>(1);
        let env = Envelope::Subscribe {
            receiver: sub,
            channel: Some("a/b".to_string()),
            reply_to: None,
        };
        assert_eq!(env.kind(), "subscribe");
        assert!(format!("{env:?}").contains("a/b"));

        let msg: Envelope<String> = Envelope::Message {
            payload: "secret".to_string(),
            channel: None,
        };
        assert!(!format!("{msg:?}").contains("secret"));
    }
}
