use std::{fmt, time::Duration};

use tokio::sync::mpsc::{self, error::TrySendError};

use super::{Delivery, Routee, RouteeId, RouteeKind};
use crate::{RecvError, TryRecvError};

/// Дескриптор подписчика, регистрируемый в таблицах маршрутизации.
///
/// Дешёво клонируется. Два дескриптора равны, если ссылаются на один и тот же
/// почтовый ящик, поэтому повторная подписка того же дескриптора на тот же
/// канал не удваивает доставку.
pub struct Subscriber<P> {
    id: RouteeId,
    tx: mpsc::Sender<P>,
}

/// Почтовый ящик подписчика: принимающая сторона [`Subscriber`].
///
/// Когда ящик удалён, узлы при следующей рассылке исключают подписчика из
/// своих таблиц.
pub struct Mailbox<P> {
    id: RouteeId,
    inner: mpsc::Receiver<P>,
}

/// Создаёт пару дескриптор/почтовый ящик с ограниченной ёмкостью.
///
/// При переполнении новые сообщения отбрасываются (доставка не более одного
/// раза, без гарантий). Нулевая ёмкость повышается до одного.
pub fn mailbox<P>(capacity: usize) -> (Subscriber<P>, Mailbox<P>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let id = RouteeId::next();
    (Subscriber { id, tx }, Mailbox { id, inner: rx })
}

impl<P> Subscriber<P> {
    pub fn id(&self) -> RouteeId {
        self.id
    }

    /// Удалён ли почтовый ящик.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<P> Mailbox<P> {
    /// Идентификатор парного [`Subscriber`].
    pub fn subscriber_id(&self) -> RouteeId {
        self.id
    }

    /// Асинхронно ожидает следующее сообщение.
    ///
    /// # Возвращает
    /// - `Ok(P)` при успешном получении
    /// - `Err(RecvError::Closed)` если все дескрипторы подписчика удалены и
    ///   очередь пуста
    pub async fn recv(&mut self) -> Result<P, RecvError> {
        self.inner.recv().await.ok_or(RecvError::Closed)
    }

    /// Ожидает сообщение не дольше `timeout`.
    pub async fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<P, RecvError> {
        match tokio::time::timeout(timeout, self.inner.recv()).await {
            Ok(Some(payload)) => Ok(payload),
            Ok(None) => Err(RecvError::Closed),
            Err(_) => Err(RecvError::Timeout),
        }
    }

    /// Пытается получить сообщение без ожидания.
    pub fn try_recv(&mut self) -> Result<P, TryRecvError> {
        self.inner.try_recv().map_err(Into::into)
    }

    /// Количество сообщений в очереди.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Закрыт ли ящик (все дескрипторы подписчика удалены).
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<P: Send + 'static> Routee<P> for Subscriber<P> {
    fn id(&self) -> RouteeId {
        self.id
    }

    fn kind(&self) -> RouteeKind {
        RouteeKind::Subscriber
    }

    fn deliver(
        &self,
        payload: P,
    ) -> Delivery {
        match self.tx.try_send(payload) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

impl<P> Clone for Subscriber<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<P> PartialEq for Subscriber<P> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.id == other.id
    }
}

impl<P> Eq for Subscriber<P> {}

impl<P> fmt::Debug for Subscriber<P> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<P> fmt::Debug for Mailbox<P> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}
