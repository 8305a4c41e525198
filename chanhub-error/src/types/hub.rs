use std::{any::Any, fmt, time::Duration};

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Операция запроса с подтверждением.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskOp {
    Subscribe,
    Unsubscribe,
}

/// Ошибки, видимые вызывающей стороне хаба.
///
/// Внутренние исходы маршрутизации (нет узла, нет получателей, переполненный
/// почтовый ящик) сюда не попадают: они логируются и учитываются в
/// статистике.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// Подтверждение не пришло за отведённое время. Изменение состояния,
    /// если оно уже произошло, не откатывается.
    #[error("{op} on channel '{channel}' was not acknowledged within {after:?}")]
    Timeout {
        op: AskOp,
        channel: String,
        after: Duration,
    },

    /// Корневой узел остановлен.
    #[error("hub is closed")]
    Closed,

    /// Запрос был отброшен по пути, ответ уже не придёт.
    #[error("{op} on channel '{channel}' was dropped before acknowledgment")]
    AckDropped { op: AskOp, channel: String },

    #[error("invalid channel '{channel}': {reason}")]
    InvalidChannel {
        channel: String,
        reason: &'static str,
    },

    #[error("invalid hub configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Ошибка ожидания сообщения в почтовом ящике подписчика.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecvError {
    #[error("mailbox is closed")]
    Closed,

    #[error("operation exceeded the specified timeout")]
    Timeout,
}

/// Ошибка неблокирующего получения из почтового ящика.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TryRecvError {
    #[error("no messages available")]
    Empty,

    #[error("mailbox is closed")]
    Closed,
}

impl fmt::Display for AskOp {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Subscribe => write!(f, "subscribe"),
            Self::Unsubscribe => write!(f, "unsubscribe"),
        }
    }
}

impl ErrorExt for HubError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Timeout { .. } => StatusCode::Timeout,
            Self::Closed => StatusCode::ConnectionClosed,
            Self::AckDropped { .. } => StatusCode::AckLost,
            Self::InvalidChannel { .. } => StatusCode::InvalidChannel,
            Self::InvalidConfig { .. } => StatusCode::InvalidConfig,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "hub".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::Timeout { op, channel, .. } | Self::AckDropped { op, channel } => {
                tags.push(("op", op.to_string()));
                tags.push(("channel", channel.clone()));
            }
            Self::InvalidChannel { channel, .. } => {
                tags.push(("channel", channel.clone()));
            }
            _ => {}
        }

        tags
    }
}

impl ErrorExt for RecvError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Closed => StatusCode::ConnectionClosed,
            Self::Timeout => StatusCode::Timeout,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for TryRecvError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Empty => StatusCode::NotFound,
            Self::Closed => StatusCode::ConnectionClosed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl From<TryRecvError> for RecvError {
    fn from(err: TryRecvError) -> Self {
        match err {
            TryRecvError::Empty => RecvError::Timeout,
            TryRecvError::Closed => RecvError::Closed,
        }
    }
}

/// Конвертация из tokio::sync::mpsc::error::TryRecvError
#[cfg(feature = "tokio")]
impl From<tokio::sync::mpsc::error::TryRecvError> for TryRecvError {
    fn from(err: tokio::sync::mpsc::error::TryRecvError) -> Self {
        match err {
            tokio::sync::mpsc::error::TryRecvError::Empty => TryRecvError::Empty,
            tokio::sync::mpsc::error::TryRecvError::Disconnected => TryRecvError::Closed,
        }
    }
}

/// Отправка в закрытый inbox корневого узла.
#[cfg(feature = "tokio")]
impl<T> From<tokio::sync::mpsc::error::SendError<T>> for HubError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        HubError::Closed
    }
}
