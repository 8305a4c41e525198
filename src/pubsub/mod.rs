//! Иерархическая шина Publish–Subscribe.
//!
//! Подписчики регистрируются на канал — путь из сегментов через `/`.
//! Сообщение, опубликованное в канал, получают все подписчики этого канала и
//! всех его подканалов.
//!
//! - `channel`: разбор пути канала по одному сегменту.
//! - `hub`: корневой узел и публичный API (`subscribe`, `unsubscribe`,
//!   `publish`).
//! - `message`: конверты протокола и подтверждения.
//! - `node`: узел канала — задача tokio со своим inbox.
//! - `router`: таблица маршрутизации и интерфейс получателя.
//! - `stats`: счётчики доставки.
//! - `subscriber`: дескриптор подписчика и его почтовый ящик.

pub mod channel;
pub mod hub;
pub mod message;
mod node;
pub mod router;
pub mod stats;
pub mod subscriber;

pub(crate) use channel::{child_path, root_relative};
pub use channel::split_channel;
pub use hub::*;
pub(crate) use message::acknowledge;
pub use message::{Ack, Envelope, ReplyTo};
pub(crate) use node::ChannelNode;
pub use node::NodeHandle;
pub use router::*;
pub use stats::*;
pub use subscriber::*;
