use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use rustc_hash::FxHashMap;

/// Счётчик идентификаторов получателей. Общий для подписчиков и узлов,
/// поэтому идентификаторы двух видов никогда не пересекаются.
static NEXT_ROUTEE_ID: AtomicU64 = AtomicU64::new(1);

/// Идентификатор получателя в таблице маршрутизации.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteeId(u64);

/// Вид получателя.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteeKind {
    Subscriber,
    Node,
}

/// Результат одной попытки доставки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Почтовый ящик переполнен, сообщение отброшено.
    Full,
    /// Получатель больше не существует.
    Closed,
}

/// Получатель сообщений: подписчик или дочерний узел.
///
/// Таблица маршрутизации хранит оба варианта единообразно как
/// `Arc<dyn Routee<P>>`.
pub trait Routee<P>: Send + Sync {
    fn id(&self) -> RouteeId;

    fn kind(&self) -> RouteeKind;

    /// Неблокирующая односторонняя доставка.
    fn deliver(
        &self,
        payload: P,
    ) -> Delivery;
}

/// Итог одного веерного вызова [`RoutingTable::route`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RouteReport {
    /// Доставлено подписчикам.
    pub delivered: usize,
    /// Передано дочерним узлам.
    pub forwarded: usize,
    /// Отброшено из-за переполненных почтовых ящиков.
    pub dropped: usize,
    /// Закрытые получатели, удалённые из таблицы.
    pub pruned: usize,
}

/// Таблица маршрутизации узла: множество получателей без дубликатов.
///
/// Таблица принадлежит задаче узла и изменяется только ею, поэтому
/// синхронизация не нужна.
pub struct RoutingTable<P> {
    routees: FxHashMap<RouteeId, Arc<dyn Routee<P>>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl RouteReport {
    /// Ни один получатель не принял и не отбросил сообщение: таблица пуста
    /// или все получатели оказались закрыты.
    pub fn reached_nobody(&self) -> bool {
        self.delivered + self.forwarded + self.dropped == 0
    }
}

impl RouteeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ROUTEE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl<P: Clone> RoutingTable<P> {
    pub fn new() -> Self {
        Self {
            routees: FxHashMap::default(),
        }
    }

    /// Добавляет получателя. Возвращает `false`, если он уже был в таблице:
    /// повторная регистрация не должна приводить к двойной доставке.
    pub fn add(
        &mut self,
        routee: Arc<dyn Routee<P>>,
    ) -> bool {
        let id = routee.id();
        if self.routees.contains_key(&id) {
            return false;
        }
        self.routees.insert(id, routee);
        true
    }

    /// Удаляет получателя. Отсутствующий получатель — не ошибка.
    pub fn remove(
        &mut self,
        id: RouteeId,
    ) -> bool {
        self.routees.remove(&id).is_some()
    }

    pub fn contains(
        &self,
        id: RouteeId,
    ) -> bool {
        self.routees.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.routees.is_empty()
    }

    pub fn len(&self) -> usize {
        self.routees.len()
    }

    /// Рассылает `payload` каждому получателю независимо.
    ///
    /// Порядок обхода не определён. Получатели, сообщившие о закрытии,
    /// удаляются из таблицы.
    pub fn route(
        &mut self,
        payload: &P,
    ) -> RouteReport {
        let mut report = RouteReport::default();
        let mut closed = Vec::new();

        for (id, routee) in self.routees.iter() {
            match routee.deliver(payload.clone()) {
                Delivery::Delivered => match routee.kind() {
                    RouteeKind::Subscriber => report.delivered += 1,
                    RouteeKind::Node => report.forwarded += 1,
                },
                Delivery::Full => report.dropped += 1,
                Delivery::Closed => closed.push(*id),
            }
        }

        for id in closed {
            self.routees.remove(&id);
            report.pruned += 1;
        }

        report
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for RouteeId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl<P: Clone> Default for RoutingTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for RoutingTable<P> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_set().entries(self.routees.keys()).finish()
    }
}
