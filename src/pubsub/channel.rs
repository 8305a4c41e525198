//! Разбор пути канала.
//!
//! Канал — строка из сегментов, разделённых `/`. Путь разбирается по одному
//! сегменту за шаг: отрезается только первый `/`, остаток передаётся дальше
//! как есть. Пустой остаток (`"a/"` → `("a", Some(""))`) — отдельный
//! допустимый канал, а не корень.

/// Отделяет первый сегмент канала от остатка.
///
/// ```
/// use chanhub::split_channel;
///
/// assert_eq!(split_channel("foo/bar/baz"), ("foo", Some("bar/baz")));
/// assert_eq!(split_channel("foo"), ("foo", None));
/// assert_eq!(split_channel("foo/"), ("foo", Some("")));
/// ```
pub fn split_channel(channel: &str) -> (&str, Option<&str>) {
    match channel.split_once('/') {
        Some((outer, inner)) => (outer, Some(inner)),
        None => (channel, None),
    }
}

/// Нормализация канала на входе в хаб: отсутствующий и пустой канал
/// означают корень.
pub(crate) fn root_relative(channel: Option<&str>) -> Option<&str> {
    channel.filter(|c| !c.is_empty())
}

/// Полный путь дочернего узла.
pub(crate) fn child_path(
    parent: &str,
    segment: &str,
) -> String {
    if parent.is_empty() {
        segment.to_owned()
    } else {
        format!("{parent}/{segment}")
    }
}
