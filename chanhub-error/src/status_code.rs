use std::fmt;

use num_enum::TryFromPrimitive;

/// Коды статуса для категоризации ошибок шины.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки и конфигурация
/// - 2xxx: Маршрутизация и каналы
/// - 6xxx: Доставка / ожидание подтверждений
///
/// `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Internal = 1003,
    InvalidConfig = 1006,

    // === 2xxx: Маршрутизация ===
    NotFound = 2000,
    InvalidChannel = 2010,

    // === 6xxx: Доставка ===
    ConnectionClosed = 6001,
    Timeout = 6002,
    AckLost = 6009,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    ///
    /// Возвращает `None`, если значение не соответствует ни одному варианту.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Имеет ли смысл повторить операцию с этим кодом.
    ///
    /// Повторная подписка после таймаута безопасна: добавление подписчика
    /// идемпотентно.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::AckLost)
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Ошибка в запросе вызывающей стороны (некорректный канал или
    /// конфигурация).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig | Self::InvalidChannel | Self::NotFound
        )
    }

    /// Требуется ли логировать как критическую ошибку.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Internal)
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound => LogLevel::Debug,
            Self::InvalidConfig | Self::InvalidChannel => LogLevel::Info,
            Self::Timeout | Self::ConnectionClosed | Self::AckLost => LogLevel::Warn,
            Self::Internal => LogLevel::Error,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что retryable-коды помечаются корректно.
    #[test]
    fn test_retryable() {
        assert!(StatusCode::Timeout.is_retryable());
        assert!(StatusCode::AckLost.is_retryable());
        assert!(!StatusCode::InvalidChannel.is_retryable());
        assert!(!StatusCode::NotFound.is_retryable());
    }

    /// Тест проверяет конвертацию через `TryFrom<u32>` и `from_u32`.
    #[test]
    fn test_from_try_from_u32() {
        let n = StatusCode::Timeout.code();
        assert_eq!(StatusCode::try_from(n).unwrap(), StatusCode::Timeout);
        assert!(StatusCode::from_u32(99999).is_none());
    }

    /// Тест проверяет числовое представление и `From<StatusCode> for u32`.
    #[test]
    fn test_code_and_into() {
        let c = StatusCode::NotFound;
        assert_eq!(c.code(), 2000);
        let n: u32 = c.into();
        assert_eq!(n, 2000);
        assert!(StatusCode::is_success(StatusCode::Success.code()));
        assert!(!StatusCode::is_success(StatusCode::NotFound.code()));
    }

    /// Тест проверяет уровни логирования для разных кодов.
    #[test]
    fn test_log_level_mappings() {
        assert_eq!(StatusCode::Success.log_level(), LogLevel::Trace);
        assert_eq!(StatusCode::NotFound.log_level(), LogLevel::Debug);
        assert_eq!(StatusCode::Timeout.log_level(), LogLevel::Warn);
        assert_eq!(StatusCode::Internal.log_level(), LogLevel::Error);
    }

    /// Тест проверяет, что `Display` содержит имя варианта и числовой код.
    #[test]
    fn test_display_contains_name_and_code() {
        let s = format!("{}", StatusCode::Timeout);
        assert!(s.contains("6002"), "Display must contain code, got: {s}");
        assert!(s.contains("Timeout"), "Display must contain name, got: {s}");
    }

    /// Тест проверяет, что каждый код, который выдают ошибки шины,
    /// восстанавливается из числа, а удалённые номера больше не приняты.
    #[test]
    fn test_codes_roundtrip_through_u32() {
        for code in [
            StatusCode::Success,
            StatusCode::Internal,
            StatusCode::InvalidConfig,
            StatusCode::NotFound,
            StatusCode::InvalidChannel,
            StatusCode::ConnectionClosed,
            StatusCode::Timeout,
            StatusCode::AckLost,
        ] {
            assert_eq!(StatusCode::from_u32(code.code()), Some(code));
        }
        for retired in [1000, 1004, 2011, 6008] {
            assert!(StatusCode::from_u32(retired).is_none());
        }
    }

    #[test]
    fn test_client_errors() {
        assert!(StatusCode::InvalidChannel.is_client_error());
        assert!(!StatusCode::Timeout.is_client_error());
        assert!(StatusCode::Internal.is_critical());
    }
}
