pub mod hub;

// Публичный экспорт всех типов ошибок из вложенных модулей.
pub use hub::*;
