//! Интерактивная консоль `chanhub`: баннер, разбор команд и REPL поверх
//! [`Hub<String>`](crate::Hub).

pub mod banner;
pub mod command;
pub mod repl;

pub use banner::{print_banner, render_banner};
pub use command::{parse_command, CommandParseError, ConsoleCommand, HELP};
pub use repl::{Console, ConsoleError, Outcome};
