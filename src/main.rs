//! Интерактивная консоль chanhub.
//!
//! Запускает хаб в процессе и позволяет подписывать именованных
//! подписчиков, публиковать сообщения и смотреть статистику.

use std::{io::IsTerminal, path::PathBuf};

use anyhow::{Context, Result};
use chanhub::{
    console::{print_banner, Console},
    init_logging, Hub, Settings,
};
use clap::Parser;

#[derive(Parser)]
#[command(name = "chanhub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "ChanHub - interactive hierarchical publish/subscribe console", long_about = None)]
struct Cli {
    /// Файл конфигурации (TOML)
    #[arg(short, long, env = "CHANHUB_CONFIG", help = "Путь к файлу конфигурации")]
    config: Option<PathBuf>,
    /// Уровень логирования или директива фильтра
    #[arg(short, long, help = "Уровень логирования (перекрывает конфигурацию)")]
    log_level: Option<String>,
    /// Файл истории команд
    #[arg(long, help = "Файл для сохранения истории команд")]
    history: Option<PathBuf>,
    /// Не выводить баннер
    #[arg(long)]
    no_banner: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings =
        Settings::load_from(cli.config.as_deref()).context("Не удалось загрузить конфигурацию")?;
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }

    let color = std::io::stdout().is_terminal();
    settings.logging.with_ansi &= color;
    let logging =
        init_logging(settings.logging.clone()).context("Ошибка инициализации логирования")?;

    if !cli.no_banner {
        print_banner(&settings.hub, color);
    }

    let hub = Hub::start(settings.hub).context("Не удалось запустить хаб")?;
    Console::new(hub, color).run(cli.history).await?;

    logging.shutdown();
    Ok(())
}
