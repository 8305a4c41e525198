use chrono::{DateTime, Local};
use owo_colors::OwoColorize;

use crate::HubConfig;

/// Баннер консоли.
pub const ASCII_BANNER: &str = r#"
    ChanHub {version}
    ----------------------------------------------
    Mode:             {mode}
    Mailbox:          {capacity}
    Ask timeout:      {ask_timeout} ms
    PID:              {pid}
    OS/Arch:          {os}/{arch}
    Build:            {git} ({build_time})
"#;

/// Подставляет метаданные сборки и параметры хаба в шаблон.
pub fn render_banner(config: &HubConfig) -> String {
    let version = env!("CARGO_PKG_VERSION");
    let mode = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };

    // Git и время сборки
    let git = env!("CHANHUB_GIT_COMMIT");
    let build_time_raw = env!("CHANHUB_BUILD_TIME");
    let build_time = match DateTime::parse_from_rfc3339(build_time_raw) {
        Ok(dt) => dt
            .with_timezone(&Local)
            .format("%d.%m.%Y %H:%M:%S")
            .to_string(),
        Err(_) => build_time_raw.to_string(),
    };

    ASCII_BANNER
        .replace("{version}", version)
        .replace("{mode}", mode)
        .replace("{capacity}", &config.mailbox_capacity.to_string())
        .replace("{ask_timeout}", &config.ask_timeout_ms.to_string())
        .replace("{pid}", &std::process::id().to_string())
        .replace("{os}", std::env::consts::OS)
        .replace("{arch}", std::env::consts::ARCH)
        .replace("{git}", git)
        .replace("{build_time}", &build_time)
}

/// Вывод баннера; `color` включает подсветку для терминала.
pub fn print_banner(
    config: &HubConfig,
    color: bool,
) {
    let banner = render_banner(config);
    if !color {
        println!("{banner}");
        return;
    }

    for (i, line) in banner.lines().enumerate() {
        if i == 1 {
            println!("{}", line.bold().bright_blue());
        } else if line.trim_start().starts_with("Build:") {
            println!("{}", line.dimmed());
        } else {
            println!("{line}");
        }
    }
    println!();
}
