use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling::daily};
use tracing_subscriber::{layer::Layer as LayerTrait, registry::LookupSpan};

use crate::logging::{config::FileSinkConfig, formatter, LogFormat};

/// Файловый layer с ежедневной ротацией и неблокирующей записью.
///
/// `WorkerGuard` нужно держать, пока логирование активно: при его удалении
/// буфер сбрасывается на диск.
pub fn layer<S>(
    config: &FileSinkConfig,
    format: LogFormat,
) -> (Box<dyn LayerTrait<S> + Send + Sync>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let file_appender = daily(&config.dir, &config.prefix);
    let (writer, guard) = non_blocking(file_appender);

    let layer = formatter::build_formatter(format, false, true, writer);
    (layer, guard)
}
