use std::io::{self, Stdout};

use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use crate::logging::config::{LogFormat, LoggingConfig};

/// Fmt-слой по конфигурации с выводом в stdout.
///
/// Возвращаем boxed trait-объект, чтобы стереть конкретный тип формата
/// (json/pretty/compact).
pub fn build_formatter_from_config<S>(config: &LoggingConfig) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let writer: fn() -> Stdout = io::stdout;
    build_formatter_with_writer(config, writer)
}

/// То же, что [`build_formatter_from_config`], но с произвольным writer.
pub fn build_formatter_with_writer<S, W>(
    config: &LoggingConfig,
    writer: W,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_ansi(config.with_ansi)
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_line_number(config.with_line_numbers);

    match config.format {
        LogFormat::Json => Box::new(
            base.event_format(fmt::format().json().with_current_span(true))
                .fmt_fields(fmt::format::JsonFields::new()),
        ),
        LogFormat::Pretty => Box::new(
            base.event_format(fmt::format().pretty())
                .with_span_events(FmtSpan::CLOSE),
        ),
        LogFormat::Compact => Box::new(base.event_format(fmt::format().compact())),
    }
}
