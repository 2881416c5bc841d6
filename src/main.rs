use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
mod bus;
mod config;
mod error;
mod events;
mod server;
mod services;
mod utils;

use bus::AttentionBus;
use config::Config;
use server::{HttpServer, RequestLimits};
use services::create_detectors;

#[derive(Parser, Debug)]
#[command(name = "attention-relay")]
#[command(about = "Сводит сигналы детекторов внимания в единый поток состояния")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "attention.toml")]
    config: String,

    /// Режим сухого запуска (эмуляция детекторов)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает logging.filter из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    /// Адрес HTTP-сервера (перекрывает server.bind)
    #[arg(long)]
    bind: Option<String>,

    /// Показать окна и их классификацию, затем выйти
    #[arg(long)]
    discover: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let mut config = Config::load(&args.config)?;
    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
        config.validate()?;
    }
    let config = Arc::new(config);

    // Инициализация системы логирования
    init_tracing(&config, args.log_level.as_deref())?;

    info!("Запуск attention-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.discover {
        utils::discovery::run(&config).await?;
        return Ok(());
    }

    if args.dry_run {
        warn!("Режим сухого запуска - реальные детекторы отключены");
    }

    // Проверка окружения сессии
    let session = utils::session::check_session();

    // Инициализация компонентов
    let bus = AttentionBus::new();
    let detectors = create_detectors(config.clone(), bus.clone(), &session, args.dry_run);
    if detectors.is_empty() && !config.any_detector_enabled() {
        warn!("Все детекторы отключены: события придут только через POST /events");
    }
    let server = HttpServer::bind(
        config.bind_addr()?,
        bus.clone(),
        RequestLimits::from(&config.server),
    )
    .await?;

    info!("Все компоненты инициализированы");

    // Запуск всех сервисов параллельно
    let mut handles = Vec::with_capacity(detectors.len() + 1);
    for detector in detectors {
        let name = detector.name();
        handles.push(tokio::spawn(async move {
            if let Err(e) = detector.run().await {
                error!("Ошибка в детекторе {}: {}", name, e);
            }
        }));
    }
    handles.push(tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Ошибка в HTTP-сервере: {}", e);
        }
    }));

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }

    info!("Завершение работы...");

    for handle in &handles {
        handle.abort();
    }

    // Ожидаем завершения задач (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        for handle in handles {
            let _ = handle.await;
        }
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!(
        "attention-relay завершил работу, последнее состояние: {:?}",
        bus.snapshot()
    );
    Ok(())
}

fn init_tracing(config: &Config, level: Option<&str>) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let directive = match level {
        Some(level) => level.to_string(),
        None if !config.logging.filter.is_empty() => config.logging.filter.clone(),
        None => config.logging.level.clone(),
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}
