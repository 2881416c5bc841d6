use crate::bus::{AttentionBus, PublishOutcome};
use crate::error::BridgeError;
use crate::events::{AttentionEvent, EventKind};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::http::{
    read_request, write_json, write_stream_head, Request, RequestError, RequestLimits, Status,
};
use super::stream::publish_stream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Health,
    State,
    Stream,
    Ingest,
    MethodNotAllowed,
    NotFound,
}

pub fn route(method: &str, path: &str) -> Route {
    match (method, path.trim_end_matches('/')) {
        ("GET", "/health") => Route::Health,
        ("GET", "/state") => Route::State,
        ("GET", "/events") => Route::Stream,
        ("POST", "/events") => Route::Ingest,
        (_, "/health") | (_, "/state") | (_, "/events") => Route::MethodNotAllowed,
        _ => Route::NotFound,
    }
}

/// Тело `POST /events`
#[derive(Debug, Deserialize)]
struct IngressEvent {
    event: String,
    source: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl IngressEvent {
    fn into_event(self) -> Result<AttentionEvent, BridgeError> {
        let kind: EventKind = self.event.parse()?;
        let event = AttentionEvent::new(kind, self.source, self.reason);
        Ok(match self.timestamp {
            Some(timestamp) => event.with_timestamp(timestamp),
            None => event,
        })
    }
}

/// Опубликовать событие внешнего производителя
pub fn ingest(bus: &AttentionBus, body: &[u8]) -> (Status, Value) {
    let result = serde_json::from_slice::<IngressEvent>(body)
        .map_err(BridgeError::from)
        .and_then(IngressEvent::into_event)
        .and_then(|event| bus.publish(event));

    match result {
        Ok(PublishOutcome::Delivered { subscribers }) => (
            Status::Accepted,
            json!({"delivered": true, "subscribers": subscribers}),
        ),
        Ok(PublishOutcome::Suppressed) => (Status::Ok, json!({"delivered": false})),
        Err(e) => {
            debug!("Внешнее событие отклонено: {}", e);
            (Status::BadRequest, json!({"error": e.to_string()}))
        }
    }
}

/// Обслужить одно соединение
pub async fn handle_connection<R, W>(bus: AttentionBus, mut reader: R, mut writer: W, limits: RequestLimits)
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request = match read_request(&mut reader, limits).await {
        Ok(request) => request,
        Err(RequestError::Closed) => return,
        Err(e) => {
            debug!("Не удалось прочитать запрос: {}", e);
            if let Some(status) = e.status() {
                let _ = write_json(&mut writer, status, &json!({"error": e.to_string()})).await;
            }
            return;
        }
    };

    if let Err(e) = respond(&bus, request, reader, writer).await {
        debug!("Ответ не доставлен: {}", e);
    }
}

async fn respond<R, W>(bus: &AttentionBus, request: Request, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match route(&request.method, &request.path) {
        Route::Health => write_json(&mut writer, Status::Ok, &json!({"status": "ok"})).await,
        Route::State => write_json(&mut writer, Status::Ok, &bus.snapshot()).await,
        Route::Stream => {
            // Подписка раньше заголовка: события после ответа 200 не теряются
            let subscription = bus.subscribe();
            info!(
                "Клиент потока подключён ({}), подписчиков: {}",
                subscription.id(),
                bus.subscriber_count()
            );
            write_stream_head(&mut writer).await?;
            let end = publish_stream(bus, subscription, reader, writer).await;
            info!("Клиент потока отключён: {:?}", end);
            Ok(())
        }
        Route::Ingest => {
            let (status, body) = ingest(bus, &request.body);
            if status == Status::BadRequest {
                warn!("Отклонено внешнее событие: {}", body);
            }
            write_json(&mut writer, status, &body).await
        }
        Route::MethodNotAllowed => {
            write_json(
                &mut writer,
                Status::MethodNotAllowed,
                &json!({"error": format!("метод {} не поддерживается", request.method)}),
            )
            .await
        }
        Route::NotFound => {
            write_json(
                &mut writer,
                Status::NotFound,
                &json!({"error": format!("путь {} не найден", request.path)}),
            )
            .await
        }
    }
}
