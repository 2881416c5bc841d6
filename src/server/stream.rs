//! Публикация подписки в одно соединение.
//!
//! Формат записи:
//!
//! ```text
//! event: <Kind>
//! data: {"event":"<Kind>","source":"<Origin>","timestamp":"<RFC3339>","reason":"<string>"}
//!
//! ```

use crate::bus::{AttentionBus, Subscription};
use crate::debug_if_enabled;
use crate::events::{AttentionEvent, EventKind};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

#[derive(Serialize)]
struct StreamRecord<'a> {
    event: EventKind,
    source: &'a str,
    timestamp: String,
    reason: &'a str,
}

/// Отформатировать событие в запись потока
pub fn format_record(event: &AttentionEvent) -> io::Result<String> {
    let record = StreamRecord {
        event: event.kind,
        source: &event.origin,
        timestamp: event
            .timestamp
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        reason: &event.reason,
    };
    let data = serde_json::to_string(&record).map_err(io::Error::other)?;
    Ok(format!("event: {}\ndata: {}\n\n", event.kind, data))
}

/// Почему поток завершился
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Соединение оборвано (ошибка чтения)
    ClientClosed,
    /// Запись в сокет не удалась
    WriteFailed,
    /// Подписка снята с шины
    Unsubscribed,
}

/// Сливать подписку в соединение, пока оно живо.
///
/// Читающая половина нужна только чтобы заметить обрыв соединения; присланные
/// клиентом байты игнорируются. EOF на чтении означает лишь half-close: клиент
/// ещё принимает данные, поэтому поток продолжается до ошибки записи.
pub async fn publish_stream<R, W>(
    bus: &AttentionBus,
    mut subscription: Subscription,
    mut reader: R,
    mut writer: W,
) -> StreamEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let id = subscription.id();
    let mut discard = [0u8; 256];
    let mut reader_open = true;

    let end = loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    break StreamEnd::Unsubscribed;
                };
                if let Err(e) = write_record(&mut writer, &event).await {
                    debug!("Запись в {} не удалась: {}", id, e);
                    break StreamEnd::WriteFailed;
                }
                debug_if_enabled!("{} получил {}", id, event);
            }
            read = reader.read(&mut discard), if reader_open => {
                match read {
                    Ok(0) => {
                        debug!("{}: клиент закрыл свою сторону на запись", id);
                        reader_open = false;
                    }
                    Ok(_) => {}
                    Err(_) => break StreamEnd::ClientClosed,
                }
            }
        }
    };

    bus.unsubscribe(id);
    debug!("Поток {} завершён: {:?}", id, end);
    end
}

async fn write_record<W>(writer: &mut W, event: &AttentionEvent) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let record = format_record(event)?;
    writer.write_all(record.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    #[test]
    fn test_record_format() {
        let timestamp = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let event = AttentionEvent::waiting("title", "needs \"approval\"\nnow").with_timestamp(timestamp);

        assert_eq!(
            format_record(&event).unwrap(),
            "event: Waiting\n\
             data: {\"event\":\"Waiting\",\"source\":\"title\",\"timestamp\":\"2025-03-01T12:30:00.000Z\",\"reason\":\"needs \\\"approval\\\"\\nnow\"}\n\n"
        );
    }

    #[tokio::test]
    async fn test_stream_delivers_in_order_and_stops_on_close() {
        let bus = AttentionBus::new();
        let subscription = bus.subscribe();

        let (server, client) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let task = {
            let bus = bus.clone();
            tokio::spawn(async move {
                publish_stream(&bus, subscription, server_read, server_write).await
            })
        };

        bus.publish(AttentionEvent::waiting("title", "one")).unwrap();
        bus.publish(AttentionEvent::clear("focus", "two")).unwrap();

        let (client_read, client_write) = tokio::io::split(client);
        let mut lines = BufReader::new(client_read).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "event: Waiting");
        assert!(lines.next_line().await.unwrap().unwrap().contains("\"reason\":\"one\""));
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "event: Clear");

        drop(lines);
        drop(client_write);

        // Обрыв замечается на первой записи
        bus.publish(AttentionEvent::done("notifications", "three")).unwrap();
        assert_eq!(task.await.unwrap(), StreamEnd::WriteFailed);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_half_closed_client_keeps_receiving() {
        let bus = AttentionBus::new();
        let subscription = bus.subscribe();

        let (server, client) = duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let task = {
            let bus = bus.clone();
            tokio::spawn(async move {
                publish_stream(&bus, subscription, server_read, server_write).await
            })
        };

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write.shutdown().await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(AttentionEvent::waiting("title", "after half-close")).unwrap();
        let mut lines = BufReader::new(client_read).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "event: Waiting");
        assert!(!task.is_finished());

        drop(lines);
        drop(client_write);
        bus.publish(AttentionEvent::clear("focus", "")).unwrap();
        assert_eq!(task.await.unwrap(), StreamEnd::WriteFailed);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_unsubscribes() {
        let bus = AttentionBus::new();
        let subscription = bus.subscribe();

        let (server, client) = duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);
        drop(client);

        bus.publish(AttentionEvent::waiting("title", "nobody listens")).unwrap();
        let end = publish_stream(&bus, subscription, server_read, server_write).await;
        assert_eq!(end, StreamEnd::WriteFailed);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_ends_when_unsubscribed() {
        let bus = AttentionBus::new();
        let subscription = bus.subscribe();
        let id = subscription.id();

        let (server, _client) = duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);
        bus.unsubscribe(id);

        let end = publish_stream(&bus, subscription, server_read, server_write).await;
        assert_eq!(end, StreamEnd::Unsubscribed);
    }
}
