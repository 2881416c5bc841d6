//! HTTP-фронт шины: поток событий, снимок состояния, liveness и приём
//! событий от внешних производителей.
//!
//! | Метод | Путь      | Ответ                                          |
//! |-------|-----------|------------------------------------------------|
//! | GET   | `/events` | `text/event-stream`, одна запись на событие    |
//! | GET   | `/state`  | `{"active":bool,"mode":"idle|waiting|done"}`   |
//! | GET   | `/health` | `{"status":"ok"}`                              |
//! | POST  | `/events` | публикация `{"event","source","reason"}`       |

mod http;
mod routes;
mod stream;

pub use self::http::RequestLimits;

use crate::bus::AttentionBus;
use crate::error::Result;
use std::net::SocketAddr;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub struct HttpServer {
    listener: TcpListener,
    bus: AttentionBus,
    limits: RequestLimits,
}

impl HttpServer {
    pub async fn bind(addr: SocketAddr, bus: AttentionBus, limits: RequestLimits) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("HTTP-сервер слушает {}", listener.local_addr()?);
        Ok(Self {
            listener,
            bus,
            limits,
        })
    }

    #[allow(dead_code)]
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Принимать соединения; каждое обслуживается в своей задаче
    pub async fn run(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!("Соединение от {}", peer);
                    let bus = self.bus.clone();
                    let limits = self.limits;
                    tokio::spawn(async move {
                        let (read_half, write_half) = stream.into_split();
                        routes::handle_connection(bus, BufReader::new(read_half), write_half, limits)
                            .await;
                        debug!("Соединение с {} закрыто", peer);
                    });
                }
                Err(e) => {
                    warn!("Ошибка accept: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AttentionEvent;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::{sleep, Duration};

    async fn start() -> (AttentionBus, SocketAddr) {
        let bus = AttentionBus::new();
        let limits = RequestLimits {
            max_body_bytes: 1024,
            timeout: Duration::from_secs(5),
        };
        let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), bus.clone(), limits)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        (bus, addr)
    }

    async fn wait_for_subscribers(bus: &AttentionBus, count: usize) {
        for _ in 0..200 {
            if bus.subscriber_count() == count {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("ожидалось {} подписчиков, есть {}", count, bus.subscriber_count());
    }

    #[tokio::test]
    async fn test_state_over_tcp() {
        let (bus, addr) = start().await;
        bus.publish(AttentionEvent::waiting("title", "")).unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /state HTTP/1.1\r\nHost: localhost\r\n\r\n").await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with(r#"{"active":true,"mode":"waiting"}"#));
    }

    #[tokio::test]
    async fn test_fan_out_to_two_stream_clients() {
        let (bus, addr) = start().await;

        let mut clients = Vec::new();
        for _ in 0..2 {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"GET /events HTTP/1.1\r\n\r\n").await.unwrap();
            clients.push(tokio::io::BufReader::new(stream));
        }
        wait_for_subscribers(&bus, 2).await;

        bus.publish(AttentionEvent::waiting("title", "")).unwrap();
        bus.publish(AttentionEvent::clear("focus", "")).unwrap();
        bus.publish(AttentionEvent::clear("idle", "")).unwrap();
        bus.publish(AttentionEvent::done("notifications", "")).unwrap();

        for client in clients.iter_mut() {
            let mut kinds = Vec::new();
            while kinds.len() < 3 {
                let mut line = String::new();
                client.read_line(&mut line).await.unwrap();
                if let Some(kind) = line.strip_prefix("event: ") {
                    kinds.push(kind.trim().to_string());
                }
            }
            assert_eq!(kinds, vec!["Waiting", "Clear", "Done"]);
        }

        drop(clients);

        // Закрытое соединение обнаруживается только при записи
        for _ in 0..200 {
            if bus.subscriber_count() == 0 {
                return;
            }
            bus.publish(AttentionEvent::waiting("title", "")).unwrap();
            sleep(Duration::from_millis(5)).await;
        }
        panic!("подписчики не сняты: {}", bus.subscriber_count());
    }
}
