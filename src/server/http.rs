//! Минимальный HTTP/1.1: один запрос на соединение, ответ с `Connection: close`.

use crate::config::ServerConfig;
use serde::Serialize;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Duration};

/// Предел на строку запроса и заголовки вместе
pub const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Ограничения на чтение одного запроса
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    pub max_body_bytes: usize,
    pub timeout: Duration,
}

impl From<&ServerConfig> for RequestLimits {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_body_bytes: config.max_body_bytes,
            timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Accepted,
    BadRequest,
    NotFound,
    RequestTimeout,
    MethodNotAllowed,
    PayloadTooLarge,
    HeaderFieldsTooLarge,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Accepted => 202,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::RequestTimeout => 408,
            Status::MethodNotAllowed => 405,
            Status::PayloadTooLarge => 413,
            Status::HeaderFieldsTooLarge => 431,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Accepted => "Accepted",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::RequestTimeout => "Request Timeout",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::PayloadTooLarge => "Payload Too Large",
            Status::HeaderFieldsTooLarge => "Request Header Fields Too Large",
        }
    }
}

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("соединение закрыто до запроса")]
    Closed,

    #[error("некорректный запрос: {0}")]
    Malformed(String),

    #[error("заголовки запроса больше {} байт", MAX_HEAD_BYTES)]
    HeadTooLarge,

    #[error("тело запроса больше {0} байт")]
    BodyTooLarge(usize),

    #[error("запрос не получен за {0:?}")]
    TimedOut(Duration),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] io::Error),
}

impl RequestError {
    /// Статус ответа клиенту; `None`, если отвечать некому
    pub fn status(&self) -> Option<Status> {
        match self {
            RequestError::Closed | RequestError::Io(_) => None,
            RequestError::Malformed(_) => Some(Status::BadRequest),
            RequestError::HeadTooLarge => Some(Status::HeaderFieldsTooLarge),
            RequestError::BodyTooLarge(_) => Some(Status::PayloadTooLarge),
            RequestError::TimedOut(_) => Some(Status::RequestTimeout),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    /// Значение заголовка (имя без учёта регистра)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Прочитать одну строку заголовка, не выходя за оставшийся бюджет
async fn read_head_line<R>(reader: &mut R, budget: &mut usize) -> Result<Option<String>, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = (&mut *reader)
        .take(*budget as u64)
        .read_line(&mut line)
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => RequestError::Malformed("заголовки не в UTF-8".to_string()),
            _ => RequestError::Io(e),
        })?;

    if read == 0 {
        return if *budget == 0 {
            Err(RequestError::HeadTooLarge)
        } else {
            Ok(None)
        };
    }

    *budget -= read;
    if !line.ends_with('\n') {
        return if *budget == 0 {
            Err(RequestError::HeadTooLarge)
        } else {
            Err(RequestError::Malformed("обрыв заголовков".to_string()))
        };
    }

    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Прочитать запрос целиком: строку запроса, заголовки и тело по `Content-Length`.
///
/// Весь запрос должен прийти за `limits.timeout`.
pub async fn read_request<R>(reader: &mut R, limits: RequestLimits) -> Result<Request, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    timeout(limits.timeout, read_request_unbounded(reader, limits.max_body_bytes))
        .await
        .map_err(|_| RequestError::TimedOut(limits.timeout))?
}

async fn read_request_unbounded<R>(reader: &mut R, max_body_bytes: usize) -> Result<Request, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut budget = MAX_HEAD_BYTES;

    let request_line = read_head_line(reader, &mut budget)
        .await?
        .ok_or(RequestError::Closed)?;

    let mut parts = request_line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version), None) => (method, target, version),
        _ => {
            return Err(RequestError::Malformed(format!(
                "строка запроса '{}'",
                request_line.escape_debug()
            )))
        }
    };

    if !version.starts_with("HTTP/1.") {
        return Err(RequestError::Malformed(format!("версия {}", version)));
    }

    let path = target.split(['?', '#']).next().unwrap_or(target).to_string();

    let mut headers = Vec::new();
    loop {
        let line = read_head_line(reader, &mut budget)
            .await?
            .ok_or_else(|| RequestError::Malformed("обрыв заголовков".to_string()))?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| RequestError::Malformed(format!("заголовок '{}'", line.escape_debug())))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let mut request = Request {
        method: method.to_ascii_uppercase(),
        path,
        headers,
        body: Vec::new(),
    };

    if let Some(length) = request.header("content-length") {
        let length: usize = length
            .parse()
            .map_err(|_| RequestError::Malformed(format!("Content-Length '{}'", length)))?;
        if length > max_body_bytes {
            return Err(RequestError::BodyTooLarge(max_body_bytes));
        }
        request.body = vec![0; length];
        reader.read_exact(&mut request.body).await?;
    } else if request.header("transfer-encoding").is_some() {
        return Err(RequestError::Malformed("Transfer-Encoding не поддерживается".to_string()));
    }

    Ok(request)
}

/// Ответ с JSON-телом
pub async fn write_json<W, T>(writer: &mut W, status: Status, body: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(body).map_err(io::Error::other)?;
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
        status.code(),
        status.reason(),
        body.len()
    );

    writer.write_all(head.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}

/// Заголовок потокового ответа; тело ограничено закрытием соединения
pub async fn write_stream_head<W>(writer: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
        )
        .await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn limits(max_body_bytes: usize) -> RequestLimits {
        RequestLimits {
            max_body_bytes,
            timeout: Duration::from_secs(5),
        }
    }

    async fn parse(raw: &[u8], max_body: usize) -> Result<Request, RequestError> {
        let mut reader = BufReader::new(raw);
        read_request(&mut reader, limits(max_body)).await
    }

    #[tokio::test]
    async fn test_parse_get() {
        let request = parse(b"get /state?x=1 HTTP/1.1\r\nHost: localhost\r\n\r\n", 1024)
            .await
            .unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/state");
        assert_eq!(request.header("HOST"), Some("localhost"));
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn test_parse_post_body() {
        let raw = b"POST /events HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let request = parse(raw, 1024).await.unwrap();
        assert_eq!(request.body, b"hello");
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        assert!(matches!(parse(b"", 1024).await, Err(RequestError::Closed)));
        assert!(matches!(
            parse(b"GET /\r\n\r\n", 1024).await,
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(
            parse(b"GET / HTTP/1.1\r\nbroken\r\n\r\n", 1024).await,
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(
            parse(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n0123456789", 4).await,
            Err(RequestError::BodyTooLarge(4))
        ));
    }

    #[tokio::test]
    async fn test_rejects_oversized_head() {
        let mut raw = b"GET / HTTP/1.1\r\nX-Big: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(MAX_HEAD_BYTES));
        raw.extend(b"\r\n\r\n");
        let err = parse(&raw, 1024).await.unwrap_err();
        assert!(matches!(err, RequestError::HeadTooLarge));
        assert_eq!(err.status(), Some(Status::HeaderFieldsTooLarge));
    }

    #[tokio::test]
    async fn test_stalled_request_times_out() {
        let limits = RequestLimits {
            max_body_bytes: 1024,
            timeout: Duration::from_millis(50),
        };

        // Клиент молчит
        let (server, _client) = tokio::io::duplex(1024);
        let mut reader = BufReader::new(server);
        let err = read_request(&mut reader, limits).await.unwrap_err();
        assert!(matches!(err, RequestError::TimedOut(_)));
        assert_eq!(err.status(), Some(Status::RequestTimeout));

        // Тело короче Content-Length
        let (server, mut client) = tokio::io::duplex(1024);
        client
            .write_all(b"POST /events HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc")
            .await
            .unwrap();
        let mut reader = BufReader::new(server);
        let err = read_request(&mut reader, limits).await.unwrap_err();
        assert!(matches!(err, RequestError::TimedOut(_)));
    }

    #[tokio::test]
    async fn test_write_json() {
        let mut out = Vec::new();
        write_json(&mut out, Status::NotFound, &serde_json::json!({"error": "x"}))
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Length: 13\r\n"));
        assert!(text.ends_with("\r\n\r\n{\"error\":\"x\"}"));
    }
}
