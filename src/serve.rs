use std::{
    convert::Infallible,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::rt::{TokioIo, TokioTimer};
use log::{debug, error, info};
use tokio::{fs, net::TcpListener};

pub async fn serve(root: PathBuf, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("serving {} on http://{}", root.display(), addr);

    serve_listener(listener, root).await
}

pub async fn serve_listener(listener: TcpListener, root: PathBuf) -> anyhow::Result<()> {
    let root = Arc::new(root);

    loop {
        let (tcp, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                // e.g. EMFILE; back off and keep accepting
                error!("error accepting connection: {err}");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        let io = TokioIo::new(tcp);
        let root = root.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle(root.clone(), req));

            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await
            {
                error!("error serving connection from {remote}: {err:?}");
            }
        });
    }
}

pub async fn handle<B>(
    root: Arc<PathBuf>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::GET {
        return Ok(response(
            StatusCode::METHOD_NOT_ALLOWED,
            "text/plain; charset=utf-8",
            Bytes::from_static(b"Method Not Allowed"),
        ));
    }

    let mut path = resolve(&root, req.uri().path());

    if fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
        path.push("index.html");
    }

    match fs::read(&path).await {
        Ok(contents) => {
            debug!("GET {} -> {}", req.uri().path(), path.display());
            Ok(response(StatusCode::OK, content_type(&path), contents.into()))
        }
        Err(_) => {
            debug!("GET {} -> not found", req.uri().path());
            Ok(response(
                StatusCode::NOT_FOUND,
                "text/html; charset=utf-8",
                Bytes::from_static(b"<h1>404 Not Found</h1>"),
            ))
        }
    }
}

fn response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Maps a request path onto a file below `root`. `..` segments cannot climb
/// above `root`; a trailing `/` selects the directory's `index.html`.
pub fn resolve(root: &Path, uri_path: &str) -> PathBuf {
    let cleaned = path_clean::clean(Path::new("/").join(uri_path.trim_start_matches('/')));
    let relative = cleaned.strip_prefix("/").unwrap_or(&cleaned);

    let mut path = root.join(relative);
    if uri_path.is_empty() || uri_path.ends_with('/') {
        path.push("index.html");
    }

    path
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path, sync::Arc};

    use bytes::Bytes;
    use http_body_util::{BodyExt, Empty};
    use hyper::{header::CONTENT_TYPE, Method, Request, StatusCode};
    use tempfile::TempDir;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use super::{handle, resolve, serve_listener};

    #[test]
    fn resolves_index_pages() {
        let root = Path::new("/srv/porus");

        assert_eq!(resolve(root, "/"), root.join("index.html"));
        assert_eq!(resolve(root, "/faq/"), root.join("faq/index.html"));
        assert_eq!(resolve(root, "/porus.css"), root.join("porus.css"));
    }

    #[test]
    fn cannot_escape_root() {
        let root = Path::new("/srv/porus");

        assert_eq!(resolve(root, "/../../etc/passwd"), root.join("etc/passwd"));
        assert_eq!(resolve(root, "/faq/../../index.html"), root.join("index.html"));
    }

    fn site() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<title>PORUS: about</title>").unwrap();
        fs::create_dir(dir.path().join("faq")).unwrap();
        fs::write(dir.path().join("faq/index.html"), "<title>PORUS: FAQ</title>").unwrap();
        fs::write(dir.path().join("porus.css"), "body {}").unwrap();
        dir
    }

    async fn get(dir: &TempDir, method: Method, uri: &str) -> (StatusCode, String, String) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Empty::<Bytes>::new())
            .unwrap();
        let resp = handle(Arc::new(dir.path().to_path_buf()), req).await.unwrap();

        let status = resp.status();
        let content_type = resp.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
        let body = resp.into_body().collect().await.unwrap().to_bytes();

        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn serves_pages_as_html() {
        let dir = site();

        let (status, content_type, body) = get(&dir, Method::GET, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/html; charset=utf-8");
        assert_eq!(body, "<title>PORUS: about</title>");

        let (status, _, body) = get(&dir, Method::GET, "/faq/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<title>PORUS: FAQ</title>");
    }

    #[tokio::test]
    async fn directory_without_slash_serves_index() {
        let dir = site();

        let (status, _, body) = get(&dir, Method::GET, "/faq").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<title>PORUS: FAQ</title>");
    }

    #[tokio::test]
    async fn serves_stylesheet() {
        let dir = site();

        let (status, content_type, _) = get(&dir, Method::GET, "/porus.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/css; charset=utf-8");
    }

    #[tokio::test]
    async fn missing_page_is_404() {
        let dir = site();

        let (status, _, _) = get(&dir, Method::GET, "/doc/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_get_is_allowed() {
        let dir = site();

        let (status, _, _) = get(&dir, Method::POST, "/").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    async fn raw_get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn keeps_accepting_connections() {
        let dir = site();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_listener(listener, dir.path().to_path_buf()));

        let first = raw_get(addr, "/faq/").await;
        assert!(first.starts_with("HTTP/1.1 200 OK"), "{first}");
        assert!(first.ends_with("<title>PORUS: FAQ</title>"));

        let second = raw_get(addr, "/missing").await;
        assert!(second.starts_with("HTTP/1.1 404 Not Found"), "{second}");

        assert!(!server.is_finished());
        server.abort();
    }
}
