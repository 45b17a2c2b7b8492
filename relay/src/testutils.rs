use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// Scripted response for one backend route.
#[derive(Clone)]
pub struct ScriptedRoute {
    pub status: u16,
    pub body: &'static str,
    pub delay: Option<Duration>,
}

impl ScriptedRoute {
    pub fn ok(body: &'static str) -> Self {
        Self {
            status: 200,
            body,
            delay: None,
        }
    }

    pub fn status(status: u16, body: &'static str) -> Self {
        Self {
            status,
            body,
            delay: None,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            status: 200,
            body: "{}",
            delay: Some(delay),
        }
    }
}

/// In-process backend with scripted per-route responses.
///
/// Unknown routes answer like the legacy backend does: 404 with a
/// `Cannot GET /path` text body. Every request (known or not) bumps the
/// hit counter so tests can assert how many candidates were attempted.
pub struct ScriptedBackend {
    pub base_url: Url,
    hits: Arc<AtomicUsize>,
    last_authorization: Arc<std::sync::Mutex<Option<String>>>,
}

impl ScriptedBackend {
    pub async fn start(routes: HashMap<(&'static str, &'static str), ScriptedRoute>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test backend");
        let port = listener.local_addr().unwrap().port();

        let routes = Arc::new(routes);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let last_authorization = Arc::new(std::sync::Mutex::new(None));
        let auth_clone = last_authorization.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let io = TokioIo::new(stream);
                let routes = routes.clone();
                let hits = hits_clone.clone();
                let auth = auth_clone.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let routes = routes.clone();
                        let hits = hits.clone();
                        let auth = auth.clone();
                        async move {
                            hits.fetch_add(1, Ordering::SeqCst);
                            *auth.lock().unwrap() = req
                                .headers()
                                .get(hyper::header::AUTHORIZATION)
                                .and_then(|value| value.to_str().ok())
                                .map(str::to_owned);

                            let key = (req.method().as_str(), req.uri().path());
                            let response = match routes
                                .iter()
                                .find(|((method, path), _)| (*method, *path) == key)
                            {
                                Some((_, route)) => {
                                    if let Some(delay) = route.delay {
                                        tokio::time::sleep(delay).await;
                                    }
                                    Response::builder()
                                        .status(route.status)
                                        .body(Full::new(Bytes::from_static(route.body.as_bytes())))
                                        .unwrap()
                                }
                                None => Response::builder()
                                    .status(StatusCode::NOT_FOUND)
                                    .body(Full::new(Bytes::from(format!(
                                        "Cannot {} {}",
                                        req.method(),
                                        req.uri().path()
                                    ))))
                                    .unwrap(),
                            };
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        // Give the accept loop a moment to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            base_url: Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
            hits,
            last_authorization,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.last_authorization.lock().unwrap().clone()
    }
}
