//! Integration tests driving the session and transport through a
//! scripted backend, without touching the network.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use http::{HeaderMap, HeaderValue, StatusCode, header};

use wirepool::{
    Backend, BackendFault, BoxStream, ConfigError, Error, FaultKind, NetErrorKind, Payload, Pool,
    PoolRegistry, ProxyKind, Reply, RequestOptions, ResolverCache, Response, SendRequest, Session,
    Transport,
};

/// What a scripted pool does on each send.
#[derive(Clone)]
enum Script {
    /// Reply 200 with these body chunks, sleeping before each one.
    Body { chunks: Vec<Bytes>, delay: Duration },
    /// Fail the send phase.
    SendFault(FaultKind),
    /// Reply 200, yield a prefix, then fail the body stream.
    ReadFault { prefix: Bytes, fault: FaultKind },
}

#[derive(Default)]
struct Stats {
    proxied_created: AtomicUsize,
    checkouts: AtomicUsize,
    checkins: AtomicUsize,
}

impl Stats {
    fn balanced(&self) -> bool {
        self.checkouts.load(Ordering::SeqCst) == self.checkins.load(Ordering::SeqCst)
    }
}

/// Counts a connection release when dropped.
struct Checkin(Arc<Stats>);

impl Drop for Checkin {
    fn drop(&mut self) {
        self.0.checkins.fetch_add(1, Ordering::SeqCst);
    }
}

fn scripted_stream(
    items: Vec<Result<Bytes, BackendFault>>,
    delay: Duration,
    checkin: Checkin,
) -> BoxStream<'static, Result<Bytes, BackendFault>> {
    let checkin = Arc::new(checkin);
    stream::iter(items)
        .then(move |item| {
            let _held = Arc::clone(&checkin);
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                item
            }
        })
        .boxed()
}

struct MockPool {
    script: Script,
    stats: Arc<Stats>,
    seen: Arc<Mutex<Vec<SendRequest>>>,
}

impl Pool for MockPool {
    fn send(
        &self,
        call: SendRequest,
    ) -> impl std::future::Future<Output = Result<Reply, BackendFault>> + Send {
        self.seen.lock().unwrap().push(call);
        let script = self.script.clone();
        let stats = Arc::clone(&self.stats);
        async move {
            stats.checkouts.fetch_add(1, Ordering::SeqCst);
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            match script {
                Script::SendFault(kind) => {
                    // The backend releases internally when the send fails.
                    stats.checkins.fetch_add(1, Ordering::SeqCst);
                    Err(BackendFault::new(kind, "scripted send fault"))
                }
                Script::Body { chunks, delay } => {
                    let items = chunks.into_iter().map(Ok).collect();
                    Ok(Reply {
                        status: StatusCode::OK,
                        headers,
                        peer_cert: Some(vec![0x30, 0x82]),
                        body: scripted_stream(items, delay, Checkin(stats.clone())),
                    })
                }
                Script::ReadFault { prefix, fault } => {
                    let items = vec![
                        Ok(prefix),
                        Err(BackendFault::new(fault, "scripted read fault")),
                    ];
                    Ok(Reply {
                        status: StatusCode::OK,
                        headers,
                        peer_cert: None,
                        body: scripted_stream(items, Duration::ZERO, Checkin(stats.clone())),
                    })
                }
            }
        }
    }
}

#[derive(Clone)]
struct MockBackend {
    script: Script,
    stats: Arc<Stats>,
    seen: Arc<Mutex<Vec<SendRequest>>>,
    resolver_seen: Arc<Mutex<Option<ResolverCache>>>,
}

impl MockBackend {
    fn new(script: Script) -> Self {
        Self {
            script,
            stats: Arc::new(Stats::default()),
            seen: Arc::new(Mutex::new(Vec::new())),
            resolver_seen: Arc::new(Mutex::new(None)),
        }
    }

    fn pool(&self) -> MockPool {
        MockPool {
            script: self.script.clone(),
            stats: Arc::clone(&self.stats),
            seen: Arc::clone(&self.seen),
        }
    }
}

impl Backend for MockBackend {
    type Pool = MockPool;

    fn direct(&self, resolver: ResolverCache) -> Result<MockPool, ConfigError> {
        *self.resolver_seen.lock().unwrap() = Some(resolver);
        Ok(self.pool())
    }

    fn proxied(&self, _proxy: &wirepool::ProxySpec) -> Result<MockPool, ConfigError> {
        self.stats.proxied_created.fetch_add(1, Ordering::SeqCst);
        Ok(self.pool())
    }
}

fn body_script(parts: &[&[u8]]) -> Script {
    Script::Body {
        chunks: parts.iter().map(|p| Bytes::copy_from_slice(p)).collect(),
        delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn successful_request_populates_the_response() {
    let backend = MockBackend::new(body_script(&[b"hello ", b"world"]));
    let stats = Arc::clone(&backend.stats);
    let session = Session::with_backend(backend).unwrap();

    let res = session
        .request(RequestOptions::new("http://example.test/"))
        .await
        .unwrap();

    assert_eq!(res.status_u16(), Some(200));
    assert_eq!(res.body, b"hello world");
    assert_eq!(res.headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(res.peer_cert.as_deref(), Some(&[0x30, 0x82][..]));
    assert!(res.error.is_none());
    assert!(stats.balanced());
}

#[tokio::test]
async fn send_faults_become_response_errors_not_panics() {
    for (kind, expected) in [
        (FaultKind::ConnectTimeout, NetErrorKind::Connect),
        (FaultKind::Tls, NetErrorKind::Connect),
        (FaultKind::Protocol, NetErrorKind::Connect),
        (FaultKind::Proxy, NetErrorKind::Proxy),
        (FaultKind::Decode, NetErrorKind::MalformedResponse),
        (FaultKind::ReadTimeout, NetErrorKind::OperationTimeout),
    ] {
        let backend = MockBackend::new(Script::SendFault(kind));
        let stats = Arc::clone(&backend.stats);
        let session = Session::with_backend(backend).unwrap();

        let res = session
            .request(RequestOptions::new("http://example.test/"))
            .await
            .unwrap();

        assert_eq!(res.error.as_ref().map(|e| e.kind()), Some(expected));
        assert!(res.status.is_none());
        assert!(res.body.is_empty());
        assert!(stats.balanced());
    }
}

#[tokio::test]
async fn unmapped_backend_faults_are_not_swallowed() {
    let backend = MockBackend::new(Script::SendFault(FaultKind::Other));
    let stats = Arc::clone(&backend.stats);
    let session = Session::with_backend(backend).unwrap();

    let err = session
        .request(RequestOptions::new("http://example.test/"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Backend(ref fault) if fault.kind == FaultKind::Other));
    assert!(stats.balanced());
}

#[tokio::test]
async fn read_fault_keeps_partial_body_in_lenient_mode() {
    let backend = MockBackend::new(Script::ReadFault {
        prefix: Bytes::from_static(b"partial"),
        fault: FaultKind::ReadTimeout,
    });
    let stats = Arc::clone(&backend.stats);
    let session = Session::with_backend(backend).unwrap();

    let res = session
        .request(RequestOptions::new("http://example.test/"))
        .await
        .unwrap();

    assert_eq!(res.status_u16(), Some(200));
    assert_eq!(res.body, b"partial");
    assert_eq!(
        res.error.as_ref().map(|e| e.kind()),
        Some(NetErrorKind::OperationTimeout)
    );
    assert!(stats.balanced());
}

#[tokio::test]
async fn body_is_truncated_silently_at_the_read_limit() {
    let chunk = vec![b'x'; 1024];
    let backend = MockBackend::new(body_script(&[&chunk, &chunk, &chunk]));
    let stats = Arc::clone(&backend.stats);
    let session = Session::with_backend(backend).unwrap();

    let res = session
        .request(RequestOptions::new("http://example.test/").content_read_limit(1500))
        .await
        .unwrap();

    assert_eq!(res.body.len(), 1500);
    assert!(res.error.is_none());
    assert!(stats.balanced());
}

#[tokio::test]
async fn slow_drip_sender_trips_the_total_budget() {
    let chunks: Vec<Bytes> = (0..20).map(|_| Bytes::from_static(b"xx")).collect();
    let backend = MockBackend::new(Script::Body {
        chunks,
        delay: Duration::from_millis(30),
    });
    let stats = Arc::clone(&backend.stats);
    let session = Session::with_backend(backend).unwrap();

    let res = session
        .request(RequestOptions::new("http://example.test/").timeout(Duration::from_millis(50)))
        .await
        .unwrap();

    assert_eq!(
        res.error.as_ref().map(|e| e.kind()),
        Some(NetErrorKind::OperationTimeout)
    );
    // A couple of chunks may have landed before the budget ran out.
    assert!(res.body.len() < 40);
    assert!(stats.balanced());
}

#[tokio::test]
async fn resolve_with_proxy_fails_before_any_pool_is_touched() {
    let backend = MockBackend::new(body_script(&[]));
    let stats = Arc::clone(&backend.stats);
    let session = Session::with_backend(backend).unwrap();

    let err = session
        .request(
            RequestOptions::new("http://example.test/")
                .resolve("example.test", IpAddr::V4(Ipv4Addr::LOCALHOST))
                .proxy("127.0.0.1:8080"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Config(ConfigError::ResolveWithProxy)));
    assert_eq!(stats.proxied_created.load(Ordering::SeqCst), 0);
    assert_eq!(stats.checkouts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn resolve_overrides_land_in_the_shared_resolver_cache() {
    let backend = MockBackend::new(body_script(&[b"ok"]));
    let resolver_seen = Arc::clone(&backend.resolver_seen);
    let session = Session::with_backend(backend).unwrap();

    let ip = IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3));
    session
        .request(RequestOptions::new("http://example.test/").resolve("example.test", ip))
        .await
        .unwrap();

    let cache = resolver_seen.lock().unwrap().clone().unwrap();
    assert_eq!(cache.lookup("example.test"), Some(ip));
}

#[tokio::test]
async fn identical_proxies_share_a_pool_distinct_proxies_do_not() {
    let backend = MockBackend::new(body_script(&[]));
    let stats = Arc::clone(&backend.stats);
    let registry = PoolRegistry::new(backend, ResolverCache::default()).unwrap();

    let request = |addr: &str| {
        RequestOptions::new("http://example.test/")
            .proxy(addr)
            .proxy_type(ProxyKind::Http)
            .build()
            .unwrap()
    };

    let first = registry.select(&request("127.0.0.1:8080")).unwrap();
    let second = registry.select(&request("127.0.0.1:8080")).unwrap();
    let other = registry.select(&request("127.0.0.1:9090")).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(stats.proxied_created.load(Ordering::SeqCst), 2);

    let direct = registry
        .select(&RequestOptions::new("http://example.test/").build().unwrap())
        .unwrap();
    assert!(!Arc::ptr_eq(&direct, &first));
}

#[tokio::test]
async fn form_data_is_url_encoded_with_matching_headers() {
    let backend = MockBackend::new(body_script(&[b"ok"]));
    let seen = Arc::clone(&backend.seen);
    let session = Session::with_backend(backend).unwrap();

    session
        .request(
            RequestOptions::new("http://example.test/submit")
                .method(http::Method::POST)
                .data(Payload::Form(vec![
                    ("a".to_string(), "1".to_string()),
                    ("b".to_string(), "2&3".to_string()),
                ])),
        )
        .await
        .unwrap();

    let calls = seen.lock().unwrap();
    let call = &calls[0];
    let body = call.body.as_ref().unwrap();
    assert_eq!(&body[..], b"a=1&b=2%263");
    assert_eq!(
        call.headers[header::CONTENT_TYPE],
        "application/x-www-form-urlencoded"
    );
    assert_eq!(
        call.headers[header::CONTENT_LENGTH],
        body.len().to_string().as_str()
    );
}

#[tokio::test]
async fn multipart_data_produces_a_multipart_body() {
    let backend = MockBackend::new(body_script(&[b"ok"]));
    let seen = Arc::clone(&backend.seen);
    let session = Session::with_backend(backend).unwrap();

    session
        .request(
            RequestOptions::new("http://example.test/upload")
                .method(http::Method::POST)
                .data(Payload::Multipart(vec![(
                    "field".to_string(),
                    "value".to_string(),
                )])),
        )
        .await
        .unwrap();

    let calls = seen.lock().unwrap();
    let call = &calls[0];
    let ctype = call.headers[header::CONTENT_TYPE].to_str().unwrap();
    let boundary = ctype
        .strip_prefix("multipart/form-data; boundary=")
        .expect("multipart content type");

    let body = String::from_utf8(call.body.as_ref().unwrap().to_vec()).unwrap();
    assert!(body.contains(&format!("--{boundary}\r\n")));
    assert!(body.contains("Content-Disposition: form-data; name=\"field\"\r\n\r\nvalue\r\n"));
    assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    assert_eq!(
        call.headers[header::CONTENT_LENGTH],
        body.len().to_string().as_str()
    );
}

#[tokio::test]
async fn content_encoding_becomes_a_header_only_for_raw_bodies() {
    let backend = MockBackend::new(body_script(&[b"ok"]));
    let seen = Arc::clone(&backend.seen);
    let session = Session::with_backend(backend).unwrap();

    // Decoding on: the coding travels as backend configuration, never
    // as a literal header, which would turn decompression off.
    session
        .request(RequestOptions::new("http://example.test/").content_encoding("gzip"))
        .await
        .unwrap();
    // Decoding off: the caller gets raw bytes, so a literal header
    // declares the coding.
    session
        .request(
            RequestOptions::new("http://example.test/")
                .content_encoding("gzip")
                .decode_content(false),
        )
        .await
        .unwrap();
    // Caller already set one, in different case: the option defers.
    session
        .request(
            RequestOptions::new("http://example.test/")
                .header("ACCEPT-ENCODING", "identity")
                .content_encoding("gzip")
                .decode_content(false),
        )
        .await
        .unwrap();

    let calls = seen.lock().unwrap();
    assert!(!calls[0].headers.contains_key(header::ACCEPT_ENCODING));
    assert_eq!(calls[0].content_encoding.as_deref(), Some("gzip"));
    assert!(calls[0].decode_content);
    assert_eq!(calls[1].headers[header::ACCEPT_ENCODING], "gzip");
    assert!(!calls[1].decode_content);
    assert_eq!(calls[2].headers[header::ACCEPT_ENCODING], "identity");
}

#[tokio::test]
async fn strict_finalization_raises_the_read_fault() {
    let backend = MockBackend::new(Script::ReadFault {
        prefix: Bytes::from_static(b"partial"),
        fault: FaultKind::ReadTimeout,
    });
    let stats = Arc::clone(&backend.stats);
    let transport = Transport::new(backend).unwrap();

    let req = RequestOptions::new("http://example.test/").build().unwrap();
    let mut res = Response::default();
    let inflight = transport.request(&req).await.unwrap();
    let err = transport
        .prepare_response(&req, &mut res, Ok(inflight), true)
        .await
        .unwrap_err();

    assert!(matches!(&err, Error::Net(net) if net.kind() == NetErrorKind::OperationTimeout));
    // The head was already copied and the partial body retained; only
    // the fault is raised instead of stored.
    assert_eq!(res.status_u16(), Some(200));
    assert_eq!(res.headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(res.body, b"partial");
    assert!(res.error.is_none());
    assert!(stats.balanced());
}

#[tokio::test]
async fn one_transport_serves_concurrent_requests() {
    let backend = MockBackend::new(Script::Body {
        chunks: vec![Bytes::from_static(b"ok")],
        delay: Duration::from_millis(10),
    });
    let stats = Arc::clone(&backend.stats);
    let session = Arc::new(Session::with_backend(backend).unwrap());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let session = Arc::clone(&session);
        handles.push(tokio::spawn(async move {
            session
                .request(RequestOptions::new("http://example.test/"))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        let res = handle.await.unwrap();
        assert_eq!(res.body, b"ok");
        assert!(res.error.is_none());
    }
    assert_eq!(stats.checkouts.load(Ordering::SeqCst), 8);
    assert!(stats.balanced());
}
