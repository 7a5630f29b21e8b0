//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 多路复用流水线端到端测试（无需网络）
//! - 协议自动检测与真实 socket 测试
//! - 配置加载回归测试

#[cfg(test)]
mod support {
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use contracts::{DataSource, Item, WatchCallback, WatchSlot};

    /// Manually driven counter source
    #[derive(Default)]
    pub struct CounterSource {
        slot: WatchSlot,
        last: AtomicU64,
    }

    impl CounterSource {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Emit `{"n": n}` to the current watcher
        pub fn emit(&self, n: u64) {
            self.last.store(n, Ordering::Relaxed);
            self.slot.publish(&json!({ "n": n }));
        }
    }

    impl DataSource for CounterSource {
        fn name(&self) -> &str {
            "counter"
        }

        fn attrs(&self) -> HashMap<String, Item> {
            HashMap::from([("unit".to_string(), json!("count"))])
        }

        fn text_template(&self) -> Option<String> {
            Some("n={{ n }}".to_string())
        }

        fn get(&self) -> Option<Item> {
            Some(json!({ "n": self.last.load(Ordering::Relaxed) }))
        }

        fn get_init(&self) -> Option<Item> {
            self.get()
        }

        fn watch(&self, callback: WatchCallback) {
            self.slot.replace(callback);
        }
    }

    /// Shared in-memory sink with a switchable failure mode
    #[derive(Clone, Default)]
    pub struct SharedWriter {
        data: Arc<Mutex<Vec<u8>>>,
        fail: Arc<AtomicBool>,
    }

    impl SharedWriter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn contents(&self) -> Vec<u8> {
            self.data.lock().unwrap().clone()
        }

        pub fn lines(&self) -> Vec<String> {
            String::from_utf8(self.contents())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }

        pub fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    impl io::Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink failed"));
            }
            self.data.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod pipeline_tests {
    use std::sync::Arc;

    use multiplex::{SourceMultiplexer, SourceRegistry};
    use wire::{BufferWriter, CoalescingBuffer};

    use crate::support::{CounterSource, SharedWriter};

    /// End-to-end flow: snapshot, then a watch stream carrying the
    /// initial item followed by live items.
    #[test]
    fn test_snapshot_then_watch_stream() {
        let source = CounterSource::new();
        let mux = SourceMultiplexer::new(source.clone());

        let mut snapshot = Vec::new();
        mux.get("json", &mut snapshot).unwrap();
        assert_eq!(snapshot, b"{\"n\":0}");

        let sink = SharedWriter::new();
        mux.watch("json", Box::new(sink.clone())).unwrap();
        assert!(mux.is_watching());

        source.emit(1);
        source.emit(2);
        source.emit(3);

        assert_eq!(
            sink.lines(),
            vec!["{\"n\":0}", "{\"n\":1}", "{\"n\":2}", "{\"n\":3}"]
        );
    }

    /// A failed sink is dropped without disturbing the surviving sink,
    /// and is never written to again.
    #[test]
    fn test_failed_sink_compaction_keeps_stream() {
        let source = CounterSource::new();
        let mux = SourceMultiplexer::new(source.clone());

        let flaky = SharedWriter::new();
        let steady = SharedWriter::new();
        mux.watch("json", Box::new(flaky.clone())).unwrap();
        mux.watch("json", Box::new(steady.clone())).unwrap();

        source.emit(1);
        flaky.set_fail(true);
        source.emit(2);
        flaky.set_fail(false);
        source.emit(3);

        // The flaky sink saw init + item 1 and nothing after its failure
        assert_eq!(flaky.lines(), vec!["{\"n\":0}", "{\"n\":1}"]);
        assert_eq!(
            steady.lines(),
            vec!["{\"n\":0}", "{\"n\":1}", "{\"n\":2}", "{\"n\":3}"]
        );
        assert!(mux.is_watching());
    }

    /// Losing the last sink unsubscribes from the source; a fresh watch
    /// re-arms the stream.
    #[test]
    fn test_last_sink_loss_unsubscribes_then_rearms() {
        let source = CounterSource::new();
        let mux = SourceMultiplexer::new(source.clone());

        let sink = SharedWriter::new();
        mux.watch("json", Box::new(sink.clone())).unwrap();
        sink.set_fail(true);
        source.emit(1);
        assert!(!mux.is_watching());

        let fresh = SharedWriter::new();
        mux.watch("json", Box::new(fresh.clone())).unwrap();
        assert!(mux.is_watching());
        source.emit(2);
        assert_eq!(fresh.lines(), vec!["{\"n\":1}", "{\"n\":2}"]);
    }

    /// Formats marshal independently; a text watcher and a json watcher
    /// on the same source see their own renderings.
    #[test]
    fn test_text_and_json_streams_are_isolated() {
        let source = CounterSource::new();
        let mux = SourceMultiplexer::new(source.clone());
        assert_eq!(mux.formats(), ["json", "text"]);

        let json_sink = SharedWriter::new();
        let text_sink = SharedWriter::new();
        mux.watch("json", Box::new(json_sink.clone())).unwrap();
        mux.watch("text", Box::new(text_sink.clone())).unwrap();

        source.emit(7);

        assert_eq!(json_sink.lines(), vec!["{\"n\":0}", "{\"n\":7}"]);
        assert_eq!(text_sink.lines(), vec!["n=0", "n=7"]);
    }

    /// The coalescing buffer works as a watch sink: writes accumulate,
    /// the reader is notified once per idle-to-pending transition.
    #[test]
    fn test_coalescing_buffer_as_watch_sink() {
        let source = CounterSource::new();
        let mux = SourceMultiplexer::new(source.clone());

        let (ready_tx, mut ready_rx) = CoalescingBuffer::ready_channel();
        let buffer = CoalescingBuffer::new(ready_tx);
        mux.watch("json", Box::new(BufferWriter::new(Arc::clone(&buffer))))
            .unwrap();

        source.emit(1);
        source.emit(2);

        // One notification covers everything written while pending
        let ready = ready_rx.try_recv().unwrap();
        let mut batch = Vec::new();
        ready.drain_into(&mut batch);
        assert_eq!(batch, b"{\"n\":0}\n{\"n\":1}\n{\"n\":2}\n");
        assert!(ready_rx.try_recv().is_err());

        source.emit(3);
        let ready = ready_rx.try_recv().unwrap();
        ready.drain_into(&mut batch);
        assert_eq!(batch, b"{\"n\":3}\n");
    }

    /// Registry listing carries formats and attrs for each source
    #[test]
    fn test_registry_describe() {
        let registry = SourceRegistry::new();
        registry.add(CounterSource::new()).unwrap();

        let listing = registry.describe();
        assert_eq!(listing["counter"]["formats"][0], "json");
        assert_eq!(listing["counter"]["attrs"]["unit"], "count");
        assert!(registry.add(CounterSource::new()).is_err());
    }
}

#[cfg(test)]
mod server_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    use multiplex::SourceRegistry;
    use wire::{resp_detector, HttpHandler, RespHandler, RunningServer, ServerBuilder, ServerHandle};

    use crate::support::CounterSource;

    async fn start_server(registry: Arc<SourceRegistry>) -> RunningServer {
        let handle = ServerHandle::new();
        let http = Arc::new(HttpHandler::new(
            Arc::clone(&registry),
            "/watch",
            handle.clone(),
        ));
        let resp = Arc::new(RespHandler::new(Arc::clone(&registry)));
        ServerBuilder::new(http)
            .with_handle(handle)
            .detect(resp_detector(resp))
            .start("127.0.0.1:0")
            .await
            .unwrap()
    }

    async fn http_get(server: &RunningServer, target: &str) -> String {
        let mut conn = TcpStream::connect(server.local_addr()).await.unwrap();
        conn.write_all(format!("GET {target} HTTP/1.1\r\nHost: test\r\n\r\n").as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        conn.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_untagged_connection_gets_http() {
        let registry = Arc::new(SourceRegistry::new());
        registry.add(CounterSource::new()).unwrap();
        let server = start_server(registry).await;

        let index = http_get(&server, "/watch/").await;
        assert!(index.starts_with("HTTP/1.1 200 OK"), "got: {index}");
        assert!(index.contains("counter"));

        let snapshot = http_get(&server, "/watch/counter").await;
        assert!(snapshot.contains("{\"n\":0}"));

        let text = http_get(&server, "/watch/counter?format=text").await;
        assert!(text.contains("n=0"));

        let missing = http_get(&server, "/watch/nope").await;
        assert!(missing.starts_with("HTTP/1.1 404"));

        let bad_format = http_get(&server, "/watch/counter?format=yaml").await;
        assert!(bad_format.starts_with("HTTP/1.1 400"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_meta_server_reports_bound_addr() {
        let registry = Arc::new(SourceRegistry::new());
        let server = start_server(registry).await;

        let response = http_get(&server, "/watch/meta/server").await;
        assert!(response.contains(&server.local_addr().to_string()));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_tagged_connection_gets_resp() {
        let registry = Arc::new(SourceRegistry::new());
        registry.add(CounterSource::new()).unwrap();
        let server = start_server(registry).await;

        let conn = TcpStream::connect(server.local_addr()).await.unwrap();
        let (read_half, mut write_half) = conn.into_split();
        let mut reader = BufReader::new(read_half);

        // RESP array framing classifies the connection
        write_half
            .write_all(b"*1\r\n$4\r\nping\r\n")
            .await
            .unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "+PONG\r\n");

        // Inline commands work on the same connection
        write_half.write_all(b"ls\r\n").await.unwrap();
        let mut listing = String::new();
        for _ in 0..3 {
            reader.read_line(&mut listing).await.unwrap();
        }
        assert_eq!(listing, "*1\r\n$7\r\ncounter\r\n");

        write_half.write_all(b"get counter\r\n").await.unwrap();
        let mut bulk = String::new();
        reader.read_line(&mut bulk).await.unwrap();
        assert_eq!(bulk, "$7\r\n");
        let mut payload = [0u8; 9];
        reader.read_exact(&mut payload).await.unwrap();
        assert_eq!(&payload, b"{\"n\":0}\r\n");

        write_half.write_all(b"bogus\r\n").await.unwrap();
        let mut err = String::new();
        reader.read_line(&mut err).await.unwrap();
        assert!(err.starts_with("-ERR"));

        write_half.write_all(b"quit\r\n").await.unwrap();
        let mut ok = String::new();
        reader.read_line(&mut ok).await.unwrap();
        assert_eq!(ok, "+OK\r\n");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_http_watch_streams_live_items() {
        let registry = Arc::new(SourceRegistry::new());
        let source = CounterSource::new();
        registry.add(source.clone()).unwrap();
        let server = start_server(Arc::clone(&registry)).await;

        let mut conn = TcpStream::connect(server.local_addr()).await.unwrap();
        conn.write_all(b"GET /watch/counter?watch=1&format=json HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .unwrap();

        let (read_half, _write_half) = conn.into_split();
        let mut reader = BufReader::new(read_half);

        // Response head ends with a blank line
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            if line == "\r\n" {
                break;
            }
            assert!(!line.is_empty(), "connection closed before body");
        }

        // Wait for the watch to attach before emitting
        let mux = registry.get("counter").unwrap();
        for _ in 0..200 {
            if mux.is_watching() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(mux.is_watching());

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "{\"n\":0}\n");

        source.emit(1);
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "{\"n\":1}\n");

        source.emit(2);
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "{\"n\":2}\n");

        drop(reader);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_resp_watch_streams_live_items() {
        let registry = Arc::new(SourceRegistry::new());
        let source = CounterSource::new();
        registry.add(source.clone()).unwrap();
        let server = start_server(Arc::clone(&registry)).await;

        let conn = TcpStream::connect(server.local_addr()).await.unwrap();
        let (read_half, mut write_half) = conn.into_split();
        let mut reader = BufReader::new(read_half);

        write_half
            .write_all(b"*2\r\n$5\r\nwatch\r\n$7\r\ncounter\r\n")
            .await
            .unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "+OK\r\n");

        let mux = registry.get("counter").unwrap();
        for _ in 0..200 {
            if mux.is_watching() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        line.clear();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "{\"n\":0}\n");

        source.emit(5);
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "{\"n\":5}\n");

        server.stop().await;
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = ConfigLoader::load_from_str("[server]\n", ConfigFormat::Toml).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:4040");
        assert_eq!(config.server.http_prefix, "/watch");
        assert_eq!(config.log.level, "info");
        assert!(config.metrics.port.is_none());
    }

    #[test]
    fn test_json_config_parses() {
        let config = ConfigLoader::load_from_str(
            r#"{"server": {"listen": "127.0.0.1:8080", "http_prefix": "/ops"}}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(config.server.http_prefix, "/ops");
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        let result = ConfigLoader::load_from_str(
            "[server]\nhttp_prefix = \"watch\"\n",
            ConfigFormat::Toml,
        );
        assert!(result.is_err());
    }
}
