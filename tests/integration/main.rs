//! Integration tests for netfetch

mod fetch_tests {
    use netfetch::transport::{default_agent, Transport};
    use netfetch::{FetchClient, NetfetchError, NetworkPolicy};
    use std::io::Read;
    use std::sync::Arc;
    use tempfile::TempDir;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ONE_MIB: u64 = 1024 * 1024;

    /// Run blocking client calls off the runtime the mock server lives on
    async fn blocking<T, F>(f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .expect("blocking task panicked")
    }

    fn cached_client(temp: &TempDir, max_size: u64) -> Arc<FetchClient> {
        Arc::new(FetchClient::with_cache_dir_and_size(temp.path(), max_size))
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    /// Load and drain, returning the body and whether it came from cache
    fn fetch_text(client: &FetchClient, url: &Url, policy: NetworkPolicy) -> (String, bool) {
        let mut result = client.load(url, policy).unwrap();
        let from_cache = result.from_cache;
        let mut body = String::new();
        result.read_to_string(&mut body).unwrap();
        (body, from_cache)
    }

    async fn mount_cacheable(server: &MockServer, p: &str, body: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "max-age=31536000")
                    .set_body_string(body),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cache_population_then_offline_hit() {
        let server = MockServer::start().await;
        mount_cacheable(&server, "/hello", "Hi", 1).await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/hello");

        let (first, second) = blocking(move || {
            let first = fetch_text(&client, &u, NetworkPolicy::empty());
            let second = fetch_text(&client, &u, NetworkPolicy::OFFLINE);
            (first, second)
        })
        .await;

        assert_eq!(first, ("Hi".to_string(), false));
        assert_eq!(second, ("Hi".to_string(), true));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_cache_bypasses_cache_reads() {
        let server = MockServer::start().await;
        mount_cacheable(&server, "/hello", "Hi", 2).await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/hello");

        let (_, from_cache) = blocking(move || {
            fetch_text(&client, &u, NetworkPolicy::empty());
            fetch_text(&client, &u, NetworkPolicy::NO_CACHE)
        })
        .await;
        assert!(!from_cache);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1]
                .headers
                .get("cache-control")
                .and_then(|v| v.to_str().ok()),
            Some("no-cache")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_store_sends_directive_and_skips_write() {
        let server = MockServer::start().await;
        mount_cacheable(&server, "/hello", "Hi", 1).await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/hello");

        let stored = blocking(move || {
            fetch_text(&client, &u, NetworkPolicy::NO_STORE);
            client.cache().unwrap().len()
        })
        .await;
        assert_eq!(stored, 0);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            requests[0]
                .headers
                .get("cache-control")
                .and_then(|v| v.to_str().ok()),
            Some("no-store")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn default_policy_sends_no_cache_control() {
        let server = MockServer::start().await;
        mount_cacheable(&server, "/hello", "Hi", 1).await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/hello");

        blocking(move || fetch_text(&client, &u, NetworkPolicy::empty())).await;

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("cache-control").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn content_length_passthrough() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blob"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/blob");

        let length = blocking(move || {
            let result = client.load(&u, NetworkPolicy::empty()).unwrap();
            result.content_length
        })
        .await;

        assert_eq!(length, Some(1024));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn error_status_fails_and_releases_connection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secret"))
            .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
            .mount(&server)
            .await;
        mount_cacheable(&server, "/open", "ok", 1).await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let secret = url(&server, "/secret");
        let open = url(&server, "/open");

        let (err, after) = blocking(move || {
            let err = client.load(&secret, NetworkPolicy::empty()).unwrap_err();
            let after = fetch_text(&client, &open, NetworkPolicy::empty());
            (err, after)
        })
        .await;

        match &err {
            NetfetchError::Response(e) => {
                assert_eq!(e.status, 401);
                assert_eq!(e.message, "401 Unauthorized");
                assert_eq!(e.policy, NetworkPolicy::empty());
            }
            other => panic!("expected Response error, got {:?}", other),
        }
        assert_eq!(after, ("ok".to_string(), false));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_errors_do_not_exhaust_connections() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_bytes(vec![0u8; 64 * 1024]))
            .expect(20)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/missing");

        let statuses = blocking(move || {
            (0..20)
                .map(|_| client.load(&u, NetworkPolicy::empty()).unwrap_err().status())
                .collect::<Vec<_>>()
        })
        .await;

        assert!(statuses.iter().all(|s| *s == Some(404)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_twice_closes_cache() {
        let temp = TempDir::new().unwrap();
        let client = FetchClient::with_cache_dir_and_size(temp.path(), ONE_MIB);

        client.shutdown();
        assert!(client.cache().unwrap().is_closed());
        client.shutdown();
        assert!(client.is_shut_down());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_serves_stale_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stale"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "max-age=0")
                    .set_body_string("old"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/stale");

        let second = blocking(move || {
            fetch_text(&client, &u, NetworkPolicy::empty());
            fetch_text(&client, &u, NetworkPolicy::OFFLINE)
        })
        .await;

        assert_eq!(second, ("old".to_string(), true));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_with_empty_cache_is_504() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/never");

        let err = blocking(move || {
            client
                .load(&u, NetworkPolicy::OFFLINE | NetworkPolicy::NO_CACHE)
                .unwrap_err()
        })
        .await;

        assert_eq!(err.status(), Some(504));
        assert_eq!(err.to_string(), "504 Unsatisfiable Request (only-if-cached)");
        assert!(err.hint().is_some());
        assert!(err.is_retryable());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn skip_network_behaves_as_offline() {
        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = Url::parse("http://127.0.0.1:9/nothing").unwrap();

        let err = blocking(move || client.load(&u, NetworkPolicy::SKIP_NETWORK).unwrap_err()).await;

        assert_eq!(err.status(), Some(504));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_entry_is_revalidated_with_etag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .and(header("if-none-match", "\"v1\""))
            .respond_with(ResponseTemplate::new(304).insert_header("etag", "\"v1\""))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "max-age=0")
                    .insert_header("etag", "\"v1\"")
                    .set_body_string("v1 body"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/doc");

        let (first, second) = blocking(move || {
            let first = fetch_text(&client, &u, NetworkPolicy::empty());
            let second = fetch_text(&client, &u, NetworkPolicy::empty());
            (first, second)
        })
        .await;

        assert_eq!(first, ("v1 body".to_string(), false));
        assert_eq!(second, ("v1 body".to_string(), true));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_store_revalidation_leaves_entry_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .and(header("if-none-match", "\"v1\""))
            .respond_with(
                ResponseTemplate::new(304)
                    .insert_header("etag", "\"v1\"")
                    .insert_header("cache-control", "max-age=600"),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "max-age=0")
                    .insert_header("etag", "\"v1\"")
                    .set_body_string("v1 body"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/doc");

        let (second, stored) = blocking(move || {
            fetch_text(&client, &u, NetworkPolicy::empty());
            let second = fetch_text(&client, &u, NetworkPolicy::NO_STORE);
            let stored = client.cache().unwrap().entries().unwrap();
            (second, stored)
        })
        .await;

        assert_eq!(second, ("v1 body".to_string(), true));
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].header("cache-control"), Some("max-age=0"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn eviction_keeps_cache_within_budget() {
        let server = MockServer::start().await;
        for p in ["/a", "/b", "/c"] {
            mount_cacheable(&server, p, "123456", 1).await;
        }

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, 10);
        let urls: Vec<Url> = ["/a", "/b", "/c"].iter().map(|p| url(&server, p)).collect();

        let sizes = blocking(move || {
            let cache = Arc::clone(client.cache().unwrap());
            urls.iter()
                .map(|u| {
                    fetch_text(&client, u, NetworkPolicy::empty());
                    (cache.size(), cache.len())
                })
                .collect::<Vec<_>>()
        })
        .await;

        assert_eq!(sizes, vec![(6, 1), (6, 1), (6, 1)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropped_body_is_not_cached() {
        let server = MockServer::start().await;
        mount_cacheable(&server, "/big", &"x".repeat(4096), 1).await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/big");

        let stored = blocking(move || {
            let mut result = client.load(&u, NetworkPolicy::empty()).unwrap();
            let mut first = [0u8; 1];
            result.read_exact(&mut first).unwrap();
            drop(result);
            client.cache().unwrap().len()
        })
        .await;

        assert_eq!(stored, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn loads_after_shutdown_use_network() {
        let server = MockServer::start().await;
        mount_cacheable(&server, "/hello", "Hi", 2).await;

        let temp = TempDir::new().unwrap();
        let client = cached_client(&temp, ONE_MIB);
        let u = url(&server, "/hello");

        let (after, offline) = blocking(move || {
            fetch_text(&client, &u, NetworkPolicy::empty());
            client.shutdown();
            let after = fetch_text(&client, &u, NetworkPolicy::empty());
            let offline = client.load(&u, NetworkPolicy::OFFLINE).unwrap_err().status();
            (after, offline)
        })
        .await;

        assert_eq!(after, ("Hi".to_string(), false));
        assert_eq!(offline, Some(504));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn direct_transport_never_serves_from_cache() {
        let server = MockServer::start().await;
        mount_cacheable(&server, "/hello", "Hi", 2).await;

        let client = Arc::new(FetchClient::with_transport(Transport::direct(default_agent(
            None,
        ))));
        let u = url(&server, "/hello");

        let results = blocking(move || {
            let first = fetch_text(&client, &u, NetworkPolicy::empty());
            let second = fetch_text(&client, &u, NetworkPolicy::empty());
            client.shutdown();
            (first, second)
        })
        .await;

        assert_eq!(results.0, ("Hi".to_string(), false));
        assert_eq!(results.1, ("Hi".to_string(), false));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn caller_supplied_cache_is_closed_on_shutdown() {
        let temp = TempDir::new().unwrap();
        let cache = netfetch::transport::default_cache(
            temp.path(),
            &netfetch::cache::CapacityBudget::default(),
        );
        let client =
            FetchClient::with_transport(Transport::cached(default_agent(None), Arc::clone(&cache)));

        client.shutdown();

        assert!(cache.is_closed());
        assert_eq!(cache.directory(), temp.path().join("http-cache"));
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn netfetch() -> Command {
        cargo_bin_cmd!("netfetch")
    }

    /// Config file pointing the cache into `temp`, passed via the environment
    fn isolated(temp: &TempDir) -> Command {
        let config = temp.path().join("config.toml");
        if !config.exists() {
            write_config(&config, &temp.path().join("cache"));
        }
        let mut cmd = netfetch();
        cmd.env("NETFETCH_CONFIG", &config);
        cmd
    }

    fn write_config(config: &Path, cache_dir: &Path) {
        fs::write(
            config,
            format!(
                "[cache]\ndir = {:?}\nmax_size_bytes = 1048576\n",
                cache_dir.display().to_string()
            ),
        )
        .unwrap();
    }

    #[test]
    fn help_displays() {
        netfetch()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("size-bounded disk cache"))
            .stdout(predicate::str::contains("warm"));
    }

    #[test]
    fn version_displays() {
        netfetch()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("netfetch"));
    }

    #[test]
    fn config_path_follows_env() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("max_size_bytes = 1048576"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("nested").join("config.toml");

        netfetch()
            .env("NETFETCH_CONFIG", &config)
            .args(["config", "init"])
            .assert()
            .success();

        let written = fs::read_to_string(&config).unwrap();
        assert!(written.contains("[general]"));
        assert!(written.contains("enabled = true"));
    }

    #[test]
    fn invalid_config_hints_at_init() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("config.toml");
        fs::write(&config, "[cache\n").unwrap();

        netfetch()
            .env("NETFETCH_CONFIG", &config)
            .args(["cache", "info"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("netfetch config init --force"));

        netfetch()
            .env("NETFETCH_CONFIG", &config)
            .args(["config", "init", "--force"])
            .assert()
            .success();
    }

    #[test]
    fn get_offline_miss_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["get", "--offline", "http://127.0.0.1:9/missing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("504 Unsatisfiable Request"))
            .stderr(predicate::str::contains("--offline"));
    }

    #[test]
    fn get_rejects_invalid_url() {
        netfetch()
            .args(["get", "not a url"])
            .assert()
            .failure();
    }

    #[test]
    fn cache_info_on_empty_cache() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["cache", "info"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Entries:   0"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_then_offline_get_then_clear() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "max-age=31536000")
                    .set_body_string("Hi"),
            )
            .expect(1)
            .mount(&server)
            .await;
        let url = format!("{}/hello.txt", server.uri());

        tokio::task::spawn_blocking(move || {
            let temp = TempDir::new().unwrap();

            isolated(&temp)
                .args(["get", &url])
                .assert()
                .success()
                .stdout("Hi")
                .stderr(predicate::str::contains("network"));

            let saved = temp.path().join("hello.txt");
            isolated(&temp)
                .args(["get", "--offline", "-o"])
                .arg(&saved)
                .arg(&url)
                .assert()
                .success()
                .stderr(predicate::str::contains("cache"));
            assert_eq!(fs::read_to_string(&saved).unwrap(), "Hi");

            isolated(&temp)
                .args(["cache", "list", "--format", "plain"])
                .assert()
                .success()
                .stdout(predicate::str::contains("/hello.txt"));

            isolated(&temp)
                .args(["cache", "clear", "--yes"])
                .assert()
                .success();

            isolated(&temp)
                .args(["get", "--offline", &url])
                .assert()
                .failure();
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn warm_reports_each_url() {
        let server = MockServer::start().await;
        for p in ["/one", "/two"] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("cache-control", "max-age=600")
                        .set_body_string("payload"),
                )
                .expect(1)
                .mount(&server)
                .await;
        }
        let one = format!("{}/one", server.uri());
        let two = format!("{}/two", server.uri());

        tokio::task::spawn_blocking(move || {
            let temp = TempDir::new().unwrap();

            isolated(&temp)
                .args(["warm", "--format", "plain", &one, &two])
                .assert()
                .success()
                .stdout(predicate::str::contains("network\t7\t"))
                .stdout(predicate::str::contains("/one"))
                .stdout(predicate::str::contains("/two"));

            isolated(&temp)
                .args(["warm", "--offline", "--format", "json", &one])
                .assert()
                .success()
                .stdout(predicate::str::contains("\"source\": \"cache\""));
        })
        .await
        .unwrap();
    }

    #[test]
    fn warm_failure_exits_non_zero() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["warm", "--offline", "--format", "plain", "http://127.0.0.1:9/x"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("failed"))
            .stderr(predicate::str::contains("could not be loaded"));
    }
}
