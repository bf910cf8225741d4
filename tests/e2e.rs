//! End-to-end tests for the relay.
//!
//! Starts a real Axum server on a random port in front of a wiremock
//! origin, then drives it with reqwest the way a player would: fetch the
//! manifest, then follow the rewritten references.

use hls_relay::config::Config;
use hls_relay::server::build_router;
use m3u8_rs::Playlist;
use std::net::SocketAddr;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEFAULT_REFERER: &str = "https://default.example/";

const PLAYLIST: &str = "#EXTM3U\n#EXT-X-VERSION:3\nseg0.ts\nhttps://othercdn.example/seg1.ts\n#EXT-X-ENDLIST";

// ── Test server helpers ───────────────────────────────────────────────────────

async fn start_relay() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().unwrap();

    let config = Config {
        port: addr.port(),
        default_referer: DEFAULT_REFERER.to_string(),
        user_agent: "relay-test/1.0".to_string(),
        fetch_timeout_secs: 5,
        block_private_origins: false,
        metrics_port: None,
    };

    let app = build_router(config).unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

fn manifest_url(relay: SocketAddr, target: &str, referer: Option<&str>) -> String {
    let mut url = format!(
        "http://{}/manifest?url={}",
        relay,
        urlencoding::encode(target)
    );
    if let Some(referer) = referer {
        url.push_str("&referer=");
        url.push_str(&urlencoding::encode(referer));
    }
    url
}

/// Decode a rewritten reference into (target, referer)
fn decode_reference(line: &str) -> (String, Option<String>) {
    let url = Url::parse(line).expect("rewritten reference should be absolute");
    assert_eq!(url.path(), "/segment");
    let target = url
        .query_pairs()
        .find(|(k, _)| k == "url")
        .map(|(_, v)| v.into_owned())
        .expect("url parameter");
    let referer = url
        .query_pairs()
        .find(|(k, _)| k == "referer")
        .map(|(_, v)| v.into_owned());
    (target, referer)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_check() {
    let relay = start_relay().await;

    let resp = reqwest::get(format!("http://{}/health", relay))
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn manifest_rewrite_scenario() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a/playlist.m3u8"))
        .and(header("referer", DEFAULT_REFERER))
        .and(header("origin", "https://default.example"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PLAYLIST))
        .expect(1)
        .mount(&origin)
        .await;

    let relay = start_relay().await;
    let target = format!("{}/a/playlist.m3u8", origin.uri());

    let resp = reqwest::get(manifest_url(relay, &target, None)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/vnd.apple.mpegurl"
    );
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );

    let body = resp.text().await.unwrap();
    let lines: Vec<&str> = body.split('\n').collect();
    assert_eq!(lines.len(), 5, "line count must be preserved:\n{body}");

    assert_eq!(lines[0], "#EXTM3U");
    assert_eq!(lines[1], "#EXT-X-VERSION:3");
    assert_eq!(lines[4], "#EXT-X-ENDLIST");

    assert!(lines[2].starts_with(&format!("http://{}/segment?", relay)));
    assert_eq!(
        decode_reference(lines[2]),
        (
            format!("{}/a/seg0.ts", origin.uri()),
            Some(DEFAULT_REFERER.to_string())
        )
    );
    assert_eq!(
        decode_reference(lines[3]),
        (
            "https://othercdn.example/seg1.ts".to_string(),
            Some(DEFAULT_REFERER.to_string())
        )
    );
}

#[tokio::test]
async fn rewritten_manifest_is_valid_m3u8() {
    let origin = MockServer::start().await;
    let media = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:0\n#EXTINF:10.0,\nseg0.ts\n#EXTINF:10.0,\nseg1.ts\n#EXT-X-ENDLIST\n";
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(media))
        .mount(&origin)
        .await;

    let relay = start_relay().await;
    let target = format!("{}/vod/index.m3u8", origin.uri());
    let body = reqwest::get(manifest_url(relay, &target, None))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let playlist =
        m3u8_rs::parse_playlist_res(body.as_bytes()).expect("Response should be valid M3U8");
    let Playlist::MediaPlaylist(pl) = playlist else {
        panic!("Expected a MediaPlaylist, got MasterPlaylist");
    };
    assert_eq!(pl.segments.len(), 2);
    for segment in &pl.segments {
        assert!(
            segment.uri.starts_with(&format!("http://{}/segment?url=", relay)),
            "segment not routed through relay: {}",
            segment.uri
        );
    }
    assert!(pl.end_list);
}

#[tokio::test]
async fn segment_hop_carries_referer_and_streams_bytes() {
    let origin = MockServer::start().await;
    let referer = "https://site.example/watch?v=42&lang=en";
    let payload: Vec<u8> = (0..=255u8).cycle().take(512 * 1024).collect();

    Mock::given(method("GET"))
        .and(path("/v/index.m3u8"))
        .and(header("referer", referer))
        .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\n#EXTINF:6,\nseg0.ts\n"))
        .expect(1)
        .mount(&origin)
        .await;

    Mock::given(method("GET"))
        .and(path("/v/seg0.ts"))
        .and(header("referer", referer))
        .and(header("origin", "https://site.example"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(payload.clone(), "video/mp2t"))
        .expect(1)
        .mount(&origin)
        .await;

    let relay = start_relay().await;
    let target = format!("{}/v/index.m3u8", origin.uri());
    let body = reqwest::get(manifest_url(relay, &target, Some(referer)))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let segment_line = body
        .lines()
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .expect("reference line");
    let (_, carried) = decode_reference(segment_line);
    assert_eq!(carried.as_deref(), Some(referer));

    let resp = reqwest::get(segment_line).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "video/mp2t");
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    let bytes = resp.bytes().await.unwrap();
    assert_eq!(bytes.as_ref(), payload.as_slice());
}

#[tokio::test]
async fn segment_without_referer_uses_default() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/seg.ts"))
        .and(header("referer", DEFAULT_REFERER))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x47u8; 188], "video/mp2t"))
        .expect(1)
        .mount(&origin)
        .await;

    let relay = start_relay().await;
    let url = format!(
        "http://{}/segment?url={}",
        relay,
        urlencoding::encode(&format!("{}/seg.ts", origin.uri()))
    );

    let resp = reqwest::get(url).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().len(), 188);
}

#[tokio::test]
async fn truncated_origin_body_fails_the_relayed_stream() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Origin promises 100000 bytes, sends 1000, then hangs up
    let origin = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin_addr = origin.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = origin.accept().await.unwrap();
        let mut request = vec![0u8; 4096];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: video/mp2t\r\nContent-Length: 100000\r\n\r\n",
            )
            .await
            .unwrap();
        socket.write_all(&[0x47u8; 1000]).await.unwrap();
        socket.flush().await.unwrap();
        drop(socket);
    });

    let relay = start_relay().await;
    let url = format!(
        "http://{}/segment?url={}",
        relay,
        urlencoding::encode(&format!("http://{}/seg0.ts", origin_addr))
    );

    let resp = reqwest::get(url).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "video/mp2t");
    assert!(
        resp.bytes().await.is_err(),
        "a cut-off origin must not look like a complete segment"
    );
}

#[tokio::test]
async fn upstream_404_is_502() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&origin)
        .await;

    let relay = start_relay().await;
    let target = format!("{}/a/playlist.m3u8", origin.uri());
    let resp = reqwest::get(manifest_url(relay, &target, None)).await.unwrap();

    assert_eq!(resp.status(), 502);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Failed to fetch from origin"), "{body}");
}

#[tokio::test]
async fn cors_preflight_is_permissive() {
    let relay = start_relay().await;
    let client = reqwest::Client::new();

    let resp = client
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{}/segment?url=x", relay),
        )
        .header("origin", "https://player.example")
        .header("access-control-request-method", "GET")
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
