//! End-to-end coverage of the static asset pipeline.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::{raw_request, site_config, spawn_gateway};
use ssr_gateway::StaticSiteRenderer;

/// Lay out a small built site: versioned client assets with compressed
/// variants, plus prerendered pages.
fn build_site(root: &Path) {
    let client = root.join("client");
    fs::create_dir_all(client.join("_app/immutable")).unwrap();
    fs::write(client.join("app.css"), "body{color:plain}").unwrap();
    fs::write(client.join("app.css.gz"), "gzip-bytes").unwrap();
    fs::write(client.join("app.css.br"), "br-bytes").unwrap();
    fs::write(client.join("_app/immutable/chunk.js"), "export {}").unwrap();
    fs::write(client.join("overlap.txt"), "from client").unwrap();
    fs::write(client.join("caf\u{e9}.txt"), "accent").unwrap();

    let prerender = root.join("prerender");
    fs::create_dir_all(prerender.join("docs")).unwrap();
    fs::write(prerender.join("index.html"), "<h1>home</h1>").unwrap();
    fs::write(prerender.join("about.html"), "<h1>about</h1>").unwrap();
    fs::write(prerender.join("docs/index.html"), "<h1>docs</h1>").unwrap();
    fs::write(prerender.join("overlap.txt"), "from prerender").unwrap();
    fs::write(prerender.join("blob.bin"), (0u8..100).collect::<Vec<u8>>()).unwrap();
}

#[tokio::test]
async fn test_serves_pages_and_directory_indexes() {
    let site = tempfile::tempdir().unwrap();
    build_site(site.path());
    let (addr, _) = spawn_gateway(site_config(site.path()), Arc::new(StaticSiteRenderer)).await;
    let client = reqwest::Client::new();

    let home = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(home.status(), 200);
    assert_eq!(
        home.headers().get("content-type").unwrap(),
        "text/html;charset=utf-8"
    );
    assert_eq!(home.text().await.unwrap(), "<h1>home</h1>");

    // extensionless page and trailing-slash directory index
    let about = client.get(format!("http://{addr}/about")).send().await.unwrap();
    assert_eq!(about.text().await.unwrap(), "<h1>about</h1>");
    let docs = client.get(format!("http://{addr}/docs/")).send().await.unwrap();
    assert_eq!(docs.text().await.unwrap(), "<h1>docs</h1>");

    // unmatched paths fall through to the renderer
    let missing = client.get(format!("http://{addr}/nope")).send().await.unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_client_root_wins_over_prerender() {
    let site = tempfile::tempdir().unwrap();
    build_site(site.path());
    let (addr, _) = spawn_gateway(site_config(site.path()), Arc::new(StaticSiteRenderer)).await;

    let body = reqwest::get(format!("http://{addr}/overlap.txt"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "from client");
}

#[tokio::test]
async fn test_encoding_negotiation_prefers_brotli() {
    let site = tempfile::tempdir().unwrap();
    build_site(site.path());
    let (addr, _) = spawn_gateway(site_config(site.path()), Arc::new(StaticSiteRenderer)).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/app.css");

    let br = client
        .get(&url)
        .header("accept-encoding", "br, gzip")
        .send()
        .await
        .unwrap();
    assert_eq!(br.headers().get("content-encoding").unwrap(), "br");
    assert_eq!(br.headers().get("content-type").unwrap(), "text/css");
    assert_eq!(br.headers().get("vary").unwrap(), "Accept-Encoding");
    assert_eq!(br.bytes().await.unwrap().as_ref(), b"br-bytes");

    let gz = client
        .get(&url)
        .header("accept-encoding", "gzip")
        .send()
        .await
        .unwrap();
    assert_eq!(gz.headers().get("content-encoding").unwrap(), "gzip");
    assert_eq!(gz.bytes().await.unwrap().as_ref(), b"gzip-bytes");

    let plain = client.get(&url).send().await.unwrap();
    assert!(plain.headers().get("content-encoding").is_none());
    assert_eq!(plain.text().await.unwrap(), "body{color:plain}");
}

#[tokio::test]
async fn test_etag_round_trip_yields_304() {
    let site = tempfile::tempdir().unwrap();
    build_site(site.path());
    let (addr, _) = spawn_gateway(site_config(site.path()), Arc::new(StaticSiteRenderer)).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/about");

    let first = client.get(&url).send().await.unwrap();
    let etag = first.headers().get("etag").unwrap().clone();
    assert!(etag.to_str().unwrap().starts_with("W/\""));

    let second = client
        .get(&url)
        .header("if-none-match", etag)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 304);
    assert!(second.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_range_requests() {
    let site = tempfile::tempdir().unwrap();
    build_site(site.path());
    let (addr, _) = spawn_gateway(site_config(site.path()), Arc::new(StaticSiteRenderer)).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/blob.bin");

    let partial = client
        .get(&url)
        .header("range", "bytes=10-19")
        .send()
        .await
        .unwrap();
    assert_eq!(partial.status(), 206);
    assert_eq!(
        partial.headers().get("content-range").unwrap(),
        "bytes 10-19/100"
    );
    assert_eq!(partial.headers().get("content-length").unwrap(), "10");
    assert_eq!(partial.headers().get("accept-ranges").unwrap(), "bytes");
    assert_eq!(
        partial.bytes().await.unwrap().as_ref(),
        &(10u8..20).collect::<Vec<u8>>()[..]
    );

    let out_of_range = client
        .get(&url)
        .header("range", "bytes=200-300")
        .send()
        .await
        .unwrap();
    assert_eq!(out_of_range.status(), 416);
    assert_eq!(
        out_of_range.headers().get("content-range").unwrap(),
        "bytes */100"
    );

    // unknown range units are ignored, not rejected
    let unknown_unit = client
        .get(&url)
        .header("range", "lines=1-2")
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_unit.status(), 200);
    assert_eq!(unknown_unit.bytes().await.unwrap().len(), 100);
}

#[tokio::test]
async fn test_immutable_cache_control_for_versioned_assets() {
    let site = tempfile::tempdir().unwrap();
    build_site(site.path());
    let (addr, _) = spawn_gateway(site_config(site.path()), Arc::new(StaticSiteRenderer)).await;
    let client = reqwest::Client::new();

    let chunk = client
        .get(format!("http://{addr}/_app/immutable/chunk.js"))
        .send()
        .await
        .unwrap();
    assert_eq!(
        chunk.headers().get("cache-control").unwrap(),
        "public,max-age=31536000,immutable"
    );
    assert_eq!(chunk.headers().get("content-type").unwrap(), "text/javascript");

    // only the versioned subtree is marked
    let css = client
        .get(format!("http://{addr}/app.css"))
        .send()
        .await
        .unwrap();
    assert!(css.headers().get("cache-control").is_none());
}

#[tokio::test]
async fn test_percent_encoded_lookup() {
    let site = tempfile::tempdir().unwrap();
    build_site(site.path());
    let (addr, _) = spawn_gateway(site_config(site.path()), Arc::new(StaticSiteRenderer)).await;

    let body = reqwest::get(format!("http://{addr}/caf%C3%A9.txt"))
        .await
        .unwrap();
    assert_eq!(body.status(), 200);
    assert_eq!(body.text().await.unwrap(), "accent");
}

#[tokio::test]
async fn test_dev_mode_traversal_is_not_found() {
    let site = tempfile::tempdir().unwrap();
    build_site(site.path());
    let mut config = site_config(site.path());
    config.assets.dev = true;
    let (addr, _) = spawn_gateway(config, Arc::new(StaticSiteRenderer)).await;

    // raw socket: HTTP clients normalize away the dot segments
    let response = raw_request(
        addr,
        "GET /../../etc/passwd HTTP/1.1\r\nHost: gateway\r\nConnection: close\r\n\r\n",
    )
    .await;
    let status = response.lines().next().unwrap_or_default().to_string();
    assert!(
        status.contains("404") || status.contains("400"),
        "unexpected status line: {status}"
    );
    assert!(!response.contains("root:"));
}

#[tokio::test]
async fn test_dev_mode_serves_fresh_files() {
    let site = tempfile::tempdir().unwrap();
    build_site(site.path());
    let mut config = site_config(site.path());
    config.assets.dev = true;
    let (addr, _) = spawn_gateway(config, Arc::new(StaticSiteRenderer)).await;
    let client = reqwest::Client::new();

    // created after startup, still served
    fs::write(site.path().join("prerender/late.html"), "late").unwrap();
    let late = client.get(format!("http://{addr}/late")).send().await.unwrap();
    assert_eq!(late.status(), 200);
    assert_eq!(late.headers().get("cache-control").unwrap(), "no-cache");
    assert_eq!(late.text().await.unwrap(), "late");
}
