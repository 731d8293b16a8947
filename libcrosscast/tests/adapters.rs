//! Platform adapter tests against local mock HTTP servers
//!
//! Each test runs the full `publish` wrapper, so media normalization, step
//! ordering, and error mapping are all exercised.

use std::io::Cursor;

use libcrosscast::config::MediaConfig;
use libcrosscast::credentials::{
    BlueskyCredentials, InstagramCredentials, MastodonCredentials, TumblrCredentials,
};
use libcrosscast::platforms::bluesky::BlueskyClient;
use libcrosscast::platforms::instagram::InstagramClient;
use libcrosscast::platforms::mastodon::MastodonClient;
use libcrosscast::platforms::publish;
use libcrosscast::platforms::tumblr::TumblrClient;
use libcrosscast::service::events::EventBus;
use libcrosscast::types::{MediaItem, Post};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn image_item(name: &str) -> MediaItem {
    MediaItem::from_bytes(name, "image/png", png(64, 32), u64::MAX).unwrap()
}

fn post_with_images(text: &str, count: usize) -> Post {
    let mut post = Post::new(text);
    for i in 0..count {
        post.images.push(image_item(&format!("photo{}.png", i)));
    }
    post
}

fn bluesky_client(server: &MockServer) -> BlueskyClient {
    BlueskyClient::new(
        &server.uri(),
        BlueskyCredentials {
            username: "alice.bsky.social".to_string(),
            app_password: "app-pass".to_string(),
        },
    )
}

async fn mount_bluesky_session(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.server.createSession"))
        .and(body_partial_json(json!({
            "identifier": "alice.bsky.social",
            "password": "app-pass",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessJwt": "jwt-token",
            "did": "did:plc:alice",
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn body_of(server: &MockServer, url_path: &str) -> Value {
    let requests = server.received_requests().await.unwrap();
    let request = requests
        .iter()
        .find(|r| r.url.path() == url_path)
        .expect("request not received");
    serde_json::from_slice(&request.body).unwrap()
}

#[tokio::test]
async fn test_bluesky_posts_record_with_image_embed() {
    let server = MockServer::start().await;
    mount_bluesky_session(&server).await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.uploadBlob"))
        .and(header("authorization", "Bearer jwt-token"))
        .and(header("content-type", "image/jpeg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "blob": { "$type": "blob", "ref": { "$link": "bafy" }, "mimeType": "image/jpeg", "size": 10 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .and(header("authorization", "Bearer jwt-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "at://did:plc:alice/app.bsky.feed.post/1",
            "cid": "bafyrecord",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = publish(
        &bluesky_client(&server),
        &post_with_images("hello sky", 1),
        &MediaConfig::default(),
        &EventBus::default(),
    )
    .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, "Posted successfully to Bluesky");
    assert_eq!(outcome.data.unwrap()["cid"], "bafyrecord");

    let body = body_of(&server, "/xrpc/com.atproto.repo.createRecord").await;
    assert_eq!(body["repo"], "did:plc:alice");
    assert_eq!(body["record"]["text"], "hello sky");
    assert_eq!(body["record"]["embed"]["$type"], "app.bsky.embed.images");
    assert_eq!(body["record"]["embed"]["images"][0]["alt"], "Image 1");
}

#[tokio::test]
async fn test_bluesky_uploads_at_most_four_images() {
    let server = MockServer::start().await;
    mount_bluesky_session(&server).await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.uploadBlob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "blob": { "size": 1 } })))
        .expect(4)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uri": "at://x", "cid": "y" })))
        .mount(&server)
        .await;

    let outcome = publish(
        &bluesky_client(&server),
        &post_with_images("many", 6),
        &MediaConfig::default(),
        &EventBus::default(),
    )
    .await;

    assert!(outcome.success, "{}", outcome.message);
    let body = body_of(&server, "/xrpc/com.atproto.repo.createRecord").await;
    assert_eq!(body["record"]["embed"]["images"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_bluesky_bad_login_stops_before_upload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.server.createSession"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "AuthenticationRequired",
            "message": "Invalid identifier or password",
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.uploadBlob"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = publish(
        &bluesky_client(&server),
        &post_with_images("nope", 1),
        &MediaConfig::default(),
        &EventBus::default(),
    )
    .await;

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Error: "));
    assert!(outcome.message.contains("Authentication failed"));
    assert!(outcome.message.contains("Invalid identifier or password"));
}

#[tokio::test]
async fn test_mastodon_uploads_then_posts_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/media"))
        .and(header("authorization", "Bearer masto-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "media-1" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .and(body_partial_json(json!({
            "status": "toot",
            "media_ids": ["media-1"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "109",
            "url": "https://example.social/@me/109",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = MastodonClient::new(MastodonCredentials {
        instance_url: format!("{}/", server.uri()),
        access_token: "masto-token".to_string(),
    });

    let mut post = post_with_images("common", 1);
    post.mastodon = "toot".to_string();

    let outcome = publish(&client, &post, &MediaConfig::default(), &EventBus::default()).await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.data.unwrap()["id"], "109");
}

#[tokio::test]
async fn test_mastodon_skips_undecodable_image_and_notes_it() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "unused" })))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "1" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = MastodonClient::new(MastodonCredentials {
        instance_url: server.uri(),
        access_token: "t".to_string(),
    });

    let mut post = Post::new("text survives");
    post.images.push(
        MediaItem::from_bytes("broken.png", "image/png", b"not a png".to_vec(), u64::MAX).unwrap(),
    );

    let outcome = publish(&client, &post, &MediaConfig::default(), &EventBus::default()).await;
    assert!(outcome.success, "{}", outcome.message);
    assert!(outcome
        .message
        .starts_with("Posted successfully to Mastodon (skipped 1 image(s):"));

    let body = body_of(&server, "/api/v1/statuses").await;
    assert!(body.get("media_ids").is_none());
}

#[tokio::test]
async fn test_tumblr_photo_post() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/blog/myblog.tumblr.com/post"))
        .and(query_param("api_key", "tumblr-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "meta": { "status": 201, "msg": "Created" },
            "response": { "id": 7001 },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TumblrClient::new(
        &server.uri(),
        TumblrCredentials {
            api_key: "tumblr-key".to_string(),
            blog_identifier: "myblog.tumblr.com".to_string(),
        },
    );

    let outcome = publish(
        &client,
        &post_with_images("**bold** caption", 2),
        &MediaConfig::default(),
        &EventBus::default(),
    )
    .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.data.unwrap(), json!({ "id": 7001 }));

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"type\""));
    assert!(body.contains("photo"));
    assert!(body.contains("name=\"data[0]\""));
    assert!(body.contains("name=\"data[1]\""));
    assert!(body.contains("name=\"caption\""));
}

#[tokio::test]
async fn test_tumblr_rate_limit_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/blog/myblog/post"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "meta": { "status": 429, "msg": "Limit Exceeded" },
        })))
        .mount(&server)
        .await;

    let client = TumblrClient::new(
        &server.uri(),
        TumblrCredentials {
            api_key: "k".to_string(),
            blog_identifier: "myblog".to_string(),
        },
    );

    let outcome = publish(&client, &Post::new("text"), &MediaConfig::default(), &EventBus::default()).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("Rate limit exceeded"));
    assert!(outcome.message.contains("Limit Exceeded"));
}

fn instagram_client(server: &MockServer) -> InstagramClient {
    InstagramClient::new(
        &server.uri(),
        InstagramCredentials {
            access_token: "ig-token".to_string(),
            business_account_id: "1784".to_string(),
            ..Default::default()
        },
    )
}

async fn mount_instagram_upload_and_container(server: &MockServer) {
    // Container creation is the JSON request to the same edge
    Mock::given(method("POST"))
        .and(path("/1784/media"))
        .and(body_partial_json(json!({ "media_type": "CAROUSEL" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "container-9" })))
        .with_priority(1)
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/1784/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "upload-1" })))
        .expect(2)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_instagram_carousel_three_step_publish() {
    let server = MockServer::start().await;
    mount_instagram_upload_and_container(&server).await;

    Mock::given(method("POST"))
        .and(path("/1784/media_publish"))
        .and(body_partial_json(json!({ "creation_id": "container-9" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "ig-post-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = publish(
        &instagram_client(&server),
        &post_with_images("#sunset", 2),
        &MediaConfig::default(),
        &EventBus::default(),
    )
    .await;

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.data.unwrap()["id"], "ig-post-1");
}

#[tokio::test]
async fn test_instagram_error_body_fails_even_on_ok_status() {
    let server = MockServer::start().await;
    mount_instagram_upload_and_container(&server).await;

    Mock::given(method("POST"))
        .and(path("/1784/media_publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "message": "Media not ready", "code": 9007 }
        })))
        .mount(&server)
        .await;

    let outcome = publish(
        &instagram_client(&server),
        &post_with_images("#sunset", 2),
        &MediaConfig::default(),
        &EventBus::default(),
    )
    .await;

    assert!(!outcome.success);
    assert!(outcome.message.contains("Instagram publish"));
    assert!(outcome.message.contains("9007"));
    assert!(outcome.message.contains("Media not ready"));
}

#[tokio::test]
async fn test_instagram_text_only_makes_no_requests() {
    let server = MockServer::start().await;

    let outcome = publish(
        &instagram_client(&server),
        &Post::new("caption only"),
        &MediaConfig::default(),
        &EventBus::default(),
    )
    .await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, "Instagram requires at least one image");
    assert!(server.received_requests().await.unwrap().is_empty());
}
