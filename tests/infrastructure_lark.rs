//! 飞书机器人测试

mod common;

use common::{MockServer, RecordedRequest};
use larkoss::core::signing::webhook_signature;
use larkoss::infrastructure::lark::webhook::{at_element, text_element};
use larkoss::{ClientError, LarkBot, LarkWebhookBot, MessageContent, PostContent, ReceiveId};
use serde_json::{json, Value};

const TOKEN_PATH: &str = "/auth/v3/tenant_access_token/internal";
const TOKEN: &str = "t-test-token";

fn token_reply() -> (u16, String) {
    (
        200,
        json!({"code": 0, "msg": "ok", "tenant_access_token": TOKEN, "expire": 7200}).to_string(),
    )
}

fn ok_reply(data: Value) -> (u16, String) {
    (200, json!({"code": 0, "msg": "success", "data": data}).to_string())
}

fn api_requests(server: &MockServer) -> Vec<RecordedRequest> {
    server
        .requests()
        .into_iter()
        .filter(|r| r.path != TOKEN_PATH)
        .collect()
}

async fn bot_with<F>(responder: F) -> (MockServer, LarkBot)
where
    F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
{
    let server = MockServer::start(move |req| {
        if req.path == TOKEN_PATH {
            token_reply()
        } else {
            responder(req)
        }
    })
    .await;
    let bot = LarkBot::new("cli_test", "app-secret").with_base_url(&server.base_url);
    (server, bot)
}

#[tokio::test]
async fn test_tenant_access_token_request() {
    let (server, bot) = bot_with(|_| ok_reply(json!({}))).await;

    assert_eq!(bot.tenant_access_token().await.unwrap(), TOKEN);

    let req = &server.requests()[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, TOKEN_PATH);
    assert_eq!(req.json(), json!({"app_id": "cli_test", "app_secret": "app-secret"}));
}

#[tokio::test]
async fn test_token_failure_is_auth_error() {
    let server = MockServer::start(|_| {
        (200, json!({"code": 10003, "msg": "invalid app_id"}).to_string())
    })
    .await;
    let bot = LarkBot::new("bad", "bad").with_base_url(&server.base_url);

    let err = bot.send_text(&ReceiveId::user("ou_1"), "hi").await.unwrap_err();
    assert!(matches!(err, ClientError::Auth(ref msg) if msg.contains("invalid app_id")));
    // 令牌失败时不再调用发送接口
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_send_text_to_user() {
    let (server, bot) = bot_with(|_| ok_reply(json!({"message_id": "om_1"}))).await;

    let data = bot.send_text(&ReceiveId::user("ou_1"), "你好").await.unwrap();
    assert_eq!(data.unwrap()["message_id"], "om_1");

    let requests = api_requests(&server);
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/im/v1/messages");
    assert_eq!(req.query(), "receive_id_type=open_id");
    assert_eq!(req.header("authorization"), Some("Bearer t-test-token"));

    let body = req.json();
    assert_eq!(body["receive_id"], "ou_1");
    assert_eq!(body["msg_type"], "text");
    // content 是 JSON 字符串而不是对象
    let content: Value = serde_json::from_str(body["content"].as_str().unwrap()).unwrap();
    assert_eq!(content, json!({"text": "你好"}));
    assert_eq!(body["uuid"].as_str().unwrap().len(), 36);
}

#[tokio::test]
async fn test_each_send_has_unique_uuid() {
    let (server, bot) = bot_with(|_| ok_reply(json!({}))).await;
    let chat = ReceiveId::chat("oc_1");

    bot.send_image(&chat, "img_1").await.unwrap();
    bot.send_image(&chat, "img_1").await.unwrap();

    let requests = api_requests(&server);
    assert_eq!(requests[0].query(), "receive_id_type=chat_id");
    assert_ne!(requests[0].json()["uuid"], requests[1].json()["uuid"]);
}

#[tokio::test]
async fn test_send_post() {
    let (server, bot) = bot_with(|_| ok_reply(json!({}))).await;

    let mut post = PostContent::new("周报");
    post.add_content_in_line(PostContent::make_text("本周完成", &[], false));
    post.add_content_in_new_line(PostContent::make_at("ou_2", &[]));

    assert!(bot.send_post(&ReceiveId::chat("oc_1"), &post).await.unwrap().is_some());

    let body = api_requests(&server)[0].json();
    assert_eq!(body["msg_type"], "post");
    let content: Value = serde_json::from_str(body["content"].as_str().unwrap()).unwrap();
    assert_eq!(content["zh_cn"]["title"], "周报");
    assert_eq!(content["zh_cn"]["content"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_send_system_message() {
    let (server, bot) = bot_with(|_| ok_reply(json!({}))).await;

    bot.send_system_msg_to_user("ou_1", "新会话").await.unwrap();

    let req = &api_requests(&server)[0];
    assert_eq!(req.query(), "receive_id_type=open_id");
    assert_eq!(req.json()["msg_type"], "system");
}

#[tokio::test]
async fn test_send_rejected_returns_none() {
    let (_server, bot) = bot_with(|_| {
        (400, json!({"code": 230001, "msg": "invalid receive_id"}).to_string())
    })
    .await;

    let content = MessageContent::ShareChat { chat_id: "oc_2".into() };
    assert!(bot.send(&ReceiveId::chat("oc_x"), &content).await.unwrap().is_none());
}

#[tokio::test]
async fn test_group_lookup_by_name() {
    let (server, bot) = bot_with(|_| {
        ok_reply(json!({
            "items": [
                {"chat_id": "oc_1", "name": "研发群"},
                {"chat_id": "oc_2", "name": "产品群"},
                {"chat_id": "oc_3", "name": "研发群"}
            ],
            "has_more": false
        }))
    })
    .await;

    let ids = bot.get_group_chat_id_by_name("研发群").await.unwrap();
    assert_eq!(ids, vec!["oc_1", "oc_3"]);
    assert!(bot.get_group_chat_id_by_name("不存在").await.unwrap().is_empty());

    let req = &api_requests(&server)[0];
    assert_eq!(req.method, "GET");
    assert_eq!(req.path, "/im/v1/chats");
    assert!(req.query().contains("page_size=20"));
}

#[tokio::test]
async fn test_member_lookup_by_name() {
    let (server, bot) = bot_with(|_| {
        ok_reply(json!({
            "items": [
                {"member_id": "ou_1", "name": "张三"},
                {"member_id": "ou_2", "name": "李四"}
            ]
        }))
    })
    .await;

    let ids = bot.get_member_open_id_by_name("oc_1", "李四").await.unwrap();
    assert_eq!(ids, vec!["ou_2"]);
    assert_eq!(api_requests(&server)[0].path, "/im/v1/chats/oc_1/members");
}

#[tokio::test]
async fn test_group_list_failure_is_empty() {
    let (_server, bot) = bot_with(|_| (500, "not json".to_string())).await;
    assert!(bot.get_group_list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_user_info() {
    let (server, bot) = bot_with(|_| {
        ok_reply(json!({
            "user_list": [{"email": "a@example.com", "user_id": "ou_1"}]
        }))
    })
    .await;

    let users = bot
        .get_user_info(&["a@example.com".to_string()], &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(users[0]["user_id"], "ou_1");

    let req = &api_requests(&server)[0];
    assert_eq!(req.path, "/contact/v3/users/batch_get_id");
    assert_eq!(req.query(), "user_id_type=open_id");
    assert_eq!(req.json()["emails"], json!(["a@example.com"]));
    assert_eq!(req.json()["include_resigned"], true);
}

#[tokio::test]
async fn test_upload_image_multipart() {
    let (server, bot) = bot_with(|_| ok_reply(json!({"image_key": "img_v2_abc"}))).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logo.png");
    std::fs::write(&path, b"\x89PNG fake").unwrap();

    let key = bot.upload_image(&path).await.unwrap();
    assert_eq!(key.as_deref(), Some("img_v2_abc"));

    let req = &api_requests(&server)[0];
    assert_eq!(req.path, "/im/v1/images");
    assert!(req
        .header("content-type")
        .unwrap()
        .starts_with("multipart/form-data"));
    let body = req.body_text();
    assert!(body.contains("name=\"image_type\""));
    assert!(body.contains("message"));
    assert!(body.contains("filename=\"logo.png\""));
}

#[tokio::test]
async fn test_upload_file_fields() {
    let (server, bot) = bot_with(|_| ok_reply(json!({"file_key": "file_v2_1"}))).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.pdf");
    std::fs::write(&path, b"%PDF").unwrap();

    assert_eq!(
        bot.upload_file(&path, "pdf").await.unwrap().as_deref(),
        Some("file_v2_1")
    );

    let body = api_requests(&server)[0].body_text();
    assert!(body.contains("name=\"file_type\""));
    assert!(body.contains("name=\"file_name\""));
    assert!(body.contains("report.pdf"));
}

#[tokio::test]
async fn test_download_image() {
    let (server, bot) = bot_with(|_| (200, "image-bytes".to_string())).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.png");

    assert!(bot.download_image("img_1", &path).await.unwrap());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "image-bytes");
    assert_eq!(api_requests(&server)[0].path, "/im/v1/images/img_1");
}

#[tokio::test]
async fn test_download_file_failure() {
    let (_server, bot) = bot_with(|_| (404, "{}".to_string())).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");

    assert!(!bot.download_file("file_1", &path).await.unwrap());
    assert!(!path.exists());
}

async fn webhook_server(reply: Value) -> MockServer {
    let reply = reply.to_string();
    MockServer::start(move |_| (200, reply.clone())).await
}

#[tokio::test]
async fn test_webhook_unsigned_text() {
    let server = webhook_server(json!({"code": 0, "msg": "success"})).await;
    let bot = LarkWebhookBot::new(format!("{}/hook/abc", server.base_url), "", "", "");

    assert!(bot.send_text("部署完成", true).await.unwrap());

    let req = &server.requests()[0];
    assert_eq!(req.path, "/hook/abc");
    let body = req.json();
    assert_eq!(body["msg_type"], "text");
    assert_eq!(
        body["content"]["text"],
        "部署完成 <at user_id=\"all\">所有人</at>"
    );
    assert!(body.get("timestamp").is_none());
    assert!(body.get("sign").is_none());
}

#[tokio::test]
async fn test_webhook_signed_payload() {
    let server = webhook_server(json!({"StatusCode": 0, "StatusMessage": "success"})).await;
    let bot = LarkWebhookBot::new(format!("{}/hook/abc", server.base_url), "demo-secret", "", "");

    assert!(bot.send_image("img_1").await.unwrap());

    let body = server.requests()[0].json();
    let timestamp = body["timestamp"].as_str().unwrap();
    let ts: i64 = timestamp.parse().unwrap();
    assert_eq!(
        body["sign"].as_str().unwrap(),
        webhook_signature(ts, "demo-secret").unwrap()
    );
    assert_eq!(body["content"]["image_key"], "img_1");
}

#[tokio::test]
async fn test_webhook_post_and_card() {
    let server = webhook_server(json!({"code": 0})).await;
    let bot = LarkWebhookBot::new(format!("{}/hook", server.base_url), "", "", "");

    let paragraphs = vec![vec![text_element("上线", false), at_element("all", "所有人")]];
    assert!(bot.send_post(paragraphs, "通知").await.unwrap());
    assert!(bot
        .send_interactive(json!({"elements": [{"tag": "div"}]}))
        .await
        .unwrap());

    let requests = server.requests();
    let post = requests[0].json();
    assert_eq!(post["content"]["post"]["zh_cn"]["title"], "通知");
    assert_eq!(post["content"]["post"]["zh_cn"]["content"][0][1]["tag"], "at");

    let card = requests[1].json();
    assert_eq!(card["msg_type"], "interactive");
    assert_eq!(card["card"]["elements"][0]["tag"], "div");
}

#[tokio::test]
async fn test_webhook_error_code_is_failure() {
    let server = webhook_server(json!({"code": 19021, "msg": "sign match fail or timestamp is not within one hour from current time"})).await;
    let bot = LarkWebhookBot::new(format!("{}/hook", server.base_url), "wrong", "", "");

    assert!(!bot.send_share_chat("oc_1").await.unwrap());
}

#[tokio::test]
async fn test_webhook_upload_image_needs_credentials() {
    let server = webhook_server(json!({"code": 0})).await;
    let bot = LarkWebhookBot::new(format!("{}/hook", server.base_url), "", "", "")
        .with_base_url(&server.base_url);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    std::fs::write(&path, b"png").unwrap();

    assert!(bot.upload_image(&path).await.unwrap().is_none());
    assert!(bot.upload_image(dir.path().join("missing.png")).await.unwrap().is_none());
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_webhook_upload_image() {
    let server = MockServer::start(|req| {
        if req.path == TOKEN_PATH {
            token_reply()
        } else {
            ok_reply(json!({"image_key": "img_v2_x"}))
        }
    })
    .await;
    let bot = LarkWebhookBot::new(format!("{}/hook", server.base_url), "", "cli_1", "s")
        .with_base_url(&server.base_url);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    std::fs::write(&path, b"png").unwrap();

    assert_eq!(bot.upload_image(&path).await.unwrap().as_deref(), Some("img_v2_x"));
    let upload = server.requests().into_iter().find(|r| r.path == "/im/v1/images").unwrap();
    assert_eq!(upload.header("authorization"), Some("Bearer t-test-token"));
}

#[tokio::test]
async fn test_webhook_string_code_is_failure() {
    let server = webhook_server(json!({"code": "19021", "msg": "sign match fail"})).await;
    let bot = LarkWebhookBot::new(format!("{}/hook", server.base_url), "", "", "");

    assert!(!bot.send_text("hi", false).await.unwrap());
}
