//! 请求签名
//!
//! - 对象存储：`METHOD\nCONTENT-MD5\nCONTENT-TYPE\nDATE\n/bucket/key` 的 HMAC-SHA1
//! - 机器人 Webhook：`timestamp\nsecret` 的 HMAC-SHA256
//!
//! 两者都是纯函数，相同输入总得到相同输出。

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use serde_json::Value;
use sha1::Sha1;
use sha2::Sha256;

use crate::errors::{ClientError, Result};

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// 对象存储签名器
#[derive(Clone)]
pub struct OssSigner {
    bucket: String,
    access_key_id: String,
    access_key_secret: String,
}

impl OssSigner {
    pub fn new(
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// `/bucket/key`，key 为空时为 `/bucket/`
    pub fn canonicalized_resource(&self, key: &str) -> String {
        format!("/{}/{}", self.bucket, key)
    }

    /// 待签名字符串
    pub fn string_to_sign(
        &self,
        method: &str,
        content_md5: &str,
        content_type: &str,
        date: &str,
        key: &str,
    ) -> String {
        [
            method,
            content_md5,
            content_type,
            date,
            &self.canonicalized_resource(key),
        ]
        .join("\n")
    }

    /// 生成 `Authorization` 头：`OSS <access-key-id>:<signature>`
    pub fn authorization(
        &self,
        method: &str,
        content_type: &str,
        content_md5: &str,
        date: &str,
        key: &str,
    ) -> Result<String> {
        let string_to_sign = self.string_to_sign(method, content_md5, content_type, date, key);
        let signature = hmac_sha1_base64(
            self.access_key_secret.as_bytes(),
            string_to_sign.as_bytes(),
        )?;
        Ok(format!("OSS {}:{}", self.access_key_id, signature))
    }
}

impl std::fmt::Debug for OssSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OssSigner")
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"***")
            .finish()
    }
}

/// HMAC-SHA1 后做标准 Base64 编码
pub fn hmac_sha1_base64(key: &[u8], message: &[u8]) -> Result<String> {
    let mut mac =
        HmacSha1::new_from_slice(key).map_err(|e| ClientError::Config(e.to_string()))?;
    mac.update(message);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// `Content-MD5` 头：MD5 摘要的 Base64
pub fn content_md5(data: &[u8]) -> String {
    STANDARD.encode(Md5::digest(data))
}

/// RFC 1123 格式的 GMT 时间，例如 `Thu, 17 Nov 2005 18:49:58 GMT`
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Webhook 签名：以 secret 为密钥对 `timestamp\nsecret` 做 HMAC-SHA256
pub fn webhook_signature(timestamp: i64, secret: &str) -> Result<String> {
    let string_to_sign = format!("{}\n{}", timestamp, secret);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ClientError::Config(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// 为 Webhook 负载附加 `timestamp` 与 `sign`
///
/// secret 为空时不做任何修改（未签名的 Webhook 是合法配置）。
pub fn sign_webhook_payload(payload: &mut Value, secret: &str, timestamp: i64) -> Result<()> {
    if secret.is_empty() {
        return Ok(());
    }
    let sign = webhook_signature(timestamp, secret)?;
    if let Value::Object(map) = payload {
        map.insert("timestamp".to_string(), Value::String(timestamp.to_string()));
        map.insert("sign".to_string(), Value::String(sign));
    }
    Ok(())
}
