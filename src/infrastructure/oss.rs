//! 对象存储客户端
//!
//! 以虚拟主机方式访问 bucket（`https://{bucket}.{endpoint}`），每个请求都带
//! `Date` 与 `Authorization: OSS <id>:<signature>` 头。
//!
//! 远端返回非 2xx 时记录告警并返回 `false` / `None` / 空列表；
//! 传输错误和本地 I/O 错误通过 `Err` 返回。

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, DATE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::core::listing::{self, DirectoryItem};
use crate::core::signing::{content_md5, http_date, OssSigner};
use crate::errors::Result;
use crate::logger::{Sanitizer, Timer};

const CONTENT_MD5: &str = "Content-MD5";
const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain";
const MAX_KEYS: &str = "1000";
const TIMEOUT: Duration = Duration::from_secs(60);

/// 对象存储客户端
#[derive(Debug, Clone)]
pub struct ObjectStorageClient {
    base_url: String,
    signer: OssSigner,
    http: reqwest::Client,
}

impl ObjectStorageClient {
    /// 创建客户端
    pub fn new(
        endpoint: &str,
        bucket: &str,
        access_key_id: &str,
        access_key_secret: &str,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(TIMEOUT)
            .timeout(TIMEOUT)
            .build()?;

        debug!(
            bucket,
            endpoint,
            access_key_id = %Sanitizer::access_key(access_key_id),
            "object storage client created"
        );

        Ok(Self {
            base_url: format!("https://{}.{}", bucket, endpoint),
            signer: OssSigner::new(bucket, access_key_id, access_key_secret),
            http,
        })
    }

    /// 替换访问地址（自定义域名、本地测试服务）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bucket(&self) -> &str {
        self.signer.bucket()
    }

    /// key 按 `/` 分段转义后拼入 URL，签名仍使用原始 key
    fn object_url(&self, key: &str) -> String {
        let path: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.base_url, path.join("/"))
    }

    /// 构建带签名头的请求，`resource_key` 为参与签名的对象 key
    fn signed(
        &self,
        method: Method,
        url: &str,
        resource_key: &str,
        content_type: &str,
        content_md5: &str,
    ) -> Result<RequestBuilder> {
        let date = http_date(Utc::now());
        let authorization = self.signer.authorization(
            method.as_str(),
            content_type,
            content_md5,
            &date,
            resource_key,
        )?;

        let mut request = self
            .http
            .request(method, url)
            .header(DATE, date)
            .header(AUTHORIZATION, authorization);
        if !content_type.is_empty() {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if !content_md5.is_empty() {
            request = request.header(CONTENT_MD5, content_md5);
        }
        Ok(request)
    }

    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<bool> {
        let md5 = content_md5(&data);
        let response = self
            .signed(Method::PUT, &self.object_url(key), key, content_type, &md5)?
            .body(data)
            .send()
            .await?;

        if response.status().is_success() {
            info!(key, "uploaded object");
            Ok(true)
        } else {
            let status = response.status();
            let body = failure_body(response).await;
            warn!(key, %status, body = %body, "failed to upload object");
            Ok(false)
        }
    }

    /// 上传本地文件
    pub async fn upload_file(&self, key: &str, file_path: impl AsRef<Path>) -> Result<bool> {
        let file_path = file_path.as_ref();
        let _timer = Timer::new("oss.upload_file").with_subject(key);

        if !tokio::fs::try_exists(file_path).await? {
            warn!(path = %file_path.display(), "file does not exist");
            return Ok(false);
        }

        let data = tokio::fs::read(file_path).await?;
        self.put_object(key, data, OCTET_STREAM).await
    }

    /// 上传文本
    pub async fn upload_text(&self, key: &str, text: &str) -> Result<bool> {
        let _timer = Timer::new("oss.upload_text").with_subject(key);
        self.put_object(key, text.as_bytes().to_vec(), TEXT_PLAIN).await
    }

    /// 下载对象到 `root_dir/key`，未指定目录时保存到相对路径 `key`
    pub async fn download_file(&self, key: &str, root_dir: Option<&Path>) -> Result<bool> {
        let _timer = Timer::new("oss.download_file").with_subject(key);
        if !is_safe_relative_key(key) {
            warn!(key, "refusing to save object outside the target directory");
            return Ok(false);
        }
        let save_path = match root_dir {
            Some(root) => root.join(key),
            None => PathBuf::from(key),
        };

        if let Some(parent) = save_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .signed(Method::GET, &self.object_url(key), key, "", "")?
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = failure_body(response).await;
            warn!(key, %status, body = %body, "failed to download object");
            return Ok(false);
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(&save_path, &bytes).await?;
        info!(key, path = %save_path.display(), "downloaded object");
        Ok(true)
    }

    /// 列举全部对象
    pub async fn list_all_keys(&self) -> Result<Vec<String>> {
        self.list_keys_with_prefix("").await
    }

    /// 列举指定前缀的对象（最多 1000 个）
    pub async fn list_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut url = url::Url::parse(&format!("{}/", self.base_url))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("max-keys", MAX_KEYS);
            if !prefix.is_empty() {
                query.append_pair("prefix", prefix);
            }
        }

        let response = self.signed(Method::GET, url.as_str(), "", "", "")?.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = failure_body(response).await;
            warn!(prefix, %status, body = %body, "failed to list objects");
            return Ok(Vec::new());
        }

        let xml = response.text().await?;
        let keys = listing::extract_keys(&xml);
        debug!(prefix, count = keys.len(), "listed objects");
        Ok(keys)
    }

    /// 删除对象
    pub async fn delete_file(&self, key: &str) -> Result<bool> {
        let response = self
            .signed(Method::DELETE, &self.object_url(key), key, "", "")?
            .send()
            .await?;

        if response.status().is_success() {
            info!(key, "deleted object");
            Ok(true)
        } else {
            let status = response.status();
            let body = failure_body(response).await;
            warn!(key, %status, body = %body, "failed to delete object");
            Ok(false)
        }
    }

    /// 删除指定前缀的全部对象，全部成功才返回 `true`
    pub async fn delete_files_with_prefix(&self, prefix: &str) -> Result<bool> {
        let mut success = true;
        for key in self.list_keys_with_prefix(prefix).await? {
            if !self.delete_file(&key).await? {
                success = false;
            }
        }
        Ok(success)
    }

    /// 递归上传本地目录，对象 key 为 `prefix/相对路径`
    pub async fn upload_directory(&self, local_path: impl AsRef<Path>, prefix: &str) -> Result<bool> {
        let local_path = local_path.as_ref();
        let is_dir = tokio::fs::metadata(local_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            warn!(path = %local_path.display(), "cannot access directory");
            return Ok(false);
        }

        let mut success = true;
        for file in walk_files(local_path).await? {
            let Some(relative) = relative_key(local_path, &file) else {
                continue;
            };
            let key = if prefix.is_empty() {
                relative
            } else {
                format!("{}/{}", prefix.trim_end_matches('/'), relative)
            };
            if !self.upload_file(&key, &file).await? {
                success = false;
            }
        }
        Ok(success)
    }

    /// 下载前缀下的全部对象到本地目录；前缀下没有对象时返回 `false`
    pub async fn download_directory(&self, prefix: &str, local_path: impl AsRef<Path>) -> Result<bool> {
        let keys = self.list_keys_with_prefix(prefix).await?;
        if keys.is_empty() {
            warn!(prefix, "no objects found under prefix");
            return Ok(false);
        }
        self.download_keys(&keys, local_path.as_ref()).await
    }

    /// 下载前缀下的全部对象；前缀下没有对象时视为成功
    pub async fn download_files_with_prefix(&self, prefix: &str, root_dir: impl AsRef<Path>) -> Result<bool> {
        let keys = self.list_keys_with_prefix(prefix).await?;
        self.download_keys(&keys, root_dir.as_ref()).await
    }

    async fn download_keys(&self, keys: &[String], root_dir: &Path) -> Result<bool> {
        let mut success = true;
        for key in keys {
            if !self.download_file(key, Some(root_dir)).await? {
                success = false;
            }
        }
        Ok(success)
    }

    /// 列举前缀下一层的文件和目录
    pub async fn list_directory_contents(&self, prefix: &str) -> Result<Vec<DirectoryItem>> {
        let keys = self.list_keys_with_prefix(prefix).await?;
        Ok(listing::group_directory_contents(prefix, &keys))
    }

    /// 读取文本对象内容
    ///
    /// key 指向文件夹（以 `/` 结尾或下面还有对象）、对象不存在或读取失败时返回 `None`。
    pub async fn read_file_content(&self, key: &str) -> Result<Option<String>> {
        if key.ends_with('/') {
            warn!(key, "key is a folder");
            return Ok(None);
        }

        if self.has_children(key).await? {
            warn!(key, "key is a folder");
            return Ok(None);
        }

        let response = self
            .signed(Method::GET, &self.object_url(key), key, "", "")?
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let content = response.text().await?;
                info!(key, "read object content");
                Ok(Some(content))
            }
            StatusCode::NOT_FOUND => {
                warn!(key, "object does not exist");
                Ok(None)
            }
            status => {
                let body = failure_body(response).await;
                warn!(key, %status, body = %body, "failed to read object");
                Ok(None)
            }
        }
    }

    async fn has_children(&self, key: &str) -> Result<bool> {
        let mut url = url::Url::parse(&format!("{}/", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("prefix", &format!("{}/", key))
            .append_pair("delimiter", "/")
            .append_pair("max-keys", "1");

        let response = self.signed(Method::GET, url.as_str(), "", "", "")?.send().await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        Ok(listing::has_children(&response.text().await?))
    }
}

async fn failure_body(response: Response) -> String {
    response
        .text()
        .await
        .ok()
        .filter(|body| !body.is_empty())
        .unwrap_or_else(|| "unknown error".to_string())
}

/// 目录下全部普通文件，按路径排序
async fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// key 作为本地相对路径时只能由普通路径段组成
fn is_safe_relative_key(key: &str) -> bool {
    !key.is_empty()
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// 相对路径转为以 `/` 分隔的对象 key
fn relative_key(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
