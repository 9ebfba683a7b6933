//! 对象列举结果解析
//!
//! 列举接口返回 XML，这里只做 `<Key>` 子串扫描，不做完整的 XML 解析。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const KEY_OPEN: &str = "<Key>";
const KEY_CLOSE: &str = "</Key>";

/// 目录项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryItem {
    pub name: String,
    pub is_directory: bool,
}

/// 按文档顺序提取所有 `<Key>...</Key>` 的内容
///
/// 遇到没有闭合的 `<Key>` 时停止扫描。
pub fn extract_keys(xml: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut index = 0;

    while let Some(start) = xml[index..].find(KEY_OPEN).map(|i| i + index) {
        let body_start = start + KEY_OPEN.len();
        let Some(end) = xml[body_start..].find(KEY_CLOSE).map(|i| i + body_start) else {
            break;
        };
        keys.push(unescape_xml(&xml[body_start..end]));
        index = end + KEY_CLOSE.len();
    }

    keys
}

/// 还原 XML 预定义实体，`&amp;` 最后处理
fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// 列举结果中是否含有对象条目
pub fn has_contents(xml: &str) -> bool {
    xml.contains("<Contents>")
}

/// 带分隔符的列举结果中是否有子对象或子目录
pub fn has_children(xml: &str) -> bool {
    has_contents(xml) || xml.contains("<CommonPrefixes>")
}

/// 前缀规范化为以 `/` 结尾（空前缀保持为空）
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

/// 将一组 key 按前缀下的第一层分组为文件和目录
///
/// 目录排在前面，同类按名称升序。
pub fn group_directory_contents(prefix: &str, keys: &[String]) -> Vec<DirectoryItem> {
    let prefix = normalize_prefix(prefix);
    let mut contents: HashMap<&str, bool> = HashMap::new();

    for key in keys {
        let Some(relative) = key.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let mut parts = relative.split('/');
        let first = parts.next().unwrap_or_default();
        if first.is_empty() {
            continue;
        }
        // 只要后面还有路径段就是目录
        let is_directory = parts.next().is_some();
        contents.insert(first, is_directory);
    }

    let mut items: Vec<DirectoryItem> = contents
        .into_iter()
        .map(|(name, is_directory)| DirectoryItem {
            name: name.to_string(),
            is_directory,
        })
        .collect();

    items.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.cmp(&b.name))
    });
    items
}
