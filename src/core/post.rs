//! 富文本（post）消息内容构建

use serde::Serialize;
use serde_json::{json, Value};

const LOCALE: &str = "zh_cn";

/// 文本样式
pub const TEXT_STYLES: [&str; 4] = ["bold", "underline", "lineThrough", "italic"];

#[derive(Debug, Clone, Default, Serialize)]
struct LocalizedPost {
    title: String,
    content: Vec<Vec<Value>>,
}

/// 富文本消息内容，序列化为 `{"zh_cn": {"title": .., "content": [[..], ..]}}`
#[derive(Debug, Clone, Default)]
pub struct PostContent {
    post: LocalizedPost,
}

impl PostContent {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            post: LocalizedPost {
                title: title.into(),
                content: Vec::new(),
            },
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.post.title = title.into();
    }

    pub fn title(&self) -> &str {
        &self.post.title
    }

    /// 当前所有段落
    pub fn lines(&self) -> &[Vec<Value>] {
        &self.post.content
    }

    pub fn text_styles() -> Vec<&'static str> {
        TEXT_STYLES.to_vec()
    }

    pub fn make_text(text: &str, styles: &[&str], unescape: bool) -> Value {
        json!({"tag": "text", "text": text, "style": styles, "unescape": unescape})
    }

    pub fn make_link(text: &str, link: &str, styles: &[&str]) -> Value {
        json!({"tag": "a", "text": text, "href": link, "style": styles})
    }

    pub fn make_at(user_id: &str, styles: &[&str]) -> Value {
        json!({"tag": "at", "user_id": user_id, "style": styles})
    }

    pub fn make_image(image_key: &str) -> Value {
        json!({"tag": "img", "image_key": image_key})
    }

    pub fn make_media(file_key: &str, image_key: &str) -> Value {
        json!({"tag": "media", "file_key": file_key, "image_key": image_key})
    }

    pub fn make_emoji(emoji_type: &str) -> Value {
        json!({"tag": "emotion", "emoji_type": emoji_type})
    }

    pub fn make_hr() -> Value {
        json!({"tag": "hr"})
    }

    pub fn make_code_block(language: &str, text: &str) -> Value {
        json!({"tag": "code_block", "language": language, "text": text})
    }

    pub fn make_markdown(md_text: &str) -> Value {
        json!({"tag": "md", "text": md_text})
    }

    /// 追加到最后一行，没有行时先新建一行
    pub fn add_content_in_line(&mut self, content: Value) {
        self.last_line().push(content);
    }

    pub fn add_contents_in_line(&mut self, contents: impl IntoIterator<Item = Value>) {
        self.last_line().extend(contents);
    }

    pub fn add_content_in_new_line(&mut self, content: Value) {
        self.post.content.push(vec![content]);
    }

    pub fn add_contents_in_new_line(&mut self, contents: impl IntoIterator<Item = Value>) {
        self.post.content.push(contents.into_iter().collect());
    }

    fn last_line(&mut self) -> &mut Vec<Value> {
        if self.post.content.is_empty() {
            self.post.content.push(Vec::new());
        }
        let last = self.post.content.len() - 1;
        &mut self.post.content[last]
    }

    pub fn to_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(LOCALE.to_string(), json!(self.post));
        Value::Object(map)
    }
}

impl Serialize for PostContent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(LOCALE, &self.post)?;
        map.end()
    }
}
