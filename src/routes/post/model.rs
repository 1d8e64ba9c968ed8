use serde::{Deserialize, Serialize};

use crate::store::{Comment, Post};

const MAX_TITLE_CHARS: usize = 100;
const MAX_CONTENT_CHARS: usize = 1000;
const MAX_TAGS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// 只修改提供的字段；带上 `version` 时以它做冲突检查
#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub version: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

/// 帖子详情，带全部评论
#[derive(Debug, Serialize)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<Comment>,
}

fn check_title(title: &str) -> Result<(), &'static str> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
        return Err("标题长度必须在1到100个字符之间");
    }
    Ok(())
}

fn check_content(content: &str) -> Result<(), &'static str> {
    let content = content.trim();
    if content.is_empty() || content.chars().count() > MAX_CONTENT_CHARS {
        return Err("内容长度必须在1到1000个字符之间");
    }
    Ok(())
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        check_title(&self.title)?;
        check_content(&self.content)?;
        if self.tags.len() > MAX_TAGS {
            return Err("标签最多5个");
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err("标签不能为空");
        }
        Ok(())
    }
}

impl UpdatePostRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if let Some(content) = &self.content {
            check_content(content)?;
        }
        Ok(())
    }
}

impl CreateCommentRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        check_content(&self.content)
    }
}
