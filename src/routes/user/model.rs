use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::store::{FeedQuery, SortOrder};

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        let username = self.username.trim();
        if username.is_empty() || username.chars().count() > 100 {
            return Err("用户名长度必须在1到100个字符之间");
        }
        Ok(())
    }
}

/// 动态流的查询参数，`tags` 以逗号分隔
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    pub tags: Option<String>,
    pub search: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

impl FeedParams {
    pub fn into_query(self) -> Result<FeedQuery, &'static str> {
        let mut query = FeedQuery::default();

        if let Some(limit) = self.limit {
            if !(1..=20).contains(&limit) {
                return Err("limit 必须在1到20之间");
            }
            query.limit = limit;
        }
        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err("offset 不能为负数");
            }
            query.offset = offset;
        }
        if let Some(sort) = self.sort {
            query.sort = match sort.to_ascii_lowercase().as_str() {
                "asc" => SortOrder::Asc,
                "desc" => SortOrder::Desc,
                _ => return Err("sort 只能是 asc 或 desc"),
            };
        }
        if let Some(tags) = self.tags {
            query.tags = tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            if query.tags.len() > 5 {
                return Err("标签最多5个");
            }
        }
        if let Some(search) = self.search {
            if search.chars().count() > 100 {
                return Err("搜索内容最多100个字符");
            }
            query.search = search;
        }
        query.since = parse_time(self.since)?;
        query.until = parse_time(self.until)?;
        Ok(query)
    }
}

fn parse_time(raw: Option<String>) -> Result<Option<DateTime<Utc>>, &'static str> {
    match raw {
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| "时间必须是 RFC 3339 格式"),
        None => Ok(None),
    }
}
