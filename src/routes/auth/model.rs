use serde::{Deserialize, Serialize};

use crate::store::UserProfile;

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// 注册成功后返回用户和明文激活令牌（数据库里只保存摘要）
#[derive(Debug, Serialize)]
pub struct UserWithToken {
    #[serde(flatten)]
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: i64,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        let username = self.username.trim();
        if username.is_empty() || username.chars().count() > 100 {
            return Err("用户名长度必须在1到100个字符之间");
        }
        if !is_plausible_email(&self.email) || self.email.len() > 255 {
            return Err("邮箱格式无效");
        }
        if self.password.len() < 3 || self.password.len() > 72 {
            return Err("密码长度必须在3到72个字符之间");
        }
        Ok(())
    }
}

impl CreateTokenRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !is_plausible_email(&self.email) {
            return Err("邮箱格式无效");
        }
        if self.password.len() < 3 || self.password.len() > 72 {
            return Err("密码长度必须在3到72个字符之间");
        }
        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}
