use std::env;

/// 默认站点地址，`SITE_URL` 未设置时使用
const DEFAULT_SITE_URL: &str = "http://localhost:3000";

/// 应用配置
///
/// 全部来源于环境变量，源码中不保留任何凭据字面量。
#[derive(Debug, Clone)]
pub struct Config {
    /// 站点基础 URL，用于拼接邮件里的退订链接和 sitemap 绝对地址
    pub site_url: String,
    /// 管理后台密码，登录接口与其比对
    pub admin_password: String,
    /// SMTP 配置，缺省时邮件发送降级为日志输出
    pub smtp: Option<SmtpConfig>,
}

/// SMTP 凭据
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// 发件人地址，形如 `"Blog" <no-reply@example.com>`
    pub from: String,
}

impl Config {
    /// 从环境变量读取配置
    ///
    /// - `SITE_URL`：可选，缺省为 [`DEFAULT_SITE_URL`]
    /// - `ADMIN_PASSWORD`：必需
    /// - `SMTP_HOST` / `SMTP_USERNAME` / `SMTP_PASSWORD` / `MAIL_FROM`：
    ///   整组可选，只设置部分时 panic
    pub fn from_env() -> Self {
        let site_url = env::var("SITE_URL")
            .unwrap_or_else(|_| DEFAULT_SITE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let admin_password = env::var("ADMIN_PASSWORD").expect("环境变量: `ADMIN_PASSWORD`: NotPresent");

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                username: env::var("SMTP_USERNAME").expect("环境变量: `SMTP_USERNAME`: NotPresent"),
                password: env::var("SMTP_PASSWORD").expect("环境变量: `SMTP_PASSWORD`: NotPresent"),
                from: env::var("MAIL_FROM").expect("环境变量: `MAIL_FROM`: NotPresent"),
            }),
            Err(_) => None,
        };

        Self {
            site_url,
            admin_password,
            smtp,
        }
    }

    /// 退订链接
    pub fn unsubscribe_url(&self, token: &str) -> String {
        format!("{}/unsubscribe?token={}", self.site_url, token)
    }
}
