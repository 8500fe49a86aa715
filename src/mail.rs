use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;

/// 邮件正文
#[derive(Debug, Clone)]
pub enum MailBody {
    Html(String),
    Text(String),
}

/// 群发结果汇总
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// 邮件发送器
///
/// 封装 SMTP 传输。未配置 SMTP 时降级为日志输出，
/// 便于本地开发和测试环境运行。
#[derive(Clone)]
pub struct Mailer {
    transport: Transport,
    from: String,
}

#[derive(Clone)]
enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Noop,
}

impl Mailer {
    /// 根据配置创建发送器
    ///
    /// - Panics
    ///
    /// SMTP 主机名无法解析为 relay 时 panic。
    pub fn from_config(config: &Config) -> Self {
        match &config.smtp {
            Some(smtp) => {
                let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
                    .expect("Failed to build SMTP relay")
                    .credentials(Credentials::new(
                        smtp.username.clone(),
                        smtp.password.clone(),
                    ))
                    .build();

                Self {
                    transport: Transport::Smtp(transport),
                    from: smtp.from.clone(),
                }
            }
            None => {
                tracing::warn!("SMTP not configured, mail delivery degraded to logging");
                Self {
                    transport: Transport::Noop,
                    from: "blogd <no-reply@localhost>".to_string(),
                }
            }
        }
    }

    /// 发送单封邮件
    pub async fn send(&self, to: &str, subject: &str, body: &MailBody) -> Result<()> {
        match &self.transport {
            Transport::Smtp(transport) => {
                let builder = Message::builder()
                    .from(self.from.parse::<Mailbox>()?)
                    .to(to.parse::<Mailbox>()?)
                    .subject(subject);

                let message = match body {
                    MailBody::Html(html) => builder
                        .header(ContentType::TEXT_HTML)
                        .body(html.clone())?,
                    MailBody::Text(text) => builder
                        .header(ContentType::TEXT_PLAIN)
                        .body(text.clone())?,
                };

                transport.send(message).await?;
                Ok(())
            }
            Transport::Noop => {
                tracing::info!(%to, %subject, "mail delivery skipped (no SMTP)");
                Ok(())
            }
        }
    }

    /// 逐个发送个性化邮件并汇总结果
    ///
    /// 单个收件人失败只记日志，不中断批次。
    pub async fn send_each(
        &self,
        mails: impl IntoIterator<Item = (String, MailBody)>,
        subject: &str,
    ) -> BulkSummary {
        let mut summary = BulkSummary::default();

        for (to, body) in mails {
            summary.total += 1;
            match self.send(&to, subject, &body).await {
                Ok(_) => summary.successful += 1,
                Err(e) => {
                    tracing::error!(%to, %e, "failed to send newsletter mail");
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

/// 订阅欢迎邮件主题
pub const WELCOME_SUBJECT: &str = "Welcome to the Blog Newsletter!";

/// 生成订阅欢迎邮件正文，内含个性化退订链接
pub fn welcome_body(config: &Config, token: &str) -> MailBody {
    let unsubscribe_url = config.unsubscribe_url(token);
    let site_url = &config.site_url;

    MailBody::Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<body style="margin: 0; padding: 0; font-family: Arial, sans-serif; background-color: #f5f5f5;">
  <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff; padding: 40px 20px;">
    <h1 style="color: #333333; font-size: 28px;">Subscription Confirmed!</h1>
    <p style="color: #555555; font-size: 16px; line-height: 1.6;">
      Your newsletter subscription has been successfully confirmed. You'll now
      receive updates about new blog posts and exclusive content.
    </p>
    <p style="text-align: center; margin: 30px 0;">
      <a href="{site_url}"
         style="background-color: #28a745; color: #ffffff; text-decoration: none; padding: 15px 30px; border-radius: 5px; font-weight: bold;">
        Visit the Blog
      </a>
    </p>
    <p style="color: #999999; font-size: 12px; border-top: 1px solid #e9ecef; padding-top: 20px;">
      You can <a href="{unsubscribe_url}" style="color: #007bff;">unsubscribe</a>
      from this newsletter at any time.
    </p>
  </div>
</body>
</html>"#
    ))
}

/// 退订令牌占位符，群发时逐收件人替换
const TOKEN_PLACEHOLDER: &str = "{{UNSUBSCRIBE_TOKEN}}";

/// 为单个订阅者生成个性化的简报正文
///
/// 在原始内容后追加退订页脚，并替换令牌占位符。
pub fn personalized_newsletter(
    config: &Config,
    content: &str,
    is_html: bool,
    token: &str,
) -> MailBody {
    let footer = if is_html {
        format!(
            r#"<br><br><hr><p style="font-size: 12px; color: #666;">
You can <a href="{}/unsubscribe?token={TOKEN_PLACEHOLDER}">unsubscribe</a> from this newsletter at any time.
</p>"#,
            config.site_url
        )
    } else {
        format!(
            "\n\n---\nUnsubscribe from this newsletter: {}/unsubscribe?token={TOKEN_PLACEHOLDER}",
            config.site_url
        )
    };

    // 占位符在整个正文里替换，内容本身也可以携带
    let body = format!("{content}{footer}").replace(TOKEN_PLACEHOLDER, token);

    if is_html {
        MailBody::Html(body)
    } else {
        MailBody::Text(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            site_url: "https://blog.example.com".to_string(),
            admin_password: "secret".to_string(),
            smtp: None,
        }
    }

    #[test]
    fn test_welcome_body_contains_unsubscribe_link() {
        let MailBody::Html(html) = welcome_body(&test_config(), "tok123") else {
            panic!("欢迎邮件应为 HTML");
        };
        assert!(html.contains("https://blog.example.com/unsubscribe?token=tok123"));
    }

    #[test]
    fn test_personalized_newsletter_substitutes_token() {
        let config = test_config();

        let MailBody::Text(text) =
            personalized_newsletter(&config, "hello", false, "abc") else {
            panic!("应为纯文本");
        };
        assert!(text.starts_with("hello"));
        assert!(text.contains("unsubscribe?token=abc"));
        assert!(!text.contains(TOKEN_PLACEHOLDER));

        let MailBody::Html(html) = personalized_newsletter(&config, "<p>hi</p>", true, "xyz")
        else {
            panic!("应为 HTML");
        };
        assert!(html.contains("unsubscribe?token=xyz"));
    }
}
