use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// 文章
///
/// `category` 保存分类 slug，`(category, slug)` 全局唯一。
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    pub cover_image: String,
    pub published: bool,
    /// 首次发布时间，未发布为 `None`
    pub published_at: Option<DateTime<Local>>,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

/// 分类
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

/// 访客用户
///
/// 首次以 name+email 登录时隐式创建，无密码。
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: String,
    /// 根据浏览路径推断出的偏好分类
    pub preferred_categories: Vec<String>,
    pub last_visited: DateTime<Local>,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

/// 评论行，带作者信息（JOIN users）
///
/// `upvotes` / `downvotes` 为投票用户 id 集合。
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub parent_id: Option<i64>,
    pub upvotes: Vec<i64>,
    pub downvotes: Vec<i64>,
    pub created_at: DateTime<Local>,
    pub author_name: String,
    pub author_email: String,
    pub author_avatar: String,
}

/// 文章投票方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Upvote,
    Downvote,
}

impl VoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteKind::Upvote => "upvote",
            VoteKind::Downvote => "downvote",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upvote" => Some(VoteKind::Upvote),
            "downvote" => Some(VoteKind::Downvote),
            _ => None,
        }
    }
}

/// 文章赞/踩计数
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow, Serialize)]
pub struct VoteCounts {
    pub upvotes: i64,
    pub downvotes: i64,
}

/// 订阅者
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    pub subscribed_at: DateTime<Local>,
    /// 随机退订令牌，全局唯一
    pub unsubscribe_token: String,
}

/// Cookie 同意记录，按 session 维度 upsert
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieConsent {
    pub id: i64,
    pub session_id: String,
    pub user_id: Option<i64>,
    pub necessary: bool,
    pub analytics: bool,
    pub marketing: bool,
    pub functional: bool,
    pub consent_given: bool,
    pub last_updated: DateTime<Local>,
}

/// 总访问量与独立访客数
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitStats {
    pub total_visits: i64,
    pub unique_visitors: i64,
}

/// 热门文章及互动计数
///
/// `engagement = upvotes + downvotes + comments`
#[derive(Debug, Clone, Serialize)]
pub struct PopularPost {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub category: String,
    pub views: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub comments: i64,
    pub engagement: i64,
}

/// 时间窗口内的互动指标
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMetrics {
    pub votes: i64,
    pub comments: i64,
    /// 平均停留时长（秒），无客户端埋点，固定估算值
    pub avg_time_on_site: i64,
}
