use chrono::{DateTime, Local};

use super::{Db, VisitStats};

/// PageView 聚合查询接口
///
/// 全部为描述性统计，每次调用重扫时间窗口，无流式/增量成分。
/// 聚合结果一律落到显式 schema（见 [`super::models`] 与 [`crate::analytics`]），
/// 不向调用方暴露松散行。
pub trait AnalyticsQuery {
    /// 获取 [`Db`] 对象
    fn db(&self) -> &Db;

    /// 时间窗口内的总访问量与独立访客数
    ///
    /// 独立访客按 `user_id`、`session_id`、`ip` 依次取第一个非空值去重。
    fn visit_stats(
        &self,
        since: DateTime<Local>,
    ) -> impl Future<Output = Result<VisitStats, sqlx::Error>> {
        sqlx::query_as::<_, VisitStats>(
            "
            SELECT
                COUNT(*) AS total_visits,
                COUNT(DISTINCT COALESCE(user_id::text, NULLIF(session_id, ''), ip))
                    AS unique_visitors
            FROM page_views
            WHERE created_at >= $1
            ",
        )
        .bind(since)
        .fetch_one(self.db())
    }

    /// 按天分组的访问量，缺失天数由调用方补零
    fn daily_counts(
        &self,
        since: DateTime<Local>,
    ) -> impl Future<Output = Result<Vec<(String, i64)>, sqlx::Error>> {
        sqlx::query_as::<_, (String, i64)>(
            "
            SELECT to_char(created_at, 'YYYY-MM-DD') AS day, COUNT(*)
            FROM page_views
            WHERE created_at >= $1
            GROUP BY day
            ORDER BY day
            ",
        )
        .bind(since)
        .fetch_all(self.db())
    }

    /// 按 referrer 原值分组计数，空 referrer 不在其中
    fn referrer_counts(
        &self,
        since: DateTime<Local>,
    ) -> impl Future<Output = Result<Vec<(String, i64)>, sqlx::Error>> {
        sqlx::query_as::<_, (String, i64)>(
            "
            SELECT referrer, COUNT(*)
            FROM page_views
            WHERE created_at >= $1 AND referrer <> ''
            GROUP BY referrer
            ",
        )
        .bind(since)
        .fetch_all(self.db())
    }

    /// 无 referrer 的直接访问量
    fn direct_visits(
        &self,
        since: DateTime<Local>,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> {
        sqlx::query_scalar("SELECT COUNT(*) FROM page_views WHERE created_at >= $1 AND referrer = ''")
            .bind(since)
            .fetch_one(self.db())
    }

    /// 按 user-agent 原值分组计数，设备/浏览器归类在应用层做
    fn user_agent_counts(
        &self,
        since: DateTime<Local>,
    ) -> impl Future<Output = Result<Vec<(String, i64)>, sqlx::Error>> {
        sqlx::query_as::<_, (String, i64)>(
            "
            SELECT user_agent, COUNT(*)
            FROM page_views
            WHERE created_at >= $1 AND user_agent <> ''
            GROUP BY user_agent
            ",
        )
        .bind(since)
        .fetch_all(self.db())
    }

    /// 浏览量最高的文章路径（形如 `/{category}/{slug}`）
    fn popular_paths(
        &self,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<(String, i64)>, sqlx::Error>> {
        sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT path, COUNT(*) AS views
            FROM page_views
            WHERE path ~ '^/[^/]+/[^/]+$'
            GROUP BY path
            ORDER BY views DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.db())
    }

    /// 时间窗口内的投票总数
    fn votes_since(
        &self,
        since: DateTime<Local>,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> {
        sqlx::query_scalar("SELECT COUNT(*) FROM post_votes WHERE created_at >= $1")
            .bind(since)
            .fetch_one(self.db())
    }

    /// 时间窗口内的评论总数
    fn comments_since(
        &self,
        since: DateTime<Local>,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> {
        sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE created_at >= $1")
            .bind(since)
            .fetch_one(self.db())
    }
}

impl AnalyticsQuery for &Db {
    fn db(&self) -> &Db {
        self
    }
}
