use super::{CookieConsent, Db};

/// 新增浏览记录的字段集合
#[derive(Debug)]
pub struct PageViewRecord<'a> {
    pub path: &'a str,
    pub user_id: Option<i64>,
    pub user_agent: &'a str,
    pub ip: &'a str,
    pub referrer: &'a str,
    pub session_id: &'a str,
}

/// 浏览记录与 Cookie 同意的写入 / 查询接口
///
/// page_views 只追加，不更新不删除。
pub trait TrackingStore {
    /// 获取 [`Db`] 对象
    fn db(&self) -> &Db;

    /// 追加一条浏览记录
    fn insert_page_view(
        &self,
        record: PageViewRecord<'_>,
    ) -> impl Future<Output = Result<(), sqlx::Error>> {
        async move {
            sqlx::query(
                "
                INSERT INTO page_views (path, user_id, user_agent, ip, referrer, session_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(record.path.to_string())
            .bind(record.user_id)
            .bind(record.user_agent.to_string())
            .bind(record.ip.to_string())
            .bind(record.referrer.to_string())
            .bind(record.session_id.to_string())
            .execute(self.db())
            .await?;
            Ok(())
        }
    }

    /// 按 session 维度 upsert 同意记录
    fn upsert_consent(
        &self,
        session_id: &str,
        user_id: Option<i64>,
        flags: [bool; 4],
        ip: &str,
        user_agent: &str,
    ) -> impl Future<Output = Result<CookieConsent, sqlx::Error>> {
        let [necessary, analytics, marketing, functional] = flags;
        sqlx::query_as::<_, CookieConsent>(
            "
            INSERT INTO cookie_consents
                (session_id, user_id, necessary, analytics, marketing, functional,
                 consent_given, ip, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $8)
            ON CONFLICT (session_id) DO UPDATE SET
                user_id = COALESCE(EXCLUDED.user_id, cookie_consents.user_id),
                necessary = EXCLUDED.necessary,
                analytics = EXCLUDED.analytics,
                marketing = EXCLUDED.marketing,
                functional = EXCLUDED.functional,
                consent_given = TRUE,
                last_updated = now(),
                updated_at = now()
            RETURNING *
            ",
        )
        .bind(session_id.to_string())
        .bind(user_id)
        .bind(necessary)
        .bind(analytics)
        .bind(marketing)
        .bind(functional)
        .bind(ip.to_string())
        .bind(user_agent.to_string())
        .fetch_one(self.db())
    }

    /// 按 session 查询同意记录
    fn consent_by_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<CookieConsent>, sqlx::Error>> {
        sqlx::query_as::<_, CookieConsent>("SELECT * FROM cookie_consents WHERE session_id = $1")
            .bind(session_id.to_string())
            .fetch_optional(self.db())
    }

    /// 按用户查询最近一条同意记录
    fn consent_by_user(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Option<CookieConsent>, sqlx::Error>> {
        sqlx::query_as::<_, CookieConsent>(
            "
            SELECT * FROM cookie_consents
            WHERE user_id = $1
            ORDER BY last_updated DESC
            LIMIT 1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.db())
    }
}

impl TrackingStore for &Db {
    fn db(&self) -> &Db {
        self
    }
}
