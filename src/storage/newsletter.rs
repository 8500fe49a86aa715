use super::{Db, Subscriber};

/// 订阅者的读写接口
pub trait NewsletterStore {
    /// 获取 [`Db`] 对象
    fn db(&self) -> &Db;

    /// 按 email 查询订阅者，不区分激活状态
    fn subscriber_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<Subscriber>, sqlx::Error>> {
        sqlx::query_as::<_, Subscriber>("SELECT * FROM newsletter_subscribers WHERE email = $1")
            .bind(email.to_string())
            .fetch_optional(self.db())
    }

    /// 按退订令牌查询订阅者
    fn subscriber_by_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<Subscriber>, sqlx::Error>> {
        sqlx::query_as::<_, Subscriber>(
            "SELECT * FROM newsletter_subscribers WHERE unsubscribe_token = $1",
        )
        .bind(token.to_string())
        .fetch_optional(self.db())
    }

    /// 新增订阅者
    fn insert_subscriber(
        &self,
        email: &str,
        token: &str,
    ) -> impl Future<Output = Result<Subscriber, sqlx::Error>> {
        sqlx::query_as::<_, Subscriber>(
            "
            INSERT INTO newsletter_subscribers (email, unsubscribe_token)
            VALUES ($1, $2)
            RETURNING *
            ",
        )
        .bind(email.to_string())
        .bind(token.to_string())
        .fetch_one(self.db())
    }

    /// 重新激活订阅，保留原令牌，刷新订阅时间
    fn reactivate_subscriber(&self, id: i64) -> impl Future<Output = Result<(), sqlx::Error>> {
        async move {
            sqlx::query(
                "
                UPDATE newsletter_subscribers
                SET is_active = TRUE, subscribed_at = now(), updated_at = now()
                WHERE id = $1
                ",
            )
            .bind(id)
            .execute(self.db())
            .await?;
            Ok(())
        }
    }

    /// 停用订阅
    fn deactivate_subscriber(&self, id: i64) -> impl Future<Output = Result<(), sqlx::Error>> {
        async move {
            sqlx::query(
                "
                UPDATE newsletter_subscribers
                SET is_active = FALSE, updated_at = now()
                WHERE id = $1
                ",
            )
            .bind(id)
            .execute(self.db())
            .await?;
            Ok(())
        }
    }

    /// 查询全部激活订阅者，最近订阅在前
    fn active_subscribers(&self) -> impl Future<Output = Result<Vec<Subscriber>, sqlx::Error>> {
        sqlx::query_as::<_, Subscriber>(
            "
            SELECT * FROM newsletter_subscribers
            WHERE is_active = TRUE
            ORDER BY subscribed_at DESC
            ",
        )
        .fetch_all(self.db())
    }
}

impl NewsletterStore for &Db {
    fn db(&self) -> &Db {
        self
    }
}
