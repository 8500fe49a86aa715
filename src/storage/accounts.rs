use super::{Db, User};

/// 访客用户的读写接口
///
/// 无密码：email 命中即登录，未命中则隐式建号。
pub trait UserStore {
    /// 获取 [`Db`] 对象
    fn db(&self) -> &Db;

    /// 按 email 查询用户
    fn user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, sqlx::Error>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.to_string())
            .fetch_optional(self.db())
    }

    /// 按 id 查询用户
    fn user_by_id(&self, id: i64) -> impl Future<Output = Result<Option<User>, sqlx::Error>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db())
    }

    /// 创建用户
    fn insert_user(
        &self,
        name: &str,
        email: &str,
    ) -> impl Future<Output = Result<User, sqlx::Error>> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING *",
        )
        .bind(name.to_string())
        .bind(email.to_string())
        .fetch_one(self.db())
    }

    /// 刷新最近访问时间
    fn touch_last_visited(&self, id: i64) -> impl Future<Output = Result<(), sqlx::Error>> {
        async move {
            sqlx::query("UPDATE users SET last_visited = now(), updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(self.db())
                .await?;
            Ok(())
        }
    }

    /// 记录偏好分类并刷新最近访问时间，已存在的分类不重复追加
    fn add_preferred_category(
        &self,
        id: i64,
        category: &str,
    ) -> impl Future<Output = Result<(), sqlx::Error>> {
        async move {
            sqlx::query(
                "
                UPDATE users SET
                    preferred_categories = CASE
                        WHEN $2 = ANY(preferred_categories) THEN preferred_categories
                        ELSE array_append(preferred_categories, $2)
                    END,
                    last_visited = now(),
                    updated_at = now()
                WHERE id = $1
                ",
            )
            .bind(id)
            .bind(category.to_string())
            .execute(self.db())
            .await?;
            Ok(())
        }
    }
}

impl UserStore for &Db {
    fn db(&self) -> &Db {
        self
    }
}
