use super::{Comment, Db, VoteCounts, VoteKind};

const COMMENT_COLUMNS: &str = "
    c.id, c.post_id, c.user_id, c.content, c.parent_id,
    c.upvotes, c.downvotes, c.created_at,
    u.name AS author_name, u.email AS author_email, u.avatar AS author_avatar
";

/// 评论的读写接口
///
/// 评论固定两层：顶层按时间倒序，回复按时间正序。
pub trait CommentStore {
    /// 获取 [`Db`] 对象
    fn db(&self) -> &Db;

    /// 查询文章的顶层评论，最新在前
    fn top_level_comments(
        &self,
        post_id: i64,
    ) -> impl Future<Output = Result<Vec<Comment>, sqlx::Error>> {
        async move {
            let sql = format!(
                "
                SELECT {COMMENT_COLUMNS}
                FROM comments c
                INNER JOIN users u ON c.user_id = u.id
                WHERE c.post_id = $1 AND c.parent_id IS NULL
                ORDER BY c.created_at DESC
                "
            );
            sqlx::query_as::<_, Comment>(&sql)
                .bind(post_id)
                .fetch_all(self.db())
                .await
        }
    }

    /// 查询一批顶层评论的全部回复，最早在前
    fn replies_of(
        &self,
        parent_ids: &[i64],
    ) -> impl Future<Output = Result<Vec<Comment>, sqlx::Error>> {
        async move {
            let sql = format!(
                "
                SELECT {COMMENT_COLUMNS}
                FROM comments c
                INNER JOIN users u ON c.user_id = u.id
                WHERE c.parent_id = ANY($1)
                ORDER BY c.created_at ASC
                "
            );
            sqlx::query_as::<_, Comment>(&sql)
                .bind(parent_ids.to_vec())
                .fetch_all(self.db())
                .await
        }
    }

    /// 按 id 查询单条评论
    fn comment_by_id(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<Comment>, sqlx::Error>> {
        async move {
            let sql = format!(
                "
                SELECT {COMMENT_COLUMNS}
                FROM comments c
                INNER JOIN users u ON c.user_id = u.id
                WHERE c.id = $1
                "
            );
            sqlx::query_as::<_, Comment>(&sql)
                .bind(id)
                .fetch_optional(self.db())
                .await
        }
    }

    /// 插入评论，返回带作者信息的完整行
    fn insert_comment(
        &self,
        post_id: i64,
        user_id: i64,
        content: &str,
        parent_id: Option<i64>,
    ) -> impl Future<Output = Result<Option<Comment>, sqlx::Error>> {
        async move {
            let id: i64 = sqlx::query_scalar(
                "
                INSERT INTO comments (post_id, user_id, content, parent_id)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                ",
            )
            .bind(post_id)
            .bind(user_id)
            .bind(content.to_string())
            .bind(parent_id)
            .fetch_one(self.db())
            .await?;

            self.comment_by_id(id).await
        }
    }

    /// 覆写评论的赞/踩用户集合
    fn set_comment_votes(
        &self,
        id: i64,
        upvotes: &[i64],
        downvotes: &[i64],
    ) -> impl Future<Output = Result<(), sqlx::Error>> {
        async move {
            sqlx::query(
                "UPDATE comments SET upvotes = $2, downvotes = $3, updated_at = now() WHERE id = $1",
            )
            .bind(id)
            .bind(upvotes.to_vec())
            .bind(downvotes.to_vec())
            .execute(self.db())
            .await?;
            Ok(())
        }
    }

    /// 统计文章评论数（含回复）
    fn comments_count(&self, post_id: i64) -> impl Future<Output = Result<i64, sqlx::Error>> {
        sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db())
    }
}

impl CommentStore for &Db {
    fn db(&self) -> &Db {
        self
    }
}

/// 文章投票的读写接口
///
/// `(post_id, user_id)` 唯一索引是唯一的并发控制手段，
/// 同一用户并发重复投票会以 duplicate-key 失败收场。
pub trait VoteStore {
    /// 获取 [`Db`] 对象
    fn db(&self) -> &Db;

    /// 查询用户在某篇文章上的投票方向
    fn vote_of(
        &self,
        post_id: i64,
        user_id: i64,
    ) -> impl Future<Output = Result<Option<VoteKind>, sqlx::Error>> {
        async move {
            let kind: Option<String> =
                sqlx::query_scalar("SELECT kind FROM post_votes WHERE post_id = $1 AND user_id = $2")
                    .bind(post_id)
                    .bind(user_id)
                    .fetch_optional(self.db())
                    .await?;
            Ok(kind.as_deref().and_then(VoteKind::parse))
        }
    }

    /// 插入新投票
    fn insert_vote(
        &self,
        post_id: i64,
        user_id: i64,
        kind: VoteKind,
    ) -> impl Future<Output = Result<(), sqlx::Error>> {
        async move {
            sqlx::query("INSERT INTO post_votes (post_id, user_id, kind) VALUES ($1, $2, $3)")
                .bind(post_id)
                .bind(user_id)
                .bind(kind.as_str())
                .execute(self.db())
                .await?;
            Ok(())
        }
    }

    /// 改写已有投票的方向
    fn update_vote(
        &self,
        post_id: i64,
        user_id: i64,
        kind: VoteKind,
    ) -> impl Future<Output = Result<(), sqlx::Error>> {
        async move {
            sqlx::query(
                "UPDATE post_votes SET kind = $3, updated_at = now() WHERE post_id = $1 AND user_id = $2",
            )
            .bind(post_id)
            .bind(user_id)
            .bind(kind.as_str())
            .execute(self.db())
            .await?;
            Ok(())
        }
    }

    /// 撤回投票
    fn remove_vote(
        &self,
        post_id: i64,
        user_id: i64,
    ) -> impl Future<Output = Result<(), sqlx::Error>> {
        async move {
            sqlx::query("DELETE FROM post_votes WHERE post_id = $1 AND user_id = $2")
                .bind(post_id)
                .bind(user_id)
                .execute(self.db())
                .await?;
            Ok(())
        }
    }

    /// 统计文章的赞/踩数量
    fn vote_counts(
        &self,
        post_id: i64,
    ) -> impl Future<Output = Result<VoteCounts, sqlx::Error>> {
        sqlx::query_as::<_, VoteCounts>(
            "
            SELECT
                COUNT(*) FILTER (WHERE kind = 'upvote') AS upvotes,
                COUNT(*) FILTER (WHERE kind = 'downvote') AS downvotes
            FROM post_votes
            WHERE post_id = $1
            ",
        )
        .bind(post_id)
        .fetch_one(self.db())
    }
}

impl VoteStore for &Db {
    fn db(&self) -> &Db {
        self
    }
}
