use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use super::current_user_id;
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::storage::{Comment, CommentStore, ContentQuery, Db, VoteKind, VoteStore};

/// 配置评论与投票路由。
///
/// 路由包括：
/// - `GET /posts/{id}/comments`：两层评论树
/// - `POST /posts/{id}/comments`：发表评论或回复
/// - `POST /posts/{id}/vote`：对文章投票（切换语义）
/// - `GET /posts/{id}/votes`：文章赞/踩计数
/// - `GET /posts/{id}/votes/me`：当前用户的投票方向
/// - `POST /comments/{id}/vote`：对评论投票（切换语义）
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route(
            "/posts/{id}/comments",
            get(comments_tree).post(create_comment),
        )
        .route("/posts/{id}/vote", post(vote_post))
        .route("/posts/{id}/votes", get(post_votes))
        .route("/posts/{id}/votes/me", get(my_vote))
        .route("/comments/{id}/vote", post(vote_comment))
}

/// 评论树节点：评论本体、票数与回复列表
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    #[serde(flatten)]
    comment: Comment,
    upvote_count: usize,
    downvote_count: usize,
    replies: Vec<CommentNode>,
}

impl CommentNode {
    fn new(comment: Comment, replies: Vec<CommentNode>) -> Self {
        Self {
            upvote_count: comment.upvotes.len(),
            downvote_count: comment.downvotes.len(),
            comment,
            replies,
        }
    }
}

/// 获取文章的评论树。
///
/// 顶层按时间倒序，回复按时间正序，固定两层。
async fn comments_tree(
    Path(post_id): Path<i64>,
    State(pool): State<Db>,
) -> Result<Json<Vec<CommentNode>>> {
    let top_level = (&pool).top_level_comments(post_id).await?;

    let parent_ids: Vec<i64> = top_level.iter().map(|c| c.id).collect();
    let replies = (&pool).replies_of(&parent_ids).await?;

    let mut by_parent: HashMap<i64, Vec<Comment>> = HashMap::new();
    for reply in replies {
        if let Some(parent_id) = reply.parent_id {
            by_parent.entry(parent_id).or_default().push(reply);
        }
    }

    let tree = top_level
        .into_iter()
        .map(|comment| {
            let children = by_parent
                .remove(&comment.id)
                .unwrap_or_default()
                .into_iter()
                .map(|r| CommentNode::new(r, Vec::new()))
                .collect();
            CommentNode::new(comment, children)
        })
        .collect();

    Ok(Json(tree))
}

/// 发表评论的请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    content: String,
    #[serde(default)]
    parent_id: Option<i64>,
}

/// 评论创建响应
#[derive(Debug, Serialize)]
pub struct CommentCreated {
    success: bool,
    comment: CommentNode,
}

/// 发表评论或回复。
///
/// 需要用户 cookie。文章必须存在；回复的父评论必须存在、属于同一篇
/// 文章且本身是顶层评论（数据模型只允许一层回复）。
async fn create_comment(
    Path(post_id): Path<i64>,
    jar: CookieJar,
    State(pool): State<Db>,
    Json(body): Json<NewComment>,
) -> Result<Json<CommentCreated>> {
    let user_id = current_user_id(&jar).ok_or(Error::Unauthorized)?;

    if body.content.trim().is_empty() {
        return Err(Error::Validation("Comment content is required"));
    }

    (&pool).post_by_id(post_id).await?.ok_or(Error::NotFound)?;

    if let Some(parent_id) = body.parent_id {
        let parent = (&pool)
            .comment_by_id(parent_id)
            .await?
            .ok_or(Error::NotFound)?;
        if parent.post_id != post_id {
            return Err(Error::Validation("Parent comment belongs to another post"));
        }
        if parent.parent_id.is_some() {
            return Err(Error::Validation("Replies cannot be nested further"));
        }
    }

    let comment = (&pool)
        .insert_comment(post_id, user_id, body.content.trim(), body.parent_id)
        .await?
        .ok_or(Error::NotFound)?;

    Ok(Json(CommentCreated {
        success: true,
        comment: CommentNode::new(comment, Vec::new()),
    }))
}

/// 投票请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    vote_type: VoteKind,
}

/// 文章投票响应，带最新计数
#[derive(Debug, Serialize)]
pub struct PostVoteResponse {
    success: bool,
    upvotes: i64,
    downvotes: i64,
    message: String,
}

/// 对文章投票。
///
/// 切换语义：重复同向投票撤回，换向改写已有记录。
async fn vote_post(
    Path(post_id): Path<i64>,
    jar: CookieJar,
    State(pool): State<Db>,
    Json(body): Json<VoteRequest>,
) -> Result<Json<PostVoteResponse>> {
    let user_id = current_user_id(&jar).ok_or(Error::Unauthorized)?;

    (&pool).post_by_id(post_id).await?.ok_or(Error::NotFound)?;

    match (&pool).vote_of(post_id, user_id).await? {
        Some(existing) if existing == body.vote_type => {
            (&pool).remove_vote(post_id, user_id).await?;
        }
        Some(_) => {
            (&pool).update_vote(post_id, user_id, body.vote_type).await?;
        }
        None => {
            (&pool).insert_vote(post_id, user_id, body.vote_type).await?;
        }
    }

    let counts = (&pool).vote_counts(post_id).await?;

    Ok(Json(PostVoteResponse {
        success: true,
        upvotes: counts.upvotes,
        downvotes: counts.downvotes,
        message: "Vote recorded successfully".to_string(),
    }))
}

/// 票数查询响应
#[derive(Debug, Serialize)]
pub struct VoteCountsResponse {
    success: bool,
    upvotes: i64,
    downvotes: i64,
}

/// 查询文章的赞/踩计数。
async fn post_votes(
    Path(post_id): Path<i64>,
    State(pool): State<Db>,
) -> Result<Json<VoteCountsResponse>> {
    let counts = (&pool).vote_counts(post_id).await?;
    Ok(Json(VoteCountsResponse {
        success: true,
        upvotes: counts.upvotes,
        downvotes: counts.downvotes,
    }))
}

/// 当前用户投票方向响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyVoteResponse {
    success: bool,
    vote_type: Option<VoteKind>,
}

/// 查询当前用户对文章的投票方向，未登录视为未投票。
async fn my_vote(
    Path(post_id): Path<i64>,
    jar: CookieJar,
    State(pool): State<Db>,
) -> Result<Json<MyVoteResponse>> {
    let vote_type = match current_user_id(&jar) {
        Some(user_id) => (&pool).vote_of(post_id, user_id).await?,
        None => None,
    };
    Ok(Json(MyVoteResponse {
        success: true,
        vote_type,
    }))
}

/// 评论投票响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentVoteResponse {
    success: bool,
    upvote_count: usize,
    downvote_count: usize,
}

/// 对评论投票。
///
/// 与文章投票同一套切换语义：先把用户从两个集合中移除，
/// 仅当此前未持有同向投票时重新加入目标集合。
async fn vote_comment(
    Path(comment_id): Path<i64>,
    jar: CookieJar,
    State(pool): State<Db>,
    Json(body): Json<VoteRequest>,
) -> Result<Json<CommentVoteResponse>> {
    let user_id = current_user_id(&jar).ok_or(Error::Unauthorized)?;

    let comment = (&pool)
        .comment_by_id(comment_id)
        .await?
        .ok_or(Error::NotFound)?;

    let already_held = match body.vote_type {
        VoteKind::Upvote => comment.upvotes.contains(&user_id),
        VoteKind::Downvote => comment.downvotes.contains(&user_id),
    };

    let mut upvotes: Vec<i64> = comment.upvotes.into_iter().filter(|&id| id != user_id).collect();
    let mut downvotes: Vec<i64> = comment
        .downvotes
        .into_iter()
        .filter(|&id| id != user_id)
        .collect();

    if !already_held {
        match body.vote_type {
            VoteKind::Upvote => upvotes.push(user_id),
            VoteKind::Downvote => downvotes.push(user_id),
        }
    }

    (&pool)
        .set_comment_votes(comment_id, &upvotes, &downvotes)
        .await?;

    Ok(Json(CommentVoteResponse {
        success: true,
        upvote_count: upvotes.len(),
        downvote_count: downvotes.len(),
    }))
}
