use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::Query;
use chrono::{Duration, Local};
use serde::{Deserialize, Serialize};

use crate::analytics::{
    BrowserCount, DailyVisits, SourceCount, browser_buckets, device_buckets, source_buckets,
    zero_filled_days,
};
use crate::error::Result;
use crate::state::AppState;
use crate::storage::{
    AnalyticsQuery, CommentStore, ContentQuery, Db, EngagementMetrics, PopularPost, VisitStats,
    VoteStore,
};

/// 配置聚合报表路由（挂在管理网关之后）。
///
/// 路由包括：
/// - `GET /visits`：总访问量与独立访客
/// - `GET /daily`：按天补零的访问曲线
/// - `GET /sources`：流量来源分布
/// - `GET /devices`：设备与浏览器分布
/// - `GET /popular`：热门文章与互动得分
/// - `GET /engagement`：时间窗口内的互动指标
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/visits", get(visits))
        .route("/daily", get(daily))
        .route("/sources", get(sources))
        .route("/devices", get(devices))
        .route("/popular", get(popular))
        .route("/engagement", get(engagement))
}

/// 时间窗口参数，默认回看 30 天
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowParams {
    days: i64,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self { days: 30 }
    }
}

impl WindowParams {
    fn since(&self) -> chrono::DateTime<Local> {
        Local::now() - Duration::days(self.days.max(1))
    }
}

/// 总访问量与独立访客数。
async fn visits(
    Query(params): Query<WindowParams>,
    State(pool): State<Db>,
) -> Result<Json<VisitStats>> {
    Ok(Json((&pool).visit_stats(params.since()).await?))
}

/// 按天补零的访问曲线，时间升序。
async fn daily(
    Query(params): Query<WindowParams>,
    State(pool): State<Db>,
) -> Result<Json<Vec<DailyVisits>>> {
    let days = params.days.max(1);
    let raw = (&pool).daily_counts(params.since()).await?;
    Ok(Json(zero_filled_days(
        days,
        Local::now().date_naive(),
        &raw,
    )))
}

/// 流量来源分布：direct 单独统计，其余按 referrer 正则归类。
async fn sources(
    Query(params): Query<WindowParams>,
    State(pool): State<Db>,
) -> Result<Json<Vec<SourceCount>>> {
    let since = params.since();
    let referrers = (&pool).referrer_counts(since).await?;
    let direct = (&pool).direct_visits(since).await?;
    Ok(Json(source_buckets(referrers, direct)))
}

/// 设备与浏览器分布响应
#[derive(Debug, Serialize)]
pub struct DeviceStats {
    devices: Vec<crate::analytics::DeviceCount>,
    browsers: Vec<BrowserCount>,
}

/// 设备与浏览器分布，按 user-agent 正则归类。
async fn devices(
    Query(params): Query<WindowParams>,
    State(pool): State<Db>,
) -> Result<Json<DeviceStats>> {
    let user_agents = (&pool).user_agent_counts(params.since()).await?;
    Ok(Json(DeviceStats {
        devices: device_buckets(&user_agents),
        browsers: browser_buckets(&user_agents),
    }))
}

/// 热门文章参数
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PopularParams {
    limit: i64,
}

impl Default for PopularParams {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

/// 热门文章排行。
///
/// 取浏览量最高的文章路径，回查文章并补齐投票/评论计数，
/// `engagement = upvotes + downvotes + comments`。
/// 对不上文章的路径（已删除等）直接跳过。
async fn popular(
    Query(params): Query<PopularParams>,
    State(pool): State<Db>,
) -> Result<Json<Vec<PopularPost>>> {
    let paths = (&pool).popular_paths(params.limit.max(1)).await?;

    let mut posts = Vec::with_capacity(paths.len());
    for (path, views) in paths {
        let mut parts = path.splitn(3, '/').skip(1);
        let (Some(category), Some(slug)) = (parts.next(), parts.next()) else {
            continue;
        };

        let Some(post) = (&pool).post_by_category_slug(category, slug).await? else {
            continue;
        };

        let votes = (&pool).vote_counts(post.id).await?;
        let comments = (&pool).comments_count(post.id).await?;

        posts.push(PopularPost {
            id: post.id,
            title: post.title,
            slug: post.slug,
            category: post.category,
            views,
            upvotes: votes.upvotes,
            downvotes: votes.downvotes,
            comments,
            engagement: votes.upvotes + votes.downvotes + comments,
        });
    }

    Ok(Json(posts))
}

/// 无客户端停留时长埋点时的占位均值（秒）
const AVG_TIME_PLACEHOLDER_SECS: i64 = 120;

/// 时间窗口内的互动指标。
async fn engagement(
    Query(params): Query<WindowParams>,
    State(pool): State<Db>,
) -> Result<Json<EngagementMetrics>> {
    let since = params.since();
    Ok(Json(EngagementMetrics {
        votes: (&pool).votes_since(since).await?,
        comments: (&pool).comments_since(since).await?,
        avg_time_on_site: AVG_TIME_PLACEHOLDER_SECS,
    }))
}
