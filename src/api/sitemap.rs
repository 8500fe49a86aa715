use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::config::Config;
use crate::error::Result;
use crate::storage::{Category, ContentQuery, Db, Post};

/// 静态页面路径
const STATIC_ROUTES: [&str; 3] = ["", "/about", "/contact"];

/// 输出 sitemap。
///
/// 覆盖静态页、全部分类页和全部已发布文章，
/// 文章的 `lastmod` 取更新时间。
pub async fn sitemap_xml(
    State(pool): State<Db>,
    State(config): State<Arc<Config>>,
) -> Result<impl IntoResponse> {
    let categories = (&pool).categories().await?;
    let posts = (&pool).published_posts().await?;

    let xml = build_sitemap(&config.site_url, &categories, &posts);

    Ok(([(header::CONTENT_TYPE, "application/xml")], xml))
}

/// 拼接 urlset XML
fn build_sitemap(site_url: &str, categories: &[Category], posts: &[Post]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
"#,
    );

    for route in STATIC_ROUTES {
        xml.push_str(&format!(
            "  <url><loc>{site_url}{route}</loc><changefreq>weekly</changefreq></url>\n"
        ));
    }

    for category in categories {
        xml.push_str(&format!(
            "  <url><loc>{site_url}/{}</loc><changefreq>weekly</changefreq></url>\n",
            category.slug
        ));
    }

    for post in posts {
        xml.push_str(&format!(
            "  <url><loc>{site_url}/{}/{}</loc><lastmod>{}</lastmod><changefreq>monthly</changefreq></url>\n",
            post.category,
            post.slug,
            post.updated_at.format("%Y-%m-%d"),
        ));
    }

    xml.push_str("</urlset>\n");
    xml
}
