use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, mail::Mailer, storage::Db};

/// 应用程序上下文
///
/// [`AppState`] 封装了数据库连接池、邮件发送器和配置，
/// 进程启动时创建一次，注入所有处理器。
#[derive(Clone, FromRef)]
pub struct AppState {
    pool: Db,
    mailer: Mailer,
    config: Arc<Config>,
}

impl AppState {
    /// 创建一个新的 [`AppState`] 实例
    pub fn new(pool: Db, mailer: Mailer, config: Config) -> Self {
        Self {
            pool,
            mailer,
            config: Arc::new(config),
        }
    }

    /// 获取数据库连接池
    pub fn db(&self) -> &Db {
        &self.pool
    }

    /// 获取邮件发送器
    pub fn mailer(&self) -> &Mailer {
        &self.mailer
    }

    /// 获取配置
    pub fn config(&self) -> &Config {
        &self.config
    }
}
