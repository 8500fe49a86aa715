mod accounts;
mod analytics_query;
mod content_query;
mod content_storage;
mod engagement;
mod models;
mod newsletter;
mod postgres;
mod tracking;

pub use self::{
    accounts::UserStore,
    analytics_query::AnalyticsQuery,
    content_query::ContentQuery,
    content_storage::{CategoryDraft, ContentStorage, PostDraft},
    engagement::{CommentStore, VoteStore},
    models::{
        Category, Comment, CookieConsent, EngagementMetrics, PopularPost, Post, Subscriber, User,
        VisitStats, VoteCounts, VoteKind,
    },
    newsletter::NewsletterStore,
    postgres::{Db, init_db_from_env, migrate},
    tracking::{PageViewRecord, TrackingStore},
};
