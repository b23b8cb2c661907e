//! News aggregation domain: documents, their cache descriptors and the
//! aggregate shapes the dashboard reads.

mod article;
mod comment;
mod dashboard;
mod descriptors;
mod interaction;
mod user;

pub use article::{Article, ArticleSummary, ArticleUpdate, Byline};
pub use comment::Comment;
pub use dashboard::{DashboardSummary, TagCount, TopArticle};
pub use descriptors::{entity, Descriptors, ALL, LATEST, SUMMARY};
pub use interaction::{Interaction, InteractionLevel, InteractionStats, InteractionUpdate};
pub use user::{Account, AccountStatus, Address, ProfileUpdate, Role, User};
