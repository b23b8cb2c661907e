//! Cached user repository.

use std::sync::Arc;

use newsagg_core::cache::{InvalidationScope, KeyParams, Lookup};
use newsagg_core::news::{
    entity, AccountStatus, Descriptors, ProfileUpdate, Role, User, ALL,
};
use newsagg_core::storage::{
    Document, DocumentStore, Filter, FindQuery, Page, Pagination, Patch, RepositoryError, Result,
    Sort,
};

use crate::coordinator::{CacheCoordinator, EntityCache};

const PREFERENCES: &str = "preferences";

/// Users behind the cache.
///
/// `user:{id}` holds the document and `user:{id}:preferences` the followed
/// tags, so invalidating a user drops both. Lookups by email are not
/// cached: they serve sign-in, where a stale account state would matter.
pub struct CachedUserRepository {
    users: EntityCache<User>,
    descriptors: Descriptors,
}

impl CachedUserRepository {
    pub fn new(
        coordinator: CacheCoordinator,
        store: Arc<dyn DocumentStore<User>>,
        descriptors: Descriptors,
    ) -> Self {
        Self {
            users: EntityCache::new(coordinator, store, descriptors.user),
            descriptors,
        }
    }

    fn coordinator(&self) -> &CacheCoordinator {
        self.users.coordinator()
    }

    fn store(&self) -> &Arc<dyn DocumentStore<User>> {
        self.users.store()
    }

    pub async fn get(&self, id: &str) -> Result<Lookup<User>> {
        self.users.get_or_load(id).await
    }

    /// Tags the user follows.
    pub async fn preferences(&self, id: &str) -> Result<Lookup<Vec<String>>> {
        let params = KeyParams::new().with("view", PREFERENCES);
        self.coordinator()
            .get_or_load(&self.descriptors.user_view, id, &params, || async {
                let user = self.store().find_one(id).await?;
                Ok::<_, RepositoryError>(user.map(|u| u.preferences))
            })
            .await
    }

    /// Uncached.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = FindQuery::new(Filter::eq("email", email)).with_limit(1);
        Ok(self.store().find_many(&query).await?.into_iter().next())
    }

    /// Admin listing, newest accounts first.
    pub async fn list_page(&self, page: Pagination) -> Result<Lookup<Page<User>>> {
        self.coordinator()
            .get_or_load(
                &self.descriptors.user_listing,
                ALL,
                &page.key_params(),
                || async {
                    let query = FindQuery::default()
                        .sorted_by(Sort::desc("created_at"))
                        .paginate(page);
                    let items = self.store().find_many(&query).await?;
                    let total = self.store().count(&Filter::All).await?;
                    Ok::<_, RepositoryError>(Some(Page::new(items, total, page)))
                },
            )
            .await
    }

    /// Stores a new user. Emails are unique.
    pub async fn create(&self, mut user: User) -> Result<User> {
        if self.store().count(&Filter::eq("email", user.email.as_str())).await? > 0 {
            return Err(RepositoryError::AlreadyExists {
                entity_type: User::KIND,
                id: user.email,
            });
        }

        let id = self.store().insert(&user).await?;
        user.set_id(id);
        self.invalidate_listing().await;

        tracing::debug!(user_id = ?user.id, "User created");
        Ok(user)
    }

    pub async fn update_profile(&self, id: &str, update: ProfileUpdate) -> Result<()> {
        self.apply(id, update.into_patch()?).await
    }

    /// Sets account status and role. Omitted values reset to an active
    /// regular user.
    pub async fn update_account(
        &self,
        id: &str,
        status: Option<AccountStatus>,
        role: Option<Role>,
    ) -> Result<()> {
        let patch = Patch::new()
            .set_serialized("account.status", &status.unwrap_or_default())?
            .set_serialized("account.role", &role.unwrap_or_default())?;
        self.apply(id, patch).await
    }

    pub async fn update_preferences(&self, id: &str, tags: Vec<String>) -> Result<()> {
        let patch = Patch::new().set_serialized("preferences", &tags)?;
        self.apply(id, patch).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.store().delete(id).await? {
            return Err(not_found(id));
        }
        self.invalidate_user(id).await;

        tracing::debug!(user_id = id, "User deleted");
        Ok(())
    }

    /// Drops every cached user key.
    pub async fn invalidate_all(&self) {
        tracing::info!("Invalidating all cached users");
        self.coordinator()
            .invalidate_scope(&InvalidationScope::entity_type(entity::USER))
            .await;
    }

    async fn apply(&self, id: &str, patch: Patch) -> Result<()> {
        if !self.store().update(id, &patch).await? {
            return Err(not_found(id));
        }
        self.invalidate_user(id).await;

        tracing::debug!(user_id = id, "User updated");
        Ok(())
    }

    async fn invalidate_user(&self, id: &str) {
        self.users.invalidate(id).await;
        self.invalidate_listing().await;
    }

    async fn invalidate_listing(&self) {
        self.coordinator()
            .invalidate(&self.descriptors.user_listing, ALL, None)
            .await;
    }
}

fn not_found(id: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity_type: User::KIND,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use newsagg_core::cache::{Cache, Source};

    use crate::cache::MemoryCache;
    use crate::testing::CountingStore;

    struct Fixture {
        repo: CachedUserRepository,
        store: Arc<CountingStore<User>>,
        cache: Arc<MemoryCache>,
    }

    async fn setup() -> Fixture {
        let store = Arc::new(CountingStore::new());
        store
            .seed(
                User::new("Ada", "Lovelace", "ada@example.com")
                    .with_id("u1")
                    .with_preferences(["rust", "cache"]),
            )
            .await;
        let cache = Arc::new(MemoryCache::new(100));
        let repo = CachedUserRepository::new(
            CacheCoordinator::new(cache.clone()),
            store.clone(),
            Descriptors::default(),
        );
        Fixture { repo, store, cache }
    }

    #[tokio::test]
    async fn test_get_caches_user() {
        let f = setup().await;
        f.repo.get("u1").await.unwrap();
        let second = f.repo.get("u1").await.unwrap();

        assert_eq!(second.source(), Some(Source::Cache));
        assert_eq!(second.into_option().unwrap().display_name(), "Ada Lovelace");
        assert_eq!(f.store.find_one_calls(), 1);
    }

    #[tokio::test]
    async fn test_preferences_are_cached_under_the_user() {
        let f = setup().await;
        let prefs = f.repo.preferences("u1").await.unwrap();
        assert_eq!(
            prefs,
            Lookup::loaded(vec!["rust".to_string(), "cache".to_string()])
        );
        assert!(f.cache.get("user:u1:preferences").await.unwrap().is_some());

        let again = f.repo.preferences("u1").await.unwrap();
        assert_eq!(again.source(), Some(Source::Cache));
    }

    #[tokio::test]
    async fn test_preferences_of_missing_user() {
        let f = setup().await;
        assert_eq!(f.repo.preferences("nobody").await.unwrap(), Lookup::NotFound);
        assert!(f.cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_preferences_invalidates_both_views() {
        let f = setup().await;
        f.repo.get("u1").await.unwrap();
        f.repo.preferences("u1").await.unwrap();

        f.repo
            .update_preferences("u1", vec!["news".to_string()])
            .await
            .unwrap();

        assert!(f.cache.is_empty().await);
        let prefs = f.repo.preferences("u1").await.unwrap();
        assert_eq!(prefs, Lookup::loaded(vec!["news".to_string()]));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let f = setup().await;
        f.repo.get("u1").await.unwrap();

        let update = ProfileUpdate {
            firstname: Some("Augusta".to_string()),
            ..ProfileUpdate::default()
        };
        f.repo.update_profile("u1", update).await.unwrap();

        let user = f.repo.get("u1").await.unwrap();
        assert_eq!(user.source(), Some(Source::Store));
        assert_eq!(user.into_option().unwrap().firstname, "Augusta");
    }

    #[tokio::test]
    async fn test_update_account_defaults() {
        let f = setup().await;
        f.repo
            .update_account("u1", Some(AccountStatus::Banned), Some(Role::Admin))
            .await
            .unwrap();
        let user = f.repo.get("u1").await.unwrap().into_option().unwrap();
        assert_eq!(user.account.status, AccountStatus::Banned);
        assert_eq!(user.account.role, Role::Admin);

        f.repo.update_account("u1", None, None).await.unwrap();
        let user = f.repo.get("u1").await.unwrap().into_option().unwrap();
        assert_eq!(user.account.status, AccountStatus::Active);
        assert_eq!(user.account.role, Role::User);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email() {
        let f = setup().await;
        let result = f
            .repo
            .create(User::new("Other", "Ada", "ada@example.com"))
            .await;
        assert_eq!(
            result,
            Err(RepositoryError::AlreadyExists {
                entity_type: "User",
                id: "ada@example.com".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_create_clears_listing() {
        let f = setup().await;
        f.repo.list_page(Pagination::default()).await.unwrap();
        assert!(f.cache.get("user:all:1:10").await.unwrap().is_some());

        f.repo
            .create(User::new("Alan", "Turing", "alan@example.com"))
            .await
            .unwrap();

        let page = f.repo.list_page(Pagination::default()).await.unwrap();
        assert_eq!(page.source(), Some(Source::Store));
        assert_eq!(page.into_option().unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_find_by_email_is_uncached() {
        let f = setup().await;
        let user = f.repo.find_by_email("ada@example.com").await.unwrap();
        assert_eq!(user.and_then(|u| u.id).as_deref(), Some("u1"));
        assert!(f.repo.find_by_email("x@example.com").await.unwrap().is_none());
        assert!(f.cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete() {
        let f = setup().await;
        f.repo.get("u1").await.unwrap();
        f.repo.delete("u1").await.unwrap();

        assert_eq!(f.repo.get("u1").await.unwrap(), Lookup::NotFound);
        assert!(matches!(
            f.repo.delete("u1").await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let f = setup().await;
        f.repo.get("u1").await.unwrap();
        f.repo.preferences("u1").await.unwrap();
        f.cache.set("article:a1", b"{}", None).await.unwrap();

        f.repo.invalidate_all().await;

        assert_eq!(f.cache.len().await, 1);
    }
}
