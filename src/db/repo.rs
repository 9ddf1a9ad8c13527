use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    Set,
};

use super::entities::{
    auth_tokens, bugs, groups, login_info, profiles, sub_tasks, tasks, user_groups, users,
};
use crate::auth;
use crate::db::types::{Priority, RecordStatus};

/// Row statuses that are visible to list/retrieve queries.
const VISIBLE: [RecordStatus; 2] = [RecordStatus::New, RecordStatus::Updated];

/// Per-user aggregate counts, computed at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileStats {
    pub total_bugs: u64,
    pub active_bugs: u64,
    pub total_tasks: u64,
    pub total_subtasks: u64,
    pub total_logins: u64,
}

pub struct Repo {
    db: DatabaseConnection,
}

impl Repo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn ping(&self) -> Result<()> {
        self.db.ping().await.context("Database ping failed")
    }

    // ==================== Users ====================

    /// Create a user together with its profile and default group membership.
    /// The group is created on first use; everything runs in one transaction.
    pub async fn create_user(
        &self,
        username: String,
        email: String,
        first_name: String,
        password_hash: String,
        default_group: &str,
    ) -> Result<users::Model> {
        use sea_orm::TransactionTrait;

        let now = Utc::now().naive_utc();

        let txn = self
            .db
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let new_user = users::ActiveModel {
            username: Set(username),
            email: Set(email),
            first_name: Set(first_name),
            password: Set(password_hash),
            is_superuser: Set(false),
            is_active: Set(true),
            last_login: Set(None),
            date_joined: Set(now),
            ..Default::default()
        };

        let user = new_user
            .insert(&txn)
            .await
            .context("Failed to insert user")?;

        let new_profile = profiles::ActiveModel {
            user_id: Set(user.id),
            ..Default::default()
        };
        new_profile
            .insert(&txn)
            .await
            .context("Failed to insert profile")?;

        // INSERT ... ON CONFLICT(name) DO NOTHING, then fetch by name
        let new_group = groups::ActiveModel {
            name: Set(default_group.to_string()),
            ..Default::default()
        };
        groups::Entity::insert(new_group)
            .on_conflict(
                OnConflict::column(groups::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .context("Failed to upsert default group")?;

        let group = groups::Entity::find()
            .filter(groups::Column::Name.eq(default_group))
            .one(&txn)
            .await
            .context("Failed to fetch default group")?
            .ok_or_else(|| anyhow::anyhow!("Group {} not found after upsert", default_group))?;

        let membership = user_groups::ActiveModel {
            user_id: Set(user.id),
            group_id: Set(group.id),
            ..Default::default()
        };
        membership
            .insert(&txn)
            .await
            .context("Failed to insert group membership")?;

        txn.commit().await.context("Failed to commit transaction")?;

        Ok(user)
    }

    pub async fn get_user(&self, user_id: i32) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .context("Failed to get user")
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await
            .context("Failed to get user by username")
    }

    /// Check username uniqueness, optionally excluding one user id (for updates).
    pub async fn username_taken(&self, username: &str, exclude_id: Option<i32>) -> Result<bool> {
        let mut query = users::Entity::find().filter(users::Column::Username.eq(username));
        if let Some(id) = exclude_id {
            query = query.filter(users::Column::Id.ne(id));
        }
        let count = query
            .count(&self.db)
            .await
            .context("Failed to check username uniqueness")?;
        Ok(count > 0)
    }

    /// List all users, newest joiners first.
    pub async fn list_users(&self, page: u64, per_page: u64) -> Result<(Vec<users::Model>, u64)> {
        let paginator = users::Entity::find()
            .order_by_desc(users::Column::DateJoined)
            .paginate(&self.db, per_page);

        let total = paginator
            .num_items()
            .await
            .context("Failed to count users")?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .context("Failed to fetch users page")?;

        Ok((items, total))
    }

    /// Full update of a user's editable fields; the password arrives pre-hashed.
    pub async fn update_user(
        &self,
        user: users::Model,
        username: String,
        email: String,
        first_name: String,
        password_hash: String,
    ) -> Result<users::Model> {
        let mut active: users::ActiveModel = user.into_active_model();
        active.username = Set(username);
        active.email = Set(email);
        active.first_name = Set(first_name);
        active.password = Set(password_hash);

        active
            .update(&self.db)
            .await
            .context("Failed to update user")
    }

    /// Check whether a user belongs to a group with the given name.
    pub async fn user_in_group(&self, user_id: i32, group_name: &str) -> Result<bool> {
        let count = user_groups::Entity::find()
            .join(JoinType::InnerJoin, user_groups::Relation::Groups.def())
            .filter(user_groups::Column::UserId.eq(user_id))
            .filter(groups::Column::Name.eq(group_name))
            .count(&self.db)
            .await
            .context("Failed to check group membership")?;
        Ok(count > 0)
    }

    // ==================== Groups ====================

    pub async fn list_groups(&self, page: u64, per_page: u64) -> Result<(Vec<groups::Model>, u64)> {
        let paginator = groups::Entity::find()
            .order_by_asc(groups::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator
            .num_items()
            .await
            .context("Failed to count groups")?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .context("Failed to fetch groups page")?;

        Ok((items, total))
    }

    pub async fn get_group(&self, group_id: i32) -> Result<Option<groups::Model>> {
        groups::Entity::find_by_id(group_id)
            .one(&self.db)
            .await
            .context("Failed to get group")
    }

    pub async fn create_group(&self, name: String) -> Result<groups::Model> {
        let new_group = groups::ActiveModel {
            name: Set(name),
            ..Default::default()
        };

        new_group
            .insert(&self.db)
            .await
            .context("Failed to insert group")
    }

    pub async fn group_name_taken(&self, name: &str) -> Result<bool> {
        let count = groups::Entity::find()
            .filter(groups::Column::Name.eq(name))
            .count(&self.db)
            .await
            .context("Failed to check group name uniqueness")?;
        Ok(count > 0)
    }

    // ==================== Tokens ====================

    /// Look up a token key together with its user, for request authentication.
    pub async fn find_token_with_user(
        &self,
        key: &str,
    ) -> Result<Option<(auth_tokens::Model, users::Model)>> {
        let result = auth_tokens::Entity::find_by_id(key)
            .find_also_related(users::Entity)
            .one(&self.db)
            .await
            .context("Failed to look up token")?;

        match result {
            Some((token, Some(user))) => Ok(Some((token, user))),
            Some((token, None)) => Err(anyhow::anyhow!(
                "Token {} has no associated user",
                token.key
            )),
            None => Ok(None),
        }
    }

    pub async fn get_token_for_user(&self, user_id: i32) -> Result<Option<auth_tokens::Model>> {
        auth_tokens::Entity::find()
            .filter(auth_tokens::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .context("Failed to get token for user")
    }

    /// Login bookkeeping: get-or-create the user's token (rotating it if
    /// expired), stamp last_login, and append a login history row.
    pub async fn record_login(&self, user_id: i32, ttl_secs: i64) -> Result<auth_tokens::Model> {
        use sea_orm::TransactionTrait;

        let now = Utc::now().naive_utc();

        let txn = self
            .db
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let existing = auth_tokens::Entity::find()
            .filter(auth_tokens::Column::UserId.eq(user_id))
            .one(&txn)
            .await
            .context("Failed to get token for user")?;

        let token = match existing {
            Some(token) if !auth::token_is_expired(token.created_at, ttl_secs) => token,
            other => {
                if let Some(stale) = other {
                    auth_tokens::Entity::delete_by_id(stale.key)
                        .exec(&txn)
                        .await
                        .context("Failed to delete expired token")?;
                }
                let fresh = auth_tokens::ActiveModel {
                    key: Set(auth::generate_token_key()),
                    user_id: Set(user_id),
                    created_at: Set(now),
                };
                fresh
                    .insert(&txn)
                    .await
                    .context("Failed to insert token")?
            }
        };

        let user = users::Entity::find_by_id(user_id)
            .one(&txn)
            .await
            .context("Failed to query user")?
            .ok_or_else(|| anyhow::anyhow!("User {} not found", user_id))?;

        let mut active: users::ActiveModel = user.into_active_model();
        active.last_login = Set(Some(now));
        active
            .update(&txn)
            .await
            .context("Failed to update last_login")?;

        let history = login_info::ActiveModel {
            user_id: Set(user_id),
            logged_in_at: Set(now),
            ..Default::default()
        };
        history
            .insert(&txn)
            .await
            .context("Failed to insert login history")?;

        txn.commit().await.context("Failed to commit transaction")?;

        Ok(token)
    }

    // ==================== Bugs ====================

    /// List a user's bugs, newest first, hiding soft-deleted rows.
    pub async fn list_bugs(
        &self,
        author_id: i32,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<bugs::Model>, u64)> {
        let paginator = bugs::Entity::find()
            .filter(bugs::Column::AuthorId.eq(author_id))
            .filter(bugs::Column::Status.is_in(VISIBLE))
            .order_by_desc(bugs::Column::CreatedAt)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await.context("Failed to count bugs")?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .context("Failed to fetch bugs page")?;

        Ok((items, total))
    }

    pub async fn get_bug(&self, author_id: i32, bug_id: i32) -> Result<Option<bugs::Model>> {
        bugs::Entity::find_by_id(bug_id)
            .filter(bugs::Column::AuthorId.eq(author_id))
            .filter(bugs::Column::Status.is_in(VISIBLE))
            .one(&self.db)
            .await
            .context("Failed to get bug")
    }

    pub async fn create_bug(
        &self,
        author_id: i32,
        title: String,
        description: String,
        priority: Priority,
    ) -> Result<bugs::Model> {
        let now = Utc::now().naive_utc();

        let new_bug = bugs::ActiveModel {
            title: Set(title),
            description: Set(description),
            priority: Set(priority),
            status: Set(RecordStatus::New),
            author_id: Set(author_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        new_bug.insert(&self.db).await.context("Failed to insert bug")
    }

    /// Apply a validated partial update and mark the bug UPDATED.
    pub async fn update_bug(
        &self,
        bug: bugs::Model,
        title: Option<String>,
        description: Option<String>,
        priority: Option<Priority>,
    ) -> Result<bugs::Model> {
        let mut active: bugs::ActiveModel = bug.into_active_model();
        if let Some(title) = title {
            active.title = Set(title);
        }
        if let Some(description) = description {
            active.description = Set(description);
        }
        if let Some(priority) = priority {
            active.priority = Set(priority);
        }
        active.status = Set(RecordStatus::Updated);
        active.updated_at = Set(Utc::now().naive_utc());

        active.update(&self.db).await.context("Failed to update bug")
    }

    /// Soft delete: the row stays, only its status changes.
    pub async fn mark_bug_deleted(&self, bug: bugs::Model) -> Result<bugs::Model> {
        let mut active: bugs::ActiveModel = bug.into_active_model();
        active.status = Set(RecordStatus::Deleted);
        active.updated_at = Set(Utc::now().naive_utc());

        active
            .update(&self.db)
            .await
            .context("Failed to mark bug deleted")
    }

    // ==================== Tasks ====================

    /// List a user's tasks, newest first, hiding soft-deleted rows.
    pub async fn list_tasks(
        &self,
        author_id: i32,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<tasks::Model>, u64)> {
        let paginator = tasks::Entity::find()
            .filter(tasks::Column::AuthorId.eq(author_id))
            .filter(tasks::Column::Status.is_in(VISIBLE))
            .order_by_desc(tasks::Column::CreatedAt)
            .paginate(&self.db, per_page);

        let total = paginator
            .num_items()
            .await
            .context("Failed to count tasks")?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .context("Failed to fetch tasks page")?;

        Ok((items, total))
    }

    /// Fetch a task scoped to its owner. Also serves as the parent guard for
    /// sub-task operations: a deleted or foreign task is simply not found.
    pub async fn get_task(&self, author_id: i32, task_id: i32) -> Result<Option<tasks::Model>> {
        tasks::Entity::find_by_id(task_id)
            .filter(tasks::Column::AuthorId.eq(author_id))
            .filter(tasks::Column::Status.is_in(VISIBLE))
            .one(&self.db)
            .await
            .context("Failed to get task")
    }

    pub async fn create_task(&self, author_id: i32, body: String) -> Result<tasks::Model> {
        let now = Utc::now().naive_utc();

        let new_task = tasks::ActiveModel {
            body: Set(body),
            status: Set(RecordStatus::New),
            author_id: Set(author_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        new_task
            .insert(&self.db)
            .await
            .context("Failed to insert task")
    }

    /// Apply a validated partial update and mark the task UPDATED.
    pub async fn update_task(&self, task: tasks::Model, body: Option<String>) -> Result<tasks::Model> {
        let mut active: tasks::ActiveModel = task.into_active_model();
        if let Some(body) = body {
            active.body = Set(body);
        }
        active.status = Set(RecordStatus::Updated);
        active.updated_at = Set(Utc::now().naive_utc());

        active
            .update(&self.db)
            .await
            .context("Failed to update task")
    }

    /// Soft delete: the row stays, only its status changes.
    pub async fn mark_task_deleted(&self, task: tasks::Model) -> Result<tasks::Model> {
        let mut active: tasks::ActiveModel = task.into_active_model();
        active.status = Set(RecordStatus::Deleted);
        active.updated_at = Set(Utc::now().naive_utc());

        active
            .update(&self.db)
            .await
            .context("Failed to mark task deleted")
    }

    /// Count every sub-task of a task, deleted ones included.
    pub async fn count_subtasks(&self, task_id: i32) -> Result<u64> {
        sub_tasks::Entity::find()
            .filter(sub_tasks::Column::TaskId.eq(task_id))
            .count(&self.db)
            .await
            .context("Failed to count sub-tasks")
    }

    // ==================== SubTasks ====================

    /// List the sub-tasks of a task, hiding soft-deleted rows. The caller is
    /// responsible for resolving the parent task through its owner first.
    pub async fn list_sub_tasks(
        &self,
        task_id: i32,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<sub_tasks::Model>, u64)> {
        let paginator = sub_tasks::Entity::find()
            .filter(sub_tasks::Column::TaskId.eq(task_id))
            .filter(sub_tasks::Column::Status.is_in(VISIBLE))
            .order_by_asc(sub_tasks::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator
            .num_items()
            .await
            .context("Failed to count sub-tasks")?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .context("Failed to fetch sub-tasks page")?;

        Ok((items, total))
    }

    pub async fn get_sub_task(
        &self,
        task_id: i32,
        sub_task_id: i32,
    ) -> Result<Option<sub_tasks::Model>> {
        sub_tasks::Entity::find_by_id(sub_task_id)
            .filter(sub_tasks::Column::TaskId.eq(task_id))
            .filter(sub_tasks::Column::Status.is_in(VISIBLE))
            .one(&self.db)
            .await
            .context("Failed to get sub-task")
    }

    pub async fn create_sub_task(
        &self,
        task_id: i32,
        description: String,
        due_date: NaiveDate,
    ) -> Result<sub_tasks::Model> {
        let now = Utc::now().naive_utc();

        let new_sub_task = sub_tasks::ActiveModel {
            description: Set(description),
            status: Set(RecordStatus::New),
            due_date: Set(due_date),
            task_id: Set(task_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        new_sub_task
            .insert(&self.db)
            .await
            .context("Failed to insert sub-task")
    }

    /// Apply a validated partial update and mark the sub-task UPDATED.
    pub async fn update_sub_task(
        &self,
        sub_task: sub_tasks::Model,
        description: Option<String>,
        due_date: Option<NaiveDate>,
    ) -> Result<sub_tasks::Model> {
        let mut active: sub_tasks::ActiveModel = sub_task.into_active_model();
        if let Some(description) = description {
            active.description = Set(description);
        }
        if let Some(due_date) = due_date {
            active.due_date = Set(due_date);
        }
        active.status = Set(RecordStatus::Updated);
        active.updated_at = Set(Utc::now().naive_utc());

        active
            .update(&self.db)
            .await
            .context("Failed to update sub-task")
    }

    /// Soft delete: the row stays, only its status changes.
    pub async fn mark_sub_task_deleted(&self, sub_task: sub_tasks::Model) -> Result<sub_tasks::Model> {
        let mut active: sub_tasks::ActiveModel = sub_task.into_active_model();
        active.status = Set(RecordStatus::Deleted);
        active.updated_at = Set(Utc::now().naive_utc());

        active
            .update(&self.db)
            .await
            .context("Failed to mark sub-task deleted")
    }

    // ==================== Profiles ====================

    pub async fn get_profile(&self, user_id: i32) -> Result<Option<profiles::Model>> {
        profiles::Entity::find()
            .filter(profiles::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .context("Failed to get profile")
    }

    /// Aggregate counts over a user's rows. Deleted bugs still count toward
    /// total_bugs but not active_bugs; sub-tasks are counted across all of the
    /// user's tasks regardless of status.
    pub async fn profile_stats(&self, user_id: i32) -> Result<ProfileStats> {
        let total_bugs = bugs::Entity::find()
            .filter(bugs::Column::AuthorId.eq(user_id))
            .count(&self.db)
            .await
            .context("Failed to count bugs")?;

        let active_bugs = bugs::Entity::find()
            .filter(bugs::Column::AuthorId.eq(user_id))
            .filter(bugs::Column::Status.ne(RecordStatus::Deleted))
            .count(&self.db)
            .await
            .context("Failed to count active bugs")?;

        let total_tasks = tasks::Entity::find()
            .filter(tasks::Column::AuthorId.eq(user_id))
            .count(&self.db)
            .await
            .context("Failed to count tasks")?;

        let total_subtasks = sub_tasks::Entity::find()
            .join(JoinType::InnerJoin, sub_tasks::Relation::Tasks.def())
            .filter(tasks::Column::AuthorId.eq(user_id))
            .count(&self.db)
            .await
            .context("Failed to count sub-tasks")?;

        let total_logins = login_info::Entity::find()
            .filter(login_info::Column::UserId.eq(user_id))
            .count(&self.db)
            .await
            .context("Failed to count logins")?;

        Ok(ProfileStats {
            total_bugs,
            active_bugs,
            total_tasks,
            total_subtasks,
            total_logins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectOptions, Database};
    use sea_orm_migration::MigratorTrait;

    async fn setup_test_db() -> Result<Repo> {
        // A single connection keeps the in-memory database alive across queries
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1);

        let db = Database::connect(opt).await?;
        migration::Migrator::up(&db, None).await?;

        Ok(Repo::new(db))
    }

    async fn create_test_user(repo: &Repo, username: &str) -> users::Model {
        repo.create_user(
            username.to_string(),
            format!("{username}@example.com"),
            "Test User".to_string(),
            "hashed-password".to_string(),
            "default",
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_user_creates_profile_and_default_group() {
        let repo = setup_test_db().await.unwrap();

        let user = create_test_user(&repo, "alice").await;
        assert!(!user.is_superuser);
        assert!(user.is_active);
        assert!(user.last_login.is_none());

        let profile = repo.get_profile(user.id).await.unwrap();
        assert!(profile.is_some());
        assert!(repo.user_in_group(user.id, "default").await.unwrap());

        // Second user reuses the same group instead of failing on the unique name
        let bob = create_test_user(&repo, "bob").await;
        assert!(repo.user_in_group(bob.id, "default").await.unwrap());

        assert!(repo.username_taken("alice", None).await.unwrap());
        assert!(!repo.username_taken("alice", Some(user.id)).await.unwrap());
        assert!(!repo.username_taken("carol", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_user_fields() {
        let repo = setup_test_db().await.unwrap();

        let user = create_test_user(&repo, "alice").await;
        let updated = repo
            .update_user(
                user,
                "alice2".to_string(),
                "alice2@example.com".to_string(),
                "Alice Two".to_string(),
                "new-hash".to_string(),
            )
            .await
            .unwrap();

        assert_eq!(updated.username, "alice2");
        assert_eq!(updated.email, "alice2@example.com");
        assert_eq!(updated.first_name, "Alice Two");
        assert_eq!(updated.password, "new-hash");
        assert!(!repo.username_taken("alice", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_bug_lifecycle() {
        let repo = setup_test_db().await.unwrap();
        let user = create_test_user(&repo, "alice").await;

        let bug = repo
            .create_bug(
                user.id,
                "Crash on save".to_string(),
                "Saving an empty form crashes".to_string(),
                Priority::High,
            )
            .await
            .unwrap();
        assert_eq!(bug.status, RecordStatus::New);

        let updated = repo
            .update_bug(bug.clone(), Some("Crash on submit".to_string()), None, None)
            .await
            .unwrap();
        assert_eq!(updated.status, RecordStatus::Updated);
        assert_eq!(updated.title, "Crash on submit");
        assert_eq!(updated.description, bug.description);
        assert_eq!(updated.priority, Priority::High);

        let deleted = repo.mark_bug_deleted(updated).await.unwrap();
        assert_eq!(deleted.status, RecordStatus::Deleted);

        // Soft-deleted rows disappear from scoped reads but stay countable
        assert!(repo.get_bug(user.id, bug.id).await.unwrap().is_none());
        let (items, total) = repo.list_bugs(user.id, 1, 10).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);

        let stats = repo.profile_stats(user.id).await.unwrap();
        assert_eq!(stats.total_bugs, 1);
        assert_eq!(stats.active_bugs, 0);
    }

    #[tokio::test]
    async fn test_owner_scoping_hides_foreign_rows() {
        let repo = setup_test_db().await.unwrap();
        let alice = create_test_user(&repo, "alice").await;
        let bob = create_test_user(&repo, "bob").await;

        let bug = repo
            .create_bug(
                alice.id,
                "Broken layout".to_string(),
                "Sidebar overlaps content".to_string(),
                Priority::Low,
            )
            .await
            .unwrap();
        let task = repo
            .create_task(alice.id, "Write release notes".to_string())
            .await
            .unwrap();

        assert!(repo.get_bug(bob.id, bug.id).await.unwrap().is_none());
        assert!(repo.get_task(bob.id, task.id).await.unwrap().is_none());

        let (bob_bugs, bob_total) = repo.list_bugs(bob.id, 1, 10).await.unwrap();
        assert!(bob_bugs.is_empty());
        assert_eq!(bob_total, 0);

        let (alice_bugs, alice_total) = repo.list_bugs(alice.id, 1, 10).await.unwrap();
        assert_eq!(alice_bugs.len(), 1);
        assert_eq!(alice_total, 1);
    }

    #[tokio::test]
    async fn test_sub_task_parent_guard_and_counts() {
        let repo = setup_test_db().await.unwrap();
        let user = create_test_user(&repo, "alice").await;

        let task = repo
            .create_task(user.id, "Prepare demo".to_string())
            .await
            .unwrap();
        let due = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();

        let first = repo
            .create_sub_task(task.id, "Record screencast".to_string(), due)
            .await
            .unwrap();
        let second = repo
            .create_sub_task(task.id, "Upload slides".to_string(), due)
            .await
            .unwrap();
        assert_eq!(first.status, RecordStatus::New);

        repo.mark_sub_task_deleted(second).await.unwrap();

        // total_subtasks counts deleted rows too, visible listing does not
        assert_eq!(repo.count_subtasks(task.id).await.unwrap(), 2);
        let (visible, total) = repo.list_sub_tasks(task.id, 1, 10).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(total, 1);

        // Deleting the parent makes it invisible to the owner scope
        repo.mark_task_deleted(task.clone()).await.unwrap();
        assert!(repo.get_task(user.id, task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_login_rotates_expired_token() {
        let repo = setup_test_db().await.unwrap();
        let user = create_test_user(&repo, "alice").await;

        // ttl 0 means the token is already stale on the next call
        let stale = repo.record_login(user.id, 0).await.unwrap();
        assert_eq!(stale.key.len(), 40);

        let fresh = repo.record_login(user.id, 14400).await.unwrap();
        assert_ne!(stale.key, fresh.key);

        // A live token is reused as-is
        let again = repo.record_login(user.id, 14400).await.unwrap();
        assert_eq!(fresh.key, again.key);

        let stored = repo.get_token_for_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.key, again.key);

        let refreshed = repo.get_user(user.id).await.unwrap().unwrap();
        assert!(refreshed.last_login.is_some());

        let stats = repo.profile_stats(user.id).await.unwrap();
        assert_eq!(stats.total_logins, 3);
    }

    #[tokio::test]
    async fn test_find_token_with_user() {
        let repo = setup_test_db().await.unwrap();
        let user = create_test_user(&repo, "alice").await;

        let token = repo.record_login(user.id, 14400).await.unwrap();

        let found = repo.find_token_with_user(&token.key).await.unwrap();
        let (found_token, found_user) = found.unwrap();
        assert_eq!(found_token.key, token.key);
        assert_eq!(found_user.id, user.id);

        assert!(repo
            .find_token_with_user("no-such-key")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_groups_crud() {
        let repo = setup_test_db().await.unwrap();

        let group = repo.create_group("qa-team".to_string()).await.unwrap();
        assert_eq!(group.name, "qa-team");
        assert!(repo.group_name_taken("qa-team").await.unwrap());
        assert!(!repo.group_name_taken("dev-team").await.unwrap());

        let fetched = repo.get_group(group.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "qa-team");

        let (items, total) = repo.list_groups(1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_profile_stats_aggregates() {
        let repo = setup_test_db().await.unwrap();
        let user = create_test_user(&repo, "alice").await;
        let other = create_test_user(&repo, "bob").await;

        let bug = repo
            .create_bug(
                user.id,
                "First bug".to_string(),
                "Something broke".to_string(),
                Priority::Medium,
            )
            .await
            .unwrap();
        repo.create_bug(
            user.id,
            "Second bug".to_string(),
            "Something else broke".to_string(),
            Priority::Low,
        )
        .await
        .unwrap();
        repo.mark_bug_deleted(bug).await.unwrap();

        let task = repo
            .create_task(user.id, "Triage incoming reports".to_string())
            .await
            .unwrap();
        let due = NaiveDate::from_ymd_opt(2026, 9, 15).unwrap();
        repo.create_sub_task(task.id, "Label duplicates".to_string(), due)
            .await
            .unwrap();
        repo.create_sub_task(task.id, "Close stale reports".to_string(), due)
            .await
            .unwrap();

        // Noise under another user must not leak into the aggregates
        repo.create_task(other.id, "Unrelated work".to_string())
            .await
            .unwrap();
        repo.record_login(other.id, 14400).await.unwrap();

        repo.record_login(user.id, 14400).await.unwrap();
        repo.record_login(user.id, 14400).await.unwrap();

        let stats = repo.profile_stats(user.id).await.unwrap();
        assert_eq!(stats.total_bugs, 2);
        assert_eq!(stats.active_bugs, 1);
        assert_eq!(stats.total_tasks, 1);
        assert_eq!(stats.total_subtasks, 2);
        assert_eq!(stats.total_logins, 2);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let repo = setup_test_db().await.unwrap();
        let user = create_test_user(&repo, "alice").await;

        for i in 0..12 {
            repo.create_bug(
                user.id,
                format!("Bug {i}"),
                "Details".to_string(),
                Priority::Low,
            )
            .await
            .unwrap();
        }

        let (page1, total) = repo.list_bugs(user.id, 1, 10).await.unwrap();
        assert_eq!(total, 12);
        assert_eq!(page1.len(), 10);

        let (page2, _) = repo.list_bugs(user.id, 2, 10).await.unwrap();
        assert_eq!(page2.len(), 2);

        let (page3, _) = repo.list_bugs(user.id, 3, 10).await.unwrap();
        assert!(page3.is_empty());
    }
}
