//! SQLx implementation of the user repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::{
    DisplayName, Email, IUserRepository, NewUser, NotificationPreferences, PasswordHash,
    PrivacySettings, PrivacyToggle, ProfileDetails, ProfileError, User, UserId,
};

const USER_COLUMNS: &str = r#"
    id, display_name, email, password_hash,
    first_name, last_name, bio, location, profile_image_url,
    is_active, is_admin, email_verified, email_verified_at,
    email_private, first_name_private, last_name_private, bio_private,
    location_private, created_at_private, is_active_private,
    messages_enabled, messages_from_strangers, messages_notifications,
    forum_reply, forum_mention, forum_quote,
    email_events, email_messages, email_newsletter,
    created_at, updated_at
"#;

/// Row shape of the `users` table
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    display_name: String,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    profile_image_url: Option<String>,
    is_active: bool,
    is_admin: bool,
    email_verified: bool,
    email_verified_at: Option<DateTime<Utc>>,
    email_private: Option<bool>,
    first_name_private: Option<bool>,
    last_name_private: Option<bool>,
    bio_private: Option<bool>,
    location_private: Option<bool>,
    created_at_private: Option<bool>,
    is_active_private: Option<bool>,
    messages_enabled: bool,
    messages_from_strangers: bool,
    messages_notifications: bool,
    forum_reply: bool,
    forum_mention: bool,
    forum_quote: bool,
    email_events: bool,
    email_messages: bool,
    email_newsletter: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = ProfileError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        // A stored value that no longer validates is a backend fault, not caller input
        let email = Email::new(row.email).map_err(|reason| ProfileError::Database {
            message: format!("user {} has an unreadable email: {}", row.id, reason),
        })?;
        let display_name =
            DisplayName::new(row.display_name).map_err(|reason| ProfileError::Database {
                message: format!("user {} has an unreadable display name: {}", row.id, reason),
            })?;

        let privacy = PrivacySettings::from_named_flags([
            (PrivacyToggle::EmailPrivate.as_str(), row.email_private),
            (PrivacyToggle::FirstNamePrivate.as_str(), row.first_name_private),
            (PrivacyToggle::LastNamePrivate.as_str(), row.last_name_private),
            (PrivacyToggle::BioPrivate.as_str(), row.bio_private),
            (PrivacyToggle::LocationPrivate.as_str(), row.location_private),
            (PrivacyToggle::CreatedAtPrivate.as_str(), row.created_at_private),
            (PrivacyToggle::IsActivePrivate.as_str(), row.is_active_private),
        ]);

        Ok(User {
            user_id: UserId::from(row.id),
            display_name,
            email,
            password_hash: PasswordHash::from(row.password_hash),
            profile: ProfileDetails {
                first_name: row.first_name,
                last_name: row.last_name,
                bio: row.bio,
                location: row.location,
                profile_image_url: row.profile_image_url,
            },
            is_active: row.is_active,
            is_admin: row.is_admin,
            email_verified: row.email_verified,
            email_verified_at: row.email_verified_at,
            privacy,
            notifications: NotificationPreferences {
                messages_enabled: row.messages_enabled,
                messages_from_strangers: row.messages_from_strangers,
                messages_notifications: row.messages_notifications,
                forum_reply: row.forum_reply,
                forum_mention: row.forum_mention,
                forum_quote: row.forum_quote,
                email_events: row.email_events,
                email_messages: row.email_messages,
                email_newsletter: row.email_newsletter,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Map a sqlx error to a domain error, naming the operation in the log
fn map_db_error(operation: &str, e: sqlx::Error) -> ProfileError {
    if let Some(db_error) = e.as_database_error()
        && db_error.is_unique_violation()
    {
        match db_error.constraint() {
            Some(constraint) if constraint.contains("display_name") => {
                return ProfileError::DisplayNameTaken;
            }
            Some(constraint) if constraint.contains("email") => {
                return ProfileError::EmailTaken;
            }
            _ => {}
        }
    }

    tracing::error!("Database error {}: {}", operation, e);
    let error_msg = e.to_string();
    if error_msg.contains("relation") && error_msg.contains("does not exist") {
        ProfileError::Database {
            message: format!(
                "Database table 'users' does not exist. Please run migrations: {}",
                error_msg
            ),
        }
    } else {
        ProfileError::Database {
            message: format!("Database error while {}: {}", operation, error_msg),
        }
    }
}

/// Apply the bundled migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// SQLx implementation of the user repository
pub struct SqlxUserRepository {
    pool: Arc<PgPool>,
}

impl SqlxUserRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(
        &self,
        operation: &str,
        predicate: &str,
        bind: SqlValue<'_>,
    ) -> Result<Option<User>, ProfileError> {
        let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, predicate);
        let query = sqlx::query_as::<_, UserRow>(&sql);
        let query = match bind {
            SqlValue::Id(id) => query.bind(id),
            SqlValue::Text(text) => query.bind(text),
        };

        query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_db_error(operation, e))?
            .map(User::try_from)
            .transpose()
    }
}

enum SqlValue<'a> {
    Id(i64),
    Text(&'a str),
}

#[async_trait]
impl IUserRepository for SqlxUserRepository {
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, ProfileError> {
        self.fetch_one_where("finding user by id", "id = $1", SqlValue::Id(user_id.as_i64()))
            .await
    }

    #[tracing::instrument(skip(self, email))]
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, ProfileError> {
        self.fetch_one_where(
            "finding user by email",
            "email = $1",
            SqlValue::Text(email.as_str()),
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(display_name = %display_name))]
    async fn find_by_display_name(
        &self,
        display_name: &DisplayName,
    ) -> Result<Option<User>, ProfileError> {
        self.fetch_one_where(
            "finding user by display name",
            "display_name = $1",
            SqlValue::Text(display_name.as_str()),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<User>, ProfileError> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY id ASC OFFSET $1 LIMIT $2",
            USER_COLUMNS
        );

        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_db_error("listing users", e))?;

        rows.into_iter().map(User::try_from).collect()
    }

    #[tracing::instrument(skip(self, user), fields(display_name = %user.display_name))]
    async fn create(&self, user: NewUser) -> Result<User, ProfileError> {
        let sql = format!(
            r#"
            INSERT INTO users (
                display_name, email, password_hash,
                first_name, last_name, bio, location, profile_image_url,
                is_admin,
                email_private, first_name_private, last_name_private, bio_private,
                location_private, created_at_private, is_active_private,
                messages_enabled, messages_from_strangers, messages_notifications,
                forum_reply, forum_mention, forum_quote,
                email_events, email_messages, email_newsletter
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9,
                $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24, $25
            )
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let privacy = &user.privacy;
        let notifications = &user.notifications;
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.display_name.as_str())
            .bind(user.email.as_str())
            .bind(user.password_hash.as_str())
            .bind(user.profile.first_name.as_deref())
            .bind(user.profile.last_name.as_deref())
            .bind(user.profile.bio.as_deref())
            .bind(user.profile.location.as_deref())
            .bind(user.profile.profile_image_url.as_deref())
            .bind(user.is_admin)
            .bind(privacy.is_hidden(PrivacyToggle::EmailPrivate))
            .bind(privacy.is_hidden(PrivacyToggle::FirstNamePrivate))
            .bind(privacy.is_hidden(PrivacyToggle::LastNamePrivate))
            .bind(privacy.is_hidden(PrivacyToggle::BioPrivate))
            .bind(privacy.is_hidden(PrivacyToggle::LocationPrivate))
            .bind(privacy.is_hidden(PrivacyToggle::CreatedAtPrivate))
            .bind(privacy.is_hidden(PrivacyToggle::IsActivePrivate))
            .bind(notifications.messages_enabled)
            .bind(notifications.messages_from_strangers)
            .bind(notifications.messages_notifications)
            .bind(notifications.forum_reply)
            .bind(notifications.forum_mention)
            .bind(notifications.forum_quote)
            .bind(notifications.email_events)
            .bind(notifications.email_messages)
            .bind(notifications.email_newsletter)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_db_error("creating user", e))?;

        let created = User::try_from(row)?;
        tracing::info!(user_id = %created.user_id, "User created");
        Ok(created)
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.user_id))]
    async fn update(&self, user: &User) -> Result<(), ProfileError> {
        let privacy = &user.privacy;
        let notifications = &user.notifications;

        let result = sqlx::query(
            r#"
            UPDATE users SET
                display_name = $2, email = $3, password_hash = $4,
                first_name = $5, last_name = $6, bio = $7, location = $8,
                profile_image_url = $9,
                is_active = $10, is_admin = $11,
                email_verified = $12, email_verified_at = $13,
                email_private = $14, first_name_private = $15,
                last_name_private = $16, bio_private = $17,
                location_private = $18, created_at_private = $19,
                is_active_private = $20,
                messages_enabled = $21, messages_from_strangers = $22,
                messages_notifications = $23,
                forum_reply = $24, forum_mention = $25, forum_quote = $26,
                email_events = $27, email_messages = $28, email_newsletter = $29,
                updated_at = $30
            WHERE id = $1
            "#,
        )
        .bind(user.user_id.as_i64())
        .bind(user.display_name.as_str())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_str())
        .bind(user.profile.first_name.as_deref())
        .bind(user.profile.last_name.as_deref())
        .bind(user.profile.bio.as_deref())
        .bind(user.profile.location.as_deref())
        .bind(user.profile.profile_image_url.as_deref())
        .bind(user.is_active)
        .bind(user.is_admin)
        .bind(user.email_verified)
        .bind(user.email_verified_at)
        .bind(privacy.is_hidden(PrivacyToggle::EmailPrivate))
        .bind(privacy.is_hidden(PrivacyToggle::FirstNamePrivate))
        .bind(privacy.is_hidden(PrivacyToggle::LastNamePrivate))
        .bind(privacy.is_hidden(PrivacyToggle::BioPrivate))
        .bind(privacy.is_hidden(PrivacyToggle::LocationPrivate))
        .bind(privacy.is_hidden(PrivacyToggle::CreatedAtPrivate))
        .bind(privacy.is_hidden(PrivacyToggle::IsActivePrivate))
        .bind(notifications.messages_enabled)
        .bind(notifications.messages_from_strangers)
        .bind(notifications.messages_notifications)
        .bind(notifications.forum_reply)
        .bind(notifications.forum_mention)
        .bind(notifications.forum_quote)
        .bind(notifications.email_events)
        .bind(notifications.email_messages)
        .bind(notifications.email_newsletter)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_db_error("updating user", e))?;

        if result.rows_affected() == 0 {
            return Err(ProfileError::NotFound);
        }

        Ok(())
    }
}
