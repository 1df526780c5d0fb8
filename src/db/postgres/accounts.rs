//! User, token and customer queries.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{constraint_error, delete_error, PgStore};
use crate::db::{AccountRepository, RepoResult, RepositoryError};
use crate::domain::aggregates::{Customer, CustomerError, CustomerProfile, Membership, NewUser, User};
use crate::domain::value_objects::{CustomerId, UserId};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, is_staff, date_joined";
const CUSTOMER_COLUMNS: &str = "id, user_id, phone, birth_date, membership";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    is_staff: bool,
    date_joined: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            email: r.email,
            first_name: r.first_name,
            last_name: r.last_name,
            is_staff: r.is_staff,
            date_joined: r.date_joined,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: CustomerId,
    user_id: UserId,
    phone: String,
    birth_date: Option<NaiveDate>,
    membership: String,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(r: CustomerRow) -> Result<Self, Self::Error> {
        let membership = Membership::from_code(&r.membership)
            .ok_or_else(|| RepositoryError::DataCorruption(format!("unknown membership {:?}", r.membership)))?;
        Ok(Self { id: r.id, user_id: r.user_id, phone: r.phone, birth_date: r.birth_date, membership })
    }
}

impl PgStore {
    async fn user_exists(&self, id: UserId) -> RepoResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn create_user(&self, user: &NewUser) -> RepoResult<User> {
        let sql = format!(
            r"
            INSERT INTO users (username, email, first_name, last_name, password_hash, is_staff)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.password_hash)
            .bind(user.is_staff)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match constraint_error(e, "unknown reference") {
                RepositoryError::Conflict(_) => {
                    RepositoryError::Conflict("A user with that username already exists.".to_owned())
                }
                other => other,
            })?;
        Ok(row.into())
    }

    async fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(User::from))
    }

    async fn find_credentials(&self, username: &str) -> RepoResult<Option<(User, String)>> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, CredentialRow>(&sql).bind(username).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| (r.user.into(), r.password_hash)))
    }

    async fn store_token(&self, token: &str, user_id: UserId, expires_at: DateTime<Utc>) -> RepoResult<()> {
        sqlx::query("INSERT INTO auth_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_for_token(&self, token: &str, now: DateTime<Utc>) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.is_staff, u.date_joined
            FROM auth_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token = $1 AND t.expires_at > $2
            ",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> RepoResult<u64> {
        let purged = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= $1").bind(now).execute(&self.pool).await?;
        Ok(purged.rows_affected())
    }

    async fn provision_customer(&self, user_id: UserId) -> RepoResult<Customer> {
        sqlx::query("INSERT INTO customers (user_id, membership) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .bind(Membership::default().code())
            .execute(&self.pool)
            .await
            .map_err(|e| constraint_error(e, &CustomerError::UnknownUser.to_string()))?;
        self.customer_for_user(user_id)
            .await?
            .ok_or_else(|| RepositoryError::DataCorruption(format!("customer for user {user_id} vanished")))
    }

    async fn list_customers(&self) -> RepoResult<Vec<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY id");
        let rows = sqlx::query_as::<_, CustomerRow>(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Customer::try_from).collect()
    }

    async fn get_customer(&self, id: CustomerId) -> RepoResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1");
        let row = sqlx::query_as::<_, CustomerRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Customer::try_from).transpose()
    }

    async fn customer_for_user(&self, user_id: UserId) -> RepoResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE user_id = $1");
        let row = sqlx::query_as::<_, CustomerRow>(&sql).bind(user_id).fetch_optional(&self.pool).await?;
        row.map(Customer::try_from).transpose()
    }

    async fn create_customer(&self, user_id: UserId, profile: &CustomerProfile) -> RepoResult<Customer> {
        if !self.user_exists(user_id).await? {
            return Err(CustomerError::UnknownUser.into());
        }
        sqlx::query(
            r"
            INSERT INTO customers (user_id, phone, birth_date, membership)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO NOTHING
            ",
        )
        .bind(user_id)
        .bind(&profile.phone)
        .bind(profile.birth_date)
        .bind(profile.membership.code())
        .execute(&self.pool)
        .await
        .map_err(|e| constraint_error(e, &CustomerError::UnknownUser.to_string()))?;
        self.customer_for_user(user_id)
            .await?
            .ok_or_else(|| RepositoryError::DataCorruption(format!("customer for user {user_id} vanished")))
    }

    async fn update_customer(&self, id: CustomerId, profile: &CustomerProfile) -> RepoResult<Option<Customer>> {
        let sql = format!(
            "UPDATE customers SET phone = $2, birth_date = $3, membership = $4 WHERE id = $1 RETURNING {CUSTOMER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(id)
            .bind(&profile.phone)
            .bind(profile.birth_date)
            .bind(profile.membership.code())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Customer::try_from).transpose()
    }

    async fn delete_customer(&self, id: CustomerId) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT id FROM customers WHERE id = $1 FOR UPDATE").bind(id).execute(&mut *tx).await?;
        let order_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE customer_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        Customer::ensure_deletable(order_count)?;

        let deleted = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| delete_error(e, CustomerError::HasOrders))?;
        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }
}
