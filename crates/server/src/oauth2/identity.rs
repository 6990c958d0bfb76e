//! Identity federation store.
//!
//! Maps an external `(provider, subject)` pair to a gateway user and issues a
//! new API key for every successful sign-in. The lookup, user/identity
//! creation or profile refresh, and key insertion happen in one transaction,
//! so a user without an identity or an identity without its new key is never
//! observable.
//!
//! Prior keys are never touched: signing in again adds a key, it does not
//! rotate the old ones.

use crate::entity::gateway_identity::{self, IdentityProvider};
use crate::entity::{gateway_api_key, gateway_user};
use crate::error::StoreError;
use crate::oauth2::credentials::{KeyHasher, generate_api_key, parse_api_key};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, QueryOrder, SqlErr, TransactionError, TransactionTrait,
    sea_query::Expr,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use time::OffsetDateTime;

/// Mutable profile fields copied from the provider on every sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    pub login: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
}

/// Result of a successful federation. `plaintext_key` must go to the user
/// exactly once and nowhere else.
pub struct IssuedCredential {
    pub plaintext_key: String,
    pub user_id: String,
    pub key_id: String,
    /// Whether this sign-in created the user.
    pub created_user: bool,
}

impl fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("user_id", &self.user_id)
            .field("key_id", &self.key_id)
            .field("created_user", &self.created_user)
            .field("plaintext_key", &"<redacted>")
            .finish()
    }
}

/// Identity resolved from a presented API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedKey {
    pub user_id: String,
    pub key_id: String,
}

struct TxOutcome {
    user_id: String,
    key_id: String,
    created_user: bool,
}

/// Everything one link attempt writes, owned so it can move into a transaction.
#[derive(Clone)]
struct LinkRequest {
    provider: String,
    subject: String,
    profile: ProfileFields,
    key_prefix: String,
    key_hash: String,
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn flatten(err: TransactionError<DbErr>) -> DbErr {
    match err {
        TransactionError::Connection(e) | TransactionError::Transaction(e) => e,
    }
}

/// Run `attempt(0)`, and `attempt(1)` once more if the first lost a uniqueness race.
async fn retry_on_conflict<T, F, Fut>(mut attempt: F) -> Result<T, DbErr>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    match attempt(0).await {
        Err(err) if is_unique_violation(&err) => {
            tracing::warn!("identity insert lost a uniqueness race, retrying");
            attempt(1).await
        }
        other => other,
    }
}

async fn find_identity(
    txn: &DatabaseTransaction,
    link: &LinkRequest,
) -> Result<Option<gateway_identity::Model>, DbErr> {
    gateway_identity::Entity::find()
        .filter(gateway_identity::Column::Provider.eq(link.provider.as_str()))
        .filter(gateway_identity::Column::Subject.eq(link.subject.as_str()))
        .one(txn)
        .await
}

/// Write the user/identity rows and the new key, given the result of the identity lookup.
async fn link_in_txn(
    txn: &DatabaseTransaction,
    existing: Option<gateway_identity::Model>,
    link: LinkRequest,
) -> Result<TxOutcome, DbErr> {
    let now = OffsetDateTime::now_utc();
    let LinkRequest {
        provider,
        subject,
        profile,
        key_prefix,
        key_hash,
    } = link;

    let (user_id, created_user) = match existing {
        Some(identity) => {
            let user_id = identity.user_id.clone();
            let mut active: gateway_identity::ActiveModel = identity.into();
            active.login = Set(profile.login);
            active.display_name = Set(profile.display_name);
            active.avatar_url = Set(profile.avatar_url);
            active.profile_url = Set(profile.profile_url);
            active.updated_at = Set(now);
            active.update(txn).await?;

            gateway_user::Entity::update_many()
                .col_expr(gateway_user::Column::LastLoginAt, Expr::value(now))
                .filter(gateway_user::Column::Id.eq(user_id.as_str()))
                .exec(txn)
                .await?;
            (user_id, false)
        }
        None => {
            let user_id = uuid::Uuid::new_v4().to_string();
            gateway_user::ActiveModel {
                id: Set(user_id.clone()),
                created_at: Set(now),
                last_login_at: Set(Some(now)),
            }
            .insert(txn)
            .await?;

            gateway_identity::ActiveModel {
                id: Set(uuid::Uuid::new_v4().to_string()),
                user_id: Set(user_id.clone()),
                provider: Set(provider),
                subject: Set(subject),
                login: Set(profile.login),
                display_name: Set(profile.display_name),
                avatar_url: Set(profile.avatar_url),
                profile_url: Set(profile.profile_url),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(txn)
            .await?;
            (user_id, true)
        }
    };

    let key_id = uuid::Uuid::new_v4().to_string();
    gateway_api_key::ActiveModel {
        id: Set(key_id.clone()),
        user_id: Set(user_id.clone()),
        key_prefix: Set(key_prefix),
        key_hash: Set(key_hash),
        created_at: Set(now),
        last_used_at: Set(None),
    }
    .insert(txn)
    .await?;

    Ok(TxOutcome {
        user_id,
        key_id,
        created_user,
    })
}

#[derive(Debug, Clone)]
pub struct IdentityFederationStore {
    db: Arc<DatabaseConnection>,
    hasher: KeyHasher,
}

impl IdentityFederationStore {
    pub fn new(db: Arc<DatabaseConnection>, pepper: &str) -> Self {
        Self {
            db,
            hasher: KeyHasher::new(pepper),
        }
    }

    /// Link `(provider, subject)` to a user, refreshing or creating it, and issue a new key.
    ///
    /// A concurrent first sign-in for the same subject can lose the unique
    /// `(provider, subject)` race; the losing transaction rolls back and is
    /// retried once, which then takes the update path.
    #[tracing::instrument(skip_all, fields(provider = %provider, subject = %subject))]
    pub async fn upsert(
        &self,
        provider: IdentityProvider,
        subject: &str,
        profile: &ProfileFields,
    ) -> Result<IssuedCredential, StoreError> {
        let key = generate_api_key().map_err(|e| StoreError::Random(e.to_string()))?;
        let key_hash = self
            .hasher
            .hash(&key.plaintext)
            .map_err(StoreError::Hashing)?;

        let link = LinkRequest {
            provider: provider.as_str().to_string(),
            subject: subject.to_string(),
            profile: profile.clone(),
            key_prefix: key.prefix.clone(),
            key_hash,
        };
        let store = self;
        let link = &link;
        let outcome = retry_on_conflict(move |_| store.upsert_once(link)).await?;

        tracing::info!(
            user_id = %outcome.user_id,
            key_id = %outcome.key_id,
            created_user = outcome.created_user,
            "issued API key for federated identity"
        );

        Ok(IssuedCredential {
            plaintext_key: key.plaintext,
            user_id: outcome.user_id,
            key_id: outcome.key_id,
            created_user: outcome.created_user,
        })
    }

    async fn upsert_once(&self, link: &LinkRequest) -> Result<TxOutcome, DbErr> {
        let link = link.clone();
        self.db
            .transaction::<_, TxOutcome, DbErr>(|txn| {
                Box::pin(async move {
                    let existing = find_identity(txn, &link).await?;
                    link_in_txn(txn, existing, link).await
                })
            })
            .await
            .map_err(flatten)
    }

    /// Resolve a presented API key. Unknown or malformed keys yield `Ok(None)`.
    #[tracing::instrument(skip(self, presented))]
    pub async fn authenticate(
        &self,
        presented: &str,
    ) -> Result<Option<AuthenticatedKey>, StoreError> {
        let Some((prefix, _)) = parse_api_key(presented) else {
            return Ok(None);
        };

        let candidates = gateway_api_key::Entity::find()
            .filter(gateway_api_key::Column::KeyPrefix.eq(prefix))
            .all(self.db.as_ref())
            .await?;

        for candidate in candidates {
            if !self.hasher.verify(presented, &candidate.key_hash) {
                continue;
            }
            gateway_api_key::Entity::update_many()
                .col_expr(
                    gateway_api_key::Column::LastUsedAt,
                    Expr::value(OffsetDateTime::now_utc()),
                )
                .filter(gateway_api_key::Column::Id.eq(candidate.id.as_str()))
                .exec(self.db.as_ref())
                .await?;
            return Ok(Some(AuthenticatedKey {
                user_id: candidate.user_id,
                key_id: candidate.id,
            }));
        }
        Ok(None)
    }

    /// Most recently refreshed identity linked to a user.
    #[tracing::instrument(skip(self))]
    pub async fn primary_identity(
        &self,
        user_id: &str,
    ) -> Result<Option<gateway_identity::Model>, StoreError> {
        Ok(gateway_identity::Entity::find()
            .filter(gateway_identity::Column::UserId.eq(user_id))
            .order_by_desc(gateway_identity::Column::UpdatedAt)
            .one(self.db.as_ref())
            .await?)
    }

    /// All key rows for a user, oldest first. Hashes only.
    #[tracing::instrument(skip(self))]
    pub async fn keys_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<gateway_api_key::Model>, StoreError> {
        Ok(gateway_api_key::Entity::find()
            .filter(gateway_api_key::Column::UserId.eq(user_id))
            .order_by_asc(gateway_api_key::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?)
    }
}
