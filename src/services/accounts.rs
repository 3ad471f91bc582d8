use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{fetch_page, PageRequest};
use crate::{
    auth::{
        hash_password, verify_password, AuthError, AuthService, TokenResponse, TokenSubject,
        ADMIN_ROLE, ALL_PERMISSIONS,
    },
    config::AppConfig,
    db::{flatten_txn_error, DbPool},
    entities::{group, group_permission, permission, user, user_group, user_permission},
    errors::ServiceError,
    events::{Event, EventSender},
    PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: TokenResponse,
    pub user: UserView,
}

/// User as exposed by the API; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub groups: Vec<String>,
    /// Effective permissions: direct plus inherited from groups.
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub first_name: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub last_name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub group_ids: Vec<Uuid>,
    /// Direct permission codenames.
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
    pub group_ids: Option<Vec<Uuid>>,
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct GroupRequest {
    #[validate(length(min = 1, max = 150, message = "Group name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub member_count: u64,
}

fn default_true() -> bool {
    true
}

/// Users, groups, permissions and login.
#[derive(Clone)]
pub struct AccountService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    auth: Arc<AuthService>,
}

impl AccountService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, auth: Arc<AuthService>) -> Self {
        Self {
            db_pool,
            event_sender,
            auth,
        }
    }

    /// Checks credentials and issues an access token.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
        request.validate()?;
        let db = self.db_pool.as_ref();

        let found = user::Entity::find()
            .filter(user::Column::Username.eq(request.username.trim()))
            .one(db)
            .await?;

        let found = match found {
            Some(found) if verify_password(&request.password, &found.password_hash) => found,
            _ => {
                warn!("Login failed");
                return Err(AuthError::InvalidCredentials.into());
            }
        };
        if !found.is_active {
            return Err(AuthError::AccountDisabled.into());
        }

        let mut active: user::ActiveModel = found.into();
        active.last_login = Set(Some(Utc::now()));
        let logged_in = active.update(db).await?;

        let view = self.user_view(db, logged_in).await?;
        let subject = TokenSubject {
            user_id: view.id,
            name: view.full_name.clone(),
            email: view.email.clone(),
            roles: if view.is_superuser {
                vec![ADMIN_ROLE.to_string()]
            } else {
                Vec::new()
            },
            permissions: view.permissions.clone(),
        };
        let token = self.auth.generate_token(&subject)?;

        info!(user_id = %view.id, "User logged in");
        self.event_sender
            .send(Event::UserLoggedIn { user_id: view.id })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(LoginResponse { token, user: view })
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: Uuid) -> Result<UserView, ServiceError> {
        let db = self.db_pool.as_ref();
        let found = user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))?;
        self.user_view(db, found).await
    }

    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        filter: UserFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<UserView>, ServiceError> {
        let db = self.db_pool.as_ref();
        let mut query = user::Entity::find().order_by_asc(user::Column::Username);

        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(user::Column::Username.contains(term))
                    .add(user::Column::Email.contains(term))
                    .add(user::Column::FirstName.contains(term))
                    .add(user::Column::LastName.contains(term)),
            );
        }
        if let Some(active) = filter.active {
            query = query.filter(user::Column::IsActive.eq(active));
        }

        let page = fetch_page(db, query, page).await?;
        let mut items = Vec::with_capacity(page.items.len());
        for found in page.items.iter().cloned() {
            items.push(self.user_view(db, found).await?);
        }
        Ok(page.with_items(items))
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_user(
        &self,
        actor_id: Uuid,
        request: CreateUserRequest,
    ) -> Result<UserView, ServiceError> {
        request.validate()?;
        let password_hash = hash_password(&request.password)?;
        let db = self.db_pool.as_ref();

        let created = db
            .transaction::<_, user::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    ensure_unique_user(txn, None, Some(&request.username), Some(&request.email))
                        .await?;

                    let created = user::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        username: Set(request.username.trim().to_string()),
                        email: Set(request.email.trim().to_lowercase()),
                        first_name: Set(request.first_name.trim().to_string()),
                        last_name: Set(request.last_name.trim().to_string()),
                        password_hash: Set(password_hash),
                        is_active: Set(request.is_active),
                        is_superuser: Set(request.is_superuser),
                        last_login: Set(None),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    replace_user_groups(txn, created.id, &request.group_ids).await?;
                    replace_user_permissions(txn, created.id, &request.permissions).await?;
                    Ok(created)
                })
            })
            .await
            .map_err(flatten_txn_error)?;

        info!(user_id = %created.id, "User created");
        self.send(Event::RecordCreated {
            entity: "user".to_string(),
            entity_id: created.id,
            actor_id,
        })
        .await?;

        self.user_view(db, created).await
    }

    #[instrument(skip(self, request))]
    pub async fn update_user(
        &self,
        actor_id: Uuid,
        id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserView, ServiceError> {
        request.validate()?;
        let password_hash = match &request.password {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };
        let db = self.db_pool.as_ref();

        let updated = db
            .transaction::<_, user::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let found = user::Entity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("User", id))?;
                    ensure_unique_user(txn, Some(id), None, request.email.as_deref()).await?;

                    if found.id == actor_id && request.is_active == Some(false) {
                        return Err(ServiceError::InvalidOperation(
                            "You cannot deactivate your own account".to_string(),
                        ));
                    }

                    let mut active: user::ActiveModel = found.into();
                    if let Some(email) = &request.email {
                        active.email = Set(email.trim().to_lowercase());
                    }
                    if let Some(first_name) = &request.first_name {
                        active.first_name = Set(first_name.trim().to_string());
                    }
                    if let Some(last_name) = &request.last_name {
                        active.last_name = Set(last_name.trim().to_string());
                    }
                    if let Some(hash) = password_hash {
                        active.password_hash = Set(hash);
                    }
                    if let Some(is_active) = request.is_active {
                        active.is_active = Set(is_active);
                    }
                    if let Some(is_superuser) = request.is_superuser {
                        active.is_superuser = Set(is_superuser);
                    }
                    let updated = active.update(txn).await?;

                    if let Some(group_ids) = &request.group_ids {
                        replace_user_groups(txn, id, group_ids).await?;
                    }
                    if let Some(permissions) = &request.permissions {
                        replace_user_permissions(txn, id, permissions).await?;
                    }
                    Ok(updated)
                })
            })
            .await
            .map_err(flatten_txn_error)?;

        self.send(Event::RecordUpdated {
            entity: "user".to_string(),
            entity_id: id,
            actor_id,
        })
        .await?;

        self.user_view(db, updated).await
    }

    /// Deactivates a user; accounts are never removed.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, actor_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let found = user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))?;

        if found.id == actor_id {
            return Err(ServiceError::InvalidOperation(
                "You cannot delete your own account".to_string(),
            ));
        }
        if found.is_superuser {
            return Err(ServiceError::InvalidOperation(
                "Superusers cannot be deleted".to_string(),
            ));
        }

        let mut active: user::ActiveModel = found.into();
        active.is_active = Set(false);
        active.update(db).await?;

        info!(user_id = %id, "User deactivated");
        self.send(Event::RecordDeleted {
            entity: "user".to_string(),
            entity_id: id,
            actor_id,
        })
        .await
    }

    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        request.validate()?;
        let db = self.db_pool.as_ref();
        let found = user::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))?;

        if !verify_password(&request.current_password, &found.password_hash) {
            return Err(ServiceError::ValidationError(
                "Current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = found.into();
        active.password_hash = Set(hash_password(&request.new_password)?);
        active.update(db).await?;

        self.send(Event::RecordUpdated {
            entity: "user".to_string(),
            entity_id: user_id,
            actor_id: user_id,
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_groups(&self, page: PageRequest) -> Result<PaginatedResponse<GroupView>, ServiceError> {
        let db = self.db_pool.as_ref();
        let query = group::Entity::find().order_by_asc(group::Column::Name);
        let page = fetch_page(db, query, page).await?;

        let mut items = Vec::with_capacity(page.items.len());
        for found in page.items.iter().cloned() {
            items.push(group_view(db, found).await?);
        }
        Ok(page.with_items(items))
    }

    #[instrument(skip(self))]
    pub async fn get_group(&self, id: Uuid) -> Result<GroupView, ServiceError> {
        let db = self.db_pool.as_ref();
        let found = group::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Group", id))?;
        group_view(db, found).await
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_group(&self, actor_id: Uuid, request: GroupRequest) -> Result<GroupView, ServiceError> {
        request.validate()?;
        let db = self.db_pool.as_ref();

        let created = db
            .transaction::<_, group::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    ensure_unique_group(txn, None, &request.name).await?;
                    let created = group::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        name: Set(request.name.trim().to_string()),
                        description: Set(request.description.clone()),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;
                    replace_group_permissions(txn, created.id, &request.permissions).await?;
                    Ok(created)
                })
            })
            .await
            .map_err(flatten_txn_error)?;

        self.send(Event::RecordCreated {
            entity: "group".to_string(),
            entity_id: created.id,
            actor_id,
        })
        .await?;

        group_view(db, created).await
    }

    #[instrument(skip(self, request))]
    pub async fn update_group(
        &self,
        actor_id: Uuid,
        id: Uuid,
        request: GroupRequest,
    ) -> Result<GroupView, ServiceError> {
        request.validate()?;
        let db = self.db_pool.as_ref();

        let updated = db
            .transaction::<_, group::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let found = group::Entity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("Group", id))?;
                    ensure_unique_group(txn, Some(id), &request.name).await?;

                    let mut active: group::ActiveModel = found.into();
                    active.name = Set(request.name.trim().to_string());
                    active.description = Set(request.description.clone());
                    let updated = active.update(txn).await?;
                    replace_group_permissions(txn, id, &request.permissions).await?;
                    Ok(updated)
                })
            })
            .await
            .map_err(flatten_txn_error)?;

        self.send(Event::RecordUpdated {
            entity: "group".to_string(),
            entity_id: id,
            actor_id,
        })
        .await?;

        group_view(db, updated).await
    }

    /// Groups have no soft-delete flag; removal is refused while users belong to them.
    #[instrument(skip(self))]
    pub async fn delete_group(&self, actor_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let found = group::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Group", id))?;

        let members = user_group::Entity::find()
            .filter(user_group::Column::GroupId.eq(id))
            .count(db)
            .await?;
        if members > 0 {
            return Err(ServiceError::Conflict(format!(
                "Group {} still has {} member(s)",
                found.name, members
            )));
        }

        db.transaction::<_, (), ServiceError>(|txn| {
            Box::pin(async move {
                group_permission::Entity::delete_many()
                    .filter(group_permission::Column::GroupId.eq(id))
                    .exec(txn)
                    .await?;
                group::Entity::delete_by_id(id).exec(txn).await?;
                Ok(())
            })
        })
        .await
        .map_err(flatten_txn_error)?;

        self.send(Event::RecordDeleted {
            entity: "group".to_string(),
            entity_id: id,
            actor_id,
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn list_permissions(&self, module: Option<String>) -> Result<Vec<permission::Model>, ServiceError> {
        let mut query = permission::Entity::find()
            .order_by_asc(permission::Column::Module)
            .order_by_asc(permission::Column::Codename);
        if let Some(module) = module.filter(|m| !m.trim().is_empty()) {
            query = query.filter(permission::Column::Module.eq(module.trim()));
        }
        Ok(query.all(self.db_pool.as_ref()).await?)
    }

    /// Upserts every known permission and creates the configured superuser if missing.
    #[instrument(skip(self, config))]
    pub async fn bootstrap(&self, config: &AppConfig) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        sync_permissions(db).await?;

        let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password)
        else {
            return Ok(());
        };

        let exists = user::Entity::find()
            .filter(user::Column::Username.eq(username.as_str()))
            .one(db)
            .await?;
        if exists.is_some() {
            return Ok(());
        }

        let email = config
            .admin_email
            .clone()
            .unwrap_or_else(|| format!("{}@localhost", username));
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.clone()),
            email: Set(email),
            first_name: Set("Administrator".to_string()),
            last_name: Set(String::new()),
            password_hash: Set(hash_password(password)?),
            is_active: Set(true),
            is_superuser: Set(true),
            last_login: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(username = %username, "Bootstrap superuser created");
        Ok(())
    }

    async fn user_view<C: ConnectionTrait>(&self, db: &C, found: user::Model) -> Result<UserView, ServiceError> {
        let group_ids: Vec<Uuid> = user_group::Entity::find()
            .filter(user_group::Column::UserId.eq(found.id))
            .all(db)
            .await?
            .into_iter()
            .map(|link| link.group_id)
            .collect();

        let groups = if group_ids.is_empty() {
            Vec::new()
        } else {
            group::Entity::find()
                .filter(group::Column::Id.is_in(group_ids.clone()))
                .order_by_asc(group::Column::Name)
                .all(db)
                .await?
                .into_iter()
                .map(|g| g.name)
                .collect()
        };

        let permissions = effective_permissions(db, found.id, &group_ids).await?;
        let full_name = format!("{} {}", found.first_name, found.last_name)
            .trim()
            .to_string();

        Ok(UserView {
            id: found.id,
            full_name: if full_name.is_empty() {
                found.username.clone()
            } else {
                full_name
            },
            username: found.username,
            email: found.email,
            first_name: found.first_name,
            last_name: found.last_name,
            is_active: found.is_active,
            is_superuser: found.is_superuser,
            last_login: found.last_login,
            groups,
            permissions,
            created_at: found.created_at,
        })
    }

    async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)
    }
}

/// Sorted union of direct and group permission codenames.
async fn effective_permissions<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    group_ids: &[Uuid],
) -> Result<Vec<String>, ServiceError> {
    let mut permission_ids: Vec<Uuid> = user_permission::Entity::find()
        .filter(user_permission::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.permission_id)
        .collect();

    if !group_ids.is_empty() {
        permission_ids.extend(
            group_permission::Entity::find()
                .filter(group_permission::Column::GroupId.is_in(group_ids.to_vec()))
                .all(db)
                .await?
                .into_iter()
                .map(|link| link.permission_id),
        );
    }

    if permission_ids.is_empty() {
        return Ok(Vec::new());
    }

    let codenames: BTreeSet<String> = permission::Entity::find()
        .filter(permission::Column::Id.is_in(permission_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| p.codename)
        .collect();
    Ok(codenames.into_iter().collect())
}

async fn group_view<C: ConnectionTrait>(db: &C, found: group::Model) -> Result<GroupView, ServiceError> {
    let permission_ids: Vec<Uuid> = group_permission::Entity::find()
        .filter(group_permission::Column::GroupId.eq(found.id))
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.permission_id)
        .collect();

    let permissions = if permission_ids.is_empty() {
        Vec::new()
    } else {
        permission::Entity::find()
            .filter(permission::Column::Id.is_in(permission_ids))
            .order_by_asc(permission::Column::Codename)
            .all(db)
            .await?
            .into_iter()
            .map(|p| p.codename)
            .collect()
    };

    let member_count = user_group::Entity::find()
        .filter(user_group::Column::GroupId.eq(found.id))
        .count(db)
        .await?;

    Ok(GroupView {
        id: found.id,
        name: found.name,
        description: found.description,
        permissions,
        member_count,
    })
}

pub(crate) async fn sync_permissions<C: ConnectionTrait>(db: &C) -> Result<(), ServiceError> {
    let existing: HashMap<String, permission::Model> = permission::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.codename.clone(), p))
        .collect();

    let missing: Vec<permission::ActiveModel> = ALL_PERMISSIONS
        .iter()
        .filter(|(codename, _, _)| !existing.contains_key(*codename))
        .map(|(codename, name, module)| permission::ActiveModel {
            id: Set(Uuid::new_v4()),
            codename: Set(codename.to_string()),
            name: Set(name.to_string()),
            module: Set(module.to_string()),
        })
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    let inserted = missing.len();
    permission::Entity::insert_many(missing)
        .on_conflict(
            OnConflict::column(permission::Column::Codename)
                .update_columns([permission::Column::Name, permission::Column::Module])
                .to_owned(),
        )
        .exec(db)
        .await?;

    info!(inserted, "Permissions synchronised");
    Ok(())
}

async fn resolve_permissions<C: ConnectionTrait>(
    db: &C,
    codenames: &[String],
) -> Result<Vec<permission::Model>, ServiceError> {
    if codenames.is_empty() {
        return Ok(Vec::new());
    }
    let wanted: BTreeSet<&str> = codenames.iter().map(|c| c.trim()).collect();
    let found = permission::Entity::find()
        .filter(permission::Column::Codename.is_in(wanted.iter().copied()))
        .all(db)
        .await?;

    if found.len() != wanted.len() {
        let known: BTreeSet<&str> = found.iter().map(|p| p.codename.as_str()).collect();
        let unknown: Vec<&str> = wanted.difference(&known).copied().collect();
        return Err(ServiceError::ValidationError(format!(
            "Unknown permissions: {}",
            unknown.join(", ")
        )));
    }
    Ok(found)
}

async fn replace_user_permissions<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    codenames: &[String],
) -> Result<(), ServiceError> {
    let permissions = resolve_permissions(db, codenames).await?;
    user_permission::Entity::delete_many()
        .filter(user_permission::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    for p in permissions {
        user_permission::ActiveModel {
            user_id: Set(user_id),
            permission_id: Set(p.id),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn replace_group_permissions<C: ConnectionTrait>(
    db: &C,
    group_id: Uuid,
    codenames: &[String],
) -> Result<(), ServiceError> {
    let permissions = resolve_permissions(db, codenames).await?;
    group_permission::Entity::delete_many()
        .filter(group_permission::Column::GroupId.eq(group_id))
        .exec(db)
        .await?;
    for p in permissions {
        group_permission::ActiveModel {
            group_id: Set(group_id),
            permission_id: Set(p.id),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn replace_user_groups<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    group_ids: &[Uuid],
) -> Result<(), ServiceError> {
    let wanted: BTreeSet<Uuid> = group_ids.iter().copied().collect();
    if !wanted.is_empty() {
        let found = group::Entity::find()
            .filter(group::Column::Id.is_in(wanted.iter().copied()))
            .count(db)
            .await?;
        if found as usize != wanted.len() {
            return Err(ServiceError::ValidationError(
                "Some groups do not exist".to_string(),
            ));
        }
    }

    user_group::Entity::delete_many()
        .filter(user_group::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    for group_id in wanted {
        user_group::ActiveModel {
            user_id: Set(user_id),
            group_id: Set(group_id),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

async fn ensure_unique_user<C: ConnectionTrait>(
    db: &C,
    exclude: Option<Uuid>,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<(), ServiceError> {
    let exclude_filter = |condition: Condition| match exclude {
        Some(id) => condition.add(user::Column::Id.ne(id)),
        None => condition,
    };

    if let Some(username) = username {
        let taken = user::Entity::find()
            .filter(exclude_filter(
                Condition::all().add(user::Column::Username.eq(username.trim())),
            ))
            .one(db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Username {} is already taken",
                username.trim()
            )));
        }
    }

    if let Some(email) = email {
        let email = email.trim().to_lowercase();
        let taken = user::Entity::find()
            .filter(exclude_filter(
                Condition::all().add(user::Column::Email.eq(email.as_str())),
            ))
            .one(db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Email {} is already in use",
                email
            )));
        }
    }

    Ok(())
}

async fn ensure_unique_group<C: ConnectionTrait>(
    db: &C,
    exclude: Option<Uuid>,
    name: &str,
) -> Result<(), ServiceError> {
    let mut query = group::Entity::find().filter(group::Column::Name.eq(name.trim()));
    if let Some(id) = exclude {
        query = query.filter(group::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(ServiceError::Conflict(format!(
            "Group {} already exists",
            name.trim()
        )));
    }
    Ok(())
}
