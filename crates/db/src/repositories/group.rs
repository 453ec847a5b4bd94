//! Group repository.
//!
//! Covers groups themselves plus their membership rows, join requests, and
//! block list.

use std::sync::Arc;

use crate::entities::{
    group, group_block, group_join_request, group_member, Group, GroupBlock, GroupJoinRequest,
    GroupMember,
};
use loopline_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use super::map_db_err;

/// Group repository for database operations.
#[derive(Clone)]
pub struct GroupRepository {
    db: Arc<DatabaseConnection>,
}

impl GroupRepository {
    /// Create a new group repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a group by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<group::Model>> {
        Group::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a group by slug.
    pub async fn find_by_slug(&self, slug: &str) -> AppResult<Option<group::Model>> {
        Group::find()
            .filter(group::Column::Slug.eq(slug))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a slug is already taken.
    pub async fn slug_exists(&self, slug: &str) -> AppResult<bool> {
        Ok(self.find_by_slug(slug).await?.is_some())
    }

    /// Create a group. A duplicate slug surfaces as a conflict.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: group::ActiveModel,
    ) -> AppResult<group::Model> {
        model.insert(conn).await.map_err(map_db_err)
    }

    /// Hand the group to a new creator.
    pub async fn set_creator_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        group: group::Model,
        new_creator_id: &str,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<group::Model> {
        let mut active: group::ActiveModel = group.into();
        active.creator_id = Set(new_creator_id.to_string());
        active.updated_at = Set(Some(updated_at.into()));
        active
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // --- membership ---

    /// Find a membership row by group and user.
    pub async fn find_member(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<Option<group_member::Model>> {
        GroupMember::find()
            .filter(group_member::Column::GroupId.eq(group_id))
            .filter(group_member::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user is a member of a group.
    pub async fn is_member(&self, group_id: &str, user_id: &str) -> AppResult<bool> {
        Ok(self.find_member(group_id, user_id).await?.is_some())
    }

    /// Add a member. A duplicate membership surfaces as a conflict.
    pub async fn add_member_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: group_member::ActiveModel,
    ) -> AppResult<group_member::Model> {
        model.insert(conn).await.map_err(map_db_err)
    }

    /// Remove a member. Returns whether a membership was removed.
    pub async fn remove_member_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<bool> {
        let result = GroupMember::delete_many()
            .filter(group_member::Column::GroupId.eq(group_id))
            .filter(group_member::Column::UserId.eq(user_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    /// Memberships of a group (paginated).
    pub async fn find_members(
        &self,
        group_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<group_member::Model>> {
        let mut query = GroupMember::find()
            .filter(group_member::Column::GroupId.eq(group_id))
            .order_by_desc(group_member::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(group_member::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // --- join requests ---

    /// Find a join request by ID.
    pub async fn find_join_request(
        &self,
        id: &str,
    ) -> AppResult<Option<group_join_request::Model>> {
        GroupJoinRequest::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the pending join request for a group and user, if any.
    pub async fn find_join_request_by_pair(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<Option<group_join_request::Model>> {
        GroupJoinRequest::find()
            .filter(group_join_request::Column::GroupId.eq(group_id))
            .filter(group_join_request::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a join request. A duplicate pending request surfaces as a
    /// conflict.
    pub async fn create_join_request_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: group_join_request::ActiveModel,
    ) -> AppResult<group_join_request::Model> {
        model.insert(conn).await.map_err(map_db_err)
    }

    /// Delete a join request. Returns whether a row was removed.
    pub async fn delete_join_request_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<bool> {
        let result = GroupJoinRequest::delete_many()
            .filter(group_join_request::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    /// Pending join requests of a group (paginated).
    pub async fn find_join_requests(
        &self,
        group_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<group_join_request::Model>> {
        let mut query = GroupJoinRequest::find()
            .filter(group_join_request::Column::GroupId.eq(group_id))
            .order_by_desc(group_join_request::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(group_join_request::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // --- blocks ---

    /// Check if a user is blocked from a group.
    pub async fn is_blocked(&self, group_id: &str, user_id: &str) -> AppResult<bool> {
        let found = GroupBlock::find()
            .filter(group_block::Column::GroupId.eq(group_id))
            .filter(group_block::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Block a user from a group. Blocking twice surfaces as a conflict.
    pub async fn create_block_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: group_block::ActiveModel,
    ) -> AppResult<group_block::Model> {
        model.insert(conn).await.map_err(map_db_err)
    }

    /// Blocks of a group (paginated).
    pub async fn find_blocks(
        &self,
        group_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<group_block::Model>> {
        let mut query = GroupBlock::find()
            .filter(group_block::Column::GroupId.eq(group_id))
            .order_by_desc(group_block::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(group_block::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Lift a block. Returns whether a block existed.
    pub async fn delete_block_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        group_id: &str,
        user_id: &str,
    ) -> AppResult<bool> {
        let result = GroupBlock::delete_many()
            .filter(group_block::Column::GroupId.eq(group_id))
            .filter(group_block::Column::UserId.eq(user_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }
}
