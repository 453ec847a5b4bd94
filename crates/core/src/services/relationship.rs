//! Relationship graph service.
//!
//! Owns follow edges and connection requests. A "connection" is never stored:
//! it is derived from mutual follow edges plus an accepted connection request
//! between the pair.

use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use loopline_common::{AppError, AppResult, IdGenerator, SharedClock, SystemClock};
use loopline_db::entities::connection_request::ConnectionStatus;
use loopline_db::entities::{connection_request, follow};
use loopline_db::repositories::{ConnectionRequestRepository, FollowRepository, UserRepository};

use super::events::DomainEvent;
use super::notification::NotificationService;

/// Follow relation between a viewer and a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowStatus {
    Following,
    FollowedBy,
    Mutual,
    NotFollowing,
}

/// Connection relation between a viewer and a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    RequestSent,
    RequestReceived,
    NotConnected,
}

/// Result of the relationship-status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipStatus {
    pub follow_status: FollowStatus,
    pub connection_status: ConnectionState,
}

/// How a receiver answers a connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRequestAction {
    Accept,
    Reject,
}

/// Relationship graph service for business logic.
#[derive(Clone)]
pub struct RelationshipService {
    db: Arc<DatabaseConnection>,
    follow_repo: FollowRepository,
    connection_repo: ConnectionRequestRepository,
    user_repo: UserRepository,
    notifications: Option<Arc<NotificationService>>,
    id_gen: IdGenerator,
    clock: SharedClock,
}

impl RelationshipService {
    /// Create a new relationship service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        follow_repo: FollowRepository,
        connection_repo: ConnectionRequestRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            db,
            follow_repo,
            connection_repo,
            user_repo,
            notifications: None,
            id_gen: IdGenerator::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the notification engine invoked inside each mutation.
    pub fn set_notifications(&mut self, notifications: Arc<NotificationService>) {
        self.notifications = Some(notifications);
    }

    /// Replace the clock.
    pub fn set_clock(&mut self, clock: SharedClock) {
        self.clock = clock;
    }

    async fn ensure_user_exists(&self, user_id: &str) -> AppResult<()> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::UserNotFound("User not found".to_string()))
    }

    /// Follow a user.
    ///
    /// Connection-first rule: when this follow completes a mutual pair and
    /// the target has a pending connection request toward the follower, that
    /// request is accepted in the same transaction.
    pub async fn follow(&self, follower_id: &str, followee_id: &str) -> AppResult<follow::Model> {
        if follower_id == followee_id {
            return Err(AppError::BadRequest("Cannot follow yourself".to_string()));
        }

        if self
            .follow_repo
            .is_following(follower_id, followee_id)
            .await?
        {
            return Err(AppError::BadRequest("Already following".to_string()));
        }

        self.ensure_user_exists(follower_id).await?;
        self.ensure_user_exists(followee_id).await?;

        let reverse_exists = self
            .follow_repo
            .is_following(followee_id, follower_id)
            .await?;
        let pending_back = if reverse_exists {
            self.connection_repo
                .find_pending_by_pair(followee_id, follower_id)
                .await?
        } else {
            None
        };

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let model = follow::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(follower_id.to_string()),
            followee_id: Set(followee_id.to_string()),
            created_at: Set(self.clock.now().into()),
        };
        let edge = self.follow_repo.create_in(&txn, model).await?;

        let mut events = vec![DomainEvent::Followed {
            follow: edge.clone(),
        }];

        if let Some(request) = pending_back {
            let accepted = self
                .connection_repo
                .resolve_in(&txn, request, ConnectionStatus::Accepted, self.clock.now())
                .await?;
            events.push(DomainEvent::ConnectionAccepted { request: accepted });
        }

        let created = self.run_engine(&txn, &events).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.dispatch(&created).await;

        Ok(edge)
    }

    /// Unfollow a user.
    ///
    /// If the pair was connected, the connection is broken: the accepted
    /// request flips to rejected. The reverse follow edge stays.
    pub async fn unfollow(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        if !self
            .follow_repo
            .is_following(follower_id, followee_id)
            .await?
        {
            return Err(AppError::BadRequest("Not following".to_string()));
        }

        let mutual = self
            .follow_repo
            .is_following(followee_id, follower_id)
            .await?;
        let connected = mutual
            && self
                .connection_repo
                .is_connected(follower_id, followee_id)
                .await?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.follow_repo
            .delete_by_pair_in(&txn, follower_id, followee_id)
            .await?;

        if connected {
            self.connection_repo
                .reject_accepted_between_in(&txn, follower_id, followee_id, self.clock.now())
                .await?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Send a connection request.
    pub async fn send_connection_request(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> AppResult<connection_request::Model> {
        if sender_id == receiver_id {
            return Err(AppError::BadRequest(
                "Cannot send a connection request to yourself".to_string(),
            ));
        }

        if self
            .connection_repo
            .find_by_pair(sender_id, receiver_id)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest(
                "Connection request already exists".to_string(),
            ));
        }

        self.ensure_user_exists(sender_id).await?;
        self.ensure_user_exists(receiver_id).await?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let model = connection_request::ActiveModel {
            id: Set(self.id_gen.generate()),
            sender_id: Set(sender_id.to_string()),
            receiver_id: Set(receiver_id.to_string()),
            status: Set(ConnectionStatus::Pending),
            created_at: Set(self.clock.now().into()),
            responded_at: Set(None),
        };
        let request = self.connection_repo.create_in(&txn, model).await?;

        let created = self
            .run_engine(
                &txn,
                &[DomainEvent::ConnectionRequested {
                    request: request.clone(),
                }],
            )
            .await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.dispatch(&created).await;

        Ok(request)
    }

    /// Accept or reject a pending connection request.
    ///
    /// Accepting guarantees mutual follows: both missing edges are created
    /// in the same transaction.
    pub async fn respond_to_connection_request(
        &self,
        request_id: &str,
        responder_id: &str,
        action: ConnectionRequestAction,
    ) -> AppResult<connection_request::Model> {
        let request = self
            .connection_repo
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Connection request not found".to_string()))?;

        if request.receiver_id != responder_id {
            return Err(AppError::Forbidden(
                "Only the receiver can respond to a connection request".to_string(),
            ));
        }

        if request.status != ConnectionStatus::Pending {
            return Err(AppError::BadRequest(
                "Connection request is not pending".to_string(),
            ));
        }

        let sender_follows = self
            .follow_repo
            .is_following(&request.sender_id, &request.receiver_id)
            .await?;
        let receiver_follows = self
            .follow_repo
            .is_following(&request.receiver_id, &request.sender_id)
            .await?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let (status, events) = match action {
            ConnectionRequestAction::Accept => {
                for (follower, followee, exists) in [
                    (&request.sender_id, &request.receiver_id, sender_follows),
                    (&request.receiver_id, &request.sender_id, receiver_follows),
                ] {
                    if !exists {
                        let model = follow::ActiveModel {
                            id: Set(self.id_gen.generate()),
                            follower_id: Set(follower.clone()),
                            followee_id: Set(followee.clone()),
                            created_at: Set(self.clock.now().into()),
                        };
                        self.follow_repo.create_in(&txn, model).await?;
                    }
                }
                (ConnectionStatus::Accepted, true)
            }
            ConnectionRequestAction::Reject => (ConnectionStatus::Rejected, false),
        };

        let resolved = self
            .connection_repo
            .resolve_in(&txn, request, status, self.clock.now())
            .await?;

        let created = if events {
            self.run_engine(
                &txn,
                &[DomainEvent::ConnectionAccepted {
                    request: resolved.clone(),
                }],
            )
            .await?
        } else {
            Vec::new()
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.dispatch(&created).await;

        Ok(resolved)
    }

    /// Pure relationship query between a viewer and a subject.
    pub async fn relationship_status(
        &self,
        viewer_id: &str,
        subject_id: &str,
    ) -> AppResult<RelationshipStatus> {
        let following = self.follow_repo.is_following(viewer_id, subject_id).await?;
        let followed_by = self.follow_repo.is_following(subject_id, viewer_id).await?;

        let follow_status = match (following, followed_by) {
            (true, true) => FollowStatus::Mutual,
            (true, false) => FollowStatus::Following,
            (false, true) => FollowStatus::FollowedBy,
            (false, false) => FollowStatus::NotFollowing,
        };

        let connection_status = if following
            && followed_by
            && self
                .connection_repo
                .is_connected(viewer_id, subject_id)
                .await?
        {
            ConnectionState::Connected
        } else if self
            .connection_repo
            .find_pending_by_pair(viewer_id, subject_id)
            .await?
            .is_some()
        {
            ConnectionState::RequestSent
        } else if self
            .connection_repo
            .find_pending_by_pair(subject_id, viewer_id)
            .await?
            .is_some()
        {
            ConnectionState::RequestReceived
        } else {
            ConnectionState::NotConnected
        };

        Ok(RelationshipStatus {
            follow_status,
            connection_status,
        })
    }

    /// Ids of everyone following a user, for new-post fan-out.
    pub async fn follower_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        self.follow_repo.follower_ids(user_id).await
    }

    /// Follow edges toward a user (paginated).
    pub async fn followers(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        self.follow_repo.find_followers(user_id, limit, until_id).await
    }

    /// Follow edges from a user (paginated).
    pub async fn following(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        self.follow_repo.find_following(user_id, limit, until_id).await
    }

    /// Pending connection requests addressed to a user (paginated).
    pub async fn pending_requests_received(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<connection_request::Model>> {
        self.connection_repo
            .find_incoming(user_id, limit, until_id)
            .await
    }

    async fn run_engine(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        events: &[DomainEvent],
    ) -> AppResult<Vec<loopline_db::entities::notification::Model>> {
        let Some(ref notifications) = self.notifications else {
            return Ok(Vec::new());
        };

        let mut created = Vec::new();
        for event in events {
            created.extend(notifications.handle_event_in(txn, event).await?);
        }
        Ok(created)
    }

    async fn dispatch(&self, created: &[loopline_db::entities::notification::Model]) {
        if let Some(ref notifications) = self.notifications {
            notifications.dispatch_created(created).await;
        }
    }
}
