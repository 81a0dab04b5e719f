//! Directory collaborator: identity and the follow graph.
//!
//! The directory is owned by an external service; the pipeline only reads it.
//! [`DirectoryService`] is the seam, [`InMemoryDirectory`] a process-local
//! implementation for tests and single-node deployments. It maintains both
//! edge directions so follower fanout and following aggregation are each a
//! single lookup.

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("user {0} not found")]
    NotFound(u64),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Read surface of the external user/follow-graph service.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn exists(&self, user_id: u64) -> Result<bool, DirectoryError>;

    async fn follower_count(&self, author_id: u64) -> Result<usize, DirectoryError>;

    /// Users who follow `author_id` (feed fanout recipients).
    async fn followers(&self, author_id: u64) -> Result<Vec<u64>, DirectoryError>;

    /// Users that `user_id` follows (pull aggregation sources).
    async fn following(&self, user_id: u64) -> Result<Vec<u64>, DirectoryError>;
}

/// In-process directory backed by concurrent maps.
pub struct InMemoryDirectory {
    users: DashMap<u64, ()>,
    followers: DashMap<u64, BTreeSet<u64>>,
    following: DashMap<u64, BTreeSet<u64>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            followers: DashMap::new(),
            following: DashMap::new(),
        }
    }

    /// Register a user id.
    pub fn add_user(&self, user_id: u64) {
        self.users.insert(user_id, ());
    }

    /// Record that `follower_id` follows `followee_id`. Both edges are kept.
    pub fn follow(&self, follower_id: u64, followee_id: u64) -> Result<(), DirectoryError> {
        self.require(follower_id)?;
        self.require(followee_id)?;
        self.followers
            .entry(followee_id)
            .or_default()
            .insert(follower_id);
        self.following
            .entry(follower_id)
            .or_default()
            .insert(followee_id);
        Ok(())
    }

    /// Remove the follow edge in both directions.
    pub fn unfollow(&self, follower_id: u64, followee_id: u64) -> Result<(), DirectoryError> {
        self.require(follower_id)?;
        if let Some(mut set) = self.followers.get_mut(&followee_id) {
            set.remove(&follower_id);
        }
        if let Some(mut set) = self.following.get_mut(&follower_id) {
            set.remove(&followee_id);
        }
        Ok(())
    }

    fn require(&self, user_id: u64) -> Result<(), DirectoryError> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(DirectoryError::NotFound(user_id))
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn exists(&self, user_id: u64) -> Result<bool, DirectoryError> {
        Ok(self.users.contains_key(&user_id))
    }

    async fn follower_count(&self, author_id: u64) -> Result<usize, DirectoryError> {
        self.require(author_id)?;
        Ok(self.followers.get(&author_id).map_or(0, |s| s.len()))
    }

    async fn followers(&self, author_id: u64) -> Result<Vec<u64>, DirectoryError> {
        self.require(author_id)?;
        Ok(self
            .followers
            .get(&author_id)
            .map_or_else(Vec::new, |s| s.iter().copied().collect()))
    }

    async fn following(&self, user_id: u64) -> Result<Vec<u64>, DirectoryError> {
        self.require(user_id)?;
        Ok(self
            .following
            .get(&user_id)
            .map_or_else(Vec::new, |s| s.iter().copied().collect()))
    }
}
