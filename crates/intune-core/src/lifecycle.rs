//! Connection lifecycle: proposing, resolving and summarizing connections.
//!
//! The lifecycle holds no state of its own. Every call reads and writes
//! through the collaborators it was built with, and relies on the
//! `ConnectionStore` guards for the check-then-write races.

use crate::connection::{
    Connection, ConnectionState, ConnectionStats, FeedEntry, NewConnection, Role,
};
use crate::constants::{MAX_MESSAGE_CHARS, TOP_TRACKS_PER_RECOMMENDATION};
use crate::error::{ConnectError, Result};
use crate::model::{ConnectionId, Counter, SongId, TrackSummary, UserId, UserRecord};
use crate::ranking::{Candidate, RankLimit, Recommendation, rank};
use crate::repo::{ConnectionStore, SongRepository, StoreFault, UserLookup};
use crate::similarity::{Overlap, SimilarityWeights};
use crate::taste::TasteProfile;
use crate::time::{Clock, SystemClock};

pub struct ConnectionLifecycle<'a, U: ?Sized, S: ?Sized, C: ?Sized> {
    users: &'a U,
    songs: &'a S,
    connections: &'a C,
    weights: SimilarityWeights,
    clock: &'a dyn Clock,
}

impl<'a, U, S, C> ConnectionLifecycle<'a, U, S, C>
where
    U: UserLookup + ?Sized,
    S: SongRepository + ?Sized,
    C: ConnectionStore + ?Sized,
{
    pub fn new(users: &'a U, songs: &'a S, connections: &'a C) -> Self {
        Self {
            users,
            songs,
            connections,
            weights: SimilarityWeights::DEFAULT,
            clock: &SystemClock,
        }
    }

    pub fn with_weights(mut self, weights: SimilarityWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn weights(&self) -> &SimilarityWeights {
        &self.weights
    }

    /// Create a pending connection from `initiator` to `target`, stamped with
    /// their current similarity score.
    pub fn propose(
        &self,
        initiator: UserId,
        target: UserId,
        recommended_track_ref: Option<SongId>,
        message: Option<&str>,
    ) -> Result<Connection> {
        if initiator == target {
            return Err(ConnectError::InvalidTarget(initiator));
        }
        let message = check_message(message)?;

        let target_user = self
            .users
            .user_by_id(target)?
            .ok_or(ConnectError::TargetNotFound(target))?;
        let initiator_user = self
            .users
            .user_by_id(initiator)?
            .ok_or(ConnectError::UserNotFound(initiator))?;

        if self.connections.find_ordered(initiator, target)?.is_some() {
            return Err(ConnectError::DuplicateConnection { initiator, target });
        }

        let score = self.weights.score(
            &self.profile_of(&initiator_user)?,
            &self.profile_of(&target_user)?,
        );

        let new = NewConnection {
            initiator_id: initiator,
            target_id: target,
            score,
            recommended_track_ref,
            message,
            created_at: self.clock.now(),
        };

        let connection = self.connections.insert(new).map_err(|fault| match fault {
            StoreFault::Conflict(detail) => {
                tracing::warn!("proposal {initiator} -> {target} lost insert race: {detail}");
                ConnectError::DuplicateConnection { initiator, target }
            }
            other => ConnectError::Store(other),
        })?;

        tracing::info!(
            "connection {} proposed: {initiator} -> {target} (score {score:.2})",
            connection.id
        );
        Ok(connection)
    }

    /// Resolve a pending connection. Only its target may do so.
    pub fn transition(
        &self,
        id: ConnectionId,
        actor: UserId,
        new_state: ConnectionState,
    ) -> Result<Connection> {
        let current = self
            .connections
            .find_by_id(id)?
            .ok_or(ConnectError::NotFound(id))?;

        if actor != current.target_id {
            return Err(ConnectError::Forbidden {
                connection: id,
                actor,
            });
        }
        if !current.state.can_transition_to(new_state) {
            return Err(ConnectError::InvalidTransition {
                from: current.state,
                to: new_state,
            });
        }

        let expected = current.state;
        let next = Connection {
            state: new_state,
            updated_at: self.clock.now().max(current.created_at),
            ..current
        };
        let mut saved = None;
        self.connections
            .atomically(&mut || -> std::result::Result<(), StoreFault> {
                let updated = self.connections.update(&next, expected)?;
                if updated.state == ConnectionState::Accepted {
                    self.users
                        .increment(updated.initiator_id, Counter::ConnectionsMade)?;
                    self.users
                        .increment(updated.target_id, Counter::LikesReceived)?;
                }
                saved = Some(updated);
                Ok(())
            })
            .inspect_err(|e| {
                if let StoreFault::Conflict(detail) = e {
                    tracing::warn!("transition of connection {id} rejected by store: {detail}");
                }
            })?;
        let updated = saved.ok_or_else(|| {
            ConnectError::Store(StoreFault::Backend(format!(
                "transition of connection {id} committed nothing"
            )))
        })?;

        tracing::info!("connection {id} {expected} -> {}", updated.state);
        Ok(updated)
    }

    pub fn stats(&self, user: UserId) -> Result<ConnectionStats> {
        let record = self
            .users
            .user_by_id(user)?
            .ok_or(ConnectError::UserNotFound(user))?;

        let count = |role, state| -> Result<usize> {
            Ok(self
                .connections
                .query_by_user(user, role, Some(state))?
                .len())
        };

        Ok(ConnectionStats {
            accepted_count: count(Role::Initiator, ConnectionState::Accepted)?,
            pending_sent_count: count(Role::Initiator, ConnectionState::Pending)?,
            pending_received_count: count(Role::Target, ConnectionState::Pending)?,
            likes_received: record.likes_received,
            connections_made: record.connections_made,
        })
    }

    /// Sent or received connections, newest first.
    pub fn connections(
        &self,
        user: UserId,
        role: Role,
        state: Option<ConnectionState>,
    ) -> Result<Vec<Connection>> {
        Ok(self.connections.query_by_user(user, role, state)?)
    }

    /// Accepted connections in either direction, most recently resolved first.
    pub fn feed(&self, user: UserId, limit: RankLimit) -> Result<Vec<FeedEntry>> {
        let mut accepted = self
            .connections
            .query_by_user(user, Role::Initiator, Some(ConnectionState::Accepted))?;
        accepted.extend(self.connections.query_by_user(
            user,
            Role::Target,
            Some(ConnectionState::Accepted),
        )?);

        accepted.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(accepted
            .into_iter()
            .take(limit.get())
            .filter_map(|c| {
                c.counterpart(user).map(|other| FeedEntry {
                    connection_id: c.id,
                    other_user_id: other,
                    score: c.score,
                    created_at: c.created_at,
                    updated_at: c.updated_at,
                })
            })
            .collect())
    }

    /// Rank every other user against `requester`, skipping anyone already
    /// connected, and attach a few favorite tracks to each result.
    pub fn recommend(&self, requester: UserId, limit: RankLimit) -> Result<Vec<Recommendation>> {
        let me = self
            .users
            .user_by_id(requester)?
            .ok_or(ConnectError::UserNotFound(requester))?;
        let me = self.candidate(me)?;

        let candidates = self
            .users
            .list_users(requester)?
            .into_iter()
            .map(|u| self.candidate(u))
            .collect::<Result<Vec<_>>>()?;
        let pairs = self.connections.pairs_for(requester)?;

        let mut ranked = rank(&me, &candidates, &pairs, limit, &self.weights);
        for rec in &mut ranked {
            rec.top_tracks = self
                .songs
                .list_by_user(rec.user_id, true)?
                .iter()
                .take(TOP_TRACKS_PER_RECOMMENDATION)
                .map(TrackSummary::from)
                .collect();
        }

        tracing::debug!(
            "recommend for {requester}: {} of {} candidates",
            ranked.len(),
            candidates.len()
        );
        Ok(ranked)
    }

    /// Score breakdown between two stored users.
    pub fn compare(&self, a: UserId, b: UserId) -> Result<Overlap> {
        let left = self
            .users
            .user_by_id(a)?
            .ok_or(ConnectError::UserNotFound(a))?;
        let right = self
            .users
            .user_by_id(b)?
            .ok_or(ConnectError::UserNotFound(b))?;
        Ok(self
            .weights
            .overlap(&self.profile_of(&left)?, &self.profile_of(&right)?))
    }

    fn profile_of(&self, user: &UserRecord) -> Result<TasteProfile> {
        let songs = self.songs.list_by_user(user.id, false)?;
        Ok(user.taste_profile(&songs))
    }

    fn candidate(&self, user: UserRecord) -> Result<Candidate> {
        let profile = self.profile_of(&user)?;
        Ok(Candidate {
            user_id: user.id,
            username: user.username,
            profile,
        })
    }
}

/// Blank messages are dropped; long ones rejected.
fn check_message(message: Option<&str>) -> Result<Option<String>> {
    let Some(text) = message.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let len = text.chars().count();
    if len > MAX_MESSAGE_CHARS {
        return Err(ConnectError::InvalidMessage(len, MAX_MESSAGE_CHARS));
    }
    Ok(Some(text.to_string()))
}
