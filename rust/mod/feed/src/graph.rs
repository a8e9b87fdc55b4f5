use std::sync::Arc;

use feed_core::ServiceError;
use feed_kv::KVStore;
use tracing::debug;

use crate::error::kv_err;
use crate::keys;
use crate::model::UserId;

/// Follower / followee relationships, indexed in both directions so a post
/// can find its recipients with one set read.
///
/// Ids are not validated: any integer names a user.
#[derive(Clone)]
pub struct SocialGraph {
    kv: Arc<dyn KVStore>,
}

impl SocialGraph {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    /// Record that `follower` follows `followee`. Both index directions are
    /// written in one storage transaction. Returns false if the edge existed.
    pub fn add_follow(&self, follower: UserId, followee: UserId) -> Result<bool, ServiceError> {
        let following = keys::following(follower);
        let followers = keys::followers(followee);
        let follower_s = follower.to_string();
        let followee_s = followee.to_string();

        let added = self
            .kv
            .sadd_batch(&[
                (following.as_str(), followee_s.as_str()),
                (followers.as_str(), follower_s.as_str()),
            ])
            .map_err(kv_err)?;
        debug!("add_follow: {} -> {} (new: {})", follower, followee, added > 0);
        Ok(added > 0)
    }

    /// Record many edges in one storage transaction.
    pub fn add_follows(&self, edges: &[(UserId, UserId)]) -> Result<(), ServiceError> {
        if edges.is_empty() {
            return Ok(());
        }
        let owned: Vec<(String, String)> = edges
            .iter()
            .flat_map(|(follower, followee)| {
                [
                    (keys::following(*follower), followee.to_string()),
                    (keys::followers(*followee), follower.to_string()),
                ]
            })
            .collect();
        let pairs: Vec<(&str, &str)> = owned
            .iter()
            .map(|(k, m)| (k.as_str(), m.as_str()))
            .collect();
        self.kv.sadd_batch(&pairs).map_err(kv_err)?;
        debug!("add_follows: {} edges", edges.len());
        Ok(())
    }

    /// Remove an edge. Timeline entries already delivered are left in place.
    pub fn remove_follow(&self, follower: UserId, followee: UserId) -> Result<bool, ServiceError> {
        let removed = self
            .kv
            .srem(&keys::following(follower), &followee.to_string())
            .map_err(kv_err)?;
        self.kv
            .srem(&keys::followers(followee), &follower.to_string())
            .map_err(kv_err)?;
        Ok(removed)
    }

    /// Everyone following `user`, ascending. Empty if nobody does.
    pub fn followers(&self, user: UserId) -> Result<Vec<UserId>, ServiceError> {
        self.members(&keys::followers(user))
    }

    /// Everyone `user` follows, ascending.
    pub fn followees(&self, user: UserId) -> Result<Vec<UserId>, ServiceError> {
        self.members(&keys::following(user))
    }

    pub fn follower_count(&self, user: UserId) -> Result<usize, ServiceError> {
        self.kv.scard(&keys::followers(user)).map_err(kv_err)
    }

    /// Remove every edge.
    pub fn clear(&self) -> Result<(), ServiceError> {
        let mut removed = self.kv.delete_prefix(keys::FOLLOWING_PREFIX).map_err(kv_err)?;
        removed += self.kv.delete_prefix(keys::FOLLOWERS_PREFIX).map_err(kv_err)?;
        debug!("graph cleared: {} members removed", removed);
        Ok(())
    }

    fn members(&self, key: &str) -> Result<Vec<UserId>, ServiceError> {
        let mut ids = self
            .kv
            .smembers(key)
            .map_err(kv_err)?
            .iter()
            .map(|m| keys::parse_user_member(m))
            .collect::<Result<Vec<_>, _>>()?;
        // Members come back in lexical order.
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_kv::MemoryStore;

    fn graph() -> SocialGraph {
        SocialGraph::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn add_follow_indexes_both_directions() {
        let g = graph();
        assert!(g.add_follow(2, 1).unwrap());
        assert!(g.add_follow(10, 1).unwrap());
        assert_eq!(g.followers(1).unwrap(), vec![2, 10]);
        assert_eq!(g.followees(2).unwrap(), vec![1]);
        assert!(g.followers(2).unwrap().is_empty());
        assert_eq!(g.follower_count(1).unwrap(), 2);
    }

    #[test]
    fn add_follow_is_idempotent() {
        let g = graph();
        assert!(g.add_follow(2, 1).unwrap());
        assert!(!g.add_follow(2, 1).unwrap());
        assert_eq!(g.followers(1).unwrap(), vec![2]);
        assert_eq!(g.followees(2).unwrap(), vec![1]);
    }

    #[test]
    fn self_follow_is_allowed() {
        let g = graph();
        g.add_follow(5, 5).unwrap();
        assert_eq!(g.followers(5).unwrap(), vec![5]);
        assert_eq!(g.followees(5).unwrap(), vec![5]);
    }

    #[test]
    fn bulk_and_remove() {
        let g = graph();
        g.add_follows(&[(1, 3), (2, 3), (1, 2), (1, 3)]).unwrap();
        assert_eq!(g.followers(3).unwrap(), vec![1, 2]);
        assert_eq!(g.followees(1).unwrap(), vec![2, 3]);

        assert!(g.remove_follow(1, 3).unwrap());
        assert!(!g.remove_follow(1, 3).unwrap());
        assert_eq!(g.followers(3).unwrap(), vec![2]);
        assert_eq!(g.followees(1).unwrap(), vec![2]);
    }

    #[test]
    fn clear_removes_all_edges() {
        let g = graph();
        g.add_follows(&[(1, 2), (2, 1)]).unwrap();
        g.clear().unwrap();
        assert!(g.followers(1).unwrap().is_empty());
        assert!(g.followees(1).unwrap().is_empty());
    }
}
