//! Self-reply chain detection within one fetched batch.

use std::collections::{HashMap, HashSet};

use crate::source::RawPost;

/// Outcome of walking parent edges up from a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootResolution {
    /// Reached a post with no recorded parent.
    Root(String),
    /// The walk ran into a cycle; the smallest id on the cycle stands in as
    /// root, so every post leading into the same cycle agrees on it.
    Cycle(String),
}

impl RootResolution {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Root(id) | Self::Cycle(id) => id,
        }
    }
}

/// A resolved thread: its root plus every member id, root first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadChain {
    pub root_id: String,
    pub member_ids: Vec<String>,
}

/// Whether `post` replies to a post written by its own author.
///
/// Embedded reply-target author metadata wins; without it, the target must be
/// in the same batch and share the author.
#[must_use]
pub fn is_self_reply(post: &RawPost, batch: &HashMap<&str, &RawPost>) -> bool {
    let Some(target_id) = post.reply.target_id.as_deref() else {
        return false;
    };
    if post.author_id.is_empty() {
        return false;
    }

    let target_author = post.reply.target_author_id.as_deref().or_else(|| {
        batch
            .get(target_id)
            .filter(|target| target.author_id == post.author_id)
            .map(|target| target.author_id.as_str())
    });
    target_author == Some(post.author_id.as_str())
}

/// Child → parent edges for the self-replies of one batch.
#[derive(Debug, Clone, Default)]
pub struct ReplyGraph {
    parents: HashMap<String, String>,
    /// Children in batch order, so chain output is deterministic.
    children: Vec<String>,
}

impl ReplyGraph {
    /// Record an edge for every confirmed self-reply in `batch`.
    #[must_use]
    pub fn from_batch(batch: &[RawPost]) -> Self {
        let index: HashMap<&str, &RawPost> = batch.iter().map(|p| (p.id.as_str(), p)).collect();

        let mut graph = Self::default();
        for post in batch {
            if !is_self_reply(post, &index) {
                continue;
            }
            let Some(parent) = post.reply.target_id.clone() else {
                continue;
            };
            if graph.parents.insert(post.id.clone(), parent).is_none() {
                graph.children.push(post.id.clone());
            }
        }
        graph
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    #[must_use]
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    /// Walk parent edges from `id` until a root or a repeated id.
    ///
    /// Terminates within one step per recorded edge.
    #[must_use]
    pub fn resolve_root(&self, id: &str) -> RootResolution {
        let mut visited = HashSet::from([id]);
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            if !visited.insert(parent) {
                let start = path.iter().position(|p| *p == parent).unwrap_or(0);
                let canonical = path[start..].iter().min().copied().unwrap_or(parent);
                return RootResolution::Cycle(canonical.to_string());
            }
            path.push(parent);
            current = parent;
        }
        RootResolution::Root(current.to_string())
    }

    /// Group every child with the root it resolves to.
    ///
    /// Chains come out in the order their first child appears in the batch.
    #[must_use]
    pub fn chains(&self) -> Vec<ThreadChain> {
        let mut chains: Vec<ThreadChain> = Vec::new();
        let mut by_root: HashMap<String, usize> = HashMap::new();

        for child in &self.children {
            let root = self.resolve_root(child).id().to_string();
            let slot = *by_root.entry(root.clone()).or_insert_with(|| {
                chains.push(ThreadChain {
                    root_id: root.clone(),
                    member_ids: vec![root.clone()],
                });
                chains.len() - 1
            });
            let chain = &mut chains[slot];
            if !chain.member_ids.contains(child) {
                chain.member_ids.push(child.clone());
            }
        }
        chains
    }
}

/// Detect the thread chains of one batch.
///
/// Returns an empty list when the batch holds no self-replies.
#[must_use]
pub fn resolve_chains(batch: &[RawPost]) -> Vec<ThreadChain> {
    ReplyGraph::from_batch(batch).chains()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ReplyContext;

    fn post(id: &str, author_id: &str, target: Option<&str>, target_author: Option<&str>) -> RawPost {
        RawPost {
            id: id.to_string(),
            author_handle: format!("user{author_id}"),
            author_id: author_id.to_string(),
            text: format!("text {id}"),
            created_at: None,
            like_count: 0,
            repost_count: 0,
            reply: ReplyContext {
                target_id: target.map(String::from),
                target_author_id: target_author.map(String::from),
            },
            is_repost: false,
        }
    }

    #[test]
    fn test_self_reply_from_embedded_metadata() {
        let batch = vec![post("b", "1", Some("a"), Some("1"))];
        let index: HashMap<&str, &RawPost> = batch.iter().map(|p| (p.id.as_str(), p)).collect();
        assert!(is_self_reply(&batch[0], &index));
    }

    #[test]
    fn test_reply_to_other_author_is_not_self_reply() {
        let batch = vec![
            post("a", "1", None, None),
            post("b", "1", Some("a"), Some("2")),
        ];
        let index: HashMap<&str, &RawPost> = batch.iter().map(|p| (p.id.as_str(), p)).collect();
        // Embedded metadata wins over the in-batch lookup.
        assert!(!is_self_reply(&batch[1], &index));
    }

    #[test]
    fn test_self_reply_falls_back_to_batch_lookup() {
        let batch = vec![
            post("a", "1", None, None),
            post("b", "1", Some("a"), None),
            post("c", "1", Some("z"), None),
            post("d", "2", Some("a"), None),
        ];
        let index: HashMap<&str, &RawPost> = batch.iter().map(|p| (p.id.as_str(), p)).collect();

        assert!(is_self_reply(&batch[1], &index));
        assert!(!is_self_reply(&batch[2], &index), "target outside batch");
        assert!(!is_self_reply(&batch[3], &index), "different author");
        assert!(!is_self_reply(&batch[0], &index), "not a reply");
    }

    #[test]
    fn test_chain_resolves_to_root() {
        let batch = vec![
            post("c", "1", Some("b"), Some("1")),
            post("b", "1", Some("a"), Some("1")),
            post("a", "1", None, None),
            post("x", "1", None, None),
        ];
        let graph = ReplyGraph::from_batch(&batch);
        let chains = resolve_chains(&batch);

        assert_eq!(graph.resolve_root("c"), RootResolution::Root("a".to_string()));
        assert_eq!(graph.resolve_root("x"), RootResolution::Root("x".to_string()));
        assert_eq!(
            chains,
            vec![ThreadChain {
                root_id: "a".to_string(),
                member_ids: vec!["a".to_string(), "c".to_string(), "b".to_string()],
            }]
        );
    }

    #[test]
    fn test_root_outside_batch_still_groups_children() {
        let batch = vec![
            post("b", "1", Some("a"), Some("1")),
            post("c", "1", Some("b"), Some("1")),
        ];
        let chains = resolve_chains(&batch);

        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].root_id, "a");
        assert_eq!(chains[0].member_ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_separate_threads_stay_separate() {
        let batch = vec![
            post("a", "1", None, None),
            post("b", "1", Some("a"), Some("1")),
            post("p", "1", None, None),
            post("q", "1", Some("p"), Some("1")),
        ];
        let chains = resolve_chains(&batch);

        let roots: Vec<&str> = chains.iter().map(|c| c.root_id.as_str()).collect();
        assert_eq!(roots, vec!["a", "p"]);
    }

    #[test]
    fn test_cycle_walk_terminates() {
        let batch = vec![
            post("a", "1", Some("b"), Some("1")),
            post("b", "1", Some("a"), Some("1")),
        ];
        let graph = ReplyGraph::from_batch(&batch);

        assert_eq!(graph.resolve_root("a"), RootResolution::Cycle("a".to_string()));
        assert_eq!(graph.resolve_root("b"), RootResolution::Cycle("a".to_string()));
    }

    #[test]
    fn test_cycle_yields_single_chain() {
        let batch = vec![
            post("x", "1", Some("c"), Some("1")),
            post("c", "1", Some("b"), Some("1")),
            post("b", "1", Some("a"), Some("1")),
            post("a", "1", Some("c"), Some("1")),
        ];
        let graph = ReplyGraph::from_batch(&batch);
        let chains = graph.chains();

        assert_eq!(graph.resolve_root("x"), RootResolution::Cycle("a".to_string()));
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].root_id, "a");
        assert_eq!(chains[0].member_ids, vec!["a", "x", "c", "b"]);
    }

    #[test]
    fn test_no_self_replies_yields_no_chains() {
        let batch = vec![post("a", "1", None, None), post("b", "1", Some("z"), Some("9"))];
        let graph = ReplyGraph::from_batch(&batch);
        let chains = resolve_chains(&batch);
        assert!(graph.is_empty());
        assert!(chains.is_empty());
    }
}
