//! Folding hydrated threads into single posts.

use std::collections::{HashMap, HashSet};

use super::threads::ThreadChain;
use crate::constants::THREAD_SEPARATOR;
use crate::models::Post;

/// Replace the members of every hydrated chain with one merged post.
///
/// The merged post takes the place of the first member met in `posts`; later
/// members are dropped. Posts outside hydrated chains keep their order.
#[must_use]
pub fn merge_threads(
    posts: Vec<Post>,
    chains: &[ThreadChain],
    hydrated: &HashMap<String, Vec<String>>,
) -> Vec<Post> {
    if hydrated.is_empty() {
        return posts;
    }

    let mut root_of: HashMap<&str, &str> = HashMap::new();
    for chain in chains.iter().filter(|c| hydrated.contains_key(&c.root_id)) {
        for member in &chain.member_ids {
            root_of.entry(member.as_str()).or_insert(chain.root_id.as_str());
        }
    }

    let mut used_roots: HashSet<&str> = HashSet::new();
    let mut merged = Vec::with_capacity(posts.len());
    for post in posts {
        let Some(&root_id) = root_of.get(post.id.as_str()) else {
            merged.push(post);
            continue;
        };
        if !used_roots.insert(root_id) {
            continue;
        }
        if let Some(texts) = hydrated.get(root_id) {
            merged.push(post.into_merged(root_id, texts, THREAD_SEPARATOR));
        }
    }
    merged
}
