//! Second-degree follow recommendations ("people followed by people I follow").

use social_types::{Profile, ProfileError, ProfileRepository};
use std::collections::{BTreeMap, HashSet};

/// Profiles followed by the profiles `user_id` follows, excluding `user_id` itself and anyone it
/// already follows. Each candidate appears once; results are ordered by `user_id`.
///
/// Issues one read for the direct follow set plus one per member, without a surrounding
/// transaction: concurrent follow/unfollow calls may be partially reflected. Any failed read
/// fails the whole call. Unknown users get an empty list.
pub async fn recommend<R>(repo: &R, user_id: i64) -> Result<Vec<Profile>, ProfileError>
where
    R: ProfileRepository + ?Sized,
{
    let following = repo.get_following(user_id).await?;

    let mut excluded: HashSet<i64> = following.iter().map(|p| p.user_id).collect();
    excluded.insert(user_id);

    let mut candidates: BTreeMap<i64, Profile> = BTreeMap::new();
    for member in &following {
        for candidate in repo.get_following(member.user_id).await? {
            if !excluded.contains(&candidate.user_id) {
                candidates.entry(candidate.user_id).or_insert(candidate);
            }
        }
    }

    tracing::debug!(
        user_id,
        fan_out = following.len(),
        recommended = candidates.len(),
        "recommendations computed"
    );
    Ok(candidates.into_values().collect())
}
