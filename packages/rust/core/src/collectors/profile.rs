//! Org profile collector: the agency's self-description.

use agencypulse_shared::{OrgProfile, Result, collections};
use agencypulse_storage::RecordStore;

use super::{CollectConstraints, describe, fetch_typed};

/// Profile documents considered when the newest one does not decode.
const PROFILE_CANDIDATES: usize = 5;

/// The newest decodable org profile document, rendered as labelled lines.
pub(super) async fn org_profile(
    store: &dyn RecordStore,
    _constraints: &CollectConstraints,
) -> Result<Vec<String>> {
    let found =
        fetch_typed::<OrgProfile>(store, collections::ORG_PROFILE, &[], PROFILE_CANDIDATES).await?;
    let Some((_, profile)) = found.into_iter().next() else {
        return Ok(Vec::new());
    };

    let list = |items: &[String]| (!items.is_empty()).then(|| items.join(", "));
    Ok(vec![describe(
        &profile.company_name,
        &[
            ("tagline", profile.tagline.clone()),
            ("services", list(&profile.services)),
            ("tone", profile.tone.clone()),
            ("target market", profile.target_market.clone()),
            ("differentiators", list(&profile.differentiators)),
        ],
    )])
}
