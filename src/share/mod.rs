//! Handoff: turn a finished draft into a persisted [`Experience`] plus a link and QR code.

pub mod intent;
pub mod qr;

use chrono::{DateTime, Utc};
use rand::Rng;

pub use intent::{
    LinkShareTarget, ShareIntent, ShareTarget, SharedVia, share_via, share_with_fallback,
};
pub use qr::{MAX_QR_SIZE, QrCodeEncoder, QrEcLevel, QrEncoder, QrOptions, request_qr};

use crate::{
    foundation::core::{EncodedImage, Raster},
    foundation::error::{ArcraftError, ArcraftResult},
    model::{Draft, Experience, ExperienceId, Metadata, default_title},
    store::{ExperienceStore, KvBackend, PutOutcome},
};

pub const SHARE_QUERY_KEY: &str = "ar";
pub const VIEW_PATH_SEGMENT: &str = "view";

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// `base36(unix millis)` followed by 9 random base36 characters.
pub fn generate_id<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> ExperienceId {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    let mut id = to_base36(millis);
    for _ in 0..ID_SUFFIX_LEN {
        id.push(char::from(BASE36[rng.random_range(0..BASE36.len())]));
    }
    ExperienceId::from_base36(id)
}

/// Freeze `draft` into an [`Experience`] and persist it.
///
/// The draft must hold an image and a complete placement. The saved render is used when
/// present, otherwise the unfiltered source is encoded. An empty title becomes
/// `"AR Experience <date>"`.
#[tracing::instrument(skip(draft, store, rng))]
pub fn finalize<B: KvBackend, R: Rng>(
    draft: &Draft,
    store: &mut ExperienceStore<B>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> ArcraftResult<(Experience, PutOutcome)> {
    let image = draft
        .image
        .as_ref()
        .ok_or_else(|| ArcraftError::missing_prerequisite("no image to share"))?;
    let placement = draft.placement.complete()?;
    let payload = match &image.rendered {
        Some(rendered) => rendered.clone(),
        None => EncodedImage::png_from_raster(&image.source)?,
    };

    let title = draft.title.trim();
    let metadata = Metadata {
        title: if title.is_empty() {
            default_title(now)
        } else {
            title.to_string()
        },
        description: draft.description.trim().to_string(),
        created_at: now,
    };

    let exp = Experience::new(generate_id(now, rng), payload, placement, metadata);
    let outcome = store.put(&exp)?;
    tracing::info!(id = %exp.id(), persisted = outcome.persisted, "experience finalized");
    Ok((exp, outcome))
}

/// Origin and path of `base` with the single query parameter `ar=<id>`.
pub fn build_share_url(base: &url::Url, id: &ExperienceId) -> url::Url {
    let mut url = base.clone();
    url.set_fragment(None);
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair(SHARE_QUERY_KEY, id.as_str());
    url
}

/// `?ar=<id>` wins; `/view/<id>` links are accepted as well.
pub fn extract_experience_id(url: &url::Url) -> Option<ExperienceId> {
    let from_query = url
        .query_pairs()
        .find(|(k, _)| k == SHARE_QUERY_KEY)
        .and_then(|(_, v)| ExperienceId::parse(&v).ok());
    if from_query.is_some() {
        return from_query;
    }

    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    segments
        .windows(2)
        .rev()
        .find(|w| w[0] == VIEW_PATH_SEGMENT)
        .and_then(|w| ExperienceId::parse(w[1]).ok())
}

/// Everything the Share step shows.
#[derive(Clone, Debug, PartialEq)]
pub struct ShareCard {
    pub id: ExperienceId,
    pub url: url::Url,
    pub title: String,
    /// `None` when QR generation failed; the link stays usable.
    pub qr: Option<Raster>,
}

impl ShareCard {
    pub fn qr_png(&self) -> ArcraftResult<Option<Vec<u8>>> {
        self.qr.as_ref().map(Raster::encode_png).transpose()
    }
}
