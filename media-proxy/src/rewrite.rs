//! Media URL rewriting for upstream listing responses.
//!
//! A listing is a JSON object with an array field (`feed` or `reels`). Each
//! item's media fields are resolved through the [`MediaCache`] concurrently
//! and replaced in place; a URL that cannot be cached is left unchanged.

use futures::future::join_all;
use serde_json::Value;

use crate::cache::MediaCache;

/// List field and the media fields of its items
#[derive(Debug, Clone, Copy)]
pub struct Listing {
    pub list_field: &'static str,
    pub media_fields: &'static [&'static str],
}

pub const FEED: Listing = Listing {
    list_field: "feed",
    media_fields: &["user_image", "post_image"],
};

pub const REELS: Listing = Listing {
    list_field: "reels",
    media_fields: &["user_image"],
};

pub const REELS_WITH_VIDEO: Listing = Listing {
    list_field: "reels",
    media_fields: &["user_image", "reel_video"],
};

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Rewrite the media fields of `listing` inside `body`.
///
/// Returns how many fields now point at the cache. Bodies without the list
/// field are left alone.
pub async fn rewrite_listing(
    cache: &MediaCache,
    body: &mut Value,
    listing: Listing,
    public_base: Option<&str>,
) -> usize {
    let Some(items) = body.get(listing.list_field).and_then(Value::as_array) else {
        return 0;
    };

    let targets: Vec<(usize, &'static str, String)> = items
        .iter()
        .enumerate()
        .flat_map(|(index, item)| {
            listing.media_fields.iter().filter_map(move |field| {
                item.get(*field)
                    .and_then(Value::as_str)
                    .filter(|url| is_remote(url))
                    .map(|url| (index, *field, url.to_string()))
            })
        })
        .collect();

    let resolved = join_all(
        targets
            .iter()
            .map(|(_, _, url)| cache.local_url(url, public_base)),
    )
    .await;

    let Some(items) = body
        .get_mut(listing.list_field)
        .and_then(Value::as_array_mut)
    else {
        return 0;
    };

    let mut rewritten = 0;
    for ((index, field, original), local) in targets.into_iter().zip(resolved) {
        if local != original {
            rewritten += 1;
        }
        items[index][field] = Value::String(local);
    }
    rewritten
}
