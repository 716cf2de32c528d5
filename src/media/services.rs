use anyhow::Context;
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo_types::{Media, NewMedia};
use crate::state::AppState;

pub const AVATAR_COLLECTION: &str = "avatar";

/// A file received from a client.
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Media as handed to clients, with a time-limited download link.
#[derive(Debug, Serialize)]
pub struct MediaView {
    #[serde(flatten)]
    pub media: Media,
    pub url: String,
}

/// Stores the upload and records it under `collection`. Earlier media in the
/// collection are kept.
pub async fn attach_upload(
    st: &AppState,
    user_id: i64,
    collection: &str,
    upload: Upload,
) -> anyhow::Result<Media> {
    anyhow::ensure!(!upload.body.is_empty(), "empty upload");

    let ext = ext_from_mime(&upload.content_type).unwrap_or("bin");
    let key = format!("{collection}/{user_id}/{}.{ext}", Uuid::new_v4());
    let size = i64::try_from(upload.body.len()).context("upload size")?;

    st.storage
        .put_object(&key, upload.body, &upload.content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;

    let record = NewMedia {
        user_id,
        collection: collection.to_string(),
        file_name: upload.file_name,
        mime_type: upload.content_type,
        size,
        s3_key: key.clone(),
    };
    match st.media.attach(&record).await {
        Ok(media) => {
            info!(user_id, media_id = media.id, collection, "media attached");
            Ok(media)
        }
        Err(e) => {
            if let Err(cleanup) = st.storage.delete_object(&key).await {
                warn!(error = %cleanup, key = %key, "orphaned object left in storage");
            }
            Err(e)
        }
    }
}

pub async fn collection_views(
    st: &AppState,
    user_id: i64,
    collection: &str,
) -> anyhow::Result<Vec<MediaView>> {
    let items = st.media.list(user_id, collection).await?;
    let mut out = Vec::with_capacity(items.len());
    for media in items {
        out.push(view(st, media).await?);
    }
    Ok(out)
}

pub async fn view(st: &AppState, media: Media) -> anyhow::Result<MediaView> {
    let url = st
        .storage
        .presign_get(&media.s3_key, st.config.media_url_ttl_secs)
        .await
        .with_context(|| format!("presign url for {}", media.s3_key))?;
    Ok(MediaView { media, url })
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/gif"), Some("gif"));
        assert_eq!(ext_from_mime("image/heic"), Some("heic"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    fn upload(name: &str) -> Upload {
        Upload {
            file_name: name.into(),
            content_type: "image/png".into(),
            body: Bytes::from_static(b"\x89PNG"),
        }
    }

    #[tokio::test]
    async fn attachments_accumulate_in_collection() {
        let state = AppState::fake();
        let first = attach_upload(&state, 1, AVATAR_COLLECTION, upload("a.png"))
            .await
            .unwrap();
        let second = attach_upload(&state, 1, AVATAR_COLLECTION, upload("b.png"))
            .await
            .unwrap();
        assert!(first.s3_key.starts_with("avatar/1/"));
        assert!(first.s3_key.ends_with(".png"));
        assert_ne!(first.s3_key, second.s3_key);

        let views = collection_views(&state, 1, AVATAR_COLLECTION).await.unwrap();
        let names: Vec<&str> = views.iter().map(|v| v.media.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert!(views[0].url.contains(&first.s3_key));

        assert!(collection_views(&state, 2, AVATAR_COLLECTION).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let state = AppState::fake();
        let empty = Upload {
            file_name: "x.png".into(),
            content_type: "image/png".into(),
            body: Bytes::new(),
        };
        assert!(attach_upload(&state, 1, AVATAR_COLLECTION, empty).await.is_err());
    }
}
