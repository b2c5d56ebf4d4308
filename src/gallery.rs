//! Album catalog assembly
//!
//! Builds paginated album summaries from directory listings under a
//! configured base path. Every direct subdirectory is an album; its photos
//! are the image entries inside it. An album with photos takes as cover the
//! first non-directory entry that carries a thumbnail; one without photos
//! has no cover. Assembled pages are cached briefly in the memory tier so
//! gallery refreshes do not re-walk the file host.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::alist::{AlistClient, AlistError, FsEntry};
use crate::cache::TieredCache;

/// One album: a subdirectory of the catalog base path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    /// Stable identifier, the directory name
    pub id: String,
    /// Display name
    pub name: String,
    /// Thumbnail URL of the cover entry; albums without photos have none
    pub cover: Option<String>,
    /// Image entries inside the album
    pub photos: Vec<FsEntry>,
    pub photo_count: usize,
    pub is_empty: bool,
}

/// Page window over the album catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 1-based page number
    pub current: usize,
    pub page_size: usize,
    /// Total albums in the catalog, including ones that failed to assemble
    pub total: usize,
    pub total_pages: usize,
}

/// One assembled catalog page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumPage {
    pub items: Vec<Album>,
    pub pagination: Pagination,
}

/// Join an album directory name onto the catalog base path
fn album_path(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Album catalog over an Alist client
pub struct Gallery {
    client: AlistClient,
    cache: Arc<TieredCache>,
    /// Catalog root on the file host
    base_path: String,
    /// Memory TTL for assembled pages
    page_ttl: Duration,
}

impl Gallery {
    pub fn new(
        client: AlistClient,
        cache: Arc<TieredCache>,
        base_path: impl Into<String>,
        page_ttl: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            base_path: base_path.into(),
            page_ttl,
        }
    }

    /// Assemble one page of the album catalog
    ///
    /// Lists the base path, keeps only directories, slices the requested
    /// page and fetches the sliced albums' listings concurrently. An album
    /// whose listing fails is logged and skipped; the page still reports the
    /// full directory count in its pagination. Page and page size are
    /// 1-clamped, and a page past the end of the catalog comes back empty.
    pub async fn albums(&self, page: usize, page_size: usize) -> Result<AlbumPage, AlistError> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let key = format!("albums_list_page_{}_{}", page, page_size);
        if let Some(cached) = self.cache.get::<AlbumPage>(&key).await.value() {
            debug!(page = page, "Album page served from cache");
            return Ok(cached);
        }

        let listing = self.client.list_directory(&self.base_path).await?;
        let dirs: Vec<FsEntry> = listing
            .content
            .into_iter()
            .filter(|entry| entry.is_dir)
            .collect();

        let total = dirs.len();
        let total_pages = total.div_ceil(page_size);
        let start = page.saturating_sub(1).saturating_mul(page_size);

        let window: Vec<&FsEntry> = dirs.iter().skip(start).take(page_size).collect();
        let assembled = join_all(window.iter().map(|dir| self.assemble_album(dir))).await;

        let mut items = Vec::with_capacity(window.len());
        for (dir, result) in window.iter().zip(assembled) {
            match result {
                Ok(album) => items.push(album),
                Err(e) => {
                    warn!(album = %dir.name, error = %e, "Skipping album, listing failed");
                }
            }
        }

        let album_page = AlbumPage {
            items,
            pagination: Pagination {
                current: page,
                page_size,
                total,
                total_pages,
            },
        };

        self.cache.set_local(&key, &album_page, self.page_ttl);
        Ok(album_page)
    }

    /// One album's photos, paginated
    pub async fn album_photos(
        &self,
        name: &str,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<FsEntry>, AlistError> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let listing = self
            .client
            .list_directory(&album_path(&self.base_path, name))
            .await?;

        Ok(listing
            .content
            .into_iter()
            .filter(FsEntry::is_image)
            .skip(page.saturating_sub(1).saturating_mul(page_size))
            .take(page_size)
            .collect())
    }

    /// Build one album summary from its directory listing
    async fn assemble_album(&self, dir: &FsEntry) -> Result<Album, AlistError> {
        let path = album_path(&self.base_path, &dir.name);
        let listing = self.client.list_directory(&path).await?;

        let photos: Vec<FsEntry> = listing
            .content
            .iter()
            .filter(|entry| entry.is_image())
            .cloned()
            .collect();

        // An album with no photos has no cover, even when another entry
        // carries a thumbnail
        let cover = if photos.is_empty() {
            None
        } else {
            listing
                .content
                .iter()
                .find(|entry| !entry.is_dir && entry.thumbnail().is_some())
                .and_then(|entry| entry.thumbnail().map(str::to_string))
        };

        Ok(Album {
            id: dir.name.clone(),
            name: dir.name.clone(),
            cover,
            photo_count: photos.len(),
            is_empty: photos.is_empty(),
            photos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alist::api::AlistApi;
    use crate::alist::types::{DirListing, FileInfo};
    use crate::cache::MemoryStore;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dir_entry(name: &str) -> FsEntry {
        FsEntry {
            name: name.to_string(),
            size: 0,
            is_dir: true,
            modified: String::new(),
            sign: String::new(),
            thumb: String::new(),
            kind: 1,
        }
    }

    fn image_entry(name: &str, thumb: &str) -> FsEntry {
        FsEntry {
            name: name.to_string(),
            size: 2048,
            is_dir: false,
            modified: String::new(),
            sign: String::new(),
            thumb: thumb.to_string(),
            kind: 5,
        }
    }

    fn text_entry(name: &str) -> FsEntry {
        FsEntry {
            name: name.to_string(),
            size: 64,
            is_dir: false,
            modified: String::new(),
            sign: String::new(),
            thumb: String::new(),
            kind: 4,
        }
    }

    fn video_entry(name: &str, thumb: &str) -> FsEntry {
        FsEntry {
            name: name.to_string(),
            size: 4096,
            is_dir: false,
            modified: String::new(),
            sign: String::new(),
            thumb: thumb.to_string(),
            kind: 2,
        }
    }

    fn listing_of(entries: Vec<FsEntry>) -> DirListing {
        DirListing {
            total: entries.len() as u64,
            content: entries,
            readme: String::new(),
            write: false,
            provider: "Local".to_string(),
        }
    }

    /// Static directory tree serving scripted listings
    struct FakeTree {
        listings: HashMap<String, DirListing>,
        /// Paths whose listing fails with an upstream error
        broken: HashSet<String>,
        list_calls: AtomicUsize,
    }

    impl FakeTree {
        fn new() -> Self {
            Self {
                listings: HashMap::new(),
                broken: HashSet::new(),
                list_calls: AtomicUsize::new(0),
            }
        }

        fn with(mut self, path: &str, entries: Vec<FsEntry>) -> Self {
            self.listings.insert(path.to_string(), listing_of(entries));
            self
        }

        fn with_broken(mut self, path: &str) -> Self {
            self.broken.insert(path.to_string());
            self
        }
    }

    #[async_trait]
    impl AlistApi for FakeTree {
        async fn login(&self, _username: &str, _password: &str) -> Result<String, AlistError> {
            Ok("token-1".to_string())
        }

        async fn me(&self, _token: &str) -> Result<(), AlistError> {
            Ok(())
        }

        async fn list(&self, _token: &str, path: &str) -> Result<DirListing, AlistError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.broken.contains(path) {
                return Err(AlistError::Upstream(500, "storage offline".to_string()));
            }
            self.listings
                .get(path)
                .cloned()
                .ok_or_else(|| AlistError::Upstream(404, "object not found".to_string()))
        }

        async fn file_info(&self, _token: &str, _path: &str) -> Result<FileInfo, AlistError> {
            Err(AlistError::Upstream(404, "not scripted".to_string()))
        }

        async fn upload(
            &self,
            _token: &str,
            _path: &str,
            _file_name: &str,
            _content: Vec<u8>,
        ) -> Result<(), AlistError> {
            Err(AlistError::Upstream(403, "not scripted".to_string()))
        }

        async fn delete(&self, _token: &str, _path: &str) -> Result<(), AlistError> {
            Err(AlistError::Upstream(403, "not scripted".to_string()))
        }
    }

    fn gallery_over(tree: Arc<FakeTree>) -> Gallery {
        let cache = Arc::new(TieredCache::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(60),
            Duration::from_secs(3600),
        ));
        let client = AlistClient::new(
            tree,
            cache.clone(),
            "guest",
            "guest",
            3,
            Duration::from_secs(60),
        );
        Gallery::new(client, cache, "/", Duration::from_secs(60))
    }

    #[test]
    fn test_album_path_joins() {
        assert_eq!(album_path("/", "Summer"), "/Summer");
        assert_eq!(album_path("/photos", "Summer"), "/photos/Summer");
        assert_eq!(album_path("/photos/", "Summer"), "/photos/Summer");
    }

    #[tokio::test]
    async fn test_albums_assemble_covers_and_counts() {
        let tree = Arc::new(
            FakeTree::new()
                .with(
                    "/",
                    vec![
                        dir_entry("Summer"),
                        dir_entry("Winter"),
                        text_entry("readme.md"),
                    ],
                )
                .with(
                    "/Summer",
                    vec![
                        text_entry("notes.txt"),
                        image_entry("beach.jpg", "https://host/t/beach.jpg"),
                        image_entry("dunes.jpg", "https://host/t/dunes.jpg"),
                    ],
                )
                .with("/Winter", vec![image_entry("snow.jpg", "")]),
        );
        let gallery = gallery_over(tree);

        let page = gallery.albums(1, 10).await.unwrap();

        // The loose file at the root is not an album
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.pagination.total_pages, 1);

        let summer = &page.items[0];
        assert_eq!(summer.id, "Summer");
        assert_eq!(summer.photo_count, 2);
        assert!(!summer.is_empty);
        // With photos present, the first thumbnailed entry supplies the cover
        assert_eq!(summer.cover.as_deref(), Some("https://host/t/beach.jpg"));
        assert!(summer.photos.iter().all(FsEntry::is_image));

        let winter = &page.items[1];
        assert_eq!(winter.photo_count, 1);
        assert_eq!(winter.cover, None);
    }

    #[tokio::test]
    async fn test_albums_pagination_slices_and_ceils() {
        let mut tree = FakeTree::new().with(
            "/",
            vec![
                dir_entry("a"),
                dir_entry("b"),
                dir_entry("c"),
                dir_entry("d"),
                dir_entry("e"),
            ],
        );
        for name in ["a", "b", "c", "d", "e"] {
            tree = tree.with(&format!("/{}", name), vec![image_entry("p.jpg", "")]);
        }
        let gallery = gallery_over(Arc::new(tree));

        let second = gallery.albums(2, 2).await.unwrap();
        assert_eq!(second.pagination.total, 5);
        assert_eq!(second.pagination.total_pages, 3);
        assert_eq!(second.pagination.current, 2);
        let names: Vec<&str> = second.items.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["c", "d"]);

        let last = gallery.albums(3, 2).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].name, "e");
    }

    #[tokio::test]
    async fn test_failed_album_is_skipped_not_fatal() {
        let tree = Arc::new(
            FakeTree::new()
                .with("/", vec![dir_entry("good"), dir_entry("bad")])
                .with("/good", vec![image_entry("p.jpg", "")])
                .with_broken("/bad"),
        );
        let gallery = gallery_over(tree);

        let page = gallery.albums(1, 10).await.unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "good");
        // The broken directory still counts toward the catalog size
        assert_eq!(page.pagination.total, 2);
    }

    #[tokio::test]
    async fn test_album_page_is_cached() {
        let tree = Arc::new(
            FakeTree::new()
                .with("/", vec![dir_entry("a")])
                .with("/a", vec![image_entry("p.jpg", "")]),
        );
        let gallery = gallery_over(tree.clone());

        gallery.albums(1, 10).await.unwrap();
        let after_first = tree.list_calls.load(Ordering::SeqCst);

        gallery.albums(1, 10).await.unwrap();
        assert_eq!(tree.list_calls.load(Ordering::SeqCst), after_first);
    }

    #[tokio::test]
    async fn test_empty_album() {
        let tree = Arc::new(
            FakeTree::new()
                .with("/", vec![dir_entry("blank")])
                .with("/blank", vec![]),
        );
        let gallery = gallery_over(tree);

        let page = gallery.albums(1, 10).await.unwrap();

        let album = &page.items[0];
        assert!(album.is_empty);
        assert_eq!(album.photo_count, 0);
        assert_eq!(album.cover, None);
        assert!(album.photos.is_empty());
    }

    #[tokio::test]
    async fn test_cover_requires_at_least_one_photo() {
        let tree = Arc::new(
            FakeTree::new()
                .with("/", vec![dir_entry("clips"), dir_entry("mixed")])
                .with(
                    "/clips",
                    vec![video_entry("intro.mp4", "https://host/t/intro.jpg")],
                )
                .with(
                    "/mixed",
                    vec![
                        video_entry("teaser.mp4", "https://host/t/teaser.jpg"),
                        image_entry("still.jpg", "https://host/t/still.jpg"),
                    ],
                ),
        );
        let gallery = gallery_over(tree);

        let page = gallery.albums(1, 10).await.unwrap();

        // A thumbnailed video alone is not a photo and earns no cover
        let clips = &page.items[0];
        assert!(clips.is_empty);
        assert_eq!(clips.cover, None);

        // Once a photo is present, any thumbnailed entry may be the cover
        let mixed = &page.items[1];
        assert_eq!(mixed.photo_count, 1);
        assert_eq!(mixed.cover.as_deref(), Some("https://host/t/teaser.jpg"));
    }

    #[tokio::test]
    async fn test_album_photos_paginates() {
        let photos: Vec<FsEntry> = (1..=5)
            .map(|i| image_entry(&format!("p{}.jpg", i), ""))
            .collect();
        let tree = Arc::new(
            FakeTree::new()
                .with("/", vec![dir_entry("trip")])
                .with("/trip", photos),
        );
        let gallery = gallery_over(tree);

        let page = gallery.album_photos("trip", 2, 2).await.unwrap();

        let names: Vec<&str> = page.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["p3.jpg", "p4.jpg"]);
    }

    #[tokio::test]
    async fn test_page_zero_is_clamped_to_one() {
        let tree = Arc::new(
            FakeTree::new()
                .with("/", vec![dir_entry("a")])
                .with("/a", vec![image_entry("p.jpg", "")]),
        );
        let gallery = gallery_over(tree);

        let page = gallery.albums(0, 10).await.unwrap();
        assert_eq!(page.pagination.current, 1);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_page_far_past_the_catalog_is_empty() {
        let tree = Arc::new(
            FakeTree::new()
                .with("/", vec![dir_entry("a")])
                .with("/a", vec![image_entry("p.jpg", "")]),
        );
        let gallery = gallery_over(tree);

        let page = gallery.albums(usize::MAX, 2).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.total, 1);

        let photos = gallery.album_photos("a", usize::MAX, 2).await.unwrap();
        assert!(photos.is_empty());
    }

    #[test]
    fn test_album_page_serializes_camel_case() {
        let page = AlbumPage {
            items: vec![Album {
                id: "trip".to_string(),
                name: "trip".to_string(),
                cover: None,
                photos: vec![],
                photo_count: 0,
                is_empty: true,
            }],
            pagination: Pagination {
                current: 1,
                page_size: 10,
                total: 1,
                total_pages: 1,
            },
        };

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["pagination"]["pageSize"], 10);
        assert_eq!(json["pagination"]["totalPages"], 1);
        assert_eq!(json["items"][0]["photoCount"], 0);
        assert_eq!(json["items"][0]["isEmpty"], true);
    }
}
