//! Library Scenario Tests
//!
//! End-to-end flows through `Library`: organising imports into folders,
//! pinning, the trash round trip, cascading permanent delete, live query
//! consistency during a reorder, and opening a library created by an older
//! schema.

#[cfg(test)]
mod library_scenarios {
    use anyhow::Result;
    use image::{Rgb, RgbImage};
    use rubix_core::config::RubixConfig;
    use rubix_core::db::migrations::MIGRATIONS;
    use rubix_core::services::{Library, MoveOutcome, NodeServiceError};
    use rubix_core::{Lifecycle, Node, NodeType};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use tokio::time::{timeout, Duration};

    async fn open_library() -> Result<(Library, TempDir)> {
        let temp_dir = TempDir::new()?;
        let library = Library::open(RubixConfig::with_data_dir(temp_dir.path().join("data"))).await?;
        Ok((library, temp_dir))
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> Result<PathBuf> {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([10, 120, 200])).save(&path)?;
        Ok(path)
    }

    fn titles(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_trip_folder_with_image() -> Result<()> {
        let (library, temp_dir) = open_library().await?;
        let source = write_png(temp_dir.path(), "beach.png", 1600, 1200)?;

        let trip = library.create_folder("Trip", None).await?;
        let image = library.import_image(&source, Some(&trip.id)).await?;

        let roots = library.nodes().list_children(None).await?;
        assert_eq!(titles(&roots), vec!["Trip"]);

        let children = library.nodes().list_children(Some(&trip.id)).await?;
        assert_eq!(children.len(), 1);
        let stored = &children[0];
        assert_eq!(stored.id, image.id);
        assert_eq!(stored.node_type, NodeType::Image);
        assert!((stored.aspect_ratio - 4.0 / 3.0).abs() < 0.01);

        for path in stored.asset_paths() {
            assert!(path.exists(), "missing {}", path.display());
        }

        let thumbnail = image::open(stored.thumbnail_path.as_ref().unwrap())?;
        assert!(thumbnail.width() <= 300);
        let preview = image::open(stored.preview_path.as_ref().unwrap())?;
        assert!(preview.width() <= 1080);

        let crumbs = library.hierarchy().get_ancestors(&image.id).await?;
        assert_eq!(titles(&crumbs), vec!["Trip"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_pinned_node_lists_first() -> Result<()> {
        let (library, _temp_dir) = open_library().await?;
        let nodes = library.nodes();

        let a = library.create_folder("A", None).await?;
        let b = library.create_folder("B", None).await?;
        let c = library.create_folder("C", None).await?;

        let before = nodes.list_children(None).await?;
        let before: Vec<&str> = before.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(before.len(), 3);

        nodes.set_pinned(&c.id, true).await?;
        let after = nodes.list_children(None).await?;
        assert_eq!(after[0].id, c.id);

        // Unpinned nodes keep their relative order
        let rest: Vec<&str> = after[1..].iter().map(|n| n.id.as_str()).collect();
        let expected: Vec<&str> = before.into_iter().filter(|id| *id != c.id).collect();
        assert_eq!(rest, expected);
        assert!(rest.contains(&a.id.as_str()) && rest.contains(&b.id.as_str()));
        Ok(())
    }

    #[tokio::test]
    async fn test_trash_then_restore() -> Result<()> {
        let (library, _temp_dir) = open_library().await?;
        let nodes = library.nodes();
        let folder = library.create_folder("Drafts", None).await?;

        nodes.trash(&folder.id).await?;
        assert!(nodes.list_children(None).await?.is_empty());
        assert_eq!(titles(&nodes.list_trashed().await?), vec!["Drafts"]);

        nodes.restore(&folder.id).await?;
        assert_eq!(titles(&nodes.list_children(None).await?), vec!["Drafts"]);
        assert!(nodes.list_trashed().await?.is_empty());

        let restored = nodes.get_node(&folder.id).await?.unwrap();
        assert_eq!(restored.lifecycle(), Lifecycle::Active);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_forever_removes_subtree_and_files() -> Result<()> {
        let (library, temp_dir) = open_library().await?;
        let nodes = library.nodes();

        let trip = library.create_folder("Trip", None).await?;
        let day = library.create_folder("Day 1", Some(&trip.id)).await?;
        let source = write_png(temp_dir.path(), "a.png", 64, 32)?;
        let image = library.import_image(&source, Some(&day.id)).await?;
        let files: Vec<PathBuf> = image.asset_paths().map(Path::to_path_buf).collect();
        assert_eq!(files.len(), 3);

        nodes.trash(&trip.id).await?;
        let result = nodes.delete_forever(&trip.id).await?;

        assert_eq!(result.deleted_ids.len(), 3);
        assert_eq!(result.files_removed, 3);
        for id in [&trip.id, &day.id, &image.id] {
            assert!(nodes.get_node(id).await?.is_none());
        }
        for file in files {
            assert!(!file.exists());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_move_into_descendant_fails() -> Result<()> {
        let (library, _temp_dir) = open_library().await?;
        let outer = library.create_folder("Outer", None).await?;
        let inner = library.create_folder("Inner", Some(&outer.id)).await?;

        let err = library
            .hierarchy()
            .move_node(&outer.id, Some(&inner.id))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeServiceError::CircularReference { .. }));

        let outcome = library.hierarchy().move_node(&inner.id, None).await?;
        assert_eq!(outcome, MoveOutcome::Moved);
        assert_eq!(library.nodes().list_children(None).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_live_subscriber_never_sees_partial_reorder() -> Result<()> {
        let (library, _temp_dir) = open_library().await?;
        let nodes = library.nodes();

        for title in ["A", "B", "C", "D", "E"] {
            library.create_folder(title, None).await?;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        let visible = nodes.list_children(None).await?;
        let old_order: Vec<String> = visible.iter().map(|n| n.id.clone()).collect();

        let mut live = nodes.watch_children(None);
        let first = timeout(Duration::from_secs(2), live.next()).await?.unwrap();
        assert_eq!(first.len(), 5);

        nodes.reorder_nodes(&visible, 4, 0).await?;

        let mut new_order = old_order.clone();
        let moved = new_order.remove(4);
        new_order.insert(0, moved);

        loop {
            let snapshot = timeout(Duration::from_secs(2), live.next()).await?.unwrap();
            let ids: Vec<String> = snapshot.iter().map(|n| n.id.clone()).collect();
            assert!(ids == old_order || ids == new_order, "partial order observed");
            if ids == new_order {
                break;
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_version_one_library_opens_with_data() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let data_dir = temp_dir.path().join("data");
        std::fs::create_dir_all(&data_dir)?;
        let config = RubixConfig::with_data_dir(&data_dir);

        {
            let db = libsql::Builder::new_local(config.database_path()).build().await?;
            let conn = db.connect()?;
            for statement in MIGRATIONS[0].statements {
                conn.execute(statement, ()).await?;
            }
            conn.execute(
                "INSERT INTO nodes (id, node_type, title, creation_date, sort_order)
                 VALUES ('trip', 'FOLDER', 'Trip', 1000, 1000)",
                (),
            )
            .await?;
            conn.execute(
                "INSERT INTO nodes (id, parent_id, node_type, title, content, creation_date, sort_order)
                 VALUES ('memo', 'trip', 'NOTE', 'Memo', 'pack socks', 2000, 2000)",
                (),
            )
            .await?;
            conn.execute("PRAGMA user_version = 1", ()).await?;
        }

        let library = Library::open(config).await?;

        let memo = library.nodes().get_node("memo").await?.unwrap();
        assert_eq!(memo.content.as_deref(), Some("pack socks"));
        assert_eq!(memo.modified_date, memo.creation_date);
        assert_eq!(memo.creation_date.timestamp_millis(), 2000);

        let crumbs = library.hierarchy().get_ancestors("memo").await?;
        assert_eq!(titles(&crumbs), vec!["Trip"]);
        assert_eq!(library.database().schema_version().await?, 3);
        Ok(())
    }
}
