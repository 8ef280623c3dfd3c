//! The serial queue guarantee: no two installs put a dialog on screen at
//! the same time.

mod common;

use std::sync::Arc;

use common::{StaticInstaller, TestHarness};
use modforge_install::InstallRequest;

#[tokio::test]
async fn concurrent_installs_never_overlap_dialogs() {
    let harness = TestHarness::new();
    let manager = Arc::new(harness.manager());
    manager.register_installer(50, Arc::new(StaticInstaller::copying(&["f.txt"])));

    // Two candidate games each, so every install opens the game-selection
    // dialog.
    for name in ["QueueA-1.0.zip", "QueueB-1.0.zip", "QueueC-1.0.zip"] {
        harness.make_archive(name, &[("f.txt", b"f")]).await;
    }

    let mut handles = Vec::new();
    for name in ["QueueA-1.0.zip", "QueueB-1.0.zip", "QueueC-1.0.zip"] {
        let manager = Arc::clone(&manager);
        let request = InstallRequest::new(harness.archive_path(name))
            .with_game_ids(vec!["game".to_string(), "other".to_string()]);
        handles.push(tokio::spawn(async move { manager.install(request).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(harness.dialogs.peak_open_dialogs(), 1);
    let mut ids = harness.store.mod_ids("game");
    ids.sort();
    assert_eq!(ids, vec!["QueueA-1.0", "QueueB-1.0", "QueueC-1.0"]);
}
