use shellward_core::{
    FileSystemStatusCode, FilesystemItemType, FsError, OpsConfig, OperationType, PathWithType,
    StorageHistory,
};
use std::io;
use std::path::Path;

#[test]
fn test_status_reduction_prefers_failures() {
    use FileSystemStatusCode::*;

    assert_eq!(FileSystemStatusCode::reduce([]), Success);
    assert_eq!(FileSystemStatusCode::reduce([Success, InProgress]), InProgress);
    assert_eq!(FileSystemStatusCode::reduce([Success, Generic, Success]), Generic);
    assert_eq!(
        FileSystemStatusCode::reduce([NotFound, Unauthorized, AlreadyExists]),
        Unauthorized
    );
    assert_eq!(Generic.worst_of(InProgress), Generic);
}

#[test]
fn test_status_classification() {
    assert!(FileSystemStatusCode::Success.is_success());
    assert!(!FileSystemStatusCode::InProgress.is_failure());
    assert!(FileSystemStatusCode::InUse.is_failure());
    assert!(FileSystemStatusCode::Unauthorized.wants_elevation());
    assert!(FileSystemStatusCode::ReadOnly.wants_elevation());
    assert!(!FileSystemStatusCode::NotFound.wants_elevation());
}

#[test]
fn test_io_errors_map_to_codes() {
    let cases = [
        (io::ErrorKind::PermissionDenied, FileSystemStatusCode::Unauthorized),
        (io::ErrorKind::NotFound, FileSystemStatusCode::NotFound),
        (io::ErrorKind::AlreadyExists, FileSystemStatusCode::AlreadyExists),
    ];

    for (kind, code) in cases {
        let err = FsError::io("/some/path", io::Error::from(kind));
        assert_eq!(err.code, code, "{kind:?}");
    }
}

#[test]
fn test_status_serializes_by_name() {
    let json = serde_json::to_string(&FileSystemStatusCode::AlreadyExists).unwrap();
    assert_eq!(json, "\"AlreadyExists\"");
}

#[test]
fn test_path_with_type_accessors() {
    let item = PathWithType::directory("/data/photos");
    assert!(item.is_dir());
    assert_eq!(item.name(), Some("photos"));
    assert_eq!(item.parent(), Some(Path::new("/data")));

    let moved = item.with_path("/archive/photos");
    assert_eq!(moved.item_type, FilesystemItemType::Directory);
    assert_eq!(moved.path, Path::new("/archive/photos"));
}

#[test]
fn test_history_merge_concatenates_in_order() {
    let first = StorageHistory::single(
        OperationType::Copy,
        PathWithType::file("/a/1.txt"),
        Some(PathWithType::file("/b/1.txt")),
    );
    let second = StorageHistory::single(
        OperationType::Copy,
        PathWithType::file("/a/2.txt"),
        Some(PathWithType::file("/b/2.txt")),
    );

    let merged = StorageHistory::merge(vec![Some(first), Some(second)]).unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.source[1].path, Path::new("/a/2.txt"));
    assert_eq!(merged.destination.unwrap()[0].path, Path::new("/b/1.txt"));
}

#[test]
fn test_history_merge_is_all_or_nothing() {
    let done = StorageHistory::single(
        OperationType::Move,
        PathWithType::file("/a"),
        Some(PathWithType::file("/b")),
    );

    assert!(StorageHistory::merge(vec![Some(done.clone()), None]).is_none());
    assert!(StorageHistory::merge(Vec::new()).is_none());
    assert_eq!(StorageHistory::merge(vec![Some(done.clone())]), Some(done));
}

#[test]
fn test_history_undo_capability() {
    let overwrite = StorageHistory::single(OperationType::Copy, PathWithType::file("/a"), None);
    assert!(!overwrite.can_undo());

    let created = StorageHistory::single(OperationType::CreateNew, PathWithType::file("/a"), None);
    assert!(created.can_undo());

    let deleted = StorageHistory::single(OperationType::Delete, PathWithType::file("/a"), None);
    assert!(!deleted.can_undo());
    assert_eq!(deleted.description(), "Permanently deleted 1 items");
}

#[test]
fn test_history_json_shape() {
    let history = StorageHistory::single(
        OperationType::Rename,
        PathWithType::file("/a/old.txt"),
        Some(PathWithType::file("/a/new.txt")),
    );
    let json = serde_json::to_value(&history).unwrap();
    let back: StorageHistory = serde_json::from_value(json).unwrap();

    assert_eq!(back, history);
    assert_eq!(back.description(), "Renamed 'old.txt' to 'new.txt'");
}

#[test]
fn test_config_from_partial_toml() {
    let config: OpsConfig = toml::from_str(
        r#"
        max_depth = 12
        use_system_trash = true
        "#,
    )
    .unwrap();

    assert_eq!(config.max_depth, 12);
    assert!(config.use_system_trash);
    assert_eq!(config.selection_delay_ms, 50);
    assert!(config.helper_command.is_empty());
}
