use async_trait::async_trait;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::{
    AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use cloud_storage::auth::{Accounts, Caller, Principal};
use cloud_storage::client::{SessionContext, serve};
use cloud_storage::config::{AccountConfig, ServerConfig, StartupConfig};
use cloud_storage::error::{ServerError, StorageError, StoreError};
use cloud_storage::gateway::{
    ListRequest, MemoryStore, ObjectBody, ObjectItem, ObjectStat, ObjectStore,
};
use cloud_storage::storage::{ResourceDescriptor, ResourceKind, StorageService, UploadFile};
use cloud_storage::Server;

const BUCKET: &str = "alice-1";

fn alice() -> Caller {
    Caller::authenticated(Principal::new("alice", 1))
}

async fn store_with(objects: &[(&str, &str)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.create_bucket(BUCKET).await;
    for (key, body) in objects {
        store
            .put(BUCKET, key, Bytes::from(body.to_string()), "text/plain")
            .await
            .unwrap();
    }
    store
}

async fn service_with(objects: &[(&str, &str)]) -> (Arc<MemoryStore>, StorageService) {
    let store = store_with(objects).await;
    (store.clone(), StorageService::new(store))
}

async fn read_body(body: ObjectBody) -> Vec<u8> {
    let mut bytes = Vec::new();
    body.into_reader().read_to_end(&mut bytes).await.unwrap();
    bytes
}

fn kind_of(result: Result<ResourceDescriptor, StorageError>) -> Option<ResourceKind> {
    result.ok().map(|d| d.kind())
}

/// Store that fails chosen operations on chosen keys. With `interleave`
/// every call first yields to the scheduler, so concurrent operations
/// alternate between their store calls.
struct FailingStore {
    inner: Arc<MemoryStore>,
    fail_copy_from: Option<String>,
    fail_remove: Option<String>,
    interleave: bool,
}

impl FailingStore {
    fn wrapping(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_copy_from: None,
            fail_remove: None,
            interleave: false,
        }
    }

    fn unavailable(op: &str, key: &str) -> StoreError {
        StoreError::Unavailable(format!("injected {} failure on {}", op, key))
    }

    async fn pause(&self) {
        if self.interleave {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        self.pause().await;
        self.inner.bucket_exists(bucket).await
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectStat>, StoreError> {
        self.pause().await;
        self.inner.stat(bucket, key).await
    }

    async fn list(&self, bucket: &str, request: &ListRequest) -> Result<Vec<ObjectItem>, StoreError> {
        self.pause().await;
        self.inner.list(bucket, request).await
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.pause().await;
        self.inner.put(bucket, key, body, content_type).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectBody, StoreError> {
        self.pause().await;
        self.inner.get(bucket, key).await
    }

    async fn copy(&self, bucket: &str, from: &str, to: &str) -> Result<(), StoreError> {
        self.pause().await;
        if self.fail_copy_from.as_deref() == Some(from) {
            return Err(Self::unavailable("copy", from));
        }
        self.inner.copy(bucket, from, to).await
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.pause().await;
        if self.fail_remove.as_deref() == Some(key) {
            return Err(Self::unavailable("remove", key));
        }
        self.inner.remove(bucket, key).await
    }
}

#[tokio::test]
async fn uploaded_file_is_described_at_root() {
    let (_, service) = service_with(&[]).await;

    let uploaded = service
        .upload(&alice(), "", vec![UploadFile::new("a.txt", "hello world")])
        .await
        .unwrap();
    assert_eq!(uploaded, vec![ResourceDescriptor::file("", "a.txt", 11)]);

    let info = service.resource_info(&alice(), "/a.txt").await.unwrap();
    assert_eq!(info, ResourceDescriptor::file("", "a.txt", 11));
    assert_eq!(
        serde_json::to_value(&info).unwrap(),
        serde_json::json!({"path": "", "name": "a.txt", "size": 11, "type": "FILE"})
    );
}

#[tokio::test]
async fn upload_nests_files_under_the_target_directory() {
    let (store, service) = service_with(&[("docs/", "")]).await;

    let uploaded = service
        .upload(
            &alice(),
            "/docs/",
            vec![UploadFile::new("a.txt", "1"), UploadFile::new("sub/b.txt", "22")],
        )
        .await
        .unwrap();

    assert_eq!(
        uploaded,
        vec![
            ResourceDescriptor::file("docs/", "a.txt", 1),
            ResourceDescriptor::file("docs/sub/", "b.txt", 2),
        ]
    );
    assert_eq!(
        store.keys(BUCKET).await,
        vec!["docs/", "docs/a.txt", "docs/sub/b.txt"]
    );
}

#[tokio::test]
async fn upload_stops_at_the_first_conflict() {
    let (store, service) = service_with(&[("taken.txt", "old")]).await;

    let result = service
        .upload(
            &alice(),
            "",
            vec![
                UploadFile::new("first.txt", "1"),
                UploadFile::new("taken.txt", "new"),
                UploadFile::new("last.txt", "3"),
            ],
        )
        .await;

    assert!(matches!(result, Err(StorageError::ResourceAlreadyExists(ref key)) if key == "taken.txt"));
    // Earlier files stay, later ones are never written.
    assert_eq!(store.keys(BUCKET).await, vec!["first.txt", "taken.txt"]);
    assert_eq!(read_body(store.get(BUCKET, "taken.txt").await.unwrap()).await, b"old");
}

#[tokio::test]
async fn upload_rejects_empty_file_names() {
    let (_, service) = service_with(&[]).await;
    let result = service
        .upload(&alice(), "docs", vec![UploadFile::new(" / ", "x")])
        .await;
    assert!(matches!(result, Err(StorageError::InvalidOrMissingPath(_))));
}

#[tokio::test]
async fn create_directory_requires_an_existing_parent() {
    let (store, service) = service_with(&[]).await;

    let result = service.create_directory(&alice(), "folder1/folder2/").await;
    assert!(matches!(result, Err(StorageError::ResourceNotFound(_))));

    let created = service.create_directory(&alice(), "folder1").await.unwrap();
    assert_eq!(created, ResourceDescriptor::directory("", "folder1/"));

    let nested = service
        .create_directory(&alice(), "folder1/folder2/")
        .await
        .unwrap();
    assert_eq!(nested, ResourceDescriptor::directory("folder1/", "folder2/"));
    assert_eq!(store.keys(BUCKET).await, vec!["folder1/", "folder1/folder2/"]);

    assert!(matches!(
        service.create_directory(&alice(), "folder1").await,
        Err(StorageError::ResourceAlreadyExists(_))
    ));
}

#[tokio::test]
async fn create_directory_under_a_file_is_not_found() {
    let (_, service) = service_with(&[("a.txt", "x")]).await;
    assert!(matches!(
        service.create_directory(&alice(), "a.txt/sub").await,
        Err(StorageError::ResourceNotFound(_))
    ));
}

#[tokio::test]
async fn move_onto_existing_file_conflicts_and_keeps_source() {
    let (_, service) = service_with(&[("folder1/a.txt", "a"), ("folder1/b.txt", "b")]).await;

    let before = service.resource_info(&alice(), "folder1/a.txt").await.unwrap();
    let result = service
        .move_resource(&alice(), "folder1/a.txt", "folder1/b.txt")
        .await;
    assert!(matches!(result, Err(StorageError::ResourceAlreadyExists(_))));

    let after = service.resource_info(&alice(), "folder1/a.txt").await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after.kind(), ResourceKind::File);
}

#[tokio::test]
async fn renamed_directory_moves_its_contents() {
    let (_, service) = service_with(&[("old/", ""), ("old/x.txt", "x")]).await;

    let moved = service.move_resource(&alice(), "old/", "new/").await.unwrap();
    assert_eq!(moved, ResourceDescriptor::directory("", "new/"));

    assert_eq!(
        kind_of(service.resource_info(&alice(), "new/x.txt").await),
        Some(ResourceKind::File)
    );
    assert!(matches!(
        service.resource_info(&alice(), "old/").await,
        Err(StorageError::ResourceNotFound(_))
    ));
}

#[tokio::test]
async fn move_requires_both_paths() {
    let (_, service) = service_with(&[("a.txt", "x")]).await;
    assert!(matches!(
        service.move_resource(&alice(), "a.txt", " / ").await,
        Err(StorageError::InvalidOrMissingPath(_))
    ));
    assert!(matches!(
        service.move_resource(&alice(), "", "b.txt").await,
        Err(StorageError::InvalidOrMissingPath(_))
    ));
}

#[tokio::test]
async fn failed_copy_leaves_directory_split_between_locations() {
    let inner = store_with(&[("old/a.txt", "a"), ("old/b.txt", "b")]).await;
    let store = FailingStore {
        fail_copy_from: Some("old/b.txt".to_string()),
        ..FailingStore::wrapping(inner.clone())
    };
    let service = StorageService::new(Arc::new(store));

    let result = service.move_resource(&alice(), "old", "new").await;
    assert!(matches!(result, Err(StorageError::StoreUnavailable(_))));

    // No rollback: the first object already moved, the second never did.
    assert_eq!(inner.keys(BUCKET).await, vec!["new/a.txt", "old/b.txt"]);
}

#[tokio::test]
async fn failed_delete_after_copy_leaves_two_copies() {
    let inner = store_with(&[("a.txt", "a")]).await;
    let store = FailingStore {
        fail_remove: Some("a.txt".to_string()),
        ..FailingStore::wrapping(inner.clone())
    };
    let service = StorageService::new(Arc::new(store));

    let result = service.move_resource(&alice(), "a.txt", "b.txt").await;
    assert!(matches!(result, Err(StorageError::StoreUnavailable(_))));
    assert_eq!(inner.keys(BUCKET).await, vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn overlapping_moves_interleave_without_locking() {
    let inner = store_with(&[("a/x.txt", "x"), ("a/sub/y.txt", "y")]).await;
    let store = FailingStore {
        interleave: true,
        ..FailingStore::wrapping(inner.clone())
    };
    let service = StorageService::new(Arc::new(store));
    let caller = alice();

    // Nothing orders the two moves, so their copy and remove steps
    // interleave. y.txt may end up at either target, at both, or stay put
    // when a move loses its source halfway.
    let (outer, nested) = tokio::join!(
        service.move_resource(&caller, "a", "b"),
        service.move_resource(&caller, "a/sub", "c"),
    );
    for result in [&outer, &nested] {
        assert!(
            matches!(result, Ok(_) | Err(StorageError::ResourceNotFound(_))),
            "unexpected outcome {:?}",
            result
        );
    }

    let keys = inner.keys(BUCKET).await;
    let copies_of = |name: &str| keys.iter().filter(|key| key.ends_with(name)).count();
    assert!(copies_of("/y.txt") >= 1, "y.txt lost: {:?}", keys);
    assert_eq!(copies_of("/x.txt"), 1, "{:?}", keys);
}

#[tokio::test]
async fn search_without_matches_is_an_invalid_query() {
    let (_, service) = service_with(&[("a.txt", "x")]).await;

    assert!(matches!(
        service.search(&alice(), "zzz").await,
        Err(StorageError::InvalidOrMissingPath(_))
    ));
    assert!(matches!(
        service.search(&alice(), "  ").await,
        Err(StorageError::InvalidOrMissingPath(_))
    ));
    assert!(matches!(
        service.search(&alice(), "*?").await,
        Err(StorageError::InvalidOrMissingPath(_))
    ));
}

#[tokio::test]
async fn search_partitions_directories_and_files() {
    let (_, service) = service_with(&[
        ("Reports/", ""),
        ("Reports/q1-report.pdf", "pdf"),
        ("archive/2023/report.txt", "txt"),
        ("notes.md", "md"),
    ])
    .await;

    let results = service.search(&alice(), " REPORT ").await.unwrap();
    let keys: Vec<(String, ResourceKind)> = results
        .iter()
        .map(|d| (d.full_key(), d.kind()))
        .collect();

    assert_eq!(
        keys,
        vec![
            ("Reports/".to_string(), ResourceKind::Directory),
            ("Reports/q1-report.pdf".to_string(), ResourceKind::File),
            ("archive/2023/report.txt".to_string(), ResourceKind::File),
        ]
    );

    let results = service.search(&alice(), "2023").await.unwrap();
    assert_eq!(results, vec![ResourceDescriptor::directory("archive/", "2023/")]);
}

#[tokio::test]
async fn deleted_directory_disappears() {
    let (store, service) = service_with(&[("d/", ""), ("d/one.txt", "1"), ("d/two.txt", "2")]).await;

    service.remove(&alice(), "d/").await.unwrap();

    assert!(store.keys(BUCKET).await.is_empty());
    assert!(matches!(
        service.list_directory(&alice(), "d/").await,
        Err(StorageError::ResourceNotFound(_))
    ));
}

#[tokio::test]
async fn delete_rejects_root_and_missing_resources() {
    let (_, service) = service_with(&[("a.txt", "x")]).await;
    assert!(matches!(
        service.remove(&alice(), "/").await,
        Err(StorageError::InvalidOrMissingPath(_))
    ));
    assert!(matches!(
        service.remove(&alice(), "b.txt").await,
        Err(StorageError::ResourceNotFound(_))
    ));
}

#[tokio::test]
async fn files_cannot_be_listed_as_directories() {
    let (_, service) = service_with(&[("docs/a.txt", "x")]).await;

    let info = service.resource_info(&alice(), "docs/a.txt").await.unwrap();
    assert_eq!(info.kind(), ResourceKind::File);
    assert!(matches!(
        service.list_directory(&alice(), "docs/a.txt").await,
        Err(StorageError::InvalidOrMissingPath(_))
    ));
}

#[tokio::test]
async fn listing_describes_children_that_reclassify() {
    let (_, service) = service_with(&[("a.txt", "x"), ("docs/", ""), ("docs/b.txt", "yy"), ("pics/c.png", "z")]).await;

    let root = service.list_directory(&alice(), "").await.unwrap();
    assert_eq!(
        root,
        vec![
            ResourceDescriptor::file("", "a.txt", 1),
            ResourceDescriptor::directory("", "docs/"),
            ResourceDescriptor::directory("", "pics/"),
        ]
    );

    for descriptor in root {
        let info = service
            .resource_info(&alice(), &descriptor.full_key())
            .await
            .unwrap();
        assert_eq!(info.kind(), descriptor.kind());
    }
}

#[tokio::test]
async fn downloads_files_raw_and_directories_as_zip() {
    let (_, service) = service_with(&[("docs/", ""), ("docs/a.txt", "alpha"), ("docs/sub/b.txt", "beta")]).await;

    let file = service.download(&alice(), "docs/a.txt").await.unwrap();
    assert_eq!(file.file_name, "a.txt");
    assert_eq!(file.content_type, "application/octet-stream");
    assert_eq!(
        file.content_disposition(),
        "attachment; filename=\"a.txt\"; filename*=UTF-8''a.txt"
    );
    assert_eq!(file.body.size, 5);
    assert_eq!(read_body(file.body).await, b"alpha");

    let dir = service.download(&alice(), "docs").await.unwrap();
    assert_eq!(dir.file_name, "docs.zip");
    assert_eq!(dir.content_type, "application/zip");

    let mut archive = zip::ZipArchive::new(Cursor::new(read_body(dir.body).await)).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "sub/b.txt"]);

    let mut contents = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("sub/b.txt").unwrap(), &mut contents).unwrap();
    assert_eq!(contents, "beta");

    assert!(matches!(
        service.download(&alice(), "/").await,
        Err(StorageError::ResourceNotFound(_))
    ));
}

#[tokio::test]
async fn anonymous_callers_and_missing_buckets_are_rejected() {
    let (_, service) = service_with(&[("a.txt", "x")]).await;

    assert!(matches!(
        service.resource_info(&Caller::anonymous(), "a.txt").await,
        Err(StorageError::Unauthenticated)
    ));
    assert!(matches!(
        service
            .list_directory(&Caller::authenticated(Principal::new("anonymousUser", 1)), "")
            .await,
        Err(StorageError::Unauthenticated)
    ));
    assert!(matches!(
        service
            .list_directory(&Caller::authenticated(Principal::new("bob", 2)), "")
            .await,
        Err(StorageError::BucketMissing(ref bucket)) if bucket == "bob-2"
    ));
}

fn accounts() -> Accounts {
    Accounts::new(&[AccountConfig {
        username: "alice".to_string(),
        password: "secret".to_string(),
        id: 1,
    }])
}

/// Splits a reply line into its status and JSON body
fn parse_reply(line: &str) -> (u16, Value) {
    let (status, body) = line.trim_end().split_once(' ').unwrap();
    (status.parse().unwrap(), serde_json::from_str(body).unwrap())
}

#[tokio::test]
async fn session_uploads_and_downloads_over_a_stream() {
    let (_, service) = service_with(&[]).await;
    let context = Arc::new(SessionContext::new(
        service,
        Arc::new(accounts()),
        &StartupConfig::default(),
    ));

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let session = tokio::spawn(async move {
        serve(server_read, server_write, "127.0.0.1:5000".parse().unwrap(), &context).await
    });

    let (client_read, mut client_write) = tokio::io::split(client_io);
    let mut replies = BufReader::new(client_read);
    let mut line = String::new();

    macro_rules! exchange {
        ($request:expr) => {{
            client_write.write_all($request).await.unwrap();
            line.clear();
            replies.read_line(&mut line).await.unwrap();
            parse_reply(&line)
        }};
    }

    line.clear();
    replies.read_line(&mut line).await.unwrap();
    assert_eq!(parse_reply(&line).0, 220);

    let (status, body) = exchange!(b"LIST\r\n");
    assert_eq!(status, 401);
    assert_eq!(body["statusCode"], 401);

    assert_eq!(exchange!(b"PASS secret\r\n").0, 401);
    assert_eq!(exchange!(b"USER alice\r\n").0, 331);
    assert_eq!(exchange!(b"PASS secret\r\n").0, 230);

    let (status, body) = exchange!(b"STOR / a.txt:11\r\nhello world");
    assert_eq!(status, 201);
    assert_eq!(
        body,
        serde_json::json!([{"path": "", "name": "a.txt", "size": 11, "type": "FILE"}])
    );

    assert_eq!(exchange!(b"MKD docs\r\n").0, 201);
    assert_eq!(exchange!(b"MOVE a.txt docs/a.txt\r\n").0, 200);

    let (status, body) = exchange!(b"STAT docs/a.txt\r\n");
    assert_eq!(status, 200);
    assert_eq!(body["path"], "docs/");

    let (status, body) = exchange!(b"RETR docs/a.txt\r\n");
    assert_eq!(status, 200);
    assert_eq!(body["size"], 11);
    let mut payload = vec![0u8; 11];
    replies.read_exact(&mut payload).await.unwrap();
    assert_eq!(payload, b"hello world");

    let (status, body) = exchange!(b"FIND nothing-here\r\n");
    assert_eq!(status, 400);
    assert_eq!(body["statusCode"], 400);

    assert_eq!(exchange!(b"FROB\r\n").0, 501);
    assert_eq!(exchange!(b"DELE docs\r\n").0, 204);
    assert_eq!(exchange!(b"LIST docs\r\n").0, 404);
    assert_eq!(exchange!(b"QUIT\r\n").0, 221);

    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn oversized_upload_closes_the_session() {
    let (store, service) = service_with(&[]).await;
    let config = StartupConfig {
        max_upload_size_mb: 1,
        ..StartupConfig::default()
    };
    let context = Arc::new(SessionContext::new(service, Arc::new(accounts()), &config));

    let (client_io, server_io) = tokio::io::duplex(4096);
    let (server_read, server_write) = tokio::io::split(server_io);
    let session = tokio::spawn(async move {
        serve(server_read, server_write, "127.0.0.1:5001".parse().unwrap(), &context).await
    });

    let (client_read, mut client_write) = tokio::io::split(client_io);
    let mut replies = BufReader::new(client_read);
    let mut line = String::new();
    replies.read_line(&mut line).await.unwrap();

    client_write
        .write_all(b"STOR / big.bin:2000000\r\n")
        .await
        .unwrap();
    line.clear();
    replies.read_line(&mut line).await.unwrap();
    assert_eq!(parse_reply(&line).0, 413);

    session.await.unwrap().unwrap();
    assert!(store.keys(BUCKET).await.is_empty());
}

/// Client end of a session served over an in-memory stream
struct TestSession {
    store: Arc<MemoryStore>,
    replies: BufReader<ReadHalf<DuplexStream>>,
    requests: WriteHalf<DuplexStream>,
    task: JoinHandle<Result<(), ServerError>>,
    line: String,
}

impl TestSession {
    async fn start(config: StartupConfig) -> Self {
        let (store, service) = service_with(&[]).await;
        let context = Arc::new(SessionContext::new(service, Arc::new(accounts()), &config));

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let task = tokio::spawn(async move {
            serve(server_read, server_write, "127.0.0.1:5002".parse().unwrap(), &context).await
        });

        let (client_read, requests) = tokio::io::split(client_io);
        let mut session = Self {
            store,
            replies: BufReader::new(client_read),
            requests,
            task,
            line: String::new(),
        };
        assert_eq!(session.read_reply().await.0, 220);
        session
    }

    async fn read_reply(&mut self) -> (u16, Value) {
        self.line.clear();
        self.replies.read_line(&mut self.line).await.unwrap();
        parse_reply(&self.line)
    }

    async fn send(&mut self, request: &[u8]) -> (u16, Value) {
        self.requests.write_all(request).await.unwrap();
        self.read_reply().await
    }

    async fn login(&mut self) {
        assert_eq!(self.send(b"USER alice\r\n").await.0, 331);
        assert_eq!(self.send(b"PASS secret\r\n").await.0, 230);
    }

    async fn read_payload(&mut self, len: usize) -> Vec<u8> {
        let mut payload = vec![0u8; len];
        self.replies.read_exact(&mut payload).await.unwrap();
        payload
    }
}

#[tokio::test]
async fn names_with_spaces_are_quoted() {
    let mut session = TestSession::start(StartupConfig::default()).await;
    session.login().await;

    let (status, body) = session
        .send(b"STOR \"my docs\" \"my report.txt\":5\r\nhello")
        .await;
    assert_eq!(status, 201);
    assert_eq!(
        body,
        serde_json::json!([{"path": "my docs/", "name": "my report.txt", "size": 5, "type": "FILE"}])
    );

    let (status, body) = session
        .send(b"MOVE \"my docs/my report.txt\" \"my docs/final report.txt\"\r\n")
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["name"], "final report.txt");

    let (status, body) = session.send(b"RETR \"my docs/final report.txt\"\r\n").await;
    assert_eq!(status, 200);
    assert_eq!(body["size"], 5);
    assert_eq!(session.read_payload(5).await, b"hello");

    assert_eq!(session.send(b"STAT my docs/final report.txt\r\n").await.0, 422);
    assert_eq!(
        session.store.keys(BUCKET).await,
        vec!["my docs/final report.txt"]
    );
}

#[tokio::test]
async fn unauthenticated_upload_is_drained_and_rejected() {
    let mut session = TestSession::start(StartupConfig::default()).await;

    let (status, body) = session.send(b"STOR / a.txt:5\r\nhello").await;
    assert_eq!(status, 401);
    assert_eq!(body["statusCode"], 401);

    // The announced bytes were consumed, so the next line is a command.
    assert_eq!(session.send(b"NOOP\r\n").await.0, 200);
    assert!(session.store.keys(BUCKET).await.is_empty());
}

#[tokio::test]
async fn upload_limit_covers_the_whole_request() {
    let config = StartupConfig {
        max_upload_size_mb: 1,
        ..StartupConfig::default()
    };
    let mut session = TestSession::start(config).await;
    session.login().await;

    // Each file fits the limit on its own; together they do not.
    let (status, _) = session
        .send(b"STOR / a.bin:600000 b.bin:600000\r\n")
        .await;
    assert_eq!(status, 413);

    session.task.await.unwrap().unwrap();
    assert!(session.store.keys(BUCKET).await.is_empty());
}

#[tokio::test]
async fn directory_download_streams_the_archive() {
    let mut session = TestSession::start(StartupConfig::default()).await;
    session.login().await;

    assert_eq!(session.send(b"STOR docs a.txt:5 sub/b.txt:4\r\nalphabeta").await.0, 201);

    let (status, body) = session.send(b"RETR docs\r\n").await;
    assert_eq!(status, 200);
    assert_eq!(body["fileName"], "docs.zip");
    assert_eq!(body["contentType"], "application/zip");
    let size = body["size"].as_u64().unwrap() as usize;

    let archive = session.read_payload(size).await;
    let mut archive = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut contents = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("sub/b.txt").unwrap(), &mut contents).unwrap();
    assert_eq!(contents, "beta");

    assert_eq!(session.send(b"QUIT\r\n").await.0, 221);
}

#[tokio::test]
async fn server_refuses_clients_beyond_the_limit() {
    let mut config = ServerConfig::default();
    config.server.port = 0;
    config.server.max_clients = 1;

    let (_, service) = service_with(&[]).await;
    let server = Server::new(&config, service, accounts()).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move { server.start().await });

    let first = TcpStream::connect(addr).await.unwrap();
    let mut first = BufReader::new(first);
    let mut line = String::new();
    first.read_line(&mut line).await.unwrap();
    assert_eq!(parse_reply(&line).0, 220);

    let second = TcpStream::connect(addr).await.unwrap();
    let mut second = BufReader::new(second);
    line.clear();
    second.read_line(&mut line).await.unwrap();
    assert_eq!(parse_reply(&line).0, 421);
}
