use super::fake_cluster::FakeCluster;
use crate::{
    FetchOutcome, HttpImageFetcher, ImageFetcher, InstanceSize, Outcome, ParamValue, ProxmoxApi,
    ProxmoxError, ProxmoxResult, Sha256Checksum, Size, TemplateService, TemplateSpec, Verb, VmId,
    VmService,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const IMAGE: &[u8] = b"\x51\x46\x49\xfb fake qcow2 payload";

fn checksum_of(bytes: &[u8]) -> Sha256Checksum {
    hex::encode(Sha256::digest(bytes)).parse().unwrap()
}

async fn image_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/noble-server-cloudimg-amd64.img"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(IMAGE))
        .mount(&server)
        .await;
    server
}

fn template(server: &MockServer, checksum: Option<Sha256Checksum>) -> TemplateSpec {
    let src = Url::parse(&format!("{}/noble-server-cloudimg-amd64.img", server.uri())).unwrap();
    TemplateSpec {
        checksum,
        ..TemplateSpec::new("noble-tpl", "node-a", src)
    }
}

fn service(cluster: &Arc<FakeCluster>, fetcher: Arc<dyn ImageFetcher>) -> TemplateService {
    TemplateService::new(VmService::new(ProxmoxApi::new(cluster.clone())), fetcher)
}

#[tokio::test]
async fn test_template_download_then_create() {
    let server = image_server().await;
    let storage = tempfile::tempdir().unwrap();
    let cluster = Arc::new(
        FakeCluster::new()
            .with_next_id(9000)
            .with_storage("local", storage.path().to_str().unwrap()),
    );
    let templates = service(&cluster, Arc::new(HttpImageFetcher::default()));

    let report = templates
        .provision(&template(&server, Some(checksum_of(IMAGE))))
        .await
        .unwrap();

    assert_eq!(report.vmid, VmId::new(9000).unwrap());
    assert!(matches!(report.outcome, Outcome::Converged));
    assert_eq!(cluster.count(Verb::Get, "/cluster/nextid"), 1);

    let image = storage.path().join("images/9000/vm-9000-disk-1.qcow2");
    assert_eq!(std::fs::read(&image).unwrap(), IMAGE);

    let mutations = cluster.mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].path, "/nodes/node-a/qemu");
    let params = &mutations[0].params;
    assert_eq!(params.get("template"), Some(&ParamValue::Int(1)));
    assert_eq!(params.get("vmid"), Some(&ParamValue::Int(9000)));
    assert_eq!(
        params.get("virtio0"),
        Some(&ParamValue::from("local:9000/vm-9000-disk-1.qcow2,size=32G"))
    );
    assert!(report.observed.unwrap().template);

    let again = templates
        .provision(&template(&server, Some(checksum_of(IMAGE))))
        .await
        .unwrap();
    assert!(matches!(again.outcome, Outcome::Unchanged));
    assert_eq!(again.vmid, VmId::new(9000).unwrap());
    assert_eq!(cluster.count(Verb::Get, "/cluster/nextid"), 1);
    assert_eq!(cluster.mutations().len(), 1);
}

#[tokio::test]
async fn test_checksum_mismatch_creates_nothing() {
    let server = image_server().await;
    let storage = tempfile::tempdir().unwrap();
    let cluster = Arc::new(
        FakeCluster::new()
            .with_next_id(9000)
            .with_storage("local", storage.path().to_str().unwrap()),
    );
    let templates = service(&cluster, Arc::new(HttpImageFetcher::default()));

    let result = templates
        .provision(&template(&server, Some(checksum_of(b"another image"))))
        .await;

    assert!(matches!(result, Err(ProxmoxError::ChecksumMismatch { .. })));
    assert!(cluster.mutations().is_empty());
    let image_dir = storage.path().join("images/9000");
    assert_eq!(std::fs::read_dir(image_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_existing_template_is_not_recreated() {
    let server = image_server().await;
    let storage = tempfile::tempdir().unwrap();
    let image_dir = storage.path().join("images/9000");
    std::fs::create_dir_all(&image_dir).unwrap();
    std::fs::write(image_dir.join("vm-9000-disk-1.qcow2"), IMAGE).unwrap();
    let cluster = Arc::new(
        FakeCluster::new()
            .with_template(9000, "noble-tpl", "node-a")
            .with_storage("local", storage.path().to_str().unwrap()),
    );
    let templates = service(&cluster, Arc::new(HttpImageFetcher::default()));

    let spec = TemplateSpec {
        size: Size::Named(InstanceSize::Small),
        ..template(&server, Some(checksum_of(IMAGE)))
    };

    let report = templates.provision(&spec).await.unwrap();

    assert_eq!(report.vmid, VmId::new(9000).unwrap());
    assert!(matches!(report.outcome, Outcome::Unchanged));
    assert_eq!(cluster.count(Verb::Get, "/cluster/nextid"), 0);
    assert!(cluster.mutations().is_empty());
}

#[derive(Default)]
struct CountingFetcher {
    fetched: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl ImageFetcher for CountingFetcher {
    async fn fetch(
        &self,
        _src: &Url,
        dest: &Path,
        _checksum: Option<&Sha256Checksum>,
    ) -> ProxmoxResult<FetchOutcome> {
        self.fetched.lock().unwrap().push(dest.to_path_buf());
        Ok(FetchOutcome::Downloaded)
    }
}

#[tokio::test]
async fn test_unknown_ostype_fails_before_download() {
    let server = image_server().await;
    let storage = tempfile::tempdir().unwrap();
    let cluster = Arc::new(
        FakeCluster::new()
            .with_next_id(9000)
            .with_storage("local", storage.path().to_str().unwrap()),
    );
    let fetcher = Arc::new(CountingFetcher::default());
    let templates = service(&cluster, fetcher.clone());
    let spec = TemplateSpec {
        ostype: "plan9".to_string(),
        ..template(&server, None)
    };

    let result = templates.provision(&spec).await;

    assert!(matches!(result, Err(ProxmoxError::UnknownOsType(ref s)) if s == "plan9"));
    assert!(fetcher.fetched.lock().unwrap().is_empty());
    assert!(cluster.calls().is_empty());
    assert!(!storage.path().join("images").exists());
}

#[tokio::test]
async fn test_unknown_storage_fails_before_download() {
    let server = image_server().await;
    let cluster = Arc::new(FakeCluster::new().with_next_id(9000));
    let fetcher = Arc::new(CountingFetcher::default());
    let templates = service(&cluster, fetcher.clone());

    let result = templates.provision(&template(&server, None)).await;

    assert!(matches!(result, Err(ProxmoxError::Transport(_))));
    assert!(fetcher.fetched.lock().unwrap().is_empty());
    assert!(cluster.mutations().is_empty());
}
