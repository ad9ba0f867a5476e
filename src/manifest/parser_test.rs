use tracing_test::traced_test;

use super::*;
use crate::ManifestError;

const NGINX_DEPLOYMENT: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: nginx
  namespace: web
  labels:
    app: nginx
spec:
  replicas: 3
  template:
    metadata:
      labels:
        app: nginx
    spec:
      containers:
        - name: nginx
          image: nginx:1.25
          args: ["-g", "daemon off;"]
          env:
            - name: MODE
              value: prod
"#;

#[test]
fn test_parse_single_deployment() {
    let parser = ManifestParser::new();
    let manifests = parser.parse(NGINX_DEPLOYMENT.as_bytes()).unwrap();

    assert_eq!(manifests.len(), 1);
    let workload = manifests[0].clone().into_workload().expect("workload");
    assert_eq!(workload.name, "nginx");
    assert_eq!(workload.namespace, "web");
    assert_eq!(workload.replicas, 3);
    assert_eq!(workload.labels.get("app").map(String::as_str), Some("nginx"));
    assert_eq!(workload.template.containers.len(), 1);
    assert_eq!(workload.template.containers[0].image, "nginx:1.25");
    assert_eq!(workload.template.containers[0].args, vec!["-g", "daemon off;"]);
    assert_eq!(workload.template.containers[0].env[0].value, "prod");
}

#[test]
#[traced_test]
fn test_parse_skips_unrecognized_kind_and_keeps_order() {
    let buffer = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: api
spec:
  template:
    spec:
      containers:
        - name: api
          image: example/api:1
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: api-config
data:
  LOG_LEVEL: debug
---
apiVersion: batch/v1
kind: CronJob
metadata:
  name: cleanup
"#;
    let manifests = ManifestParser::new().parse(buffer.as_bytes()).unwrap();

    let kinds: Vec<ManifestKind> = manifests.iter().map(|m| m.kind()).collect();
    assert_eq!(kinds, vec![ManifestKind::Workload, ManifestKind::ConfigData]);
    assert!(logs_contain("Skipping unsupported GVK: batch/v1/CronJob"));
}

#[test]
fn test_parse_order_is_source_order() {
    let buffer = r#"
apiVersion: v1
kind: Secret
metadata:
  name: creds
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: worker
"#;
    let manifests = ManifestParser::new().parse(buffer.as_bytes()).unwrap();
    let names: Vec<&str> = manifests.iter().map(|m| m.name()).collect();
    assert_eq!(names, vec!["creds", "settings", "worker"]);
}

#[test]
fn test_parse_broken_stream_returns_decode_error_only() {
    let buffer = format!("{}\n---\nkind: [Deployment\nmetadata: {{\n", NGINX_DEPLOYMENT);

    let result = ManifestParser::new().parse(buffer.as_bytes());

    assert!(matches!(result, Err(ManifestError::Decode(_))));
}

#[test]
fn test_parse_rejects_invalid_utf8() {
    let result = ManifestParser::new().parse(&[0x61, 0x3a, 0x20, 0xff, 0xfe]);
    assert!(matches!(result, Err(ManifestError::InvalidUtf8(_))));
}

#[test]
fn test_parse_json_document() {
    let buffer = r#"{"apiVersion":"apps/v1","kind":"Deployment","metadata":{"name":"redis","namespace":"cache"},"spec":{"replicas":1}}"#;
    let manifests = ManifestParser::new().parse(buffer.as_bytes()).unwrap();

    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].kind(), ManifestKind::Workload);
    assert_eq!(manifests[0].namespace(), "cache");
    assert_eq!(manifests[0].name(), "redis");
}

#[test]
fn test_parse_defaults_namespace_and_replicas() {
    let buffer = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: nginx\n";
    let manifests = ManifestParser::new().parse(buffer.as_bytes()).unwrap();

    let workload = manifests[0].clone().into_workload().unwrap();
    assert_eq!(workload.namespace, "default");
    assert_eq!(workload.replicas, 1);
}

#[test]
fn test_parse_empty_documents_are_ignored() {
    let buffer = "---\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\n";
    let manifests = ManifestParser::new().parse(buffer.as_bytes()).unwrap();
    assert_eq!(manifests.len(), 1);

    assert!(ManifestParser::new().parse(b"").unwrap().is_empty());
}

#[test]
#[traced_test]
fn test_parse_skips_document_with_bad_body() {
    let buffer = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: broken
spec:
  replicas: two
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: fine
"#;
    let manifests = ManifestParser::new().parse(buffer.as_bytes()).unwrap();

    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].name(), "fine");
    assert!(logs_contain("could not be decoded"));
}

#[test]
fn test_parse_skips_document_without_kind() {
    let buffer = "metadata:\n  name: orphan\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: kept\n";
    let manifests = ManifestParser::new().parse(buffer.as_bytes()).unwrap();
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].name(), "kept");
}

#[test]
fn test_parse_skips_workload_without_name() {
    let buffer = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  namespace: x\n";
    assert!(ManifestParser::new().parse(buffer.as_bytes()).unwrap().is_empty());
}

#[test]
fn test_parse_secret_decodes_base64_and_string_data() {
    let buffer = r#"
apiVersion: v1
kind: Secret
metadata:
  name: db
  namespace: prod
data:
  password: cGFzc3dvcmQ=
  user: YWRtaW4=
stringData:
  user: root
"#;
    let manifests = ManifestParser::new().parse(buffer.as_bytes()).unwrap();

    match &manifests[0] {
        WorkloadManifest::SecretData(secret) => {
            assert_eq!(secret.namespace, "prod");
            assert_eq!(secret.data.get("password").unwrap(), b"password");
            assert_eq!(secret.data.get("user").unwrap(), b"root");
            let rendered = format!("{:?}", secret);
            assert!(rendered.contains("keys"));
            // b"password"
            assert!(!rendered.contains("112, 97, 115, 115"));
        }
        other => panic!("expected secret, got {:?}", other),
    }
}

#[test]
fn test_parse_secret_with_invalid_base64_is_skipped() {
    let buffer = "apiVersion: v1\nkind: Secret\nmetadata:\n  name: bad\ndata:\n  key: '%%%'\n";
    assert!(ManifestParser::new().parse(buffer.as_bytes()).unwrap().is_empty());
}

#[test]
fn test_parse_file_reports_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.yaml");

    let result = ManifestParser::new().parse_file(&missing);
    assert!(matches!(result, Err(ManifestError::Read { .. })));
}

#[test]
fn test_group_version_kind_from_api_version() {
    let core = GroupVersionKind::from_api_version("v1", "ConfigMap");
    assert_eq!(core.group, "");
    assert_eq!(core.version, "v1");

    let apps = GroupVersionKind::from_api_version("apps/v1", "Deployment");
    assert_eq!(apps.group, "apps");
    assert_eq!(apps.version, "v1");
    assert_eq!(apps.kind, "Deployment");
}
