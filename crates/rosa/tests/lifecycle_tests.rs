//! End-to-end create and delete sequences against in-memory collaborators.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use rosa::api::{
    AccountRole, AccountRoleApi, ClusterApi, ClusterPage, ClusterRecord, InfraPlan,
    NodeHealthApi, NodeReadiness, OidcConfig, OidcConfigApi, OidcConfigRequest,
    ROLE_TYPE_CONTROL_PLANE, ROLE_TYPE_INSTALLER, ROLE_TYPE_SUPPORT, ROLE_TYPE_WORKER,
};
use rosa::request::ClusterSpec;
use rosa::{
    AwsCredentials, CallContext, ClusterLifecycleController, ClusterOptions, Collaborators,
    DeleteOptions, LifecycleSettings, Operation, PollPolicy, ProvisionError, Stage,
};

type Calls = Arc<Mutex<Vec<String>>>;

fn record(calls: &Calls, call: impl Into<String>) {
    calls.lock().unwrap().push(call.into());
}

fn count(calls: &Calls, prefix: &str) -> usize {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.starts_with(prefix))
        .count()
}

fn role(prefix: &str, role_type: &str, version: &str) -> AccountRole {
    let short = role_type.replace(' ', "");
    AccountRole {
        name: format!("{prefix}-{short}-Role"),
        arn: format!("arn:aws:iam::123456789012:role/{prefix}-{short}-Role"),
        role_type: role_type.to_string(),
        version: version.to_string(),
    }
}

struct FakeIdentity {
    calls: Calls,
    roles: Mutex<Vec<AccountRole>>,
}

#[async_trait]
impl AccountRoleApi for FakeIdentity {
    async fn list_account_roles(
        &self,
        _ctx: &CallContext,
    ) -> Result<Vec<AccountRole>, ProvisionError> {
        record(&self.calls, "roles.list");
        Ok(self.roles.lock().unwrap().clone())
    }

    async fn create_account_roles(
        &self,
        prefix: &str,
        version: &str,
        _channel_group: &str,
        _ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        record(&self.calls, format!("roles.create {prefix} {version}"));
        let mut roles = self.roles.lock().unwrap();
        for role_type in [
            ROLE_TYPE_CONTROL_PLANE,
            ROLE_TYPE_INSTALLER,
            ROLE_TYPE_SUPPORT,
            ROLE_TYPE_WORKER,
        ] {
            roles.push(role(prefix, role_type, version));
        }
        Ok(())
    }

    async fn delete_account_roles(
        &self,
        prefix: &str,
        _ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        record(&self.calls, format!("roles.delete {prefix}"));
        self.roles.lock().unwrap().retain(|r| !r.name.starts_with(prefix));
        Ok(())
    }
}

struct FakeOidc {
    calls: Calls,
    configs: Mutex<Vec<OidcConfig>>,
    created_id: String,
}

#[async_trait]
impl OidcConfigApi for FakeOidc {
    async fn list_oidc_configs(
        &self,
        _ctx: &CallContext,
    ) -> Result<Vec<OidcConfig>, ProvisionError> {
        record(&self.calls, "oidc.list");
        Ok(self.configs.lock().unwrap().clone())
    }

    async fn create_oidc_config(
        &self,
        request: &OidcConfigRequest,
        _ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        record(&self.calls, format!("oidc.create {}", request.prefix));
        self.configs.lock().unwrap().push(OidcConfig {
            id: self.created_id.clone(),
            secret_arn: format!("arn:aws:secretsmanager:us-east-1:123:secret:{}", request.prefix),
            managed: request.managed,
            issuer_url: String::new(),
        });
        Ok(self.created_id.clone())
    }

    async fn delete_oidc_config(&self, id: &str, _ctx: &CallContext) -> Result<(), ProvisionError> {
        record(&self.calls, format!("oidc.delete {id}"));
        self.configs.lock().unwrap().retain(|c| c.id != id);
        Ok(())
    }

    async fn cluster_oidc_config(
        &self,
        cluster_id: &str,
        _ctx: &CallContext,
    ) -> Result<OidcConfig, ProvisionError> {
        record(&self.calls, format!("oidc.cluster {cluster_id}"));
        Ok(self
            .configs
            .lock()
            .unwrap()
            .first()
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_oidc_provider(
        &self,
        cluster_id: &str,
        _ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        record(&self.calls, format!("oidc.provider.delete {cluster_id}"));
        Ok(())
    }
}

struct FakeClusters {
    calls: Calls,
    clusters: Mutex<Vec<ClusterRecord>>,
    submitted: Mutex<Option<ClusterSpec>>,
    /// Describe calls answered with `installing` before `ready`.
    installing_for: u32,
    describes: Mutex<u32>,
}

#[async_trait]
impl ClusterApi for FakeClusters {
    async fn create_cluster(
        &self,
        spec: &ClusterSpec,
        _ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        record(&self.calls, format!("cluster.create {}", spec.name));
        *self.submitted.lock().unwrap() = Some(spec.clone());
        self.clusters.lock().unwrap().push(ClusterRecord {
            id: format!("id-{}", spec.name),
            name: spec.name.clone(),
            state: "installing".into(),
        });
        Ok(())
    }

    async fn list_clusters(
        &self,
        search: &str,
        _page: u32,
        _size: u32,
        _ctx: &CallContext,
    ) -> Result<ClusterPage, ProvisionError> {
        record(&self.calls, "cluster.list");
        let items: Vec<ClusterRecord> = self
            .clusters
            .lock()
            .unwrap()
            .iter()
            .filter(|c| search.contains(&format!("name = '{}'", c.name)))
            .cloned()
            .collect();
        Ok(ClusterPage {
            total: items.len() as u64,
            items,
        })
    }

    async fn describe_cluster(
        &self,
        id: &str,
        _ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        record(&self.calls, format!("cluster.describe {id}"));
        let mut describes = self.describes.lock().unwrap();
        *describes += 1;
        Ok(if *describes > self.installing_for {
            "ready".into()
        } else {
            "installing".into()
        })
    }

    async fn delete_cluster(&self, id: &str, _ctx: &CallContext) -> Result<(), ProvisionError> {
        record(&self.calls, format!("cluster.delete {id}"));
        self.clusters.lock().unwrap().retain(|c| c.id != id);
        Ok(())
    }

    async fn delete_operator_roles(
        &self,
        cluster_id: &str,
        _ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        record(&self.calls, format!("operator-roles.delete {cluster_id}"));
        Ok(())
    }

    async fn kubeconfig(
        &self,
        cluster_id: &str,
        _ctx: &CallContext,
    ) -> Result<String, ProvisionError> {
        record(&self.calls, format!("cluster.kubeconfig {cluster_id}"));
        Ok("apiVersion: v1\nkind: Config\n".into())
    }
}

struct FakeNetwork {
    calls: Calls,
}

#[async_trait]
impl InfraPlan for FakeNetwork {
    async fn init(&self, _dir: &Path, _ctx: &CallContext) -> Result<(), ProvisionError> {
        record(&self.calls, "network.init");
        Ok(())
    }

    async fn plan(
        &self,
        _dir: &Path,
        vars: &BTreeMap<String, String>,
        _ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        record(&self.calls, format!("network.plan {}", vars["cluster_name"]));
        Ok(())
    }

    async fn apply(&self, _dir: &Path, _ctx: &CallContext) -> Result<(), ProvisionError> {
        record(&self.calls, "network.apply");
        Ok(())
    }

    async fn output(
        &self,
        _dir: &Path,
        _ctx: &CallContext,
    ) -> Result<BTreeMap<String, String>, ProvisionError> {
        record(&self.calls, "network.output");
        Ok(BTreeMap::from([
            ("cluster-private-subnet".to_string(), "\"subnet-priv\"".to_string()),
            ("cluster-public-subnet".to_string(), "\"subnet-pub\"".to_string()),
            ("node-private-subnet".to_string(), "\"subnet-node\"".to_string()),
        ]))
    }

    async fn destroy(
        &self,
        _dir: &Path,
        vars: &BTreeMap<String, String>,
        _ctx: &CallContext,
    ) -> Result<(), ProvisionError> {
        record(&self.calls, format!("network.destroy {}", vars["cluster_name"]));
        Ok(())
    }

    async fn uninstall(&self, _dir: &Path) -> Result<(), ProvisionError> {
        record(&self.calls, "network.uninstall");
        Ok(())
    }
}

struct FakeNodes {
    calls: Calls,
}

#[async_trait]
impl NodeHealthApi for FakeNodes {
    async fn list_nodes(
        &self,
        _kubeconfig: &str,
        _ctx: &CallContext,
    ) -> Result<Vec<NodeReadiness>, ProvisionError> {
        record(&self.calls, "nodes.list");
        Ok(vec![
            NodeReadiness {
                name: "worker-0".into(),
                ready: Some(true),
            },
            NodeReadiness {
                name: "worker-1".into(),
                ready: Some(true),
            },
        ])
    }
}

struct Harness {
    calls: Calls,
    identity: Arc<FakeIdentity>,
    oidc: Arc<FakeOidc>,
    clusters: Arc<FakeClusters>,
    controller: ClusterLifecycleController,
    _work_dir: tempfile::TempDir,
}

struct HarnessBuilder {
    roles: Vec<AccountRole>,
    created_oidc_id: String,
    installing_for: u32,
    ready_attempts: u32,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            roles: Vec::new(),
            created_oidc_id: "oidc-c1".into(),
            installing_for: 0,
            ready_attempts: 5,
        }
    }
}

impl HarnessBuilder {
    fn build(self) -> Harness {
        let calls: Calls = Arc::default();
        let identity = Arc::new(FakeIdentity {
            calls: Arc::clone(&calls),
            roles: Mutex::new(self.roles),
        });
        let oidc = Arc::new(FakeOidc {
            calls: Arc::clone(&calls),
            configs: Mutex::default(),
            created_id: self.created_oidc_id,
        });
        let clusters = Arc::new(FakeClusters {
            calls: Arc::clone(&calls),
            clusters: Mutex::default(),
            submitted: Mutex::default(),
            installing_for: self.installing_for,
            describes: Mutex::default(),
        });

        let work_dir = tempfile::tempdir().unwrap();
        let fast = PollPolicy::new(self.ready_attempts, Duration::ZERO);
        let settings = LifecycleSettings {
            work_dir: work_dir.path().to_path_buf(),
            hosted_ready: fast,
            classic_ready: fast,
            deleted: PollPolicy::new(3, Duration::ZERO),
            node_health: PollPolicy::new(3, Duration::ZERO),
        };

        let collaborators = Collaborators {
            account_roles: identity.clone(),
            oidc: oidc.clone(),
            clusters: clusters.clone(),
            network: Arc::new(FakeNetwork {
                calls: Arc::clone(&calls),
            }),
            nodes: Arc::new(FakeNodes {
                calls: Arc::clone(&calls),
            }),
        };
        let controller = ClusterLifecycleController::new(
            collaborators,
            Arc::new(AwsCredentials::from_profile("ci", "us-east-1")),
            settings,
        );

        Harness {
            calls,
            identity,
            oidc,
            clusters,
            controller,
            _work_dir: work_dir,
        }
    }
}

fn hosted_options() -> ClusterOptions {
    ClusterOptions::new("c1", "4.12.6")
        .with_hosted_control_plane(true)
        .with_sts(true)
}

fn position(calls: &Calls, prefix: &str) -> usize {
    calls
        .lock()
        .unwrap()
        .iter()
        .position(|c| c.starts_with(prefix))
        .unwrap_or_else(|| panic!("{prefix} was never called"))
}

#[tokio::test]
async fn test_hosted_create_provisions_prerequisites_in_order() {
    let harness = HarnessBuilder {
        installing_for: 2,
        ..HarnessBuilder::default()
    }
    .build();

    let handle = harness
        .controller
        .create(&hosted_options(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handle.id, "id-c1");
    assert_eq!(handle.name, "c1");

    let calls = &harness.calls;
    assert!(position(calls, "roles.create") < position(calls, "oidc.create"));
    assert!(position(calls, "oidc.create") < position(calls, "network.plan"));
    assert!(position(calls, "network.output") < position(calls, "cluster.create"));
    assert!(position(calls, "cluster.create") < position(calls, "cluster.describe"));
    assert!(position(calls, "cluster.kubeconfig") < position(calls, "nodes.list"));

    assert_eq!(count(calls, "roles.create c1 4.12"), 1);
    assert_eq!(count(calls, "oidc.create c1"), 1);
    assert_eq!(count(calls, "network.plan c1"), 1);
    assert_eq!(count(calls, "cluster.create"), 1);
    assert_eq!(count(calls, "cluster.describe"), 3);
    assert_eq!(count(calls, "network.uninstall"), 1);

    let submitted = harness.clusters.submitted.lock().unwrap().clone().unwrap();
    let hosted = submitted.hosted.unwrap();
    assert_eq!(hosted.oidc_config_id, "oidc-c1");
    assert_eq!(hosted.subnet_ids, vec!["subnet-priv", "subnet-pub"]);
    assert!(submitted.sts);
    assert_eq!(
        submitted.account_roles.installer,
        "arn:aws:iam::123456789012:role/c1-Installer-Role"
    );
}

#[tokio::test]
async fn test_rerun_reuses_existing_roles_and_oidc_config() {
    let harness = HarnessBuilder::default().build();

    harness
        .controller
        .create(&hosted_options(), CancellationToken::new())
        .await
        .unwrap();
    harness
        .controller
        .delete(
            &DeleteOptions::new("id-c1", "c1").with_hosted_control_plane(true),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    // roles and config survive a delete only in the fakes, so seed them back
    harness.identity.roles.lock().unwrap().extend([
        role("c1", ROLE_TYPE_CONTROL_PLANE, "4.12"),
        role("c1", ROLE_TYPE_INSTALLER, "4.12"),
        role("c1", ROLE_TYPE_SUPPORT, "4.12"),
        role("c1", ROLE_TYPE_WORKER, "4.12"),
    ]);
    harness.oidc.configs.lock().unwrap().push(OidcConfig {
        id: "oidc-existing".into(),
        secret_arn: "arn:aws:secretsmanager:us-east-1:123:secret:c1".into(),
        managed: false,
        issuer_url: String::new(),
    });

    harness
        .controller
        .create(&hosted_options(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(count(&harness.calls, "roles.create"), 1);
    assert_eq!(count(&harness.calls, "oidc.create"), 1);
    let submitted = harness.clusters.submitted.lock().unwrap().clone().unwrap();
    assert_eq!(submitted.hosted.unwrap().oidc_config_id, "oidc-existing");
}

#[tokio::test]
async fn test_partial_role_set_stops_create_before_cluster_submission() {
    let harness = HarnessBuilder {
        roles: vec![
            role("c1", ROLE_TYPE_INSTALLER, "4.12"),
            role("c1", ROLE_TYPE_WORKER, "4.12"),
        ],
        ..HarnessBuilder::default()
    }
    .build();

    let err = harness
        .controller
        .create(&hosted_options(), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Create);
    assert_eq!(err.operation, Operation::AccountRoles);
    assert!(matches!(err.kind(), ProvisionError::Inconsistent { found, .. } if found.len() == 2));
    assert_eq!(count(&harness.calls, "roles.create"), 0);
    assert_eq!(count(&harness.calls, "cluster.create"), 0);
}

#[tokio::test]
async fn test_empty_oidc_id_fails_validation_without_submitting() {
    let harness = HarnessBuilder {
        created_oidc_id: String::new(),
        ..HarnessBuilder::default()
    }
    .build();

    let err = harness
        .controller
        .create(&hosted_options(), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.operation, Operation::Validation);
    assert!(matches!(
        err.kind(),
        ProvisionError::ValidationFailed {
            field: "oidc_config_id",
            ..
        }
    ));
    assert_eq!(count(&harness.calls, "cluster.create"), 0);
    assert!(err.cluster_id.is_none());
}

#[tokio::test]
async fn test_ready_wait_is_bounded_and_reports_cluster_id() {
    let harness = HarnessBuilder {
        installing_for: u32::MAX,
        ready_attempts: 4,
        ..HarnessBuilder::default()
    }
    .build();

    let err = harness
        .controller
        .create(&hosted_options(), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.operation, Operation::Cluster);
    assert_eq!(err.cluster_id.as_deref(), Some("id-c1"));
    assert!(matches!(
        err.kind(),
        ProvisionError::Timeout { attempts: 4, .. }
    ));
    assert_eq!(count(&harness.calls, "cluster.describe"), 4);
    assert_eq!(count(&harness.calls, "nodes.list"), 0);
}

#[tokio::test]
async fn test_hosted_delete_tears_down_in_reverse() {
    let harness = HarnessBuilder::default().build();
    harness
        .controller
        .create(&hosted_options(), CancellationToken::new())
        .await
        .unwrap();
    harness.calls.lock().unwrap().clear();

    harness
        .controller
        .delete(
            &DeleteOptions::new("id-c1", "c1").with_hosted_control_plane(true),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let calls = &harness.calls;
    assert!(position(calls, "oidc.cluster id-c1") < position(calls, "cluster.delete id-c1"));
    assert!(position(calls, "cluster.delete") < position(calls, "cluster.list"));
    assert!(position(calls, "cluster.list") < position(calls, "operator-roles.delete id-c1"));
    assert!(
        position(calls, "operator-roles.delete") < position(calls, "oidc.provider.delete id-c1")
    );
    assert!(position(calls, "oidc.provider.delete") < position(calls, "oidc.delete oidc-c1"));
    assert!(position(calls, "oidc.delete") < position(calls, "network.destroy c1"));
    assert!(position(calls, "network.destroy") < position(calls, "roles.delete c1"));

    // delete never re-creates or re-plans anything
    assert_eq!(count(calls, "network.plan"), 0);
    assert_eq!(count(calls, "roles.create"), 0);
    assert!(harness.identity.roles.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_classic_delete_without_sts_only_removes_cluster() {
    let harness = HarnessBuilder::default().build();

    harness
        .controller
        .delete(&DeleteOptions::new("id-c2", "c2"), CancellationToken::new())
        .await
        .unwrap();

    let calls = harness.calls.lock().unwrap().clone();
    assert_eq!(calls, vec!["cluster.delete id-c2", "cluster.list"]);
}
